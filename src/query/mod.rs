//! Query layer: normalization, intent classification, strategy selection

pub mod intent;
pub mod normalizer;
pub mod strategy;

pub use intent::{Classification, ClassifierSource, Intent, IntentClassifier, LiveDomain};
pub use normalizer::{normalize, Language, NormalizedQuery};
pub use strategy::{select_strategy, Strategy, StrategyDecision};
