//! Intent classification
//!
//! Ordered heuristic ladder over the normalized query:
//! 1. URL present → WebRead (0.95), regardless of other matches
//! 2. Smalltalk / remember-statement guard → DirectLlm (0.90)
//! 3. Pure arithmetic expression → Calculator (0.95)
//! 4. Recall phrasing → MemoryRecall (0.85)
//! 5. Code-writing phrasing → CodeGen (0.85)
//! 6. Live-data domain table: keyword + pattern → 0.95, one of the two → 0.80
//! 7. No signal → DirectLlm (0.80)
//!
//! Below `pattern_confidence_threshold` an optional model fallback is asked
//! for a category; its answer is kept only when its self-reported confidence
//! clears `model_confidence_threshold`. Domain data lives in a typed table
//! consumed by one pure scoring function, not in branching code.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::ClassifierSection;
use crate::llm::{CompletionClient, GenerationParams};
use crate::query::normalizer::NormalizedQuery;

/// What kind of answer the query wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    DirectLlm,
    WebSearch,
    WebRead,
    Calculator,
    MemoryRecall,
    CodeGen,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::DirectLlm => "direct_llm",
            Intent::WebSearch => "web_search",
            Intent::WebRead => "web_read",
            Intent::Calculator => "calculator",
            Intent::MemoryRecall => "memory_recall",
            Intent::CodeGen => "code_gen",
        }
    }
}

/// Live-data domain behind a WebSearch intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveDomain {
    Weather,
    Price,
    Sports,
    News,
    Schedule,
    Betting,
    Trading,
}

impl LiveDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveDomain::Weather => "weather",
            LiveDomain::Price => "price",
            LiveDomain::Sports => "sports",
            LiveDomain::News => "news",
            LiveDomain::Schedule => "schedule",
            LiveDomain::Betting => "betting",
            LiveDomain::Trading => "trading",
        }
    }
}

/// Which stage produced the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierSource {
    Pattern,
    Model,
}

impl ClassifierSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierSource::Pattern => "pattern",
            ClassifierSource::Model => "model",
        }
    }
}

/// Classification outcome; never an error, worst case DirectLlm at low confidence
#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: Intent,
    pub domain: Option<LiveDomain>,
    pub confidence: f32,
    pub source: ClassifierSource,
    pub low_confidence: bool,
    /// First URL found in the text, for the WebRead path
    pub url: Option<String>,
}

/// One live-data domain: keywords for containment checks, patterns for structure
struct DomainRule {
    domain: LiveDomain,
    keywords: &'static [&'static str],
    patterns: &'static [&'static str],
}

static DOMAIN_RULES: &[DomainRule] = &[
    DomainRule {
        domain: LiveDomain::Weather,
        keywords: &[
            "meteo", "previsioni", "che tempo", "weather", "forecast", "temperatura",
            "pioggia", "neve",
        ],
        patterns: &[
            r"\b(che\s+tempo\s+fa|previsioni\s+(del\s+tempo|meteo)|weather\s+(in|for|today)|forecast\s+for)\b",
            r"\b(meteo|temperatura)\s+[a-zàèéìòù]+",
        ],
    },
    DomainRule {
        domain: LiveDomain::Price,
        keywords: &[
            "prezzo", "prezzi", "quotazione", "quanto vale", "valore", "cambio", "borsa",
            "azioni", "price", "stock", "crypto", "bitcoin", "btc", "ethereum", "eth",
            "eur/usd", "eurusd",
        ],
        patterns: &[
            r"\b(quanto\s+vale|tasso\s+di\s+cambio|price\s+of|exchange\s+rate|quotazione\s+di)\b",
            r"\b(btc|eth|sol|ada|bnb|aapl|nvda|tsla|msft|googl)\b",
        ],
    },
    DomainRule {
        domain: LiveDomain::Sports,
        keywords: &[
            "risultati", "risultato", "partita", "partite", "classifica", "punteggio",
            "score", "match", "gara",
        ],
        patterns: &[
            r"\b(chi\s+ha\s+vinto|who\s+won|final\s+score|com'è\s+finita)\b",
            r"\b(risultat\w+|partit\w+|classifica)\b.*\b(oggi|live|stasera|ieri|serie\s+[a-c])\b",
        ],
    },
    DomainRule {
        domain: LiveDomain::News,
        keywords: &[
            "notizie", "news", "ultime", "breaking", "cronaca", "attualità", "headlines",
            "annuncio",
        ],
        patterns: &[
            r"\b(ultime\s+(notizie|novit\w+)|breaking\s+news|latest\s+news)\b",
            r"\b(cosa\s+è\s+successo|what\s+happened)\b.*\b(oggi|today)\b",
        ],
    },
    DomainRule {
        domain: LiveDomain::Schedule,
        keywords: &[
            "orari", "orario", "calendario", "programma", "palinsesto", "schedule",
            "fixtures",
        ],
        patterns: &[
            r"\b(quando\s+(gioca|inizia|apre|chiude|parte)|a\s+che\s+ora)\b",
            r"\b(orari\s+(di|del|della)|calendario\s+(di|del|della)|what\s+time\s+does)\b",
        ],
    },
    DomainRule {
        domain: LiveDomain::Betting,
        keywords: &[
            "quote", "scommesse", "scommessa", "pronostico", "pronostici", "odds",
            "bookmaker",
        ],
        patterns: &[
            r"\b(quote\s+(per|di|su)|odds\s+(for|on))\b",
            r"\b(pronostic\w+|schedina|quota\s+vincente)\b",
        ],
    },
    DomainRule {
        domain: LiveDomain::Trading,
        keywords: &[
            "trading", "trend", "supporto", "resistenza", "volatilità", "rsi", "macd",
            "candlestick",
        ],
        patterns: &[
            r"\b(analisi\s+tecnica|technical\s+analysis)\b",
            r"\b(supporto|resistenza|breakout|rsi|macd)\b.*\b(btc|eth|borsa|mercato|market)\b",
        ],
    },
];

fn compiled_domain_patterns() -> &'static Vec<(usize, Vec<Regex>)> {
    static COMPILED: OnceLock<Vec<(usize, Vec<Regex>)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        DOMAIN_RULES
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let regexes = rule
                    .patterns
                    .iter()
                    .map(|p| Regex::new(p).unwrap())
                    .collect();
                (i, regexes)
            })
            .collect()
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"]+"#).unwrap())
}

fn calc_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\s0-9\.,\+\-\*/\^%\(\)]+$").unwrap())
}

fn smalltalk_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"^(ciao|hello|hi|hey|buongiorno|buonasera|salve)[\s!?.]*$",
            r"^(come\s+stai|come\s+va|how\s+are\s+you)[\s?]*$",
            r"^(ok|okay|grazie|thanks|thank\s+you|perfetto|perfect)[\s!.]*$",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn remember_statement_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(ricorda(ti)?\s+che|ricorda\s+questo|remember\s+that|ricordati:)\s+")
            .unwrap()
    })
}

fn recall_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"\b(ti\s+ricordi|do\s+you\s+remember|abbiamo\s+(detto|parlato)|we\s+(discussed|talked\s+about))\b",
            r"\b(cosa\s+sai\s+(di|su)\s+(di\s+)?me|what\s+do\s+you\s+know\s+about\s+me)\b",
            r"\b(la\s+scorsa\s+volta|last\s+time|le\s+mie\s+preferenze|my\s+preferences)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn code_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"\b(scrivi|crea|genera|write|create|generate)\b.*\b(codice|code|script|funzione|function|classe|class)\b",
            r"\b(debug|fix|refactor|ottimizza|optimize)\b.*\b(codice|code|funzione|function|script)\b",
            r"```",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

static THEORETICAL_PHRASES: &[&str] = &[
    "cos'è", "cosa è", "che cos'è", "what is", "spiegami", "explain", "definizione",
    "definition", "come funziona", "how does", "perché", "perchè", "why", "differenza tra",
    "difference between", "tutorial", "guida", "guide", "storia di",
];

/// Score every domain rule against the match text; best single hit wins.
/// Keyword and pattern both present → 0.95, one of the two → 0.80.
fn score_domains(match_text: &str) -> Option<(LiveDomain, f32)> {
    let mut best: Option<(LiveDomain, f32)> = None;
    for (i, regexes) in compiled_domain_patterns() {
        let rule = &DOMAIN_RULES[*i];
        let keyword_hit = rule.keywords.iter().any(|kw| match_text.contains(kw));
        let pattern_hit = regexes.iter().any(|re| re.is_match(match_text));
        let confidence = match (keyword_hit, pattern_hit) {
            (true, true) => 0.95,
            (true, false) | (false, true) => 0.80,
            (false, false) => continue,
        };
        let better = match best {
            Some((_, c)) => confidence > c,
            None => true,
        };
        if better {
            best = Some((rule.domain, confidence));
        }
    }
    best
}

/// Pattern-first classifier with optional model fallback
pub struct IntentClassifier {
    thresholds: ClassifierSection,
    fallback: Option<Arc<dyn CompletionClient>>,
}

impl IntentClassifier {
    pub fn new(thresholds: ClassifierSection, fallback: Option<Arc<dyn CompletionClient>>) -> Self {
        Self { thresholds, fallback }
    }

    /// Classify a normalized query. Infallible: every input yields a decision.
    pub async fn classify(&self, query: &NormalizedQuery) -> Classification {
        let mut decision = self.classify_by_pattern(query);

        if decision.confidence < self.thresholds.pattern_confidence_threshold
            && self.thresholds.model_fallback_enabled
        {
            if let Some(model_decision) = self.classify_by_model(&query.clean_text).await {
                if model_decision.confidence >= self.thresholds.model_confidence_threshold {
                    decision = model_decision;
                }
            }
        }

        decision.low_confidence = decision.confidence < self.thresholds.low_confidence_threshold;
        debug!(
            intent = decision.intent.as_str(),
            domain = decision.domain.map(|d| d.as_str()).unwrap_or("-"),
            confidence = decision.confidence,
            source = decision.source.as_str(),
            "query classified"
        );
        decision
    }

    fn classify_by_pattern(&self, query: &NormalizedQuery) -> Classification {
        let text = &query.match_text;

        if text.is_empty() {
            return pattern_result(Intent::DirectLlm, None, 0.30, None);
        }

        // URL wins over everything else
        if let Some(m) = url_regex().find(&query.clean_text) {
            return pattern_result(Intent::WebRead, None, 0.95, Some(m.as_str().to_string()));
        }

        // Smalltalk and remember-statements stay conversational even when a
        // live-data keyword happens to appear in them
        if smalltalk_regexes().iter().any(|re| re.is_match(text))
            || remember_statement_regex().is_match(text)
        {
            return pattern_result(Intent::DirectLlm, None, 0.90, None);
        }

        // Pure arithmetic: digits plus operators only
        if calc_regex().is_match(text)
            && text.chars().any(|c| c.is_ascii_digit())
            && text.chars().any(|c| "+-*/^%".contains(c))
        {
            return pattern_result(Intent::Calculator, None, 0.95, None);
        }

        if recall_regexes().iter().any(|re| re.is_match(text)) {
            return pattern_result(Intent::MemoryRecall, None, 0.85, None);
        }

        if code_regexes().iter().any(|re| re.is_match(text)) {
            return pattern_result(Intent::CodeGen, None, 0.85, None);
        }

        let theoretical = THEORETICAL_PHRASES.iter().any(|p| text.contains(p));

        if let Some((domain, confidence)) = score_domains(text) {
            // A single weak live signal inside a conceptual question is
            // ambiguous; prefer the model's own knowledge
            if theoretical && confidence < 0.95 {
                return pattern_result(Intent::DirectLlm, None, 0.60, None);
            }
            return pattern_result(Intent::WebSearch, Some(domain), confidence, None);
        }

        pattern_result(Intent::DirectLlm, None, 0.80, None)
    }

    /// Ask the completion service for a category; answers look like
    /// `RESEARCH high`. Any parse or transport failure keeps the pattern result.
    async fn classify_by_model(&self, clean_text: &str) -> Option<Classification> {
        let fallback = self.fallback.as_ref()?;
        let prompt = format!(
            "Classifica questa query in UNA categoria:\n\
             - GENERAL: domande generali, conversazione\n\
             - CODE: richieste di codice, programmazione, debug\n\
             - RESEARCH: informazioni fresche, notizie, prezzi, meteo\n\
             - CALCULATION: calcoli matematici\n\
             - MEMORY: riferimenti a conversazioni passate\n\n\
             Query: \"{}\"\n\n\
             Rispondi con: CATEGORIA confidenza(high|medium|low). Esempio: RESEARCH high",
            clean_text
        );
        let persona = "Sei un classificatore di query. Rispondi solo nel formato richiesto.";
        let params = GenerationParams {
            temperature: 0.0,
            max_tokens: 10,
            stop: Vec::new(),
        };

        let answer = match fallback.complete(&prompt, persona, &params).await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "model classification unavailable");
                return None;
            }
        };

        let upper = answer.trim().to_uppercase();
        let intent = if upper.contains("RESEARCH") {
            Intent::WebSearch
        } else if upper.contains("CODE") {
            Intent::CodeGen
        } else if upper.contains("CALCULATION") {
            Intent::Calculator
        } else if upper.contains("MEMORY") {
            Intent::MemoryRecall
        } else if upper.contains("GENERAL") {
            Intent::DirectLlm
        } else {
            debug!(answer = %answer, "unparseable model classification");
            return None;
        };
        let confidence = if upper.contains("HIGH") {
            0.9
        } else if upper.contains("MEDIUM") {
            0.6
        } else {
            0.3
        };

        Some(Classification {
            intent,
            domain: None,
            confidence,
            source: ClassifierSource::Model,
            low_confidence: false,
            url: None,
        })
    }
}

fn pattern_result(
    intent: Intent,
    domain: Option<LiveDomain>,
    confidence: f32,
    url: Option<String>,
) -> Classification {
    Classification {
        intent,
        domain,
        confidence,
        source: ClassifierSource::Pattern,
        low_confidence: false,
        url,
    }
}
