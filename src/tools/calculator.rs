//! Calculator tool
//!
//! Deterministic recursive-descent evaluator over + - * / % ^ and
//! parentheses. Italian-style comma decimals are accepted. No function calls,
//! no variables; anything outside the grammar is an error, never a guess.

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates an arithmetic expression: + - * / % ^ and parentheses"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let expr = args["expr"]
            .as_str()
            .ok_or_else(|| "Missing 'expr' argument".to_string())?;
        let value = evaluate(expr)?;
        Ok(format_number(value))
    }
}

/// Evaluate an infix expression to f64
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut parser = Parser::new(expr);
    let value = parser.expression()?;
    parser.skip_spaces();
    if parser.pos < parser.chars.len() {
        return Err(format!(
            "Unexpected character '{}' at position {}",
            parser.chars[parser.pos], parser.pos
        ));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".to_string());
    }
    Ok(value)
}

/// Integer results print without a trailing .0
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let formatted = format!("{:.10}", value);
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(expr: &str) -> Self {
        Self {
            chars: expr.chars().collect(),
            pos: 0,
        }
    }

    fn skip_spaces(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_spaces();
        self.chars.get(self.pos).copied()
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.pos += 1;
                    value += self.term()?;
                }
                '-' => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := power (('*' | '/' | '%') power)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.power()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.pos += 1;
                    value *= self.power()?;
                }
                '/' => {
                    self.pos += 1;
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err("Division by zero".to_string());
                    }
                    value /= divisor;
                }
                '%' => {
                    self.pos += 1;
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err("Modulo by zero".to_string());
                    }
                    value %= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // power := unary ('^' power)?   (right-associative)
    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some('^') {
            self.pos += 1;
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.expression()?;
                if self.peek() != Some(')') {
                    return Err("Unbalanced parentheses".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' || c == ',' => self.number(),
            Some(c) => Err(format!("Unexpected character '{}'", c)),
            None => Err("Unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        self.skip_spaces();
        let start = self.pos;
        let mut text = String::new();
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' || c == ',' {
                text.push('.');
            } else {
                break;
            }
            self.pos += 1;
        }
        text.parse::<f64>()
            .map_err(|_| format!("Invalid number at position {}", start))
    }
}
