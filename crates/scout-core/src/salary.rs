//! Salary text parsing.
//!
//! Listing pages advertise pay as free text ("R$ 5.000,00", "$3,500/mo",
//! "USD 120k"). Only the currency and the first amount are recovered; ranges
//! resolve to their lower bound.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d.,]*)(\s*[kK]\b)?").expect("salary amount regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Brl,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Usd => write!(f, "USD"),
            Currency::Brl => write!(f, "BRL"),
        }
    }
}

/// An amount recovered from salary text. `currency` is `None` when the text
/// carries no recognisable currency marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Salary {
    pub currency: Option<Currency>,
    pub amount: f64,
}

/// Detect the currency of a salary text. `R$`/`BRL` win over a bare `$`.
pub fn detect_currency(text: &str) -> Option<Currency> {
    let upper = text.to_uppercase();
    if upper.contains("R$") || upper.contains("BRL") {
        Some(Currency::Brl)
    } else if upper.contains('$') || upper.contains("USD") {
        Some(Currency::Usd)
    } else {
        None
    }
}

/// Parse the first amount in `text`. Returns `None` when no number is present.
pub fn parse_salary(text: &str) -> Option<Salary> {
    let caps = AMOUNT_RE.captures(text)?;
    let mut amount = parse_amount(caps.get(1)?.as_str())?;
    if caps.get(2).is_some() {
        amount *= 1000.0;
    }
    Some(Salary {
        currency: detect_currency(text),
        amount,
    })
}

/// Normalise a number using either `1,234.56` or `1.234,56` conventions.
///
/// With both separators present the last one is the decimal mark. With a
/// single kind, a lone separator followed by exactly three digits groups
/// thousands; anything else is a decimal mark.
fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim_end_matches(['.', ',']);
    let has_dot = raw.contains('.');
    let has_comma = raw.contains(',');

    let normalized = match (has_dot, has_comma) {
        (true, true) => {
            let last_dot = raw.rfind('.')?;
            let last_comma = raw.rfind(',')?;
            let (thousands, decimal) = if last_comma > last_dot {
                ('.', ',')
            } else {
                (',', '.')
            };
            raw.replace(thousands, "").replace(decimal, ".")
        }
        (true, false) | (false, true) => {
            let sep = if has_dot { '.' } else { ',' };
            let parts: Vec<&str> = raw.split(sep).collect();
            let grouped = parts.len() > 2 || parts.last().is_some_and(|p| p.len() == 3);
            if grouped {
                raw.replace(sep, "")
            } else {
                raw.replace(sep, ".")
            }
        }
        (false, false) => raw.to_string(),
    };

    normalized.parse().ok()
}
