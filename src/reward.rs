//! Structured compensation for opportunities.
//!
//! Datasets historically carried compensation as display text ("$5k - $10k",
//! "Up to 50k USDC"). Those strings are parsed once at load into
//! [`Compensation`]; everything downstream sorts on the amount and renders
//! the display string from the structured value.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::Error;
use crate::models::slug_enum;

slug_enum! {
    Currency {
        Usd => "usd",
        Eur => "eur",
        Eth => "eth",
        Usdc => "usdc",
        Usdt => "usdt",
        Dai => "dai",
        Op => "op",
        Arb => "arb",
        Unspecified => "unspecified",
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Unspecified
    }
}

slug_enum! {
    Period {
        Hour => "hour" | "hourly",
        Month => "month" | "monthly",
        Year => "year" | "yearly" | "annual",
        OneOff => "one-off",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompensationRepr")]
pub struct Compensation {
    pub amount: Option<f64>,
    pub max: Option<f64>,
    pub currency: Currency,
    pub period: Option<Period>,
    /// Free text kept only when no amount could be recovered ("Competitive").
    pub note: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CompensationRepr {
    Text(String),
    Structured {
        #[serde(default)]
        amount: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        currency: Currency,
        #[serde(default)]
        period: Option<Period>,
        #[serde(default)]
        note: Option<String>,
    },
}

impl TryFrom<CompensationRepr> for Compensation {
    type Error = Error;

    fn try_from(repr: CompensationRepr) -> Result<Self, Self::Error> {
        match repr {
            CompensationRepr::Text(text) => Compensation::parse_legacy(&text),
            CompensationRepr::Structured {
                amount,
                max,
                currency,
                period,
                note,
            } => Ok(Compensation {
                amount,
                max,
                currency,
                period,
                note,
            }),
        }
    }
}

/// Amount with optional `k`/`m` suffix.
static AMOUNT_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*(?:\.\d+)?)(?:\s*([kKmM])\b)?"));

static CURRENCY_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(usdc|usdt|dai|eth|op|arb|eur|usd)\b"));

fn compiled(pattern: &'static LazyLock<Result<Regex, regex::Error>>) -> crate::error::Result<&'static Regex> {
    pattern.as_ref().map_err(|e| Error::Regex(e.clone()))
}

impl Compensation {
    pub fn undisclosed() -> Self {
        Self {
            amount: None,
            max: None,
            currency: Currency::Unspecified,
            period: None,
            note: None,
        }
    }

    /// Best-effort recovery of a structured amount from display text.
    ///
    /// The first number (thousands separators dropped, `k`/`m` suffixes
    /// applied) becomes the amount, a second number the top of the range.
    pub fn parse_legacy(text: &str) -> crate::error::Result<Self> {
        let number = compiled(&AMOUNT_PATTERN)?;
        let token = compiled(&CURRENCY_PATTERN)?;

        let values: Vec<f64> = number
            .captures_iter(text)
            .filter_map(|caps| {
                let digits = caps[1].replace(',', "");
                let value: f64 = digits.parse().ok()?;
                let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
                    Some("k") => 1_000.0,
                    Some("m") => 1_000_000.0,
                    _ => 1.0,
                };
                Some(value * multiplier)
            })
            .collect();

        let currency = if let Some(caps) = token.captures(text) {
            caps[1].parse().unwrap_or_default()
        } else if text.contains('€') {
            Currency::Eur
        } else if text.contains('$') {
            Currency::Usd
        } else {
            Currency::Unspecified
        };

        let lower = text.to_lowercase();
        let period = if ["/yr", "/year", "per year", "annual", "yearly"].iter().any(|p| lower.contains(p)) {
            Some(Period::Year)
        } else if ["/mo", "per month", "monthly"].iter().any(|p| lower.contains(p)) {
            Some(Period::Month)
        } else if ["/hr", "/hour", "per hour", "hourly"].iter().any(|p| lower.contains(p)) {
            Some(Period::Hour)
        } else {
            None
        };

        let (amount, max) = match (values.first().copied(), values.get(1).copied()) {
            (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
            (a, b) => (a, b),
        };

        let trimmed = text.trim();
        let note = if amount.is_none() && !trimmed.is_empty() {
            Some(trimmed.to_string())
        } else {
            None
        };

        Ok(Self {
            amount,
            max,
            currency,
            period,
            note,
        })
    }

    /// Numeric magnitude used for ordering.
    pub fn magnitude(&self) -> Option<f64> {
        self.amount
    }
}

fn format_amount(value: f64) -> String {
    if value.fract() != 0.0 {
        let s = format!("{:.4}", value);
        return s.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    let digits = format!("{}", value as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_with_currency(value: f64, currency: Currency) -> String {
    let amount = format_amount(value);
    match currency {
        Currency::Usd => format!("${}", amount),
        Currency::Eur => format!("€{}", amount),
        Currency::Unspecified => amount,
        token => format!("{} {}", amount, token.slug().to_uppercase()),
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(amount) = self.amount else {
            return f.write_str(self.note.as_deref().unwrap_or("Undisclosed"));
        };
        write!(f, "{}", format_with_currency(amount, self.currency))?;
        if let Some(max) = self.max {
            write!(f, " - {}", format_with_currency(max, self.currency))?;
        }
        match self.period {
            Some(Period::Hour) => f.write_str("/hour"),
            Some(Period::Month) => f.write_str("/month"),
            Some(Period::Year) => f.write_str("/year"),
            Some(Period::OneOff) | None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dollar_range() {
        let c = Compensation::parse_legacy("$5,000 - $10,000").unwrap();
        assert_eq!(c.amount, Some(5000.0));
        assert_eq!(c.max, Some(10000.0));
        assert_eq!(c.currency, Currency::Usd);
        assert_eq!(c.to_string(), "$5,000 - $10,000");
    }

    #[test]
    fn test_parse_token_with_suffix() {
        let c = Compensation::parse_legacy("Up to 50k USDC").unwrap();
        assert_eq!(c.amount, Some(50_000.0));
        assert_eq!(c.currency, Currency::Usdc);
        assert_eq!(c.to_string(), "50,000 USDC");
    }

    #[test]
    fn test_parse_fractional_eth() {
        let c = Compensation::parse_legacy("2.5 ETH").unwrap();
        assert_eq!(c.amount, Some(2.5));
        assert_eq!(c.to_string(), "2.5 ETH");
    }

    #[test]
    fn test_parse_salary_period_and_order() {
        let c = Compensation::parse_legacy("$180k-$120k/year + equity").unwrap();
        assert_eq!(c.amount, Some(120_000.0));
        assert_eq!(c.max, Some(180_000.0));
        assert_eq!(c.period, Some(Period::Year));
        assert_eq!(c.to_string(), "$120,000 - $180,000/year");
    }

    #[test]
    fn test_parse_month_word_is_not_a_multiplier() {
        let c = Compensation::parse_legacy("6 months, competitive").unwrap();
        assert_eq!(c.amount, Some(6.0));
    }

    #[test]
    fn test_parse_without_numbers_keeps_note() {
        let c = Compensation::parse_legacy("Competitive").unwrap();
        assert_eq!(c.amount, None);
        assert_eq!(c.to_string(), "Competitive");
        assert_eq!(Compensation::undisclosed().to_string(), "Undisclosed");
    }

    #[test]
    fn test_patterns_compile_once_and_are_shared() {
        let first = compiled(&AMOUNT_PATTERN).unwrap();
        let second = compiled(&AMOUNT_PATTERN).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(compiled(&CURRENCY_PATTERN).is_ok());

        let a = Compensation::parse_legacy("10k DAI").unwrap();
        let b = Compensation::parse_legacy("10k DAI").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.currency, Currency::Dai);
    }

    #[test]
    fn test_deserialize_both_shapes() {
        let legacy: Compensation = serde_json::from_str("\"€3,000/month\"").unwrap();
        assert_eq!(legacy.currency, Currency::Eur);
        assert_eq!(legacy.period, Some(Period::Month));

        let structured: Compensation =
            serde_json::from_str(r#"{"amount": 25000, "currency": "op"}"#).unwrap();
        assert_eq!(structured.amount, Some(25000.0));
        assert_eq!(structured.to_string(), "25,000 OP");
    }
}
