//! Ledger configuration

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::types::*;

pub const JOURNAL_COUNTER: &str = "journal_entry";
pub const EXCHANGE_COUNTER: &str = "cash_box_exchange";

/// Runtime settings of the ledger core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency of the seeded chart of accounts
    pub base_currency: CurrencyCode,
    /// Largest |debit - credit| accepted as balanced
    pub balance_tolerance: BigDecimal,
    /// Decimal places kept on computed amounts (exchange results)
    pub amount_scale: i64,
    pub numbering: NumberingConfig,
    pub control_accounts: ControlAccounts,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: CurrencyCode::new("USD"),
            balance_tolerance: BigDecimal::new(1i64.into(), 2),
            amount_scale: 2,
            numbering: NumberingConfig::default(),
            control_accounts: ControlAccounts::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(data: &str) -> LedgerResult<Self> {
        let config: LedgerConfig =
            serde_json::from_str(data).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&data)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.balance_tolerance < BigDecimal::from(0) {
            return Err(LedgerError::Config(
                "balance_tolerance cannot be negative".to_string(),
            ));
        }
        if self.amount_scale < 0 {
            return Err(LedgerError::Config(
                "amount_scale cannot be negative".to_string(),
            ));
        }
        if self.base_currency.as_str().is_empty() {
            return Err(LedgerError::Config(
                "base_currency cannot be empty".to_string(),
            ));
        }
        self.numbering.journal.validate()?;
        self.numbering.exchange.validate()?;
        for format in self.numbering.by_reference_type.values() {
            format.validate()?;
        }
        self.numbering.check_journal_series_disjoint()
    }

    /// Whether a debit/credit difference is within tolerance
    pub fn within_tolerance(&self, difference: &BigDecimal) -> bool {
        difference.abs() <= self.balance_tolerance
    }

    /// Control account whose lines make up an entity kind's ledger balance
    pub fn control_account(&self, kind: EntityKind) -> Option<AccountId> {
        match kind {
            EntityKind::Customer => self.control_accounts.receivable,
            EntityKind::Supplier => self.control_accounts.payable,
        }
    }
}

/// Document numbering: a named counter rendered as `prefix` + zero-padded value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceFormat {
    pub counter: String,
    pub prefix: String,
    pub width: usize,
}

impl SequenceFormat {
    pub fn new(counter: impl Into<String>, prefix: impl Into<String>, width: usize) -> Self {
        Self {
            counter: counter.into(),
            prefix: prefix.into(),
            width,
        }
    }

    pub fn format(&self, value: u64) -> String {
        format!("{}{:0width$}", self.prefix, value, width = self.width)
    }

    fn may_overlap(&self, other: &SequenceFormat) -> bool {
        let digits_only = |rest: &str| rest.bytes().all(|b| b.is_ascii_digit());
        match (
            self.prefix.strip_prefix(other.prefix.as_str()),
            other.prefix.strip_prefix(self.prefix.as_str()),
        ) {
            (Some(rest), _) | (_, Some(rest)) => digits_only(rest),
            (None, None) => false,
        }
    }

    fn validate(&self) -> LedgerResult<()> {
        if self.counter.trim().is_empty() {
            return Err(LedgerError::Config("sequence counter cannot be empty".into()));
        }
        if self.prefix.trim().is_empty() {
            return Err(LedgerError::Config(format!(
                "sequence '{}' needs a prefix",
                self.counter
            )));
        }
        if self.width == 0 {
            return Err(LedgerError::Config(format!(
                "sequence '{}' needs a non-zero width",
                self.counter
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub journal: SequenceFormat,
    pub exchange: SequenceFormat,
    /// Dedicated journal series keyed by reference type (e.g. "sale" -> "SJ")
    pub by_reference_type: HashMap<String, SequenceFormat>,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            journal: SequenceFormat::new(JOURNAL_COUNTER, "J", 6),
            exchange: SequenceFormat::new(EXCHANGE_COUNTER, "EX", 6),
            by_reference_type: HashMap::new(),
        }
    }
}

impl NumberingConfig {
    /// Series used for a journal entry of the given document type
    pub fn journal_format(&self, reference_type: Option<&str>) -> &SequenceFormat {
        reference_type
            .and_then(|r| self.by_reference_type.get(r))
            .unwrap_or(&self.journal)
    }

    /// Journal series on separate counters must never render the same number.
    /// Two series can collide when one prefix is the other followed only by digits.
    fn check_journal_series_disjoint(&self) -> LedgerResult<()> {
        let series: Vec<&SequenceFormat> = std::iter::once(&self.journal)
            .chain(self.by_reference_type.values())
            .collect();
        for (i, a) in series.iter().enumerate() {
            for b in &series[i + 1..] {
                if a.counter != b.counter && a.may_overlap(b) {
                    return Err(LedgerError::Config(format!(
                        "journal series '{}' ({}) and '{}' ({}) can render the same number",
                        a.counter, a.prefix, b.counter, b.prefix
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlAccounts {
    pub receivable: Option<AccountId>,
    pub payable: Option<AccountId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_numbering_format() {
        let config = LedgerConfig::default();
        assert_eq!(config.numbering.journal.format(1), "J000001");
        assert_eq!(config.numbering.exchange.format(42), "EX000042");
        assert_eq!(config.balance_tolerance, "0.01".parse::<BigDecimal>().unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = LedgerConfig::from_json_str(
            r#"{
                "base_currency": "yer",
                "numbering": {
                    "by_reference_type": {
                        "sale": { "counter": "sale_journal", "prefix": "SJ", "width": 4 }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.base_currency.as_str(), "YER");
        assert_eq!(config.amount_scale, 2);
        assert_eq!(config.numbering.journal.prefix, "J");
        assert_eq!(config.numbering.journal_format(Some("sale")).format(7), "SJ0007");
        assert_eq!(config.numbering.journal_format(Some("manual")).prefix, "J");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = LedgerConfig::from_json_str(r#"{ "balance_tolerance": "-1" }"#).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));

        let err = LedgerConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_colliding_journal_series_rejected() {
        let err = LedgerConfig::from_json_str(
            r#"{
                "numbering": {
                    "by_reference_type": {
                        "sale": { "counter": "sale_journal", "prefix": "J", "width": 6 }
                    }
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));

        // "J0" + 5 digits renders like "J" + 6 digits
        let mut config = LedgerConfig::default();
        config.numbering.by_reference_type.insert(
            "purchase".to_string(),
            SequenceFormat::new("purchase_journal", "J0", 5),
        );
        assert!(config.validate().is_err());

        // Sharing the journal counter keeps numbers unique
        let mut config = LedgerConfig::default();
        config.numbering.by_reference_type.insert(
            "manual".to_string(),
            SequenceFormat::new(JOURNAL_COUNTER, "J", 6),
        );
        config.numbering.by_reference_type.insert(
            "return".to_string(),
            SequenceFormat::new("return_journal", "JR", 6),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_within_tolerance() {
        let config = LedgerConfig::default();
        assert!(config.within_tolerance(&"0.01".parse().unwrap()));
        assert!(config.within_tolerance(&"-0.004".parse().unwrap()));
        assert!(!config.within_tolerance(&"0.02".parse().unwrap()));
    }
}
