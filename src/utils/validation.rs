//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;
use std::collections::HashSet;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal, field: &str) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::Validation(format!("{field} must be positive")))
    } else {
        Ok(())
    }
}

/// Validate that an amount is zero or positive
pub fn validate_non_negative_amount(amount: &BigDecimal, field: &str) -> LedgerResult<()> {
    if *amount < BigDecimal::from(0) {
        Err(LedgerError::Validation(format!("{field} cannot be negative")))
    } else {
        Ok(())
    }
}

/// Validate that a required text field is present
pub fn validate_required(value: &str, field: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        Err(LedgerError::Validation(format!("{field} cannot be empty")))
    } else {
        Ok(())
    }
}

/// Validate an account code: digits, optionally grouped with dots or dashes
pub fn validate_account_code(code: &str) -> LedgerResult<()> {
    validate_required(code, "Account code")?;

    if code.len() > 20 {
        return Err(LedgerError::Validation(
            "Account code cannot exceed 20 characters".to_string(),
        ));
    }

    if !code.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(LedgerError::Validation(
            "Account code must start with a digit".to_string(),
        ));
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(LedgerError::Validation(
            "Account code can only contain digits, dots and dashes".to_string(),
        ));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    validate_required(name, "Account name")?;

    if name.chars().count() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a three-letter alphabetic currency code
pub fn validate_currency_code(code: &CurrencyCode) -> LedgerResult<()> {
    let raw = code.as_str();
    if raw.len() != 3 || !raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LedgerError::Validation(format!(
            "Currency code '{raw}' must be three letters"
        )));
    }
    Ok(())
}

/// Validate that a journal entry description is valid
pub fn validate_entry_description(description: &str) -> LedgerResult<()> {
    validate_required(description, "Journal entry description")?;

    if description.chars().count() > 500 {
        return Err(LedgerError::Validation(
            "Journal entry description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Entry validator with house rules on top of the structural checks
pub struct StrictEntryValidator;

impl EntryValidator for StrictEntryValidator {
    fn validate_entry(&self, entry: &NewJournalEntry) -> LedgerResult<()> {
        validate_entry_description(&entry.description)?;

        // The same account may not appear twice on the same side
        let mut seen = HashSet::new();
        for line in &entry.lines {
            let side = if line.debit_amount > BigDecimal::from(0) {
                EntryType::Debit
            } else {
                EntryType::Credit
            };
            if !seen.insert((line.account_id, side)) {
                return Err(LedgerError::Validation(format!(
                    "Account {} appears more than once on the {:?} side",
                    line.account_id, side
                )));
            }
        }

        Ok(())
    }
}

/// Account validator enforcing code, name and currency formats
pub struct StrictAccountValidator;

impl AccountValidator for StrictAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        validate_account_code(&account.code)?;
        validate_account_name(&account.name)?;
        validate_currency_code(&account.currency)?;
        Ok(())
    }

    fn validate_deactivation(&self, _account: &Account) -> LedgerResult<()> {
        Ok(())
    }
}
