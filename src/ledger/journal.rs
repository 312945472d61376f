//! Journal entry posting and balance derivation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::ledger::account::AccountTree;
use crate::traits::*;
use crate::types::*;

/// Check that total debits and credits agree within `tolerance`.
///
/// The reported difference is signed: debits minus credits.
pub fn check_balance(
    total_debit: &BigDecimal,
    total_credit: &BigDecimal,
    tolerance: &BigDecimal,
) -> LedgerResult<()> {
    let difference = total_debit - total_credit;
    if difference.abs() > *tolerance {
        return Err(LedgerError::UnbalancedEntry { difference });
    }
    Ok(())
}

/// Creates, numbers and transitions journal entries
pub struct JournalEngine<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn EntryValidator>,
    config: Arc<LedgerConfig>,
}

impl<S: LedgerStorage> JournalEngine<S> {
    pub fn new(storage: S, config: Arc<LedgerConfig>) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultEntryValidator),
            config,
        }
    }

    /// Create a journal engine with a custom entry validator
    pub fn with_validator(
        storage: S,
        config: Arc<LedgerConfig>,
        validator: Box<dyn EntryValidator>,
    ) -> Self {
        Self {
            storage,
            validator,
            config,
        }
    }

    /// Validate, number and persist an entry as `draft` (or `posted` when requested).
    ///
    /// Nothing is written and no number is consumed unless every check passes.
    pub async fn create_entry(&self, entry: NewJournalEntry) -> LedgerResult<JournalEntry> {
        let mut tx = self.storage.begin().await?;
        let created = self.create_entry_in(&mut tx, entry).await?;
        tx.commit().await?;

        info!(
            entry_number = %created.entry_number,
            status = ?created.status,
            total = %created.total_debit,
            lines = created.lines.len(),
            "journal entry created"
        );
        Ok(created)
    }

    /// Entry creation against a caller-owned transaction
    pub(crate) async fn create_entry_in<T: StorageTransaction>(
        &self,
        tx: &mut T,
        entry: NewJournalEntry,
    ) -> LedgerResult<JournalEntry> {
        entry.validate()?;

        for line in &entry.lines {
            let account = tx
                .get_account(line.account_id)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(line.account_id.to_string()))?;
            if account.is_header {
                warn!(code = %account.code, "posting to header account rejected");
                return Err(LedgerError::HeaderAccountPosting(account.code));
            }
            if !account.is_active {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' is inactive",
                    account.code
                )));
            }
        }

        let total_debit = entry.total_debit();
        let total_credit = entry.total_credit();
        if let Err(err) =
            check_balance(&total_debit, &total_credit, &self.config.balance_tolerance)
        {
            warn!(debit = %total_debit, credit = %total_credit, "unbalanced entry rejected");
            return Err(err);
        }

        self.validator.validate_entry(&entry)?;

        let format = self
            .config
            .numbering
            .journal_format(entry.reference_type.as_deref());
        let value = tx.next_sequence_value(&format.counter).await?;
        let entry_number = format.format(value);

        let now = chrono::Utc::now().naive_utc();
        let lines = entry
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, line)| JournalLine {
                line_no: idx as u32 + 1,
                account_id: line.account_id,
                description: line.description,
                debit_amount: line.debit_amount,
                credit_amount: line.credit_amount,
                party: line.party,
            })
            .collect();

        let created = JournalEntry {
            id: EntryId::new(),
            entry_number,
            date: entry.date,
            description: entry.description,
            reference_type: entry.reference_type,
            reference_id: entry.reference_id,
            branch_id: entry.branch_id,
            created_by: entry.actor,
            total_debit,
            total_credit,
            status: if entry.post_immediately {
                EntryStatus::Posted
            } else {
                EntryStatus::Draft
            },
            lines,
            created_at: now,
            updated_at: now,
        };

        tx.insert_entry(&created).await?;
        Ok(created)
    }

    /// Move a draft to `posted`
    pub async fn post_entry(&self, id: EntryId) -> LedgerResult<JournalEntry> {
        self.transition(id, EntryStatus::Posted).await
    }

    /// Move a draft to `cancelled`
    pub async fn cancel_entry(&self, id: EntryId) -> LedgerResult<JournalEntry> {
        self.transition(id, EntryStatus::Cancelled).await
    }

    async fn transition(&self, id: EntryId, next: EntryStatus) -> LedgerResult<JournalEntry> {
        let mut tx = self.storage.begin().await?;
        let mut entry = tx
            .get_entry(id)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))?;

        if !entry.status.can_transition_to(next) {
            warn!(
                entry_number = %entry.entry_number,
                from = ?entry.status,
                to = ?next,
                "illegal status transition"
            );
            return Err(LedgerError::InvalidStatusTransition {
                from: entry.status,
                to: next,
            });
        }

        entry.status = next;
        entry.updated_at = chrono::Utc::now().naive_utc();
        tx.update_entry(&entry).await?;
        tx.commit().await?;

        info!(entry_number = %entry.entry_number, status = ?next, "journal entry status changed");
        Ok(entry)
    }

    pub async fn get_entry(&self, id: EntryId) -> LedgerResult<Option<JournalEntry>> {
        self.storage.begin().await?.get_entry(id).await
    }

    /// Get an entry by ID, returning an error if not found
    pub async fn get_entry_required(&self, id: EntryId) -> LedgerResult<JournalEntry> {
        self.get_entry(id)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))
    }

    pub async fn list_entries(&self, filter: &EntryFilter) -> LedgerResult<Vec<JournalEntry>> {
        self.storage.begin().await?.list_entries(filter).await
    }

    /// Balance of an account from posted lines dated on or before `as_of`.
    ///
    /// Header accounts roll up every descendant. The sign follows the account's
    /// normal side, so a debit-normal account with net debits is positive.
    pub async fn account_balance(
        &self,
        account_id: AccountId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        let mut tx = self.storage.begin().await?;
        let account = tx
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

        let scope: HashSet<AccountId> = if account.is_header {
            let tree = AccountTree::build(tx.list_accounts().await?)?;
            tree.descendants(account_id).into_iter().collect()
        } else {
            HashSet::from([account_id])
        };

        let entries = tx.list_entries(&EntryFilter::posted_until(as_of)).await?;
        let net: BigDecimal = entries
            .iter()
            .flat_map(|e| e.lines.iter())
            .filter(|l| scope.contains(&l.account_id))
            .map(JournalLine::net_debit)
            .sum();

        debug!(
            code = %account.code,
            accounts = scope.len(),
            net_debit = %net,
            "account balance derived"
        );
        Ok(match account.account_type.normal_balance() {
            EntryType::Debit => net,
            EntryType::Credit => -net,
        })
    }

    /// Debit/credit balances of every postable account as of a date
    pub async fn trial_balance(&self, as_of: NaiveDate) -> LedgerResult<TrialBalance> {
        let mut tx = self.storage.begin().await?;
        let accounts = tx.list_accounts().await?;
        let entries = tx.list_entries(&EntryFilter::posted_until(Some(as_of))).await?;

        let mut net: HashMap<AccountId, BigDecimal> = HashMap::new();
        for line in entries.iter().flat_map(|e| e.lines.iter()) {
            *net.entry(line.account_id).or_insert_with(|| BigDecimal::from(0)) += line.net_debit();
        }

        let zero = BigDecimal::from(0);
        let mut rows = Vec::new();
        let mut total_debits = BigDecimal::from(0);
        let mut total_credits = BigDecimal::from(0);

        for account in accounts.iter().filter(|a| a.is_postable()) {
            let Some(balance) = net.get(&account.id) else {
                continue;
            };
            let (debit_balance, credit_balance) = if *balance > zero {
                total_debits += balance;
                (Some(balance.clone()), None)
            } else if *balance < zero {
                let credit = -balance.clone();
                total_credits += &credit;
                (None, Some(credit))
            } else {
                continue;
            };
            rows.push(TrialBalanceRow {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                debit_balance,
                credit_balance,
            });
        }

        let is_balanced = self
            .config
            .within_tolerance(&(&total_debits - &total_credits));
        Ok(TrialBalance {
            as_of_date: as_of,
            rows,
            total_debits,
            total_credits,
            is_balanced,
        })
    }
}
