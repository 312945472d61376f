//! In-memory storage implementation for testing and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<EntryId, JournalEntry>,
    mappings: HashMap<MappingId, AccountMapping>,
    rates: Vec<ExchangeRate>,
    cash_boxes: HashMap<CashBoxId, CashBox>,
    exchanges: Vec<CashBoxExchange>,
    sequences: HashMap<String, u64>,
}

/// In-memory storage for testing and development
///
/// Cloning yields another handle to the same data. Transactions are serialised:
/// each one holds the store lock from `begin` until it is committed or dropped,
/// and works on a private copy of the state that replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter without advancing it
    pub async fn sequence_value(&self, counter: &str) -> u64 {
        self.state
            .lock()
            .await
            .sequences
            .get(counter)
            .copied()
            .unwrap_or(0)
    }

    /// Number of stored journal entries, whatever their status
    pub async fn entry_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Clear all data (useful for testing)
    pub async fn clear(&self) {
        *self.state.lock().await = MemoryState::default();
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> LedgerResult<MemoryTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(MemoryTransaction { guard, staged })
    }
}

/// Transaction over [`MemoryStorage`]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StorageTransaction for MemoryTransaction {
    async fn get_account(&mut self, id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.staged.accounts.get(&id).cloned())
    }

    async fn find_account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .staged
            .accounts
            .values()
            .find(|account| account.code == code)
            .cloned())
    }

    async fn list_accounts(&mut self) -> LedgerResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self.staged.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        if self.staged.accounts.contains_key(&account.id) {
            return Err(LedgerError::Storage(format!(
                "account {} already exists",
                account.id
            )));
        }
        self.staged.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        match self.staged.accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(LedgerError::AccountNotFound(account.id.to_string())),
        }
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        if self
            .staged
            .entries
            .values()
            .any(|e| e.entry_number == entry.entry_number)
        {
            return Err(LedgerError::Storage(format!(
                "entry number {} already exists",
                entry.entry_number
            )));
        }
        self.staged.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.staged.entries.get(&id).cloned())
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        match self.staged.entries.get_mut(&entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(LedgerError::EntryNotFound(entry.id.to_string())),
        }
    }

    async fn list_entries(&mut self, filter: &EntryFilter) -> LedgerResult<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .staged
            .entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.entry_number.cmp(&b.entry_number))
        });
        Ok(entries)
    }

    async fn get_mapping(&mut self, id: MappingId) -> LedgerResult<Option<AccountMapping>> {
        Ok(self.staged.mappings.get(&id).cloned())
    }

    async fn list_mappings(
        &mut self,
        module: &str,
        operation: &str,
    ) -> LedgerResult<Vec<AccountMapping>> {
        let mut mappings: Vec<AccountMapping> = self
            .staged
            .mappings
            .values()
            .filter(|m| m.module == module && m.operation == operation)
            .cloned()
            .collect();
        mappings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(mappings)
    }

    async fn insert_mapping(&mut self, mapping: &AccountMapping) -> LedgerResult<()> {
        self.staged.mappings.insert(mapping.id, mapping.clone());
        Ok(())
    }

    async fn update_mapping(&mut self, mapping: &AccountMapping) -> LedgerResult<()> {
        match self.staged.mappings.get_mut(&mapping.id) {
            Some(existing) => {
                *existing = mapping.clone();
                Ok(())
            }
            None => Err(LedgerError::RecordNotFound(format!("mapping {}", mapping.id))),
        }
    }

    async fn insert_rate(&mut self, rate: &ExchangeRate) -> LedgerResult<()> {
        self.staged.rates.push(rate.clone());
        Ok(())
    }

    async fn list_rates(
        &mut self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> LedgerResult<Vec<ExchangeRate>> {
        Ok(self
            .staged
            .rates
            .iter()
            .filter(|r| &r.from_currency == from && &r.to_currency == to)
            .cloned()
            .collect())
    }

    async fn get_cash_box(&mut self, id: CashBoxId) -> LedgerResult<Option<CashBox>> {
        Ok(self.staged.cash_boxes.get(&id).cloned())
    }

    async fn list_cash_boxes(&mut self) -> LedgerResult<Vec<CashBox>> {
        let mut boxes: Vec<CashBox> = self.staged.cash_boxes.values().cloned().collect();
        boxes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(boxes)
    }

    async fn insert_cash_box(&mut self, cash_box: &CashBox) -> LedgerResult<()> {
        self.staged.cash_boxes.insert(cash_box.id, cash_box.clone());
        Ok(())
    }

    async fn update_cash_box(&mut self, cash_box: &CashBox) -> LedgerResult<()> {
        match self.staged.cash_boxes.get_mut(&cash_box.id) {
            Some(existing) => {
                *existing = cash_box.clone();
                Ok(())
            }
            None => Err(LedgerError::CashBoxNotFound(cash_box.id.to_string())),
        }
    }

    async fn insert_exchange(&mut self, exchange: &CashBoxExchange) -> LedgerResult<()> {
        self.staged.exchanges.push(exchange.clone());
        Ok(())
    }

    async fn list_exchanges(&mut self) -> LedgerResult<Vec<CashBoxExchange>> {
        Ok(self.staged.exchanges.clone())
    }

    async fn next_sequence_value(&mut self, counter: &str) -> LedgerResult<u64> {
        let value = self.staged.sequences.entry(counter.to_string()).or_insert(0);
        *value = value.checked_add(1).ok_or_else(|| {
            LedgerError::SequenceAllocationFailed(format!("counter '{counter}' overflowed"))
        })?;
        Ok(*value)
    }

    async fn commit(self) -> LedgerResult<()> {
        let MemoryTransaction { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cash_account() -> Account {
        Account::new(
            NewAccount::new("1100", "Cash", AccountType::Asset, CurrencyCode::new("USD")),
            None,
        )
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let storage = MemoryStorage::new();
        let account = cash_account();

        let mut tx = storage.begin().await.unwrap();
        tx.insert_account(&account).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        assert_eq!(tx.get_account(account.id).await.unwrap(), Some(account));
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes_and_sequences() {
        let storage = MemoryStorage::new();
        let account = cash_account();

        {
            let mut tx = storage.begin().await.unwrap();
            tx.insert_account(&account).await.unwrap();
            assert_eq!(tx.next_sequence_value("journal_entry").await.unwrap(), 1);
        }

        let mut tx = storage.begin().await.unwrap();
        assert!(tx.get_account(account.id).await.unwrap().is_none());
        assert_eq!(tx.next_sequence_value("journal_entry").await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(storage.sequence_value("journal_entry").await, 1);
    }

    #[tokio::test]
    async fn test_counters_are_independent() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().await.unwrap();
        assert_eq!(tx.next_sequence_value("a").await.unwrap(), 1);
        assert_eq!(tx.next_sequence_value("a").await.unwrap(), 2);
        assert_eq!(tx.next_sequence_value("b").await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(storage.sequence_value("a").await, 2);
        assert_eq!(storage.sequence_value("b").await, 1);
    }

    #[tokio::test]
    async fn test_update_missing_account_fails() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().await.unwrap();
        let err = tx.update_account(&cash_account()).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }
}
