//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::types::*;

/// Storage abstraction for the ledger core
///
/// The core never talks to a database directly. Every operation opens a
/// [`StorageTransaction`] with [`LedgerStorage::begin`], performs its reads and
/// validation, stages its writes and commits. Backends (PostgreSQL, SQLite,
/// in-memory, ...) implement these two traits.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    type Transaction: StorageTransaction;

    /// Open a transaction. Reads through it observe one consistent view of the store.
    async fn begin(&self) -> LedgerResult<Self::Transaction>;
}

/// Unit of work against the store
///
/// Writes become visible to other transactions only after [`commit`](Self::commit).
/// Dropping a transaction without committing discards everything it staged,
/// including sequence values it allocated.
#[async_trait]
pub trait StorageTransaction: Send {
    async fn get_account(&mut self, id: AccountId) -> LedgerResult<Option<Account>>;

    async fn find_account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>>;

    async fn list_accounts(&mut self) -> LedgerResult<Vec<Account>>;

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()>;

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Persist a journal entry together with its lines
    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;

    async fn get_entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>>;

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Entries matching the filter, ordered by date then entry number
    async fn list_entries(&mut self, filter: &EntryFilter) -> LedgerResult<Vec<JournalEntry>>;

    async fn get_mapping(&mut self, id: MappingId) -> LedgerResult<Option<AccountMapping>>;

    /// All mappings (active or not) for a module/operation pair
    async fn list_mappings(
        &mut self,
        module: &str,
        operation: &str,
    ) -> LedgerResult<Vec<AccountMapping>>;

    async fn insert_mapping(&mut self, mapping: &AccountMapping) -> LedgerResult<()>;

    async fn update_mapping(&mut self, mapping: &AccountMapping) -> LedgerResult<()>;

    /// Append a rate to the pair's time series
    async fn insert_rate(&mut self, rate: &ExchangeRate) -> LedgerResult<()>;

    /// Rates for the exact directional pair, in insertion order
    async fn list_rates(
        &mut self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> LedgerResult<Vec<ExchangeRate>>;

    async fn get_cash_box(&mut self, id: CashBoxId) -> LedgerResult<Option<CashBox>>;

    async fn list_cash_boxes(&mut self) -> LedgerResult<Vec<CashBox>>;

    async fn insert_cash_box(&mut self, cash_box: &CashBox) -> LedgerResult<()>;

    async fn update_cash_box(&mut self, cash_box: &CashBox) -> LedgerResult<()>;

    async fn insert_exchange(&mut self, exchange: &CashBoxExchange) -> LedgerResult<()>;

    async fn list_exchanges(&mut self) -> LedgerResult<Vec<CashBoxExchange>>;

    /// Atomically advance the named counter and return the new value.
    ///
    /// The allocation belongs to this transaction: it is only consumed if the
    /// transaction commits.
    async fn next_sequence_value(&mut self, counter: &str) -> LedgerResult<u64>;

    async fn commit(self) -> LedgerResult<()>;
}

/// Customer/supplier running balances owned by modules outside the ledger
#[async_trait]
pub trait SubledgerProvider: Send + Sync {
    /// Entities of the given kind that have subledger activity
    async fn list_balances(&self, kind: EntityKind) -> LedgerResult<Vec<SubledgerBalance>>;

    async fn get_subledger_balance(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> LedgerResult<Option<SubledgerBalance>>;

    /// Display name of an entity, if the subledger knows it
    async fn entity_name(&self, kind: EntityKind, entity_id: &str) -> LedgerResult<Option<String>>;

    /// Source documents used to recompute a balance from first principles
    async fn documents(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> LedgerResult<Vec<SubledgerDocument>>;

    /// Overwrite the stored running balance in a single write
    async fn store_balance(
        &self,
        kind: EntityKind,
        entity_id: &str,
        balance: &BigDecimal,
    ) -> LedgerResult<()>;
}

/// Trait for implementing custom account validation rules
///
/// Required fields are always checked by the chart of accounts; validators add
/// house rules on top.
pub trait AccountValidator: Send + Sync {
    /// Validate an account before it is inserted or updated
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;

    /// Validate deactivation (e.g. forbid deactivating control accounts)
    fn validate_deactivation(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom journal entry validation rules
///
/// Structural and balance checks always run first; validators add house rules.
pub trait EntryValidator: Send + Sync {
    fn validate_entry(&self, entry: &NewJournalEntry) -> LedgerResult<()>;
}

/// Account validator that accepts everything beyond the required fields
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, _account: &Account) -> LedgerResult<()> {
        Ok(())
    }

    fn validate_deactivation(&self, _account: &Account) -> LedgerResult<()> {
        Ok(())
    }
}

/// Entry validator that accepts every structurally valid, balanced entry
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate_entry(&self, _entry: &NewJournalEntry) -> LedgerResult<()> {
        Ok(())
    }
}
