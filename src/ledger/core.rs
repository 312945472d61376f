//! Main ledger facade that coordinates accounts, journals, treasury and reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::LedgerConfig;
use crate::ledger::account::{AccountTree, ChartOfAccounts};
use crate::ledger::journal::JournalEngine;
use crate::ledger::mapping::{resolve_mapping_in, MappingResolver};
use crate::reconciliation::ReconciliationEngine;
use crate::traits::*;
use crate::treasury::{CashBoxExecutor, RateResolver};
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

/// Seed chart: (key, code, name, type, parent key, header)
#[rustfmt::skip]
const STANDARD_CHART: &[(&str, &str, &str, AccountType, Option<&str>, bool)] = &[
    ("assets", "1000", "Assets", AccountType::Asset, None, true),
    ("cash", "1100", "Cash on Hand", AccountType::Asset, Some("assets"), false),
    ("bank", "1200", "Bank Accounts", AccountType::Asset, Some("assets"), false),
    ("accounts_receivable", "1300", "Accounts Receivable", AccountType::Asset, Some("assets"), false),
    ("inventory", "1400", "Medicine Inventory", AccountType::Asset, Some("assets"), false),
    ("liabilities", "2000", "Liabilities", AccountType::Liability, None, true),
    ("accounts_payable", "2100", "Accounts Payable", AccountType::Liability, Some("liabilities"), false),
    ("accrued_expenses", "2200", "Accrued Expenses", AccountType::Liability, Some("liabilities"), false),
    ("equity", "3000", "Equity", AccountType::Equity, None, true),
    ("owner_capital", "3100", "Owner's Capital", AccountType::Equity, Some("equity"), false),
    ("retained_earnings", "3200", "Retained Earnings", AccountType::Equity, Some("equity"), false),
    ("revenue", "4000", "Revenue", AccountType::Revenue, None, true),
    ("sales", "4100", "Sales Revenue", AccountType::Revenue, Some("revenue"), false),
    ("sales_returns", "4200", "Sales Returns", AccountType::Revenue, Some("revenue"), false),
    ("other_income", "4300", "Other Income", AccountType::Revenue, Some("revenue"), false),
    ("cost_of_sales", "5000", "Cost of Sales", AccountType::Cogs, None, true),
    ("cogs", "5100", "Cost of Goods Sold", AccountType::Cogs, Some("cost_of_sales"), false),
    ("expenses", "6000", "Operating Expenses", AccountType::Expense, None, true),
    ("rent", "6100", "Rent Expense", AccountType::Expense, Some("expenses"), false),
    ("salaries", "6200", "Salaries Expense", AccountType::Expense, Some("expenses"), false),
    ("utilities", "6300", "Utilities Expense", AccountType::Expense, Some("expenses"), false),
];

/// Caller-facing ledger that wires every service to one storage backend and
/// one subledger provider.
///
/// All operations take `&self`; share a ledger across tasks behind an `Arc`.
pub struct Ledger<S: LedgerStorage, P: SubledgerProvider> {
    storage: S,
    config: Arc<LedgerConfig>,
    chart: ChartOfAccounts<S>,
    mappings: MappingResolver<S>,
    journal: JournalEngine<S>,
    rates: RateResolver<S>,
    cash_boxes: CashBoxExecutor<S>,
    reconciliation: ReconciliationEngine<S, P>,
}

impl<S: LedgerStorage + Clone, P: SubledgerProvider> Ledger<S, P> {
    /// Create a ledger with the default configuration
    pub fn new(storage: S, subledger: P) -> Self {
        Self::build(
            storage,
            subledger,
            Arc::new(LedgerConfig::default()),
            Box::new(DefaultAccountValidator),
            Box::new(DefaultEntryValidator),
        )
    }

    /// Create a ledger with a validated configuration
    pub fn with_config(storage: S, subledger: P, config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self::build(
            storage,
            subledger,
            Arc::new(config),
            Box::new(DefaultAccountValidator),
            Box::new(DefaultEntryValidator),
        ))
    }

    /// Create a ledger with custom validators
    pub fn with_validators(
        storage: S,
        subledger: P,
        config: LedgerConfig,
        account_validator: Box<dyn AccountValidator>,
        entry_validator: Box<dyn EntryValidator>,
    ) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self::build(
            storage,
            subledger,
            Arc::new(config),
            account_validator,
            entry_validator,
        ))
    }

    fn build(
        storage: S,
        subledger: P,
        config: Arc<LedgerConfig>,
        account_validator: Box<dyn AccountValidator>,
        entry_validator: Box<dyn EntryValidator>,
    ) -> Self {
        Self {
            chart: ChartOfAccounts::with_validator(storage.clone(), account_validator),
            mappings: MappingResolver::new(storage.clone()),
            journal: JournalEngine::with_validator(
                storage.clone(),
                config.clone(),
                entry_validator,
            ),
            rates: RateResolver::new(storage.clone()),
            cash_boxes: CashBoxExecutor::new(storage.clone(), config.clone()),
            reconciliation: ReconciliationEngine::new(storage.clone(), subledger, config.clone()),
            storage,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // Chart of accounts
    pub async fn create_account(
        &self,
        parent: Option<AccountId>,
        attrs: NewAccount,
    ) -> LedgerResult<Account> {
        self.chart.create_account(parent, attrs).await
    }

    pub async fn update_account(
        &self,
        id: AccountId,
        update: AccountUpdate,
    ) -> LedgerResult<Account> {
        self.chart.update_account(id, update).await
    }

    pub async fn deactivate_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.chart.deactivate_account(id).await
    }

    pub async fn reactivate_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.chart.reactivate_account(id).await
    }

    pub async fn get_account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        self.chart.get_account(id).await
    }

    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.chart.list_accounts().await
    }

    pub async fn list_tree(&self) -> LedgerResult<AccountTree> {
        self.chart.list_tree().await
    }

    pub async fn account_path(&self, id: AccountId) -> LedgerResult<Vec<Account>> {
        self.chart.account_path(id).await
    }

    pub async fn has_postings(&self, id: AccountId) -> LedgerResult<bool> {
        self.chart.has_postings(id).await
    }

    // Journal
    pub async fn create_entry(&self, entry: NewJournalEntry) -> LedgerResult<JournalEntry> {
        self.journal.create_entry(entry).await
    }

    pub async fn post_entry(&self, id: EntryId) -> LedgerResult<JournalEntry> {
        self.journal.post_entry(id).await
    }

    pub async fn cancel_entry(&self, id: EntryId) -> LedgerResult<JournalEntry> {
        self.journal.cancel_entry(id).await
    }

    pub async fn get_entry(&self, id: EntryId) -> LedgerResult<Option<JournalEntry>> {
        self.journal.get_entry(id).await
    }

    pub async fn list_entries(&self, filter: &EntryFilter) -> LedgerResult<Vec<JournalEntry>> {
        self.journal.list_entries(filter).await
    }

    /// Balance of an account (headers roll up their subtree) as of a date
    pub async fn account_balance(
        &self,
        account_id: AccountId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        self.journal.account_balance(account_id, as_of).await
    }

    pub async fn trial_balance(&self, as_of: NaiveDate) -> LedgerResult<TrialBalance> {
        self.journal.trial_balance(as_of).await
    }

    // Account mappings
    pub async fn resolve_mapping(
        &self,
        module: &str,
        operation: &str,
        branch_id: Option<&str>,
    ) -> LedgerResult<ResolvedMapping> {
        self.mappings
            .resolve_mapping(module, operation, branch_id)
            .await
    }

    pub async fn create_mapping(&self, attrs: NewAccountMapping) -> LedgerResult<AccountMapping> {
        self.mappings.create_mapping(attrs).await
    }

    pub async fn update_mapping(
        &self,
        id: MappingId,
        update: AccountMappingUpdate,
    ) -> LedgerResult<AccountMapping> {
        self.mappings.update_mapping(id, update).await
    }

    pub async fn deactivate_mapping(&self, id: MappingId) -> LedgerResult<AccountMapping> {
        self.mappings.deactivate_mapping(id).await
    }

    pub async fn list_mappings(
        &self,
        module: &str,
        operation: &str,
    ) -> LedgerResult<Vec<AccountMapping>> {
        self.mappings.list_mappings(module, operation).await
    }

    /// Post an automated business event through its account mapping.
    ///
    /// The mapping lookup, number allocation and the two-line posted entry share
    /// one storage transaction. A party reference lands on the line hitting the
    /// configured control account, or on the kind's normal side when neither
    /// line does.
    pub async fn post_automated(&self, posting: AutomatedPosting) -> LedgerResult<JournalEntry> {
        validate_positive_amount(&posting.amount, "Posting amount")?;

        let mut tx = self.storage.begin().await?;
        let mapping = resolve_mapping_in(
            &mut tx,
            &posting.module,
            &posting.operation,
            posting.branch_id.as_deref(),
        )
        .await?;

        let mut debit = NewJournalLine::debit(mapping.debit_account_id, posting.amount.clone());
        let mut credit = NewJournalLine::credit(mapping.credit_account_id, posting.amount.clone());
        if let Some(party) = posting.party {
            let on_debit = match self.config.control_account(party.kind) {
                Some(control) if control == mapping.debit_account_id => true,
                Some(control) if control == mapping.credit_account_id => false,
                _ => party.kind == EntityKind::Customer,
            };
            if on_debit {
                debit.party = Some(party);
            } else {
                credit.party = Some(party);
            }
        }

        let mut entry = NewJournalEntry::new(posting.date, posting.description)
            .line(debit)
            .line(credit)
            .posted();
        entry.reference_type = posting.reference_type;
        entry.reference_id = posting.reference_id;
        entry.branch_id = posting.branch_id;
        entry.actor = posting.actor;

        let created = self.journal.create_entry_in(&mut tx, entry).await?;
        tx.commit().await?;

        info!(
            module = %posting.module,
            operation = %posting.operation,
            entry_number = %created.entry_number,
            amount = %posting.amount,
            "automated posting committed"
        );
        Ok(created)
    }

    // Exchange rates and cash boxes
    pub async fn add_rate(&self, rate: NewExchangeRate) -> LedgerResult<ExchangeRate> {
        self.rates.add_rate(rate).await
    }

    pub async fn resolve_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> LedgerResult<BigDecimal> {
        self.rates.resolve_rate(from, to, date).await
    }

    pub async fn list_rates(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> LedgerResult<Vec<ExchangeRate>> {
        self.rates.list_rates(from, to).await
    }

    pub async fn create_cash_box(&self, attrs: NewCashBox) -> LedgerResult<CashBox> {
        self.cash_boxes.create_cash_box(attrs).await
    }

    pub async fn get_cash_box(&self, id: CashBoxId) -> LedgerResult<Option<CashBox>> {
        self.cash_boxes.get_cash_box(id).await
    }

    pub async fn list_cash_boxes(&self) -> LedgerResult<Vec<CashBox>> {
        self.cash_boxes.list_cash_boxes().await
    }

    pub async fn deactivate_cash_box(&self, id: CashBoxId) -> LedgerResult<CashBox> {
        self.cash_boxes.deactivate_cash_box(id).await
    }

    pub async fn execute_exchange(
        &self,
        from_box_id: CashBoxId,
        to_box_id: CashBoxId,
        from_amount: BigDecimal,
        date: NaiveDate,
        notes: Option<String>,
    ) -> LedgerResult<CashBoxExchange> {
        self.cash_boxes
            .execute_exchange(from_box_id, to_box_id, from_amount, date, notes)
            .await
    }

    pub async fn list_exchanges(&self) -> LedgerResult<Vec<CashBoxExchange>> {
        self.cash_boxes.list_exchanges().await
    }

    // Reconciliation
    pub async fn reconcile(
        &self,
        kind: EntityKind,
        as_of: NaiveDate,
    ) -> LedgerResult<Vec<ReconciliationRow>> {
        self.reconciliation.reconcile(kind, as_of).await
    }

    pub async fn rebuild_balance(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> LedgerResult<BigDecimal> {
        self.reconciliation.rebuild_balance(kind, entity_id).await
    }

    /// Seed a retail/pharmacy chart of accounts in the base currency.
    ///
    /// Returns the created accounts keyed by a stable name (`"cash"`,
    /// `"accounts_receivable"`, ...).
    pub async fn setup_standard_chart(&self) -> LedgerResult<HashMap<String, Account>> {
        let mut accounts: HashMap<String, Account> = HashMap::new();

        for (key, code, name, account_type, parent_key, is_header) in STANDARD_CHART {
            let parent = match parent_key {
                Some(parent_key) => Some(
                    accounts
                        .get(*parent_key)
                        .map(|a| a.id)
                        .ok_or_else(|| LedgerError::AccountNotFound(parent_key.to_string()))?,
                ),
                None => None,
            };

            let mut attrs = NewAccount::new(
                *code,
                *name,
                *account_type,
                self.config.base_currency.clone(),
            );
            attrs.is_header = *is_header;

            let account = self.chart.create_account(parent, attrs).await?;
            accounts.insert(key.to_string(), account);
        }

        info!(
            accounts = accounts.len(),
            currency = %self.config.base_currency,
            "standard chart of accounts created"
        );
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use crate::utils::memory_subledger::MemorySubledger;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_standard_chart_shape() {
        let ledger = Ledger::new(MemoryStorage::new(), MemorySubledger::new());
        let accounts = ledger.setup_standard_chart().await.unwrap();

        assert_eq!(accounts.len(), STANDARD_CHART.len());
        assert!(accounts["assets"].is_header);
        assert!(!accounts["cash"].is_header);
        assert_eq!(accounts["cash"].parent_id, Some(accounts["assets"].id));
        assert_eq!(accounts["cogs"].account_type, AccountType::Cogs);

        let tree = ledger.list_tree().await.unwrap();
        assert_eq!(tree.roots().count(), 6);
        assert_eq!(tree.level(accounts["rent"].id), Some(1));

        // Seeding twice collides on codes
        assert!(matches!(
            ledger.setup_standard_chart().await,
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_post_automated_uses_mapping() {
        let ledger = Ledger::new(MemoryStorage::new(), MemorySubledger::new());
        let accounts = ledger.setup_standard_chart().await.unwrap();
        ledger
            .create_mapping(NewAccountMapping::new(
                "sales",
                "credit_sale",
                accounts["accounts_receivable"].id,
                accounts["sales"].id,
            ))
            .await
            .unwrap();

        let entry = ledger
            .post_automated(AutomatedPosting {
                module: "sales".to_string(),
                operation: "credit_sale".to_string(),
                branch_id: Some("B1".to_string()),
                actor: Some("cashier-2".to_string()),
                date: day(3),
                description: "Invoice INV-88".to_string(),
                amount: BigDecimal::from(250),
                reference_type: Some("sale".to_string()),
                reference_id: Some("INV-88".to_string()),
                party: Some(PartyRef::customer("C42")),
            })
            .await
            .unwrap();

        assert_eq!(entry.status, EntryStatus::Posted);
        assert_eq!(entry.entry_number, "J000001");
        assert_eq!(entry.lines.len(), 2);
        assert_eq!(entry.lines[0].account_id, accounts["accounts_receivable"].id);
        assert_eq!(entry.lines[0].party, Some(PartyRef::customer("C42")));
        assert_eq!(entry.lines[1].party, None);
        assert_eq!(entry.branch_id.as_deref(), Some("B1"));
        assert_eq!(entry.created_by.as_deref(), Some("cashier-2"));

        assert_eq!(
            ledger
                .account_balance(accounts["assets"].id, None)
                .await
                .unwrap(),
            BigDecimal::from(250)
        );
        assert!(ledger.has_postings(accounts["sales"].id).await.unwrap());
        assert!(!ledger.has_postings(accounts["rent"].id).await.unwrap());

        let err = ledger
            .post_automated(AutomatedPosting {
                module: "purchases".to_string(),
                operation: "receive".to_string(),
                branch_id: None,
                actor: None,
                date: day(3),
                description: "Unmapped".to_string(),
                amount: BigDecimal::from(10),
                reference_type: None,
                reference_id: None,
                party: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MappingNotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = LedgerConfig {
            amount_scale: -1,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            Ledger::with_config(MemoryStorage::new(), MemorySubledger::new(), config),
            Err(LedgerError::Config(_))
        ));
    }
}
