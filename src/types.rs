//! Core types and data structures for the general ledger

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

record_id!(
    /// Identifier of an account in the chart of accounts
    AccountId
);
record_id!(
    /// Identifier of a journal entry
    EntryId
);
record_id!(
    /// Identifier of an account mapping rule
    MappingId
);
record_id!(
    /// Identifier of a cash box
    CashBoxId
);
record_id!(
    /// Identifier of a recorded cash box exchange
    ExchangeId
);

/// ISO 4217 style currency code, stored upper-case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CurrencyCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for CurrencyCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account types of the chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// What the business owns (cash, receivables, stock)
    Asset,
    /// What the business owes (payables, loans)
    Liability,
    /// Owner's interest in the business
    Equity,
    /// Income from sales and services
    Revenue,
    /// Operating costs
    Expense,
    /// Cost of goods sold
    Cogs,
}

impl AccountType {
    /// Returns the side on which this account type normally carries its balance.
    /// Assets, expenses and cost of goods sold are debit-normal; the rest are credit-normal.
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountType::Asset | AccountType::Expense | AccountType::Cogs => EntryType::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                EntryType::Credit
            }
        }
    }
}

/// The two sides of a journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Debit,
    Credit,
}

/// Account in the chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Human-assigned, unique, sortable code (e.g. "1100")
    pub code: String,
    pub name: String,
    /// Optional name in the secondary UI language
    pub name_secondary: Option<String>,
    pub account_type: AccountType,
    pub parent_id: Option<AccountId>,
    /// Header accounts group children and never receive postings
    pub is_header: bool,
    pub is_active: bool,
    pub currency: CurrencyCode,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Build a new active account from creation attributes
    pub fn new(attrs: NewAccount, parent_id: Option<AccountId>) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: AccountId::new(),
            code: attrs.code.trim().to_string(),
            name: attrs.name.trim().to_string(),
            name_secondary: attrs.name_secondary,
            account_type: attrs.account_type,
            parent_id,
            is_header: attrs.is_header,
            is_active: true,
            currency: attrs.currency,
            description: attrs.description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether journal lines may target this account
    pub fn is_postable(&self) -> bool {
        !self.is_header
    }

    /// Apply a partial update; returns whether the parent relation changed
    pub fn apply_update(&mut self, update: AccountUpdate) -> bool {
        let mut reparented = false;
        if let Some(code) = update.code {
            self.code = code.trim().to_string();
        }
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(name_secondary) = update.name_secondary {
            self.name_secondary = name_secondary;
        }
        if let Some(account_type) = update.account_type {
            self.account_type = account_type;
        }
        if let Some(parent_id) = update.parent_id {
            reparented = parent_id != self.parent_id;
            self.parent_id = parent_id;
        }
        if let Some(is_header) = update.is_header {
            self.is_header = is_header;
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        self.updated_at = chrono::Utc::now().naive_utc();
        reparented
    }
}

/// Attributes for creating an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub name_secondary: Option<String>,
    pub account_type: AccountType,
    pub is_header: bool,
    pub currency: CurrencyCode,
    pub description: Option<String>,
}

impl NewAccount {
    /// Attributes for a postable account
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            name_secondary: None,
            account_type,
            is_header: false,
            currency,
            description: None,
        }
    }

    /// Mark the account as a non-postable header
    pub fn header(mut self) -> Self {
        self.is_header = true;
        self
    }

    pub fn secondary_name(mut self, name: impl Into<String>) -> Self {
        self.name_secondary = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Required-field checks
    pub fn validate(&self) -> LedgerResult<()> {
        if self.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }
        if self.currency.as_str().is_empty() {
            return Err(LedgerError::Validation(
                "Account currency cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Explicit set of mutable account fields; `None` leaves a field untouched.
///
/// Nullable fields use `Option<Option<_>>`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub name_secondary: Option<Option<String>>,
    pub account_type: Option<AccountType>,
    pub parent_id: Option<Option<AccountId>>,
    pub is_header: Option<bool>,
    pub currency: Option<CurrencyCode>,
    pub description: Option<Option<String>>,
}

/// Lifecycle of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Cancelled,
}

impl EntryStatus {
    /// Only drafts move; posted and cancelled are terminal
    pub fn can_transition_to(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Draft, EntryStatus::Posted) | (EntryStatus::Draft, EntryStatus::Cancelled)
        )
    }
}

/// Subledger entity kinds reconciled against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Customer,
    Supplier,
}

impl EntityKind {
    /// Sign of a ledger line from the subledger's point of view: customers are
    /// receivables (debit-normal), suppliers are payables (credit-normal).
    pub fn signed_amount(&self, line: &JournalLine) -> BigDecimal {
        match self {
            EntityKind::Customer => &line.debit_amount - &line.credit_amount,
            EntityKind::Supplier => &line.credit_amount - &line.debit_amount,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Customer => f.write_str("customer"),
            EntityKind::Supplier => f.write_str("supplier"),
        }
    }
}

/// Subledger dimension attached to a journal line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyRef {
    pub kind: EntityKind,
    pub entity_id: String,
}

impl PartyRef {
    pub fn customer(entity_id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Customer,
            entity_id: entity_id.into(),
        }
    }

    pub fn supplier(entity_id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Supplier,
            entity_id: entity_id.into(),
        }
    }
}

/// Persisted journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    /// 1-based position within the entry
    pub line_no: u32,
    pub account_id: AccountId,
    pub description: Option<String>,
    pub debit_amount: BigDecimal,
    pub credit_amount: BigDecimal,
    pub party: Option<PartyRef>,
}

impl JournalLine {
    /// Debit minus credit
    pub fn net_debit(&self) -> BigDecimal {
        &self.debit_amount - &self.credit_amount
    }
}

/// Line of an entry that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJournalLine {
    pub account_id: AccountId,
    pub description: Option<String>,
    pub debit_amount: BigDecimal,
    pub credit_amount: BigDecimal,
    pub party: Option<PartyRef>,
}

impl NewJournalLine {
    /// Create a debit line
    pub fn debit(account_id: AccountId, amount: BigDecimal) -> Self {
        Self {
            account_id,
            description: None,
            debit_amount: amount,
            credit_amount: BigDecimal::from(0),
            party: None,
        }
    }

    /// Create a credit line
    pub fn credit(account_id: AccountId, amount: BigDecimal) -> Self {
        Self {
            account_id,
            description: None,
            debit_amount: BigDecimal::from(0),
            credit_amount: amount,
            party: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn party(mut self, party: PartyRef) -> Self {
        self.party = Some(party);
        self
    }
}

/// Request to create a journal entry.
///
/// Branch and actor are carried explicitly; nothing is read from ambient session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub date: NaiveDate,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub branch_id: Option<String>,
    pub actor: Option<String>,
    pub lines: Vec<NewJournalLine>,
    /// Commit straight to `posted` (automated postings) instead of `draft`
    pub post_immediately: bool,
}

impl NewJournalEntry {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date,
            description: description.into(),
            reference_type: None,
            reference_id: None,
            branch_id: None,
            actor: None,
            lines: Vec::new(),
            post_immediately: false,
        }
    }

    pub fn reference(mut self, reference_type: impl Into<String>) -> Self {
        self.reference_type = Some(reference_type.into());
        self
    }

    pub fn reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn line(mut self, line: NewJournalLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn debit(self, account_id: AccountId, amount: BigDecimal) -> Self {
        self.line(NewJournalLine::debit(account_id, amount))
    }

    pub fn credit(self, account_id: AccountId, amount: BigDecimal) -> Self {
        self.line(NewJournalLine::credit(account_id, amount))
    }

    pub fn posted(mut self) -> Self {
        self.post_immediately = true;
        self
    }

    pub fn total_debit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit_amount).sum()
    }

    pub fn total_credit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit_amount).sum()
    }

    /// Structural checks that do not need storage: at least one line, and every line
    /// carries exactly one positive side.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.is_empty() {
            return Err(LedgerError::Validation(
                "Journal entry must have at least one line".to_string(),
            ));
        }

        let zero = BigDecimal::from(0);
        for (idx, line) in self.lines.iter().enumerate() {
            let line_no = idx + 1;
            if line.debit_amount < zero || line.credit_amount < zero {
                return Err(LedgerError::Validation(format!(
                    "Line {line_no}: amounts cannot be negative"
                )));
            }
            if line.debit_amount > zero && line.credit_amount > zero {
                return Err(LedgerError::Validation(format!(
                    "Line {line_no}: a line cannot carry both a debit and a credit"
                )));
            }
            if line.debit_amount == zero && line.credit_amount == zero {
                return Err(LedgerError::Validation(format!(
                    "Line {line_no}: either debit or credit must be non-zero"
                )));
            }
        }

        Ok(())
    }
}

/// Persisted journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub entry_number: String,
    pub date: NaiveDate,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub branch_id: Option<String>,
    pub created_by: Option<String>,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub status: EntryStatus,
    pub lines: Vec<JournalLine>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JournalEntry {
    /// Whether any line of this entry targets the account
    pub fn touches(&self, account_id: AccountId) -> bool {
        self.lines.iter().any(|l| l.account_id == account_id)
    }
}

/// Filter used when listing journal entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub status: Option<EntryStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub account_id: Option<AccountId>,
    pub reference_type: Option<String>,
}

impl EntryFilter {
    /// Posted entries dated on or before `as_of`
    pub fn posted_until(as_of: Option<NaiveDate>) -> Self {
        Self {
            status: Some(EntryStatus::Posted),
            to_date: as_of,
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &JournalEntry) -> bool {
        if self.status.is_some_and(|s| s != entry.status) {
            return false;
        }
        if self.from_date.is_some_and(|d| entry.date < d) {
            return false;
        }
        if self.to_date.is_some_and(|d| entry.date > d) {
            return false;
        }
        if self.account_id.is_some_and(|id| !entry.touches(id)) {
            return false;
        }
        if let Some(ref reference_type) = self.reference_type {
            if entry.reference_type.as_ref() != Some(reference_type) {
                return false;
            }
        }
        true
    }
}

/// Rule resolving which accounts an automated business event posts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMapping {
    pub id: MappingId,
    pub module: String,
    pub operation: String,
    /// `None` applies to every branch
    pub branch_id: Option<String>,
    pub debit_account_id: AccountId,
    pub credit_account_id: AccountId,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AccountMapping {
    /// Whether both mappings compete for the same (module, operation, branch) key
    pub fn same_key(&self, other: &AccountMapping) -> bool {
        self.module == other.module
            && self.operation == other.operation
            && self.branch_id == other.branch_id
    }
}

/// Attributes for creating an account mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccountMapping {
    pub module: String,
    pub operation: String,
    pub branch_id: Option<String>,
    pub debit_account_id: AccountId,
    pub credit_account_id: AccountId,
    pub is_active: bool,
    pub notes: Option<String>,
}

impl NewAccountMapping {
    /// Active wildcard mapping
    pub fn new(
        module: impl Into<String>,
        operation: impl Into<String>,
        debit_account_id: AccountId,
        credit_account_id: AccountId,
    ) -> Self {
        Self {
            module: module.into(),
            operation: operation.into(),
            branch_id: None,
            debit_account_id,
            credit_account_id,
            is_active: true,
            notes: None,
        }
    }

    pub fn branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Mutable fields of a mapping. The (module, operation, branch) key is immutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountMappingUpdate {
    pub debit_account_id: Option<AccountId>,
    pub credit_account_id: Option<AccountId>,
    pub is_active: Option<bool>,
    pub notes: Option<Option<String>>,
}

/// Accounts an automated event resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMapping {
    pub mapping_id: MappingId,
    pub debit_account_id: AccountId,
    pub credit_account_id: AccountId,
}

/// Automated business event to be posted through a mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomatedPosting {
    pub module: String,
    pub operation: String,
    pub branch_id: Option<String>,
    pub actor: Option<String>,
    pub date: NaiveDate,
    pub description: String,
    pub amount: BigDecimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub party: Option<PartyRef>,
}

/// Directional exchange rate: `rate` units of `to_currency` per 1 `from_currency`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub rate: BigDecimal,
    pub effective_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExchangeRate {
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub rate: BigDecimal,
    pub effective_date: NaiveDate,
    pub notes: Option<String>,
}

impl NewExchangeRate {
    pub fn new(
        from_currency: impl Into<CurrencyCode>,
        to_currency: impl Into<CurrencyCode>,
        rate: BigDecimal,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            from_currency: from_currency.into(),
            to_currency: to_currency.into(),
            rate,
            effective_date,
            notes: None,
        }
    }
}

/// Named cash holding in a single currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBox {
    pub id: CashBoxId,
    pub code: String,
    pub name: String,
    pub currency_code: CurrencyCode,
    pub current_balance: BigDecimal,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCashBox {
    pub code: String,
    pub name: String,
    pub currency_code: CurrencyCode,
    pub opening_balance: BigDecimal,
}

impl NewCashBox {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        currency_code: impl Into<CurrencyCode>,
        opening_balance: BigDecimal,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            currency_code: currency_code.into(),
            opening_balance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    Draft,
    Posted,
}

/// Recorded currency conversion between two cash boxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBoxExchange {
    pub id: ExchangeId,
    pub exchange_number: String,
    pub from_box_id: CashBoxId,
    pub to_box_id: CashBoxId,
    pub from_amount: BigDecimal,
    pub to_amount: BigDecimal,
    pub exchange_rate: BigDecimal,
    pub date: NaiveDate,
    pub status: ExchangeStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Outcome of comparing one entity's subledger balance with the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Matched,
    Mismatch,
    OnlyInSubledger,
    OnlyInGl,
}

/// Computed reconciliation result for one entity; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub entity_id: String,
    pub entity_name: String,
    pub subledger_balance: BigDecimal,
    pub gl_balance: BigDecimal,
    /// `subledger_balance - gl_balance`
    pub difference: BigDecimal,
    pub status: ReconciliationStatus,
}

/// Stored running balance of a subledger entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubledgerBalance {
    pub entity_id: String,
    pub entity_name: String,
    pub balance: BigDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Invoice,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Posted,
    Allocated,
    Void,
}

/// Invoice or payment document owned by a subledger module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubledgerDocument {
    pub reference: String,
    pub kind: DocumentKind,
    pub amount: BigDecimal,
    pub status: DocumentStatus,
    pub date: NaiveDate,
}

impl SubledgerDocument {
    pub fn invoice(reference: impl Into<String>, amount: BigDecimal, date: NaiveDate) -> Self {
        Self {
            reference: reference.into(),
            kind: DocumentKind::Invoice,
            amount,
            status: DocumentStatus::Posted,
            date,
        }
    }

    pub fn payment(reference: impl Into<String>, amount: BigDecimal, date: NaiveDate) -> Self {
        Self {
            reference: reference.into(),
            kind: DocumentKind::Payment,
            amount,
            status: DocumentStatus::Posted,
            date,
        }
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    /// Contribution to the running balance: posted invoices add, posted or
    /// allocated payments subtract, drafts and voids count for nothing.
    pub fn balance_effect(&self) -> BigDecimal {
        match (self.kind, self.status) {
            (DocumentKind::Invoice, DocumentStatus::Posted) => self.amount.clone(),
            (DocumentKind::Payment, DocumentStatus::Posted | DocumentStatus::Allocated) => {
                -self.amount.clone()
            }
            _ => BigDecimal::from(0),
        }
    }
}

/// Trial balance row for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub debit_balance: Option<BigDecimal>,
    pub credit_balance: Option<BigDecimal>,
}

/// Snapshot of postable account balances at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    pub is_balanced: bool,
}

/// Errors that can occur in the ledger core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unbalanced entry: debits minus credits = {difference}")]
    UnbalancedEntry { difference: BigDecimal },
    #[error("Account '{0}' is a header account and cannot receive postings")]
    HeaderAccountPosting(String),
    #[error("Account '{0}' still has active child accounts")]
    HasActiveChildren(String),
    #[error("Cycle detected in account hierarchy at account '{0}'")]
    CycleDetected(String),
    #[error("An active mapping already exists for {module}/{operation} (branch {branch_id:?})")]
    DuplicateMapping {
        module: String,
        operation: String,
        branch_id: Option<String>,
    },
    #[error("No active mapping for {module}/{operation} (branch {branch_id:?})")]
    MappingNotFound {
        module: String,
        operation: String,
        branch_id: Option<String>,
    },
    #[error("No exchange rate {from} -> {to} effective on or before {date}")]
    RateNotFound {
        from: CurrencyCode,
        to: CurrencyCode,
        date: NaiveDate,
    },
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        available: BigDecimal,
        requested: BigDecimal,
    },
    #[error("Both cash boxes hold {0}; an exchange must cross currencies")]
    SameCurrencyExchange(CurrencyCode),
    #[error("Sequence allocation failed: {0}")]
    SequenceAllocationFailed(String),
    #[error("Entry cannot move from {from:?} to {to:?}")]
    InvalidStatusTransition { from: EntryStatus, to: EntryStatus },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),
    #[error("Cash box not found: {0}")]
    CashBoxNotFound(String),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
