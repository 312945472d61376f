//! # Ledger Core
//!
//! General-ledger accounting core for retail and pharmacy back offices:
//! double-entry journal posting, a hierarchical chart of accounts, rule-based
//! account resolution for automated postings, multi-currency cash boxes and
//! AR/AP reconciliation against the ledger.
//!
//! ## Features
//!
//! - **Chart of accounts**: header/postable accounts in an acyclic tree
//! - **Journal posting**: balanced entries, draft/posted/cancelled lifecycle, gap-safe numbering
//! - **Account mappings**: branch-specific rules with a wildcard fallback
//! - **Treasury**: dated exchange rates and atomic cash box exchanges
//! - **Reconciliation**: customer/supplier subledgers compared with the ledger
//! - **Storage abstraction**: transactional, database-agnostic storage traits
//!
//! ## Quick Start
//!
//! ```rust
//! use ledger_core::{Ledger, MemoryStorage, MemorySubledger, NewJournalEntry};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let ledger = Ledger::new(MemoryStorage::new(), MemorySubledger::new());
//! let accounts = ledger.setup_standard_chart().await.unwrap();
//!
//! let entry = ledger
//!     .create_entry(
//!         NewJournalEntry::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "Owner investment")
//!             .debit(accounts["cash"].id, BigDecimal::from(1000))
//!             .credit(accounts["owner_capital"].id, BigDecimal::from(1000)),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(entry.entry_number, "J000001");
//! # }
//! ```

pub mod config;
pub mod ledger;
pub mod reconciliation;
pub mod telemetry;
pub mod traits;
pub mod treasury;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{ControlAccounts, LedgerConfig, NumberingConfig, SequenceFormat};
pub use ledger::*;
pub use reconciliation::{ReconciliationEngine, ReconciliationSummary};
pub use traits::*;
pub use treasury::*;
pub use types::*;
pub use utils::{MemoryStorage, MemorySubledger};
