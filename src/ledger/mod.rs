//! Ledger module containing the chart of accounts, account mappings and journal posting

pub mod account;
pub mod core;
pub mod journal;
pub mod mapping;

pub use account::*;
pub use core::*;
pub use journal::*;
pub use mapping::*;
