//! Utility modules

pub mod memory_storage;
pub mod memory_subledger;
pub mod validation;

pub use memory_storage::*;
pub use memory_subledger::*;
pub use validation::*;
