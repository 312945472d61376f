//! Currency handling: exchange rates and cash boxes

pub mod cash_box;
pub mod rates;

pub use cash_box::*;
pub use rates::*;
