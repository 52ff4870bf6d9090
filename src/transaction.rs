//! Transaction module split into types, validation and issuance accounting

pub mod issuance;
pub mod types;
pub mod validation;

pub use issuance::IssuedAmounts;
pub use types::*;
pub use validation::SpentOutputs;
