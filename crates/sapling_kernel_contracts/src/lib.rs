#![forbid(unsafe_code)]

pub mod common;
pub mod esign;
pub mod petition;
pub mod provider_secrets;

pub use common::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};
