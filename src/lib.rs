pub mod analysis;
pub mod claim;
pub mod commands;
pub mod config;
pub mod error;
pub mod evidence;
pub mod ledger;
pub mod metrics;
pub mod policy;
pub mod records;
pub mod riskpool;
pub mod scenario;
pub mod shield;
pub mod types;

#[cfg(test)]
mod testkit;

pub use error::{ErrorKind, Result, ShieldError};
pub use shield::Shield;
