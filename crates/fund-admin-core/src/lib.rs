pub mod calculators;
pub mod config;
pub mod error;
pub mod fund;
pub mod service;
pub mod store;
pub mod time_value;
pub mod types;
pub mod waterfall;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use config::{AllocationBasis, EngineConfig};
pub use error::FundAdminError;
pub use service::{ClawbackAssessment, WaterfallService};
pub use store::{CalculationStore, FundBook, FundRecord, FundRepository, InMemoryStore};
pub use types::*;

/// Standard result type for all fund-admin operations
pub type FundAdminResult<T> = Result<T, FundAdminError>;
