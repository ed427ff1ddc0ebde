//! Tier sequencing, allocation, audit and validation of a distribution
//! waterfall, plus the calculation record they produce.

pub mod allocation;
pub mod audit;
pub mod calculation;
pub mod irr;
pub mod pipeline;
pub mod sequencer;
pub mod tiers;
pub mod validator;

pub use calculation::{
    CalculationStatus, CalculationType, DistributionEvent, EventType, InvestorSummary,
    IrrAnalysis, PaymentStatus, Recipient, WaterfallCalculation,
};
pub use pipeline::{compute_waterfall, WaterfallOutcome, WaterfallRequest};
pub use tiers::{default_tiers, TierDefinition, TierResult, TierType};
pub use validator::{ValidationCheck, ValidationIssue, ValidationReport};
