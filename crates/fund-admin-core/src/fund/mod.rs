pub mod snapshot;
pub mod terms;

pub use snapshot::{load_snapshot, FundSnapshot};
pub use terms::{
    CapitalFlow, CapitalFlowKind, CarryMethod, Commitment, CommitmentStatus, FundTerms,
    HurdleTier,
};
