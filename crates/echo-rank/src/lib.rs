//! Reputation and ranking for the ECHO reference node.
//!
//! Reuse receipts are the only trust input. The [`ReputationAccumulator`]
//! turns the receipts an agent issued into a bounded reliability score; the
//! [`RankingEngine`] orders experience objects by a [`ScoringStrategy`] that
//! weighs receipt evidence by those scores.
//!
//! Everything here is pure: the same receipts, objects and clock instant give
//! the same scores, bit for bit.

pub mod config;
pub mod error;
pub mod ranking;
pub mod reputation;
pub mod scoring;

pub use config::{RankingWeights, ReputationConfig};
pub use error::{RankError, RankResult};
pub use ranking::{RankedHit, RankingEngine};
pub use reputation::{
    ReputationAccumulator, ReputationReport, TargetSummary, VerdictBreakdown, REPUTATION_VERSION,
};
pub use scoring::{round6, ReceiptEvidenceScorer, ScoreBreakdown, ScoringStrategy};
