//! Scoring pipeline services
//!
//! Control flow for one scoring call:
//! caller → [`BatchScorer::score`] → [`WarmupCoordinator::ensure_warm`] (at most
//! once per interval) → sentence split → padded concurrent rounds →
//! [`aggregator::aggregate`] → [`AggregateScore`](crate::types::AggregateScore)

pub mod aggregator;
pub mod analysis;
pub mod batch_scorer;
pub mod rewrite_client;
pub mod scoring_client;
pub mod warmup;

pub use analysis::{DocumentAnalysis, DocumentAnalyzer};
pub use batch_scorer::{BatchScorer, ScoringReport};
pub use rewrite_client::{
    ChatMessage, ChatReply, CompletionBackend, OpenAiCompletionClient, RewriteClient, RewriteError,
};
pub use scoring_client::{HttpScoringClient, ScoringBackend, ScoringError};
pub use warmup::{PoolSnapshot, WarmupCoordinator};
