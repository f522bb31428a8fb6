//! HTTP API handlers for starc-sa

pub mod health;
pub mod rewrite;
pub mod score;

pub use health::health_routes;
pub use rewrite::rewrite_routes;
pub use score::score_routes;
