//! Test Helper Utilities
//!
//! In-process HTTP stand-ins for the external services starc-sa talks to.

#![allow(dead_code)]

pub mod mock_completion_server;
pub mod mock_scoring_server;

pub use mock_completion_server::{MockCompletionServer, TEST_COMPLETION_KEY};
pub use mock_scoring_server::{MockScoringServer, TEST_API_KEY, TEST_BEARER_TOKEN};

/// `count` distinguishable sentences: "Sentence number s1x. Sentence number s2x. ..."
pub fn numbered_text(count: usize) -> String {
    (1..=count)
        .map(|i| format!("Sentence number s{}x.", i))
        .collect::<Vec<_>>()
        .join(" ")
}
