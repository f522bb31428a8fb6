//! # STARC Common Library
//!
//! Shared code for the STARC services:
//! - Common error and result types
//! - TOML configuration model and loading
//! - ENV → TOML → default settings resolution
//! - Tracing bootstrap

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
