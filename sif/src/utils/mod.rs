//! Utility functions and supporting infrastructure.
//!
//! Provides the position-tracking token reader used by the header decoder
//! and the error types shared by every stage.

pub mod errors;
pub mod token_io;

#[cfg(any(test, feature = "test-fixture"))]
pub mod fixture;
