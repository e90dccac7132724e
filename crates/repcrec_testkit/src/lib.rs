//! # RepCRec Testkit
//!
//! Test utilities for RepCRec.
//!
//! This crate provides:
//! - Test fixtures and engine helpers
//! - Canonical scenario scripts
//! - Property-based script generators using proptest
//! - Golden transcript utilities
//! - A history checker for engine invariants
//!
//! ## Usage
//!
//! ```rust,ignore
//! use repcrec_testkit::prelude::*;
//!
//! #[test]
//! fn write_skew_is_caught() {
//!     let lines = run_script(scenarios::WRITE_SKEW);
//!     assert!(lines.contains(&"T2 aborts: serialization cycle".to_string()));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod golden;
pub mod history;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::golden::*;
    pub use crate::history::*;
}

pub use fixtures::*;
pub use generators::*;
pub use golden::*;
pub use history::*;
