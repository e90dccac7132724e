//! # RepCRec Script
//!
//! Instruction scripts for the RepCRec engine.
//!
//! This crate provides:
//! - The instruction grammar and a line-oriented script reader
//! - The [`Driver`], which owns the logical clock and the deferred queue
//! - [`Event`]s, one per reportable outcome
//!
//! ```rust,ignore
//! use repcrec_script::run_script;
//!
//! for event in run_script("begin(T1); R(T1, x2); end(T1)")? {
//!     println!("{event}");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod event;
mod instruction;
mod reader;

pub use driver::{run_script, Clock, Driver, DriverConfig};
pub use error::{ScriptError, ScriptResult};
pub use event::Event;
pub use instruction::{parse_line, DumpTarget, Instruction};
pub use reader::{parse_script, ScriptLine, ScriptReader};
