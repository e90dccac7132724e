//! Benchmarks for RepCRec.
//!
//! The benchmarks live under `benches/`; this crate only holds the workload
//! generators they share.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
