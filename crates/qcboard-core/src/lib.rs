//! Core types and trait definitions for qcboard, the imaging-equipment QC
//! tracker.
//!
//! This crate is free of HTTP and database dependencies. The due-status
//! evaluator in [`due`] is a pure function over data the caller has already
//! loaded; storage backends implement [`store::MachineStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cadence;
pub mod due;
pub mod error;
pub mod machine;
pub mod qc;
pub mod store;

pub use error::{Error, Result};
