//! # Rampart Common
//!
//! Types shared by every crate in the workspace:
//!
//! * **[`error`]**: the structural and convergence error taxonomy.
//! * **[`config`]**: run-time settings assembled by the command line.
//! * **[`network`]**: the parsed network definition, address blocks and the allocator.

pub mod config;
pub mod error;
pub mod network;

pub use error::{CompileError, ConvergenceError, Result};
