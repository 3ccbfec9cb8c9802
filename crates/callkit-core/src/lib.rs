// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CallKit — Core types and error definitions shared across all crates.

pub mod best_effort;
pub mod config;
pub mod error;
pub mod types;

pub use best_effort::{AlertStep, Delivered, SoftFailure};
pub use config::{CallKitConfig, SupersedePolicy};
pub use error::CallKitError;
pub use types::*;
