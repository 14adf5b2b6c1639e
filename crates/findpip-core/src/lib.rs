// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// findpip: Core types, configuration, and error definitions shared across all
// crates.

pub mod config;
pub mod error;
pub mod error_text;
pub mod types;

pub use config::{OptionScope, ServerConfig, SessionOptions};
pub use error::FindpipError;
pub use types::*;
