// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bildwerk — Core types, error definitions, and capability traits shared
// across all crates.

pub mod capability;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use capability::{Assembler, Enhancer, ImagePayload};
pub use config::SessionConfig;
pub use error::BildwerkError;
pub use types::*;
