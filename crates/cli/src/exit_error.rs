// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling
//! `std::process::exit()` directly, allowing `main()` to handle
//! process termination.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A fatal error: exit code 1.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(1, message)
    }

    /// Propagates a pattern exit code without extra output.
    pub fn silent(code: i32) -> Self {
        Self::new(code, "")
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<anyhow::Error> for ExitError {
    fn from(e: anyhow::Error) -> Self {
        Self::fatal(format!("{e:#}"))
    }
}
