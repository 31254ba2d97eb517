// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! ID generation

/// Returns a fresh v4 UUID string.
///
/// Builds, tenders, contracts, runtimes, execs, transfers, and barriers
/// are all identified by these.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
