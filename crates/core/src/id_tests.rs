// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use std::collections::HashSet;

#[test]
fn ids_are_unique() {
    let ids: HashSet<String> = (0..100).map(|_| new_id()).collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn ids_are_uuid_shaped() {
    let id = new_id();
    assert_eq!(id.len(), 36);
    assert_eq!(id.matches('-').count(), 4);
}
