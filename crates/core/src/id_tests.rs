// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

#[test]
fn build_id_has_prefix() {
    let id = BuildId::new();
    assert!(id.as_str().starts_with("bld-"));
    assert_eq!(id.len(), 4 + 19);
}

#[test]
fn random_ids_are_unique() {
    assert_ne!(BuildId::new(), BuildId::new());
}

#[test]
fn id_hash_map_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(PlanId::from_string("7"), 42);
    assert_eq!(map.get("7"), Some(&42));
}

#[test]
fn short_strips_prefix() {
    let id = BuildId::from_string("bld-abcdefghijk");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn short_returns_full_when_shorter() {
    let id = PlanId::from_string("12");
    assert_eq!(id.short(8), "12");
}

#[test]
fn short_fn_respects_char_boundaries() {
    assert_eq!(short("héllo", 2), "hé");
    assert_eq!(short("abc", 8), "abc");
}

#[test]
fn id_serializes_transparently() {
    let id = PlanId::from_string("3");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"3\"");
    let parsed: PlanId = serde_json::from_str("\"3\"").unwrap();
    assert_eq!(parsed, "3");
}
