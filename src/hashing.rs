//! Canonical serialization and SHA-256 digest of entry payloads
//! (spec.md §4.1).
//!
//! Grounded on the `other_examples` ibank ledger's `compute_entry_hash`,
//! which builds a `serde_json::json!` value over the hashed fields and
//! hashes the serialized bytes. `serde_json`'s default `Value::Object` is
//! backed by a `BTreeMap` (the `preserve_order` feature, which would switch
//! it to an `IndexMap`, is not enabled), so `serde_json::to_value` sorts
//! object keys lexicographically at *every* depth, not just the top level —
//! there is no insertion-order-preserving JSON value to route a "top-level
//! only" sort through without opting into `preserve_order`, and doing that
//! would make `Entry::metadata`'s `HashMap` serialize in whatever order the
//! hasher happens to iterate it, breaking determinism (P1/P9). All-levels
//! sorting is simply what this crate's `serde_json` already does, and it
//! still satisfies spec.md §3 Invariant 2 (`hash = f(entry)` deterministic).

use serde::Serialize;

/// Serializes `payload` to JSON (keys sorted at every depth, since that is
/// `serde_json::Value`'s own representation) and returns the SHA-256 digest
/// of the UTF-8 bytes as 64-char lowercase hex.
pub fn canonical_hash(payload: &impl Serialize) -> String {
    let value = serde_json::to_value(payload).expect("payload must be serializable");
    let bytes = serde_json::to_vec(&value).expect("canonical value always serializes");
    sha256::digest(bytes.as_slice())
}

/// Merkle root of a transaction's entries for submission to a blockchain
/// sink (spec.md §6.2): SHA-256 of the concatenation of entry hashes in
/// entry order.
pub fn merkle_root(entry_hashes: &[String]) -> String {
    let concatenated = entry_hashes.concat();
    sha256::digest(concatenated.as_bytes())
}
