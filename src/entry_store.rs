//! Append-only log of entries, indexed by id; tracks the chain tip
//! (spec.md §4.2).
//!
//! Grounded on the teacher's `TradeContext::insert_witness` /
//! `save_to_db` / `load_from_db` (append + CBOR persistence keyed by id)
//! and on the `other_examples` ibank `AppendOnlyLedger`'s two-phase
//! `build_entry`/`commit_entry` shape and `verify_chain` sweep.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::LedgerError;
use crate::hashing::canonical_hash;
use crate::types::{Entry, EntryStatus};

/// Everything needed to materialize an `Entry` except its chain position,
/// which `EntryStore::append` assigns.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub grant_cycle_id: String,
    pub transaction_id: String,
    pub account: crate::types::Account,
    pub amount: crate::money::Money,
    pub currency: String,
    pub entry_type: crate::types::EntryType,
    pub description: String,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<String, Entry>,
    /// Insertion order, doubling as the chain's total order.
    order: Vec<String>,
    tip: Option<String>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the most recently appended entry, or `None` for an empty
    /// chain (spec.md Glossary: "Chain tip").
    pub fn tip(&self) -> Option<&str> {
        self.tip.as_deref()
    }

    /// Materializes a draft into a fully chained `Entry` against a given
    /// `previous_hash`, without touching store state. Shared by `append`
    /// (single-entry, commits immediately) and `preview_chain`
    /// (multi-entry, commits only after the caller validates).
    fn materialize(draft: EntryDraft, previous_hash: Option<String>) -> Entry {
        let mut entry = Entry {
            id: Entry::new_id(),
            timestamp: Utc::now(),
            grant_cycle_id: draft.grant_cycle_id,
            transaction_id: draft.transaction_id,
            account: draft.account,
            amount: draft.amount,
            currency: draft.currency,
            entry_type: draft.entry_type,
            description: draft.description,
            metadata: draft.metadata,
            previous_hash,
            hash: String::new(),
            signatures: Vec::new(),
            zk_proof: None,
            status: EntryStatus::Pending,
        };
        entry.hash = canonical_hash(&entry.hash_payload());
        entry
    }

    /// Assigns id, timestamp, `previousHash = tip`, computes `hash`, stores,
    /// advances the tip immediately. For multi-entry transactions, prefer
    /// `preview_chain` + `commit` so a transaction that fails validation
    /// after its entries are chained doesn't leave them in the store (see
    /// Open Question 2, SPEC_FULL.md §9).
    pub fn append(&mut self, draft: EntryDraft) -> Entry {
        let entry = Self::materialize(draft, self.tip.clone());
        tracing::debug!(entry_id = %entry.id, hash = %entry.hash, "appended entry");
        self.entries.insert(entry.id.clone(), entry.clone());
        self.order.push(entry.id.clone());
        self.tip = Some(entry.hash.clone());
        entry
    }

    /// Computes the entries that *would* result from appending `drafts` in
    /// order onto the current tip, chaining each to the previous, without
    /// mutating the store. Pass the result to `commit` once the caller has
    /// validated it, or discard it to leave the chain untouched (spec.md
    /// §4.4's Open Question 2: a transaction that fails validation must not
    /// leave partially-appended entries behind).
    pub fn preview_chain(&self, drafts: Vec<EntryDraft>) -> Vec<Entry> {
        let mut tip = self.tip.clone();
        let mut entries = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let entry = Self::materialize(draft, tip.clone());
            tip = Some(entry.hash.clone());
            entries.push(entry);
        }
        entries
    }

    /// Commits entries produced by `preview_chain` against the *current*
    /// tip. Entries are inserted and the tip advances to the last entry's
    /// hash; nothing is recomputed, so `entries` must already be chained
    /// correctly against this store's tip at the time of the call.
    pub fn commit(&mut self, entries: Vec<Entry>) {
        for entry in entries {
            tracing::debug!(entry_id = %entry.id, hash = %entry.hash, "committed staged entry");
            self.order.push(entry.id.clone());
            self.tip = Some(entry.hash.clone());
            self.entries.insert(entry.id.clone(), entry);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entry> {
        self.entries.get_mut(id)
    }

    /// All entries belonging to `transaction_id`, ordered by timestamp
    /// ascending (spec.md §4.2).
    pub fn by_transaction(&self, transaction_id: &str) -> Vec<&Entry> {
        let mut found: Vec<&Entry> = self
            .order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.transaction_id == transaction_id)
            .collect();
        found.sort_by_key(|e| e.timestamp);
        found
    }

    /// All transaction ids referenced by entries in `grant_cycle_id`, in
    /// first-seen order.
    pub fn by_grant_cycle(&self, grant_cycle_id: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for id in &self.order {
            if let Some(entry) = self.entries.get(id) {
                if entry.grant_cycle_id == grant_cycle_id && !seen.contains(&entry.transaction_id)
                {
                    seen.push(entry.transaction_id.clone());
                }
            }
        }
        seen
    }

    /// Entries in total chain order (timestamp ascending, creation sequence
    /// as tiebreaker — `order` already reflects creation sequence).
    pub fn entries_in_order(&self) -> Vec<&Entry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    /// PENDING → {CONFIRMED, REJECTED, CANCELLED}; CONFIRMED is terminal.
    pub fn set_status(&mut self, id: &str, status: EntryStatus) -> Result<(), LedgerError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| LedgerError::not_found("Entry", id))?;

        if matches!(entry.status, EntryStatus::Confirmed) {
            return Err(LedgerError::IllegalEntryTransition {
                entry_id: id.to_string(),
                from: format!("{:?}", entry.status),
                to: format!("{status:?}"),
            });
        }

        tracing::trace!(entry_id = %id, from = ?entry.status, to = ?status, "entry status transition");
        entry.status = status;
        Ok(())
    }

    /// Persists every entry to `db`, JSON-encoded and keyed by id, mirroring
    /// `TradeContext::save_to_db`'s opaque-blob-keyed-by-id shape. Opt-in
    /// mirror only: the in-memory store remains authoritative.
    pub fn persist_to(&self, db: &sled::Db) -> anyhow::Result<()> {
        for entry in self.entries.values() {
            let bytes = serde_json::to_vec(entry)?;
            db.insert(entry.id.as_bytes(), bytes)?;
        }
        Ok(())
    }

    /// Rebuilds a store from everything `persist_to` wrote to `db`,
    /// mirroring `TradeContext::load_from_db`. `db` carries no explicit
    /// ordering, so entries are resequenced by timestamp ascending (the same
    /// order `entries_in_order` otherwise reconstructs from `order`), and the
    /// tip is the hash of the last entry in that resequenced order.
    pub fn load_from(db: &sled::Db) -> anyhow::Result<Self> {
        let mut entries: HashMap<String, Entry> = HashMap::new();
        for record in db.iter() {
            let (_, bytes) = record?;
            let entry: Entry = serde_json::from_slice(&bytes)?;
            entries.insert(entry.id.clone(), entry);
        }

        let mut order: Vec<String> = entries.keys().cloned().collect();
        order.sort_by_key(|id| entries[id].timestamp);

        let tip = order.last().map(|id| entries[id].hash.clone());

        tracing::debug!(loaded = entries.len(), "loaded entry store from db");
        Ok(Self {
            entries,
            order,
            tip,
        })
    }
}
