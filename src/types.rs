//! Core ledger entities (spec.md §3).
//!
//! Field names use `camelCase` on the wire via `serde(rename_all)`, matching
//! the teacher's own `#[n(..)]`-tagged, field-name-is-contract style in
//! `context.rs`/`trade.rs` but adapted to the JSON wire shape this spec's
//! hash-compatibility requirement (§6.4) actually needs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Funding,
    Disbursement,
    Beneficiary,
    Administrative,
    Reserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    Organization,
    Individual,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    pub owner_type: OwnerType,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub account_type: AccountType,
    pub owner: Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Debit,
    Credit,
    Adjustment,
}

impl EntryType {
    /// Signed contribution to a transaction's net balance.
    ///
    /// Only CREDIT contributes +1; everything else (including ADJUSTMENT)
    /// contributes -1. This is deliberately a catch-all `_` arm, not an
    /// enumerated match, so a future EntryType variant inherits the -1
    /// default the source's own ambiguity implies rather than silently
    /// being left unbalanced (see Open Question in SPEC_FULL.md §9).
    pub fn balance_sign(&self) -> i64 {
        match self {
            EntryType::Credit => 1,
            _ => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    #[serde(rename = "ECDSA")]
    Ecdsa,
    #[serde(rename = "EdDSA")]
    EdDsa,
    #[serde(rename = "RSA")]
    Rsa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub signer: String,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub signature_type: SignatureType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProofDescriptor {
    pub scheme: String,
    pub proof: String,
}

/// A single atomic credit/debit (spec.md §3 Entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub grant_cycle_id: String,
    pub transaction_id: String,
    pub account: Account,
    pub amount: Money,
    pub currency: String,
    pub entry_type: EntryType,
    pub description: String,
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub hash: String,
    pub signatures: Vec<Signature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zk_proof: Option<ZkProofDescriptor>,
    pub status: EntryStatus,
}

impl Entry {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// The subset of an Entry's fields that feed the canonical hash: everything
/// except `hash`, `signatures`, and `status` (spec.md §4.1).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryHashPayload<'a> {
    pub id: &'a str,
    pub timestamp: DateTime<Utc>,
    pub grant_cycle_id: &'a str,
    pub transaction_id: &'a str,
    pub account: &'a Account,
    pub amount: Money,
    pub currency: &'a str,
    pub entry_type: EntryType,
    pub description: &'a str,
    pub metadata: &'a HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: &'a Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zk_proof: &'a Option<ZkProofDescriptor>,
}

impl Entry {
    pub fn hash_payload(&self) -> EntryHashPayload<'_> {
        EntryHashPayload {
            id: &self.id,
            timestamp: self.timestamp,
            grant_cycle_id: &self.grant_cycle_id,
            transaction_id: &self.transaction_id,
            account: &self.account,
            amount: self.amount,
            currency: &self.currency,
            entry_type: self.entry_type,
            description: &self.description,
            metadata: &self.metadata,
            previous_hash: &self.previous_hash,
            zk_proof: &self.zk_proof,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Allocation,
    Disbursement,
    Return,
    Adjustment,
    Closure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Draft,
    PendingApproval,
    Approved,
    Executed,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainMetadata {
    pub blockchain: String,
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            actor: actor.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// A balanced bundle of entries representing one economic event
/// (spec.md §3 Transaction). `entries` is a list of entry ids; `EntryStore`
/// exclusively owns the `Entry` records themselves (see Ownership &
/// lifecycle, spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub grant_cycle_id: String,
    pub transaction_type: TransactionType,
    pub description: String,
    pub entries: Vec<String>,
    pub total_amount: Money,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    pub required_signatures: u8,
    pub received_signatures: Vec<String>,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_metadata: Option<BlockchainMetadata>,
    pub audit_trail: Vec<AuditEntry>,
}

impl Transaction {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub account_id: String,
    pub balance: Money,
    pub currency: String,
    pub as_of: DateTime<Utc>,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantCycleStatus {
    Active,
    Closed,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantCycle {
    pub id: String,
    pub grant_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_amount: Money,
    pub currency: String,
    pub status: GrantCycleStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
