//! Constructs balanced transactions, links entries into the chain
//! (spec.md §4.4).
//!
//! Grounded on the teacher's `TradeContext` construction flow. Resolves
//! Open Question 2 (SPEC_FULL.md §9): entries are built in a scratch buffer
//! and only committed to `EntryStore` after the balance check and the
//! Validator both pass, so a rejected transaction leaves the chain tip
//! untouched.

use std::collections::HashMap;

use chrono::Utc;

use crate::config::LedgerConfig;
use crate::entry_store::{EntryDraft, EntryStore};
use crate::error::LedgerError;
use crate::money::{Money, BALANCE_TOLERANCE};
use crate::types::{Account, AuditEntry, EntryType, Transaction, TransactionType};
use crate::validator::validate_transaction;

/// A single entry as requested by the caller, before it has a chain
/// position, id, or hash.
#[derive(Debug, Clone)]
pub struct EntryDescriptor {
    pub account: Account,
    pub amount: Money,
    pub currency: String,
    pub entry_type: EntryType,
    pub description: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

pub struct TransactionAssembler<'a> {
    config: &'a LedgerConfig,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(config: &'a LedgerConfig) -> Self {
        Self { config }
    }

    /// Performs, in order: (1) balance check, (2) chains every descriptor
    /// into a scratch buffer against the store's current tip without
    /// mutating it, (3) CREDIT aggregation into totalAmount, (4) Transaction
    /// construction in DRAFT, (5) validation, (6) commits the staged
    /// entries and returns. On any failure, `store` is left untouched — the
    /// stage-then-commit redesign adopted for Open Question 2
    /// (SPEC_FULL.md §9), since spec.md §4.4 step 2 runs before step 5's
    /// validation and a naive direct append would leave chained entries
    /// behind when validation subsequently fails.
    pub fn create_transaction(
        &self,
        store: &mut EntryStore,
        grant_cycle_id: &str,
        transaction_type: TransactionType,
        descriptors: Vec<EntryDescriptor>,
        description: String,
        policy_id: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        let net: i64 = descriptors
            .iter()
            .map(|d| d.entry_type.balance_sign() * d.amount.minor_units())
            .sum();
        if net.unsigned_abs() as i64 > BALANCE_TOLERANCE.minor_units() {
            return Err(LedgerError::UnbalancedEntries {
                net: Money::from_minor_units(net),
            });
        }

        if let Some(first) = descriptors.first() {
            if let Some(mismatch) = descriptors.iter().find(|d| d.currency != first.currency) {
                return Err(LedgerError::CurrencyMismatch {
                    first: first.currency.clone(),
                    other: mismatch.currency.clone(),
                });
            }
        }

        let currency = descriptors
            .first()
            .map(|d| d.currency.clone())
            .unwrap_or_else(|| self.config.default_currency.clone());

        let transaction_id = Transaction::new_id();

        let mut credit_total: i64 = 0;
        let drafts: Vec<EntryDraft> = descriptors
            .into_iter()
            .map(|descriptor| {
                if matches!(descriptor.entry_type, EntryType::Credit) {
                    credit_total += descriptor.amount.minor_units();
                }
                EntryDraft {
                    grant_cycle_id: grant_cycle_id.to_string(),
                    transaction_id: transaction_id.clone(),
                    account: descriptor.account,
                    amount: descriptor.amount,
                    currency: descriptor.currency,
                    entry_type: descriptor.entry_type,
                    description: descriptor.description,
                    metadata: descriptor.metadata,
                }
            })
            .collect();

        let staged = store.preview_chain(drafts);
        let entry_ids: Vec<String> = staged.iter().map(|e| e.id.clone()).collect();

        let transaction = Transaction {
            id: transaction_id.clone(),
            timestamp: Utc::now(),
            grant_cycle_id: grant_cycle_id.to_string(),
            transaction_type,
            description,
            entries: entry_ids,
            total_amount: Money::from_minor_units(credit_total),
            currency,
            policy_id,
            required_signatures: self.config.required_signatures,
            received_signatures: Vec::new(),
            status: crate::types::TransactionStatus::Draft,
            execution_timestamp: None,
            blockchain_metadata: None,
            audit_trail: vec![AuditEntry::new("CREATED", "system")],
        };

        let staged_refs: Vec<&_> = staged.iter().collect();
        let validation = validate_transaction(&transaction, &staged_refs, self.config);
        if !validation.valid() {
            return Err(LedgerError::ValidationFailed {
                errors: validation.errors,
            });
        }

        store.commit(staged);
        tracing::debug!(transaction_id = %transaction.id, total = %transaction.total_amount, "transaction assembled");
        Ok(transaction)
    }
}
