//! The explicit engine handle that owns the ledger's in-memory state and
//! exposes the public API (spec.md §4, §4.7 IntegrityVerifier).
//!
//! Grounded on the teacher's `TradeService`, which similarly bundled a
//! `TradeContext` and exposed one method per lifecycle operation, generalized
//! from the teacher's witness/trade domain to transactions/entries.

use std::collections::HashMap;

use crate::assembler::{EntryDescriptor, TransactionAssembler};
use crate::balance_index::BalanceIndex;
use crate::config::LedgerConfig;
use crate::entry_store::EntryStore;
use crate::error::LedgerError;
use crate::hashing::canonical_hash;
use crate::oracle::{BlockchainSink, SignatureOracle};
use crate::state_machine::ApprovalStateMachine;
use crate::types::{Balance, EntryStatus, Signature, Transaction, TransactionType};

/// Result of a full-chain integrity sweep (spec.md §4.7): every violation
/// found, aggregated rather than short-circuiting on the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl IntegrityReport {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turns a failed sweep into `LedgerError::IntegrityViolation` (spec.md
    /// §7's mandated error-kind list), discarding nothing but the
    /// warnings — those are advisory, not violations.
    pub fn into_result(self) -> Result<(), LedgerError> {
        if self.valid() {
            Ok(())
        } else {
            Err(LedgerError::IntegrityViolation {
                violations: self.errors,
            })
        }
    }
}

pub struct LedgerEngine {
    store: EntryStore,
    balances: BalanceIndex,
    config: LedgerConfig,
    transactions: HashMap<String, Transaction>,
}

impl LedgerEngine {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            store: EntryStore::new(),
            balances: BalanceIndex::new(),
            config,
            transactions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    /// Builds, validates, appends, and stores a new DRAFT transaction
    /// (spec.md §4.4).
    pub fn create_transaction(
        &mut self,
        grant_cycle_id: &str,
        transaction_type: TransactionType,
        descriptors: Vec<EntryDescriptor>,
        description: String,
        policy_id: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        let assembler = TransactionAssembler::new(&self.config);
        let transaction = assembler.create_transaction(
            &mut self.store,
            grant_cycle_id,
            transaction_type,
            descriptors,
            description,
            policy_id,
        )?;
        self.transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(transaction)
    }

    pub fn submit_for_approval(&mut self, transaction_id: &str) -> Result<Transaction, LedgerError> {
        let mut transaction = self.take(transaction_id)?;
        ApprovalStateMachine::new(&mut self.store, &mut self.balances)
            .submit_for_approval(&mut transaction)?;
        self.put_back(transaction)
    }

    pub fn add_signature(
        &mut self,
        transaction_id: &str,
        signature: Signature,
        oracle: &impl SignatureOracle,
    ) -> Result<Transaction, LedgerError> {
        let mut transaction = self.take(transaction_id)?;
        ApprovalStateMachine::new(&mut self.store, &mut self.balances)
            .add_signature(&mut transaction, signature, oracle)?;
        self.put_back(transaction)
    }

    pub fn execute(
        &mut self,
        transaction_id: &str,
        sink: &impl BlockchainSink,
    ) -> Result<Transaction, LedgerError> {
        let mut transaction = self.take(transaction_id)?;
        let result = ApprovalStateMachine::new(&mut self.store, &mut self.balances)
            .execute(&mut transaction, sink);
        let saved = self.put_back(transaction)?;
        result.map(|_| saved)
    }

    /// Cancellation is non-fatal at the queue level (spec.md §4.5): an
    /// unknown transaction id is simply a no-op.
    pub fn cancel(&mut self, transaction_id: &str, reason: impl Into<String>) -> Result<(), LedgerError> {
        let Some(mut transaction) = self.transactions.remove(transaction_id) else {
            return Ok(());
        };
        let result = ApprovalStateMachine::new(&mut self.store, &mut self.balances)
            .cancel(&mut transaction, reason);
        self.transactions.insert(transaction_id.to_string(), transaction);
        result
    }

    pub fn reject(&mut self, transaction_id: &str, reason: impl Into<String>) -> Result<(), LedgerError> {
        let Some(mut transaction) = self.transactions.remove(transaction_id) else {
            return Ok(());
        };
        let result = ApprovalStateMachine::new(&mut self.store, &mut self.balances)
            .reject(&mut transaction, reason);
        self.transactions.insert(transaction_id.to_string(), transaction);
        result
    }

    pub fn get_account_balance(&mut self, account_id: &str, currency: &str) -> Balance {
        self.balances.get_account_balance(&self.store, account_id, currency)
    }

    pub fn entry_status(&self, entry_id: &str) -> Option<crate::types::EntryStatus> {
        self.store.get(entry_id).map(|e| e.status)
    }

    /// Runs the policy overlay (spec.md §4.3, §6.1: `validateAgainstPolicies`)
    /// against a transaction already known to this engine, resolving its
    /// child entries through the store the way `execute`/`verify_integrity`
    /// do.
    pub fn validate_against_policies(
        &self,
        transaction_id: &str,
        policy: &crate::validator::PolicyRules,
    ) -> Result<crate::validator::ValidationResult, LedgerError> {
        let transaction = self
            .transactions
            .get(transaction_id)
            .ok_or_else(|| LedgerError::not_found("Transaction", transaction_id))?;
        let entries = self.store.by_transaction(transaction_id);
        Ok(crate::validator::validate_against_policies(transaction, &entries, policy))
    }

    /// Drops all memoized balances, forcing the next `get_account_balance`
    /// call to re-derive from CONFIRMED entries (spec.md §4.6).
    pub fn clear_balance_cache(&mut self) {
        self.balances.clear();
    }

    /// Recomputes every entry's hash and chain linkage, invokes the
    /// signature oracle per entry, recomputes every transaction's balance,
    /// and aggregates the result (spec.md §4.7 steps 1-5). Never mutates
    /// state; a caller with a detected violation decides what to do about
    /// it.
    /// As `verify_integrity`, but collapses a failed sweep into a single
    /// `LedgerError::IntegrityViolation` for callers that want `?` rather
    /// than inspecting a report (spec.md §7).
    pub fn verify_integrity_checked(&self, oracle: &impl SignatureOracle) -> Result<(), LedgerError> {
        self.verify_integrity(oracle).into_result()
    }

    pub fn verify_integrity(&self, oracle: &impl SignatureOracle) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let mut previous_hash: Option<&str> = None;

        for entry in self.store.entries_in_order() {
            let recomputed = canonical_hash(&entry.hash_payload());
            if recomputed != entry.hash {
                report.errors.push(format!(
                    "entry '{}' hash mismatch: stored '{}', recomputed '{}'",
                    entry.id, entry.hash, recomputed
                ));
            }
            if entry.previous_hash.as_deref() != previous_hash {
                report.errors.push(format!(
                    "entry '{}' breaks chain: expected previousHash {:?}, found {:?}",
                    entry.id, previous_hash, entry.previous_hash
                ));
            }
            previous_hash = Some(entry.hash.as_str());

            if matches!(entry.status, EntryStatus::Confirmed) && !entry.signatures.is_empty() {
                let signature_report = oracle.verify_entry(entry);
                if !signature_report.valid {
                    report.errors.push(format!(
                        "entry '{}' has an invalid signature: {:?}",
                        entry.id, signature_report.details
                    ));
                }
            }
        }

        for transaction in self.transactions.values() {
            let entries = self.store.by_transaction(&transaction.id);
            let net: i64 = entries
                .iter()
                .map(|e| e.entry_type.balance_sign() * e.amount.minor_units())
                .sum();
            if net.unsigned_abs() as i64 > crate::money::BALANCE_TOLERANCE.minor_units() {
                report.errors.push(format!(
                    "transaction '{}' does not balance: net = {}",
                    transaction.id,
                    crate::money::Money::from_minor_units(net)
                ));
            }
            if entries.len() != transaction.entries.len() {
                report.warnings.push(format!(
                    "transaction '{}' references {} entries but store has {}",
                    transaction.id,
                    transaction.entries.len(),
                    entries.len()
                ));
            }
        }

        report
    }

    fn take(&mut self, transaction_id: &str) -> Result<Transaction, LedgerError> {
        self.transactions
            .remove(transaction_id)
            .ok_or_else(|| LedgerError::not_found("Transaction", transaction_id))
    }

    fn put_back(&mut self, transaction: Transaction) -> Result<Transaction, LedgerError> {
        self.transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{MockBlockchainSink, MockSignatureOracle};
    use crate::types::{Account, AccountType, EntryType, Owner, OwnerType, SignatureType};
    use chrono::Utc;

    fn account(id: &str) -> Account {
        Account {
            id: id.into(),
            account_type: AccountType::Funding,
            owner: Owner {
                id: format!("{id}-owner"),
                owner_type: OwnerType::Organization,
                name: None,
            },
        }
    }

    fn descriptor(account_id: &str, amount: &str, entry_type: EntryType) -> EntryDescriptor {
        EntryDescriptor {
            account: account(account_id),
            amount: amount.parse().unwrap(),
            currency: "USD".into(),
            entry_type,
            description: "alloc".into(),
            metadata: Default::default(),
        }
    }

    fn signature(signer: &str) -> Signature {
        Signature {
            signer: signer.into(),
            signature: "sig".into(),
            timestamp: Utc::now(),
            signature_type: SignatureType::Ecdsa,
        }
    }

    #[test]
    fn end_to_end_allocation_is_clean_under_integrity_verification() {
        let config = LedgerConfig {
            required_signatures: 1,
            ..LedgerConfig::default()
        };
        let mut engine = LedgerEngine::new(config);

        let tx = engine
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", "2500.00", EntryType::Credit),
                    descriptor("disbursement", "2500.00", EntryType::Debit),
                ],
                "grant allocation".into(),
                None,
            )
            .unwrap();

        engine.submit_for_approval(&tx.id).unwrap();
        engine
            .add_signature(&tx.id, signature("alice"), &MockSignatureOracle)
            .unwrap();
        let executed = engine.execute(&tx.id, &MockBlockchainSink).unwrap();

        assert_eq!(executed.status, crate::types::TransactionStatus::Executed);
        let report = engine.verify_integrity(&MockSignatureOracle);
        assert!(report.valid(), "unexpected violations: {:?}", report.errors);

        let balance = engine.get_account_balance("disbursement", "USD");
        assert_eq!(balance.balance.to_string(), "-2500.00");
    }

    #[test]
    fn cancel_on_unknown_transaction_is_a_no_op() {
        let mut engine = LedgerEngine::new(LedgerConfig::default());
        assert!(engine.cancel("does-not-exist", "cleanup").is_ok());
    }

    #[test]
    fn policy_overlay_flags_a_disallowed_transaction_type_and_blocklisted_beneficiary() {
        let mut engine = LedgerEngine::new(LedgerConfig::default());
        let tx = engine
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", "500.00", EntryType::Credit),
                    descriptor("disbursement", "500.00", EntryType::Debit),
                ],
                "grant allocation".into(),
                None,
            )
            .unwrap();

        let policy = crate::validator::PolicyRules {
            allowed_transaction_types: vec![TransactionType::Disbursement],
            max_amount: "1000000.00".parse().unwrap(),
            business_hours_start: chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            business_hours_end: chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            blocked_beneficiary_ids: vec!["disbursement-owner".into()],
        };

        let result = engine.validate_against_policies(&tx.id, &policy).unwrap();
        assert!(!result.valid());
        assert!(result.errors.iter().any(|e| e.contains("not permitted by policy")));
        assert!(result.errors.iter().any(|e| e.contains("blocklisted")));
    }

    #[test]
    fn policy_overlay_on_unknown_transaction_is_not_found() {
        let engine = LedgerEngine::new(LedgerConfig::default());
        let policy = crate::validator::PolicyRules {
            allowed_transaction_types: vec![TransactionType::Allocation],
            max_amount: "1000000.00".parse().unwrap(),
            business_hours_start: chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            business_hours_end: chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            blocked_beneficiary_ids: vec![],
        };
        let result = engine.validate_against_policies("does-not-exist", &policy);
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[test]
    fn tampering_an_entry_amount_is_caught_as_a_hash_mismatch() {
        let mut engine = LedgerEngine::new(LedgerConfig::default());
        let tx = engine
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", "5000.00", EntryType::Credit),
                    descriptor("disbursement", "5000.00", EntryType::Debit),
                ],
                "grant allocation".into(),
                None,
            )
            .unwrap();
        assert!(engine.verify_integrity(&MockSignatureOracle).valid());

        let second_entry_id = tx.entries[1].clone();
        engine.store.get_mut(&second_entry_id).unwrap().amount = "9999.00".parse().unwrap();

        let report = engine.verify_integrity(&MockSignatureOracle);
        assert!(!report.valid());
        assert!(report.errors.iter().any(|e| e.contains("hash mismatch")));
    }

    #[test]
    fn tampering_previous_hash_is_caught_as_a_broken_chain() {
        let mut engine = LedgerEngine::new(LedgerConfig::default());
        let tx = engine
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", "5000.00", EntryType::Credit),
                    descriptor("disbursement", "5000.00", EntryType::Debit),
                ],
                "grant allocation".into(),
                None,
            )
            .unwrap();

        let second_entry_id = tx.entries[1].clone();
        engine.store.get_mut(&second_entry_id).unwrap().previous_hash = Some("f".repeat(64));

        let report = engine.verify_integrity(&MockSignatureOracle);
        assert!(!report.valid());
        assert!(report.errors.iter().any(|e| e.contains("breaks chain")));
    }

    #[test]
    fn verify_integrity_checked_ok_on_a_clean_chain_and_err_on_a_tampered_one() {
        let mut engine = LedgerEngine::new(LedgerConfig::default());
        let tx = engine
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", "5000.00", EntryType::Credit),
                    descriptor("disbursement", "5000.00", EntryType::Debit),
                ],
                "grant allocation".into(),
                None,
            )
            .unwrap();
        assert!(engine.verify_integrity_checked(&MockSignatureOracle).is_ok());

        let second_entry_id = tx.entries[1].clone();
        engine.store.get_mut(&second_entry_id).unwrap().amount = "9999.00".parse().unwrap();

        match engine.verify_integrity_checked(&MockSignatureOracle) {
            Err(LedgerError::IntegrityViolation { violations }) => {
                assert!(violations.iter().any(|e| e.contains("hash mismatch")));
            }
            other => panic!("expected IntegrityViolation, got {other:?}"),
        }
    }
}
