//! Transaction lifecycle: DRAFT -> PENDING_APPROVAL -> APPROVED -> EXECUTED,
//! with REJECTED/CANCELLED reachable from any non-terminal state
//! (spec.md §4.5).
//!
//! Grounded on the teacher's `WitnessSet` signature-collection/threshold
//! logic and `TradeContext`'s status transitions, generalized to this
//! spec's five-state machine and its audit trail requirement.

use crate::entry_store::EntryStore;
use crate::error::LedgerError;
use crate::oracle::{BlockchainSink, SignatureOracle};
use crate::types::{AuditEntry, EntryStatus, Signature, Transaction, TransactionStatus};
use crate::balance_index::BalanceIndex;

/// `"STATUS_CHANGE_<new>"`, where `<new>` is the wire spelling of `status`
/// (spec.md §4.5: "on every transition, append `{now, "STATUS_CHANGE_<new>",
/// actor, details?}`"). Derived from `TransactionStatus`'s own
/// `SCREAMING_SNAKE_CASE` serde rename rather than hand-spelled per call
/// site, so the audit action can never drift from the wire enum spelling.
fn status_change_action(status: TransactionStatus) -> String {
    let wire = serde_json::to_value(status)
        .expect("TransactionStatus always serializes")
        .as_str()
        .expect("TransactionStatus serializes as a string")
        .to_string();
    format!("STATUS_CHANGE_{wire}")
}

pub struct ApprovalStateMachine<'a> {
    store: &'a mut EntryStore,
    balances: &'a mut BalanceIndex,
}

impl<'a> ApprovalStateMachine<'a> {
    pub fn new(store: &'a mut EntryStore, balances: &'a mut BalanceIndex) -> Self {
        Self { store, balances }
    }

    /// DRAFT -> PENDING_APPROVAL. Idempotent no-op if already pending.
    pub fn submit_for_approval(&self, transaction: &mut Transaction) -> Result<(), LedgerError> {
        match transaction.status {
            TransactionStatus::Draft => {
                transaction.status = TransactionStatus::PendingApproval;
                transaction.audit_trail.push(AuditEntry::new(
                    status_change_action(TransactionStatus::PendingApproval),
                    "system",
                ));
                Ok(())
            }
            TransactionStatus::PendingApproval => Ok(()),
            other => Err(LedgerError::IllegalTransactionTransition {
                transaction_id: transaction.id.clone(),
                from: format!("{other:?}"),
                to: "PENDING_APPROVAL".into(),
            }),
        }
    }

    /// Appends a validated signature, rejecting a signer who has already
    /// signed (spec.md §4.5). Propagates the signature onto every child
    /// entry, then promotes PENDING_APPROVAL -> APPROVED once the required
    /// count is met.
    pub fn add_signature(
        &mut self,
        transaction: &mut Transaction,
        signature: Signature,
        oracle: &impl SignatureOracle,
    ) -> Result<(), LedgerError> {
        if !matches!(transaction.status, TransactionStatus::PendingApproval) {
            return Err(LedgerError::IllegalTransactionTransition {
                transaction_id: transaction.id.clone(),
                from: format!("{:?}", transaction.status),
                to: "APPROVED (via signature)".into(),
            });
        }

        if transaction.received_signatures.contains(&signature.signer) {
            return Err(LedgerError::DuplicateSigner {
                transaction_id: transaction.id.clone(),
                signer: signature.signer.clone(),
            });
        }

        if !oracle.verify_signature(transaction, &signature) {
            return Err(LedgerError::ValidationFailed {
                errors: vec![format!("signature from '{}' failed verification", signature.signer)],
            });
        }

        transaction.received_signatures.push(signature.signer.clone());
        for entry_id in transaction.entries.clone() {
            if let Some(entry) = self.store.get_mut(&entry_id) {
                entry.signatures.push(signature.clone());
            }
        }
        transaction.audit_trail.push(
            AuditEntry::new("SIGNATURE_RECEIVED", signature.signer.clone())
                .with_details(format!("{}/{}", transaction.received_signatures.len(), transaction.required_signatures)),
        );

        if transaction.received_signatures.len() as u8 >= transaction.required_signatures {
            transaction.status = TransactionStatus::Approved;
            transaction.audit_trail.push(AuditEntry::new(
                status_change_action(TransactionStatus::Approved),
                "system",
            ));
            transaction
                .audit_trail
                .push(AuditEntry::new("ALL_SIGNATURES_RECEIVED", "system"));
        }

        Ok(())
    }

    /// APPROVED -> EXECUTED, gated on *both* halves of the sink contract
    /// (spec.md §4.5 transition table: "sink returns hash AND verify
    /// returns true"). On success, confirms every child entry, records
    /// blockchain metadata, and applies the balance delta exactly once. On
    /// either half failing, moves to REJECTED and records the failure in
    /// the audit trail (spec.md §7: `SinkFailure` is recorded, never
    /// retried by the core).
    pub fn execute(
        &mut self,
        transaction: &mut Transaction,
        sink: &impl BlockchainSink,
    ) -> Result<(), LedgerError> {
        if !matches!(transaction.status, TransactionStatus::Approved) {
            return Err(LedgerError::IllegalTransactionTransition {
                transaction_id: transaction.id.clone(),
                from: format!("{:?}", transaction.status),
                to: "EXECUTED".into(),
            });
        }

        let entry_hashes: Vec<String> = transaction
            .entries
            .iter()
            .filter_map(|id| self.store.get(id))
            .map(|e| e.hash.clone())
            .collect();
        let root = crate::hashing::merkle_root(&entry_hashes);
        tracing::debug!(transaction_id = %transaction.id, merkle_root = %root, "submitting transaction to sink");

        let tx_hash = match sink.submit(transaction) {
            Ok(hash) => hash,
            Err(err) => {
                transaction.status = TransactionStatus::Rejected;
                transaction.audit_trail.push(
                    AuditEntry::new(status_change_action(TransactionStatus::Rejected), "system")
                        .with_details(err.to_string()),
                );
                tracing::debug!(transaction_id = %transaction.id, error = %err, "sink rejected transaction");
                return Err(err);
            }
        };

        if !sink.verify(&tx_hash) {
            transaction.status = TransactionStatus::Rejected;
            let message = format!("sink could not verify txHash '{tx_hash}'");
            transaction.audit_trail.push(
                AuditEntry::new(status_change_action(TransactionStatus::Rejected), "system")
                    .with_details(message.clone()),
            );
            tracing::debug!(transaction_id = %transaction.id, tx_hash = %tx_hash, "sink verification failed");
            return Err(LedgerError::SinkFailure {
                transaction_id: transaction.id.clone(),
                message,
            });
        }

        for entry_id in transaction.entries.clone() {
            self.store.set_status(&entry_id, EntryStatus::Confirmed)?;
        }
        let entries = self.store.by_transaction(&transaction.id);
        self.balances.apply_execution(&entries);

        transaction.blockchain_metadata = sink.metadata(&tx_hash).or_else(|| {
            Some(crate::types::BlockchainMetadata {
                blockchain: "unknown".into(),
                tx_hash: tx_hash.clone(),
                block_number: None,
                gas_used: None,
                confirmations: None,
            })
        });
        transaction.execution_timestamp = Some(chrono::Utc::now());
        transaction.status = TransactionStatus::Executed;
        transaction.audit_trail.push(AuditEntry::new(
            status_change_action(TransactionStatus::Executed),
            "system",
        ));
        tracing::debug!(transaction_id = %transaction.id, "transaction executed");
        Ok(())
    }

    /// Moves any non-terminal transaction to CANCELLED. Child entries not
    /// yet CONFIRMED are cancelled alongside it.
    pub fn cancel(&mut self, transaction: &mut Transaction, reason: impl Into<String>) -> Result<(), LedgerError> {
        self.terminate(transaction, TransactionStatus::Cancelled, reason)
    }

    /// Moves any non-terminal transaction to REJECTED.
    pub fn reject(&mut self, transaction: &mut Transaction, reason: impl Into<String>) -> Result<(), LedgerError> {
        self.terminate(transaction, TransactionStatus::Rejected, reason)
    }

    fn terminate(
        &mut self,
        transaction: &mut Transaction,
        target: TransactionStatus,
        reason: impl Into<String>,
    ) -> Result<(), LedgerError> {
        if matches!(
            transaction.status,
            TransactionStatus::Executed | TransactionStatus::Rejected | TransactionStatus::Cancelled
        ) {
            return Err(LedgerError::IllegalTransactionTransition {
                transaction_id: transaction.id.clone(),
                from: format!("{:?}", transaction.status),
                to: format!("{target:?}"),
            });
        }

        for entry_id in transaction.entries.clone() {
            let entry_status = match target {
                TransactionStatus::Cancelled => EntryStatus::Cancelled,
                _ => EntryStatus::Rejected,
            };
            if let Some(entry) = self.store.get(&entry_id) {
                if !matches!(entry.status, EntryStatus::Confirmed) {
                    self.store.set_status(&entry_id, entry_status)?;
                }
            }
        }

        transaction.status = target;
        transaction.audit_trail.push(
            AuditEntry::new(status_change_action(target), "system").with_details(reason.into()),
        );
        Ok(())
    }
}
