//! Property-based tests for chain linkage, signature handling, and balance
//! derivation across randomly generated sequences of entries/transactions.
//!
//! These property tests cover:
//!
//! 1. Chain linkage - every entry's previousHash points at the prior tip
//! 2. Signature uniqueness - no signer appears twice on a transaction
//! 3. Executed implies confirmed - a terminal invariant on child entries
//! 4. Balance consistency - the memoized index agrees with derivation from
//!    CONFIRMED entries
//! 5. Idempotent verification - running the integrity sweep twice with no
//!    state change yields identical results
//!
//! What these tests DON'T cover (deliberately):
//!
//! - Persistence round-tripping through sled (covered in entry_store's own
//!   unit tests)
//! - Cryptographic signature verification (mocked; out of scope)

use proptest::prelude::*;

use grant_ledger::assembler::EntryDescriptor;
use grant_ledger::config::LedgerConfig;
use grant_ledger::engine::LedgerEngine;
use grant_ledger::oracle::{MockBlockchainSink, MockSignatureOracle};
use grant_ledger::types::{
    Account, AccountType, EntryType, Owner, OwnerType, Signature, SignatureType, TransactionType,
};

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
        description: "prop".into(),
        metadata: Default::default(),
    }
}

fn signature(signer: &str) -> Signature {
    Signature {
        signer: signer.into(),
        signature: "sig-bytes".into(),
        timestamp: chrono::Utc::now(),
        signature_type: SignatureType::Ecdsa,
    }
}

fn amounts_strategy(n: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..=500_000, n)
}

proptest! {
    /// P2: for the time-ordered entry sequence, every entry's previousHash
    /// equals the prior entry's hash; the first entry's is absent.
    #[test]
    fn prop_chain_links_every_entry_to_its_predecessor(amounts in amounts_strategy(5)) {
        let mut engine = LedgerEngine::new(LedgerConfig::default());
        for minor in &amounts {
            let amount = format!("{}.{:02}", minor / 100, minor % 100);
            engine.create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", &amount, EntryType::Credit),
                    descriptor("disbursement", &amount, EntryType::Debit),
                ],
                "prop allocation".into(),
                None,
            ).unwrap();
        }

        let report = engine.verify_integrity(&MockSignatureOracle);
        prop_assert!(report.valid(), "unexpected chain violations: {:?}", report.errors);
    }

    /// P5: receivedSignatures never contains a duplicate signer, even when
    /// the same signer is offered repeatedly.
    #[test]
    fn prop_signatures_never_duplicate_a_signer(repeat_count in 1usize..=5) {
        let config = LedgerConfig { required_signatures: 10, ..LedgerConfig::default() };
        let mut engine = LedgerEngine::new(config);
        let tx = engine.create_transaction(
            "cycle-1",
            TransactionType::Allocation,
            vec![
                descriptor("funding", "100.00", EntryType::Credit),
                descriptor("disbursement", "100.00", EntryType::Debit),
            ],
            "prop allocation".into(),
            None,
        ).unwrap();
        engine.submit_for_approval(&tx.id).unwrap();

        let mut accepted = 0;
        for _ in 0..repeat_count {
            if engine.add_signature(&tx.id, signature("repeat-offender"), &MockSignatureOracle).is_ok() {
                accepted += 1;
            }
        }

        prop_assert_eq!(accepted, 1);
    }

    /// P6: whenever a transaction reaches EXECUTED, every child entry has
    /// status CONFIRMED.
    #[test]
    fn prop_executed_transaction_implies_all_entries_confirmed(minor in 1i64..=500_000) {
        let config = LedgerConfig { required_signatures: 1, ..LedgerConfig::default() };
        let mut engine = LedgerEngine::new(config);
        let amount = format!("{}.{:02}", minor / 100, minor % 100);

        let tx = engine.create_transaction(
            "cycle-1",
            TransactionType::Allocation,
            vec![
                descriptor("funding", &amount, EntryType::Credit),
                descriptor("disbursement", &amount, EntryType::Debit),
            ],
            "prop allocation".into(),
            None,
        ).unwrap();
        engine.submit_for_approval(&tx.id).unwrap();
        engine.add_signature(&tx.id, signature("alice"), &MockSignatureOracle).unwrap();
        let executed = engine.execute(&tx.id, &MockBlockchainSink).unwrap();

        for entry_id in &executed.entries {
            prop_assert_eq!(
                engine.entry_status(entry_id),
                Some(grant_ledger::types::EntryStatus::Confirmed)
            );
        }
    }

    /// P8: running the integrity sweep twice with no intervening state
    /// change yields identical results.
    #[test]
    fn prop_integrity_verification_is_idempotent(amounts in amounts_strategy(3)) {
        let mut engine = LedgerEngine::new(LedgerConfig::default());
        for minor in &amounts {
            let amount = format!("{}.{:02}", minor / 100, minor % 100);
            engine.create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", &amount, EntryType::Credit),
                    descriptor("disbursement", &amount, EntryType::Debit),
                ],
                "prop allocation".into(),
                None,
            ).unwrap();
        }

        let first = engine.verify_integrity(&MockSignatureOracle);
        let second = engine.verify_integrity(&MockSignatureOracle);
        prop_assert_eq!(first, second);
    }
}

/// P7: the memoized BalanceIndex value always equals derivation from
/// CONFIRMED entries, both before and after clearing the cache.
#[test]
fn balance_index_agrees_with_fresh_derivation() {
    let config = LedgerConfig {
        required_signatures: 1,
        ..LedgerConfig::default()
    };
    let mut engine = LedgerEngine::new(config);

    for amount in ["10.00", "25.50", "4.49"] {
        let tx = engine
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                vec![
                    descriptor("funding", amount, EntryType::Credit),
                    descriptor("disbursement", amount, EntryType::Debit),
                ],
                "prop allocation".into(),
                None,
            )
            .unwrap();
        engine.submit_for_approval(&tx.id).unwrap();
        engine
            .add_signature(&tx.id, signature("alice"), &MockSignatureOracle)
            .unwrap();
        engine.execute(&tx.id, &MockBlockchainSink).unwrap();
    }

    let memoized = engine.get_account_balance("funding", "USD");
    engine.clear_balance_cache();
    let derived = engine.get_account_balance("funding", "USD");

    assert_eq!(memoized.balance, derived.balance);
}
