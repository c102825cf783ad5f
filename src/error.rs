//! Error kinds surfaced by the ledger core.
//!
//! Follows the source's propagation policy: validation errors are always
//! surfaced with the full list, `SinkFailure` is recorded but never retried
//! by the core, and integrity violations are reported, never repaired.

use crate::money::Money;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("entries do not balance: credit - debit = {net}")]
    UnbalancedEntries { net: Money },

    #[error("entries do not share a single currency: {first} vs {other}")]
    CurrencyMismatch { first: String, other: String },

    #[error("validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("signer '{signer}' already signed transaction '{transaction_id}'")]
    DuplicateSigner {
        transaction_id: String,
        signer: String,
    },

    #[error("illegal entry transition for '{entry_id}': {from} -> {to}")]
    IllegalEntryTransition {
        entry_id: String,
        from: String,
        to: String,
    },

    #[error("illegal transaction transition for '{transaction_id}': {from} -> {to}")]
    IllegalTransactionTransition {
        transaction_id: String,
        from: String,
        to: String,
    },

    #[error("amount out of range: {message}")]
    AmountOutOfRange { message: String },

    #[error("blockchain sink failed for transaction '{transaction_id}': {message}")]
    SinkFailure {
        transaction_id: String,
        message: String,
    },

    #[error("integrity violations found: {violations:?}")]
    IntegrityViolation { violations: Vec<String> },
}

impl LedgerError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
