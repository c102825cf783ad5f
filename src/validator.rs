//! Schema and business-rule checks over entries and transactions
//! (spec.md §4.3).
//!
//! Grounded on the teacher's `TradeDetails::validate_and_finalise` /
//! `validate_dates` check-then-return shape, generalized from a single
//! pass/fail `Result` into the accumulating `{valid, errors, warnings}`
//! shape this spec requires.

use chrono::{NaiveTime, Timelike, Utc};

use crate::config::LedgerConfig;
use crate::types::{Entry, Transaction};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge_prefixed(&mut self, prefix: &str, other: ValidationResult) {
        self.errors
            .extend(other.errors.into_iter().map(|e| format!("{prefix}: {e}")));
        self.warnings
            .extend(other.warnings.into_iter().map(|w| format!("{prefix}: {w}")));
    }
}

fn is_uuidv4(id: &str) -> bool {
    match uuid::Uuid::parse_str(id) {
        Ok(u) => u.get_version_num() == 4,
        Err(_) => false,
    }
}

fn is_currency_code(currency: &str) -> bool {
    currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase())
}

fn is_hex64(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// Structural + business checks on a single entry. Called both directly and
/// as part of `validate_transaction`, where each error/warning is prefixed
/// with the entry's id.
pub fn validate_entry(entry: &Entry, config: &LedgerConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !is_uuidv4(&entry.id) {
        result.errors.push(format!("id '{}' is not a valid UUIDv4", entry.id));
    }
    if !is_currency_code(&entry.currency) {
        result
            .errors
            .push(format!("currency '{}' does not match ^[A-Z]{{3}}$", entry.currency));
    }
    if !is_hex64(&entry.hash) {
        result
            .errors
            .push(format!("hash '{}' does not match ^[a-f0-9]{{64}}$", entry.hash));
    }
    if entry.description.chars().count() > 1000 {
        result.errors.push("description exceeds 1000 characters".into());
    }

    if entry.amount.minor_units() <= 0 {
        result.errors.push("entry amount must be > 0".into());
    }
    if entry.amount > config.max_transaction_amount {
        result.errors.push(format!(
            "entry amount {} exceeds configured max {}",
            entry.amount, config.max_transaction_amount
        ));
    }
    if !config.supports_currency(&entry.currency) {
        result
            .warnings
            .push(format!("currency '{}' is not in the supported set", entry.currency));
    }

    result
}

/// Validates a transaction and all of its entries together. Entry-level
/// errors/warnings are prefixed with the offending entry's id (spec.md
/// §4.3).
pub fn validate_transaction(
    tx: &Transaction,
    entries: &[&Entry],
    config: &LedgerConfig,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    if entries.len() < 2 {
        result
            .errors
            .push(format!("transaction must have at least 2 entries, got {}", entries.len()));
    }
    if !(1..=10).contains(&tx.required_signatures) {
        result.errors.push(format!(
            "requiredSignatures {} must be in [1, 10]",
            tx.required_signatures
        ));
    }
    if tx.description.chars().count() > 2000 {
        result.errors.push("description exceeds 2000 characters".into());
    }

    for entry in entries {
        result.merge_prefixed(&entry.id, validate_entry(entry, config));
    }

    if let Some(first) = entries.first() {
        let first_currency = &first.currency;
        if entries.iter().any(|e| &e.currency != first_currency) {
            result.errors.push(format!(
                "entries do not share a single currency (expected '{first_currency}')"
            ));
        }
        if &tx.currency != first_currency {
            result.errors.push(format!(
                "transaction currency '{}' does not match entry currency '{first_currency}'",
                tx.currency
            ));
        }
    }

    let net: i64 = entries
        .iter()
        .map(|e| e.entry_type.balance_sign() * e.amount.minor_units())
        .sum();
    if net.unsigned_abs() as i64 > crate::money::BALANCE_TOLERANCE.minor_units() {
        result.errors.push(format!(
            "transaction does not balance: net = {}",
            crate::money::Money::from_minor_units(net)
        ));
    }

    let credit_total: i64 = entries
        .iter()
        .filter(|e| matches!(e.entry_type, crate::types::EntryType::Credit))
        .map(|e| e.amount.minor_units())
        .sum();
    if tx.total_amount.minor_units() != credit_total {
        result.errors.push(format!(
            "totalAmount {} does not equal sum of CREDIT entries {}",
            tx.total_amount,
            crate::money::Money::from_minor_units(credit_total)
        ));
    }

    if tx.received_signatures.len() as u8 > tx.required_signatures {
        result.warnings.push(format!(
            "receivedSignatures ({}) exceeds requiredSignatures ({})",
            tx.received_signatures.len(),
            tx.required_signatures
        ));
    }

    result
}

/// Policy overlay (spec.md §4.3): allowed transaction types, max amount,
/// business-hour window (inclusive, warning-only), beneficiary blocklist.
#[derive(Debug, Clone)]
pub struct PolicyRules {
    pub allowed_transaction_types: Vec<crate::types::TransactionType>,
    pub max_amount: crate::money::Money,
    pub business_hours_start: NaiveTime,
    pub business_hours_end: NaiveTime,
    pub blocked_beneficiary_ids: Vec<String>,
}

pub fn validate_against_policies(
    tx: &Transaction,
    entries: &[&Entry],
    policy: &PolicyRules,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !policy
        .allowed_transaction_types
        .iter()
        .any(|allowed| *allowed == tx.transaction_type)
    {
        result.errors.push(format!(
            "transaction type {:?} is not permitted by policy",
            tx.transaction_type
        ));
    }

    if tx.total_amount > policy.max_amount {
        result.errors.push(format!(
            "totalAmount {} exceeds policy max {}",
            tx.total_amount, policy.max_amount
        ));
    }

    let time_of_day = tx.timestamp.time();
    let within_hours = if policy.business_hours_start <= policy.business_hours_end {
        time_of_day >= policy.business_hours_start && time_of_day <= policy.business_hours_end
    } else {
        // Window wraps past midnight.
        time_of_day >= policy.business_hours_start || time_of_day <= policy.business_hours_end
    };
    if !within_hours {
        result.warnings.push(format!(
            "transaction timestamp {:02}:{:02} falls outside business hours [{}, {}]",
            time_of_day.hour(),
            time_of_day.minute(),
            policy.business_hours_start,
            policy.business_hours_end
        ));
    }

    for entry in entries {
        if policy
            .blocked_beneficiary_ids
            .iter()
            .any(|blocked| blocked == &entry.account.owner.id)
        {
            result.errors.push(format!(
                "beneficiary '{}' is blocklisted by policy",
                entry.account.owner.id
            ));
        }
    }

    result
}
