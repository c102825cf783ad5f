//! Derived `(account, currency) -> signed amount`, updated on execution
//! (spec.md §4.6).

use std::collections::HashMap;

use chrono::Utc;

use crate::entry_store::EntryStore;
use crate::money::Money;
use crate::types::{Balance, Entry, EntryStatus, EntryType};

fn key(account_id: &str, currency: &str) -> String {
    format!("{account_id}:{currency}")
}

#[derive(Debug, Default)]
pub struct BalanceIndex {
    balances: HashMap<String, Balance>,
}

impl BalanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every child entry of an EXECUTED transaction exactly once:
    /// `+amount` for CREDIT, `-amount` otherwise (mirrors EntryType's own
    /// balance_sign, spec.md §4.6).
    pub fn apply_execution(&mut self, entries: &[&Entry]) {
        for entry in entries {
            let sign = entry.entry_type.balance_sign();
            let delta = if sign >= 0 {
                entry.amount
            } else {
                Money::from_minor_units(-entry.amount.minor_units())
            };

            let k = key(&entry.account.id, &entry.currency);
            let current = self
                .balances
                .get(&k)
                .map(|b| b.balance)
                .unwrap_or(Money::ZERO);
            let updated = current.saturating_add(delta);

            tracing::debug!(account = %entry.account.id, currency = %entry.currency, balance = %updated, "balance updated on execution");

            self.balances.insert(
                k,
                Balance {
                    account_id: entry.account.id.clone(),
                    balance: updated,
                    currency: entry.currency.clone(),
                    as_of: Utc::now(),
                    verified: false,
                },
            );
        }
    }

    /// If present, returns the memoized balance. Otherwise derives it by
    /// scanning CONFIRMED entries in `store` for `(account_id, currency)`,
    /// memoizes it, and returns the freshly-derived (unverified) balance.
    pub fn get_account_balance(
        &mut self,
        store: &EntryStore,
        account_id: &str,
        currency: &str,
    ) -> Balance {
        let k = key(account_id, currency);
        if let Some(existing) = self.balances.get(&k) {
            return existing.clone();
        }

        let mut total = Money::ZERO;
        for entry in store.entries_in_order() {
            if entry.account.id != account_id || entry.currency != currency {
                continue;
            }
            if !matches!(entry.status, EntryStatus::Confirmed) {
                continue;
            }
            let delta = match entry.entry_type {
                EntryType::Credit => entry.amount,
                _ => Money::from_minor_units(-entry.amount.minor_units()),
            };
            total = total.saturating_add(delta);
        }

        let balance = Balance {
            account_id: account_id.to_string(),
            balance: total,
            currency: currency.to_string(),
            as_of: Utc::now(),
            verified: false,
        };
        self.balances.insert(k, balance.clone());
        balance
    }

    pub fn clear(&mut self) {
        self.balances.clear();
    }
}
