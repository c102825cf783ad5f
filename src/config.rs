//! Configuration surface consumed by the core (spec.md §6.5).
//!
//! Loading this from a file/env is an integration concern; this module only
//! defines the shape and sane defaults.

use crate::money::Money;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub required_signatures: u8,
    pub supported_currencies: Vec<String>,
    pub max_transaction_amount: Money,
    pub default_currency: String,
    pub enable_multi_signature: bool,
    pub enable_zk_proofs: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            required_signatures: 2,
            supported_currencies: vec!["USD".into(), "EUR".into(), "GBP".into()],
            max_transaction_amount: Money::from_minor_units(100_000_000_00),
            default_currency: "USD".into(),
            enable_multi_signature: true,
            enable_zk_proofs: false,
        }
    }
}

impl LedgerConfig {
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.supported_currencies.iter().any(|c| c == currency)
    }
}
