//! Limits and delays for validation and action settlement
use crate::types::Amount;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    pub name_min_len: usize,
    pub name_max_len: usize,
    pub amount_max: Amount,
    /// Amounts at or above this require confirmation before they settle
    pub large_transaction_threshold: Amount,
    pub cash_settlement_delay: Duration,
    pub transfer_settlement_delay: Duration,
    pub statement_limit: usize,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            name_min_len: 2,
            name_max_len: 50,
            amount_max: Amount::from_major(10_000_000),
            large_transaction_threshold: Amount::from_major(10_000),
            cash_settlement_delay: Duration::from_millis(600),
            transfer_settlement_delay: Duration::from_millis(800),
            statement_limit: 20,
        }
    }
}

impl BankConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name_len(mut self, min: usize, max: usize) -> Self {
        self.name_min_len = min;
        self.name_max_len = max;
        self
    }
    pub fn set_amount_max(mut self, max: Amount) -> Self {
        self.amount_max = max;
        self
    }
    pub fn set_large_transaction_threshold(mut self, threshold: Amount) -> Self {
        self.large_transaction_threshold = threshold;
        self
    }
    /// Use the same delay for every action kind
    pub fn set_settlement_delay(mut self, delay: Duration) -> Self {
        self.cash_settlement_delay = delay;
        self.transfer_settlement_delay = delay;
        self
    }
    pub fn set_statement_limit(mut self, limit: usize) -> Self {
        self.statement_limit = limit;
        self
    }
    /// No settlement delay; used by tests and scripted runs
    pub fn instant() -> Self {
        Self::default().set_settlement_delay(Duration::ZERO)
    }
}
