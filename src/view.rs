//! Read-only projections for a presentation layer
use crate::error::{AuthError, BankResult};
use crate::ledger::{Ledger, LedgerEntry};
use crate::session::Session;
use crate::types::{Amount, TimeStamp};
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreditBand {
    Poor,
    Fair,
    Good,
    Excellent,
}

/// Decorative score in 300..=850, a step function of the balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditScore {
    pub score: u32,
    pub band: CreditBand,
}

impl CreditScore {
    pub const MIN: u32 = 300;
    pub const MAX: u32 = 850;

    pub fn from_balance(balance: Amount) -> Self {
        let score = if balance.is_zero() {
            Self::MIN
        } else {
            // flooring the balance first gives the same steps as flooring each quotient
            let b = balance.major_units();
            let stepped = match b {
                0..1_000 => 350 + b / 10,
                1_000..5_000 => 450 + (b - 1_000) / 40,
                5_000..10_000 => 550 + (b - 5_000) / 50,
                10_000..25_000 => 650 + (b - 10_000) / 150,
                25_000..50_000 => 750 + (b - 25_000) / 500,
                _ => (800 + (b - 50_000) / 2_000).min(Self::MAX as u64),
            };
            stepped as u32
        };

        let band = match score {
            750.. => CreditBand::Excellent,
            650.. => CreditBand::Good,
            500.. => CreditBand::Fair,
            _ => CreditBand::Poor,
        };

        Self { score, band }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile<'a> {
    pub name: &'a str,
    pub mobile: &'a str,
    pub account_number: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Dashboard<'a> {
    pub balance: Amount,
    pub credit_score: CreditScore,
    pub statement: Vec<&'a LedgerEntry>,
    pub profile: Profile<'a>,
    pub previous_login: Option<&'a TimeStamp<Utc>>,
}

/// The newest `limit` entries, keeping only those matching `query` when it is
/// not blank.
pub fn statement<'a>(ledger: &'a Ledger, query: &str, limit: usize) -> Vec<&'a LedgerEntry> {
    let query = query.trim();

    ledger
        .entries()
        .iter()
        .filter(|entry| query.is_empty() || entry.matches(query))
        .take(limit)
        .collect()
}

impl Session {
    /// Everything a refreshed view shows, with the statement filtered by
    /// `query`.
    pub fn dashboard(&self, query: &str) -> BankResult<Dashboard<'_>> {
        let ledger = self.ledger()?;
        let (Some(user), Some(account)) = (self.user(), self.account()) else {
            return Err(AuthError::NotAuthenticated.into());
        };

        Ok(Dashboard {
            balance: ledger.balance(),
            credit_score: CreditScore::from_balance(ledger.balance()),
            statement: statement(ledger, query, self.config().statement_limit),
            profile: Profile {
                name: user.name(),
                mobile: user.mobile(),
                account_number: account.account_number(),
            },
            previous_login: self.previous_login(),
        })
    }
}
