//! Balance and append-only transaction ledger
use crate::error::{BusinessRuleError, FieldError, ValidationError};
use crate::types::{Amount, TimeStamp};
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    #[n(0)]
    Deposit,
    #[n(1)]
    Withdraw,
    #[n(2)]
    Transfer,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "Deposit",
            EntryKind::Withdraw => "Withdraw",
            EntryKind::Transfer => "Transfer",
        }
    }
    pub fn is_debit(&self) -> bool {
        !matches!(self, EntryKind::Deposit)
    }
}

/// One settled transaction. Entries are never edited once written.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    #[n(0)]
    timestamp: TimeStamp<Utc>,
    #[n(1)]
    kind: EntryKind,
    #[n(2)]
    reference: String, // counterparty or cash descriptor
    #[n(3)]
    amount: Amount,
    #[n(4)]
    balance_after: Amount,
}

impl LedgerEntry {
    pub fn timestamp(&self) -> &TimeStamp<Utc> {
        &self.timestamp
    }
    pub fn kind(&self) -> EntryKind {
        self.kind
    }
    pub fn reference(&self) -> &str {
        &self.reference
    }
    pub fn amount(&self) -> Amount {
        self.amount
    }
    pub fn balance_after(&self) -> Amount {
        self.balance_after
    }
    /// Case-insensitive match on kind, reference or the plain amount text
    pub fn matches(&self, query: &str) -> bool {
        let q = query.to_lowercase();

        self.kind.label().to_lowercase().contains(&q)
            || self.reference.to_lowercase().contains(&q)
            || self.amount.to_plain_string().contains(&q)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    balance: Amount,
    entries: Vec<LedgerEntry>, // most recent first
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }
    /// Rebuild from persisted parts. No chain check is made here; see
    /// [`Ledger::verify_chain`].
    pub fn from_parts(balance: Amount, entries: Vec<LedgerEntry>) -> Self {
        Self { balance, entries }
    }
    pub fn balance(&self) -> Amount {
        self.balance
    }
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
    pub fn latest(&self) -> Option<&LedgerEntry> {
        self.entries.first()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a validated amount and prepend the resulting entry.
    ///
    /// Debits are re-checked against the balance; on any error the ledger is
    /// left as it was.
    pub fn apply(
        &mut self,
        kind: EntryKind,
        amount: Amount,
        reference: impl Into<String>,
    ) -> Result<LedgerEntry, FieldError> {
        debug_assert!(!amount.is_zero(), "ledger amounts are validated upstream");

        let balance_after = if kind.is_debit() {
            self.balance
                .checked_sub(amount)
                .ok_or(BusinessRuleError::InsufficientBalance {
                    available: self.balance,
                })?
        } else {
            self.balance
                .checked_add(amount)
                .ok_or(ValidationError::TooLarge {
                    max: Amount::from_minor(u64::MAX - self.balance.minor_units()),
                })?
        };

        let entry = LedgerEntry {
            timestamp: TimeStamp::new(),
            kind,
            reference: reference.into(),
            amount,
            balance_after,
        };
        self.balance = balance_after;
        self.entries.insert(0, entry.clone());

        Ok(entry)
    }

    /// Check that each entry's balance follows from the one before it and
    /// that the newest entry agrees with the balance.
    pub fn verify_chain(&self) -> bool {
        if let Some(latest) = self.latest() {
            if latest.balance_after != self.balance {
                return false;
            }
        }

        self.entries.windows(2).all(|pair| {
            let (newer, older) = (&pair[0], &pair[1]);
            let expected = if newer.kind.is_debit() {
                older.balance_after.checked_sub(newer.amount)
            } else {
                older.balance_after.checked_add(newer.amount)
            };
            expected == Some(newer.balance_after)
        })
    }
}
