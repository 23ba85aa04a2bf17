//! Property-based tests for the ledger and the action coordinator
//!
//! These use proptest to check the balance invariants over arbitrary
//! sequences of postings: every accepted entry moves the balance by exactly
//! its amount, debits never overdraw, and the running balances recorded in the
//! history always chain back to the current balance.

use proptest::prelude::*;
use std::sync::Arc;
use toy_bank::{
    Action, ActionCoordinator, AutoConfirm, BankConfig, BankError,
    error::{BusinessRuleError, Field, FieldError},
    ledger::{EntryKind, Ledger},
    types::Amount,
};

// PROPERTY TEST STRATEGIES

/// Strategy to generate random EntryKind values
fn kind_strategy() -> impl Strategy<Value = EntryKind> {
    (0u8..=2).prop_map(|i| match i {
        0 => EntryKind::Deposit,
        1 => EntryKind::Withdraw,
        _ => EntryKind::Transfer,
    })
}

/// Strategy to generate a non-zero amount up to 100,000.00
fn amount_strategy() -> impl Strategy<Value = Amount> {
    (1u64..=10_000_000).prop_map(Amount::from_minor)
}

/// Strategy to generate a sequence of postings, some of which will overdraw
fn posting_sequence_strategy() -> impl Strategy<Value = Vec<(EntryKind, Amount)>> {
    prop::collection::vec((kind_strategy(), amount_strategy()), 0..40)
}

/// Render an amount the way a user would type it
fn typed(amount: Amount) -> String {
    amount.to_plain_string()
}

fn reference(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Deposit => "Cash Deposit",
        EntryKind::Withdraw => "Cash Withdrawal",
        EntryKind::Transfer => "To: 9876543211",
    }
}

// LEDGER PROPERTY TESTS

proptest! {
    /// Property: the history always chains to the balance
    ///
    /// Whatever mix of postings is attempted, rejected ones leave no trace and
    /// accepted ones keep the newest entry's running balance equal to the
    /// ledger balance.
    #[test]
    fn prop_history_chains_to_balance(postings in posting_sequence_strategy()) {
        let mut ledger = Ledger::new();
        let mut accepted = 0;

        for (kind, amount) in postings {
            let before = ledger.balance();
            match ledger.apply(kind, amount, reference(kind)) {
                Ok(entry) => {
                    accepted += 1;
                    prop_assert_eq!(entry.balance_after(), ledger.balance());
                }
                Err(_) => prop_assert_eq!(before, ledger.balance()),
            }
        }

        prop_assert_eq!(ledger.len(), accepted);
        prop_assert!(ledger.verify_chain());
        if let Some(latest) = ledger.latest() {
            prop_assert_eq!(latest.balance_after(), ledger.balance());
        }
    }

    /// Property: a deposit moves the balance up by exactly its amount
    #[test]
    fn prop_deposit_adds_exactly(opening in amount_strategy(), amount in amount_strategy()) {
        let mut ledger = Ledger::new();
        ledger.apply(EntryKind::Deposit, opening, "Cash Deposit").unwrap();

        let entry = ledger.apply(EntryKind::Deposit, amount, "Cash Deposit").unwrap();

        prop_assert_eq!(entry.amount(), amount);
        prop_assert_eq!(
            ledger.balance().minor_units(),
            opening.minor_units() + amount.minor_units()
        );
    }

    /// Property: debits above the balance are rejected, at or below are applied
    ///
    /// The balance can reach exactly zero but never go below it.
    #[test]
    fn prop_debit_never_overdraws(
        opening in amount_strategy(),
        amount in amount_strategy(),
        transfer in any::<bool>(),
    ) {
        let kind = if transfer { EntryKind::Transfer } else { EntryKind::Withdraw };
        let mut ledger = Ledger::new();
        ledger.apply(EntryKind::Deposit, opening, "Cash Deposit").unwrap();

        let result = ledger.apply(kind, amount, reference(kind));

        if amount > opening {
            prop_assert_eq!(
                result.unwrap_err(),
                FieldError::Rule(BusinessRuleError::InsufficientBalance { available: opening })
            );
            prop_assert_eq!(ledger.balance(), opening);
            prop_assert_eq!(ledger.len(), 1);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(
                ledger.balance().minor_units(),
                opening.minor_units() - amount.minor_units()
            );
        }
    }
}

// COORDINATOR PROPERTY TESTS

/// Open a signed up bank over a temporary sled database
fn fresh_bank() -> anyhow::Result<ActionCoordinator> {
    let db = Arc::new(sled::Config::new().temporary(true).open()?);
    let mut bank = ActionCoordinator::open(db, BankConfig::instant())?;
    bank.signup("Asha Rao", "9876543210", "1234")?;
    Ok(bank)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: a typed deposit credits exactly the typed amount
    #[test]
    fn prop_typed_deposit_credits_exactly(amount in amount_strategy()) {
        let mut bank = fresh_bank().unwrap();

        let entry = bank
            .execute(Action::deposit(typed(amount)), &mut AutoConfirm)
            .unwrap()
            .unwrap();

        prop_assert_eq!(entry.amount(), amount);
        prop_assert_eq!(bank.session().balance().unwrap(), amount);
    }

    /// Property: a typed overdraft is reported against the amount field and
    /// changes nothing
    #[test]
    fn prop_typed_overdraft_is_rejected(
        opening in amount_strategy(),
        extra in amount_strategy(),
        transfer in any::<bool>(),
    ) {
        let mut bank = fresh_bank().unwrap();
        bank.execute(Action::deposit(typed(opening)), &mut AutoConfirm).unwrap();

        let too_much = typed(Amount::from_minor(opening.minor_units() + extra.minor_units()));
        let action = if transfer {
            Action::transfer("9876543211", too_much)
        } else {
            Action::withdraw(too_much)
        };
        let err = bank.execute(action, &mut AutoConfirm).unwrap_err();

        prop_assert!(matches!(err, BankError::Fields(_)));
        prop_assert_eq!(
            err.field(Field::Amount),
            Some(FieldError::Rule(BusinessRuleError::InsufficientBalance { available: opening }))
        );
        prop_assert_eq!(bank.session().balance().unwrap(), opening);
        prop_assert_eq!(bank.session().ledger().unwrap().len(), 1);
        prop_assert!(!bank.in_flight());
    }
}
