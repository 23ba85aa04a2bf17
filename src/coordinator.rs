//! Sequencing of balance-changing actions.
//!
//! Every deposit, withdrawal and transfer goes through two phases. [`submit`]
//! validates the input, asks for confirmation of large amounts and takes the
//! single action permit. It returns a [`ScheduledAction`] which settles after
//! a fixed delay. [`complete`] waits out that delay, posts the ledger entry
//! and hands the permit back. While an action is scheduled every other
//! submission is turned away, whatever its kind.
//!
//! [`submit`]: ActionCoordinator::submit
//! [`complete`]: ActionCoordinator::complete
use crate::config::BankConfig;
use crate::error::{BankError, BankResult, BusinessRuleError, Field, FieldErrors};
use crate::ledger::{EntryKind, LedgerEntry};
use crate::session::Session;
use crate::store::BankStore;
use crate::types::Amount;
use crate::validator;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DEPOSIT_REFERENCE: &str = "Cash Deposit";
const WITHDRAW_REFERENCE: &str = "Cash Withdrawal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Deposit { amount: String },
    Withdraw { amount: String },
    Transfer { to: String, amount: String },
}

impl Action {
    pub fn deposit(amount: impl Into<String>) -> Self {
        Action::Deposit {
            amount: amount.into(),
        }
    }
    pub fn withdraw(amount: impl Into<String>) -> Self {
        Action::Withdraw {
            amount: amount.into(),
        }
    }
    pub fn transfer(to: impl Into<String>, amount: impl Into<String>) -> Self {
        Action::Transfer {
            to: to.into(),
            amount: amount.into(),
        }
    }
    pub fn kind(&self) -> EntryKind {
        match self {
            Action::Deposit { .. } => EntryKind::Deposit,
            Action::Withdraw { .. } => EntryKind::Withdraw,
            Action::Transfer { .. } => EntryKind::Transfer,
        }
    }
}

/// Asked before a large amount is scheduled. Returning false drops the
/// action without side effects.
pub trait Confirm {
    fn confirm(&mut self, kind: EntryKind, amount: Amount) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(EntryKind, Amount) -> bool,
{
    fn confirm(&mut self, kind: EntryKind, amount: Amount) -> bool {
        self(kind, amount)
    }
}

/// Confirms everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _: EntryKind, _: Amount) -> bool {
        true
    }
}

/// Proof that the action permit is held. Dropping the token frees the
/// permit, so an abandoned [`ScheduledAction`] does not block later actions.
#[derive(Debug)]
pub struct PermitToken {
    slot: Arc<AtomicBool>,
}

impl Drop for PermitToken {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

/// Single slot, non-blocking: acquiring fails immediately while held.
#[derive(Debug, Default)]
pub struct ActionPermit {
    held: Arc<AtomicBool>,
}

impl ActionPermit {
    pub fn try_acquire(&self) -> Option<PermitToken> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(PermitToken {
            slot: Arc::clone(&self.held),
        })
    }
    pub fn release(&self, token: PermitToken) {
        drop(token);
    }
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// An accepted action waiting to settle. It holds the action permit until it
/// is passed to [`ActionCoordinator::complete`] or dropped. Dropping it
/// abandons the action without posting anything.
#[must_use = "a scheduled action holds the action permit until completed"]
#[derive(Debug)]
pub struct ScheduledAction {
    kind: EntryKind,
    amount: Amount,
    reference: String,
    counterparty: Option<String>,
    settles_at: Instant,
    token: PermitToken,
}

impl ScheduledAction {
    pub fn kind(&self) -> EntryKind {
        self.kind
    }
    pub fn amount(&self) -> Amount {
        self.amount
    }
    pub fn reference(&self) -> &str {
        &self.reference
    }
    pub fn settles_at(&self) -> Instant {
        self.settles_at
    }
}

#[derive(Debug)]
pub enum Submission {
    Scheduled(ScheduledAction),
    /// Confirmation of a large amount was refused
    Declined,
}

// validated form of an action
struct Plan {
    kind: EntryKind,
    amount: Amount,
    reference: String,
    counterparty: Option<String>,
}

pub struct ActionCoordinator {
    session: Session,
    permit: ActionPermit,
}

impl ActionCoordinator {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            permit: ActionPermit::default(),
        }
    }
    /// Open the store at `instance` and restore any persisted session
    pub fn open(instance: Arc<sled::Db>, config: BankConfig) -> BankResult<Self> {
        let session = Session::open(BankStore::new(instance), config)?;
        Ok(Self::new(session))
    }
    pub fn session(&self) -> &Session {
        &self.session
    }
    pub fn config(&self) -> &BankConfig {
        self.session.config()
    }
    pub fn in_flight(&self) -> bool {
        self.permit.is_held()
    }

    // Signup, login and logout all replace the signed-in user, so they wait
    // for an accepted action to settle against the session that accepted it.
    pub fn signup(&mut self, name: &str, mobile: &str, pin: &str) -> BankResult<()> {
        self.ensure_idle()?;
        self.session.signup(name, mobile, pin).map(|_| ())
    }
    pub fn login(&mut self, mobile: &str, pin: &str) -> BankResult<()> {
        self.ensure_idle()?;
        self.session.login(mobile, pin).map(|_| ())
    }
    pub fn logout(&mut self) -> BankResult<()> {
        self.ensure_idle()?;
        self.session.logout();
        Ok(())
    }
    pub fn change_name(&mut self, name: &str) -> BankResult<()> {
        self.session.change_name(name)
    }
    pub fn change_pin(&mut self, current: &str, new: &str) -> BankResult<()> {
        self.session.change_pin(current, new)
    }

    /// First phase: validate, confirm if large, take the permit.
    pub fn submit(
        &mut self,
        action: Action,
        confirm: &mut impl Confirm,
    ) -> BankResult<Submission> {
        if let Err(e) = self.ensure_idle() {
            debug!(kind = action.kind().label(), "rejected, another action is in flight");
            return Err(e);
        }

        let plan = self.validate(action)?;

        if plan.amount >= self.config().large_transaction_threshold
            && !confirm.confirm(plan.kind, plan.amount)
        {
            info!(kind = plan.kind.label(), amount = %plan.amount, "large action declined");
            return Ok(Submission::Declined);
        }

        let token = self.permit.try_acquire().ok_or(BankError::ActionInFlight)?;
        let settles_at = Instant::now() + self.settlement_delay(plan.kind);

        debug!(kind = plan.kind.label(), amount = %plan.amount, "action scheduled");
        Ok(Submission::Scheduled(ScheduledAction {
            kind: plan.kind,
            amount: plan.amount,
            reference: plan.reference,
            counterparty: plan.counterparty,
            settles_at,
            token,
        }))
    }

    /// Second phase: wait for settlement, post the entry, release the permit.
    ///
    /// The permit is released whether or not posting succeeds.
    pub fn complete(&mut self, scheduled: ScheduledAction) -> BankResult<LedgerEntry> {
        let ScheduledAction {
            kind,
            amount,
            reference,
            counterparty,
            settles_at,
            token,
        } = scheduled;

        let remaining = settles_at.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }

        let result = match counterparty {
            Some(to) => self
                .session
                .ensure_not_self(&to)
                .and_then(|_| self.session.post(kind, amount, reference)),
            None => self.session.post(kind, amount, reference),
        };
        self.permit.release(token);

        result
    }

    /// Run both phases back to back. `None` means the action was declined.
    pub fn execute(
        &mut self,
        action: Action,
        confirm: &mut impl Confirm,
    ) -> BankResult<Option<LedgerEntry>> {
        match self.submit(action, confirm)? {
            Submission::Scheduled(scheduled) => self.complete(scheduled).map(Some),
            Submission::Declined => Ok(None),
        }
    }

    fn ensure_idle(&self) -> BankResult<()> {
        if self.permit.is_held() {
            return Err(BankError::ActionInFlight);
        }
        Ok(())
    }

    fn settlement_delay(&self, kind: EntryKind) -> Duration {
        match kind {
            EntryKind::Transfer => self.config().transfer_settlement_delay,
            _ => self.config().cash_settlement_delay,
        }
    }

    fn validate(&self, action: Action) -> BankResult<Plan> {
        let available = self.session.balance()?;
        let config = self.session.config();
        let mut errors = FieldErrors::new();

        let plan = match action {
            Action::Deposit { amount } => errors
                .check(Field::Amount, validator::validate_amount(&amount, config))
                .map(|amount| Plan {
                    kind: EntryKind::Deposit,
                    amount,
                    reference: DEPOSIT_REFERENCE.to_string(),
                    counterparty: None,
                }),
            Action::Withdraw { amount } => errors
                .check(
                    Field::Amount,
                    validator::validate_debit(&amount, config, available),
                )
                .map(|amount| Plan {
                    kind: EntryKind::Withdraw,
                    amount,
                    reference: WITHDRAW_REFERENCE.to_string(),
                    counterparty: None,
                }),
            Action::Transfer { to, amount } => {
                let to = match errors.check(Field::Mobile, validator::validate_phone(&to)) {
                    Some(to) if self.session.ensure_not_self(&to).is_err() => {
                        errors.push(Field::Mobile, BusinessRuleError::SelfTransfer);
                        None
                    }
                    to => to,
                };
                let amount = errors.check(
                    Field::Amount,
                    validator::validate_debit(&amount, config, available),
                );

                match (to, amount) {
                    (Some(to), Some(amount)) => Some(Plan {
                        kind: EntryKind::Transfer,
                        amount,
                        reference: format!("To: {}", to),
                        counterparty: Some(to),
                    }),
                    _ => None,
                }
            }
        };

        match plan {
            Some(plan) if errors.is_empty() => Ok(plan),
            _ => {
                debug!(%errors, "action rejected");
                Err(errors.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit_is_single_slot() {
        let permit = ActionPermit::default();

        let token = permit.try_acquire().unwrap();
        assert!(permit.is_held());
        assert!(permit.try_acquire().is_none());

        permit.release(token);
        assert!(!permit.is_held());
        assert!(permit.try_acquire().is_some());
    }

    #[test]
    fn dropped_token_frees_permit() {
        let permit = ActionPermit::default();

        let token = permit.try_acquire().unwrap();
        drop(token);

        assert!(!permit.is_held());
        let _again = permit.try_acquire().unwrap();
        assert!(permit.is_held());
    }

    #[test]
    fn closures_confirm() {
        let mut seen = None;
        let mut confirm = |kind: EntryKind, amount: Amount| {
            seen = Some((kind, amount));
            amount < Amount::from_major(50_000)
        };

        assert!(confirm.confirm(EntryKind::Withdraw, Amount::from_major(20_000)));
        assert!(!confirm.confirm(EntryKind::Transfer, Amount::from_major(60_000)));
        assert_eq!(seen, Some((EntryKind::Transfer, Amount::from_major(60_000))));
        assert!(AutoConfirm.confirm(EntryKind::Deposit, Amount::from_major(1)));
    }

    #[test]
    fn actions_map_to_entry_kinds() {
        assert_eq!(Action::deposit("1").kind(), EntryKind::Deposit);
        assert_eq!(Action::withdraw("1").kind(), EntryKind::Withdraw);
        assert_eq!(Action::transfer("9876543211", "1").kind(), EntryKind::Transfer);
    }
}
