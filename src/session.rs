//! Session and account management.
//!
//! A [`Session`] is either anonymous or holds the signed-in user together with
//! their account and ledger. Every change it makes is written to the
//! [`BankStore`] before the in-memory model is updated, so a failed write
//! leaves the session as it was.
use crate::account::{Account, User};
use crate::config::BankConfig;
use crate::error::{AuthError, BankResult, BusinessRuleError, Field, FieldErrors};
use crate::ledger::{EntryKind, Ledger, LedgerEntry};
use crate::store::BankStore;
use crate::types::{Amount, TimeStamp};
use crate::validator;
use chrono::Utc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Active {
    user: User,
    account: Account,
    previous_login: Option<TimeStamp<Utc>>,
}

pub struct Session {
    store: BankStore,
    config: BankConfig,
    active: Option<Active>, // None while anonymous
}

impl Session {
    /// Open a session over `store`, restoring a previously persisted user.
    pub fn open(store: BankStore, config: BankConfig) -> BankResult<Self> {
        let mut session = Self {
            store,
            config,
            active: None,
        };

        if let Some(user) = session.store.load_user() {
            let account = session.load_account()?;
            let previous_login = session.store.last_login();
            info!(user = user.id(), "restored session");
            session.active = Some(Active {
                user,
                account,
                previous_login,
            });
        }

        Ok(session)
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }
    pub fn is_authenticated(&self) -> bool {
        self.active.is_some()
    }
    pub fn user(&self) -> Option<&User> {
        self.active.as_ref().map(|a| &a.user)
    }
    pub fn account(&self) -> Option<&Account> {
        self.active.as_ref().map(|a| &a.account)
    }
    /// When the user last logged in before this session began
    pub fn previous_login(&self) -> Option<&TimeStamp<Utc>> {
        self.active.as_ref().and_then(|a| a.previous_login.as_ref())
    }
    pub fn ledger(&self) -> BankResult<&Ledger> {
        Ok(self.active()?.account.ledger())
    }
    pub fn balance(&self) -> BankResult<Amount> {
        Ok(self.ledger()?.balance())
    }

    /// Create the user and a fresh account, replacing whatever the store held.
    ///
    /// All three fields are validated and every failure is reported.
    pub fn signup(&mut self, name: &str, mobile: &str, pin: &str) -> BankResult<&User> {
        let mut errors = FieldErrors::new();
        let name = errors.check(Field::Name, validator::validate_name(name, &self.config));
        let mobile = errors.check(Field::Mobile, validator::validate_phone(mobile));
        let pin = errors.check(Field::Pin, validator::validate_pin(pin));

        let (Some(name), Some(mobile), Some(pin)) = (name, mobile, pin) else {
            debug!(%errors, "signup rejected");
            return Err(errors.into());
        };

        if self.store.has_user()? {
            warn!("signup is replacing the stored user, account and ledger");
        }

        let user = User::new(validator::escape_html(&name), mobile, &pin)?;
        let account = Account::open();
        let now = TimeStamp::new();

        self.store.save_all(&user, &account)?;
        self.store.set_last_login(&now)?;

        info!(user = user.id(), "signed up");
        let active = self.active.insert(Active {
            user,
            account,
            previous_login: None,
        });
        Ok(&active.user)
    }

    pub fn login(&mut self, mobile: &str, pin: &str) -> BankResult<&User> {
        let mobile = validator::normalize_phone(mobile);
        let pin = pin.trim();

        let user = self.store.load_user().ok_or(AuthError::NoAccount)?;
        if user.mobile() != mobile {
            debug!("login rejected, mobile mismatch");
            return Err(AuthError::MobileMismatch.into());
        }
        if !user.verify_pin(pin) {
            debug!("login rejected, wrong pin");
            return Err(AuthError::WrongPin.into());
        }

        let account = self.load_account()?;
        let previous_login = self.store.last_login();
        self.store.set_last_login(&TimeStamp::new())?;

        info!(user = user.id(), "logged in");
        let active = self.active.insert(Active {
            user,
            account,
            previous_login,
        });
        Ok(&active.user)
    }

    /// Forget the signed-in user. Stored data is left alone.
    pub fn logout(&mut self) {
        if let Some(active) = self.active.take() {
            info!(user = active.user.id(), "logged out");
        }
    }

    pub fn change_name(&mut self, name: &str) -> BankResult<()> {
        let name = validator::validate_name(name, &self.config)?;
        let active = self.active()?;

        let mut user = active.user.clone();
        user.set_name(validator::escape_html(&name));
        self.store.save_user(&user)?;

        self.active_mut()?.user = user;
        Ok(())
    }

    pub fn change_pin(&mut self, current: &str, new: &str) -> BankResult<()> {
        let active = self.active()?;
        if !active.user.verify_pin(current.trim()) {
            return Err(AuthError::WrongPin.into());
        }
        let new = validator::validate_pin(new)?;

        let mut user = active.user.clone();
        user.set_pin(&new);
        self.store.save_user(&user)?;

        info!(user = user.id(), "pin changed");
        self.active_mut()?.user = user;
        Ok(())
    }

    /// Reject a transfer destination that is the signed-in user's own number
    pub fn ensure_not_self(&self, mobile: &str) -> BankResult<()> {
        if self.active()?.user.mobile() == mobile {
            return Err(BusinessRuleError::SelfTransfer.into());
        }
        Ok(())
    }

    /// Apply a validated amount to the ledger and persist the result.
    pub fn post(
        &mut self,
        kind: EntryKind,
        amount: Amount,
        reference: impl Into<String>,
    ) -> BankResult<LedgerEntry> {
        let mut account = self.active()?.account.clone();
        let entry = account
            .ledger_mut()
            .apply(kind, amount, reference)?;
        self.store.save_account(&account)?;

        info!(
            kind = kind.label(),
            amount = %amount,
            balance = %entry.balance_after(),
            "ledger entry posted"
        );
        self.active_mut()?.account = account;
        Ok(entry)
    }

    fn active(&self) -> BankResult<&Active> {
        Ok(self.active.as_ref().ok_or(AuthError::NotAuthenticated)?)
    }

    fn active_mut(&mut self) -> BankResult<&mut Active> {
        Ok(self.active.as_mut().ok_or(AuthError::NotAuthenticated)?)
    }

    fn load_account(&self) -> BankResult<Account> {
        let mut account = self.store.load_account()?;
        if account.ensure_account_number() {
            info!("assigned an account number to existing account");
            self.store.save_account(&account)?;
        }
        Ok(account)
    }
}
