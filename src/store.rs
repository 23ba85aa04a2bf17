//! Key-value persistence over sled.
//!
//! Four independent keys hold the user, the account, the ledger and the last
//! login time. Writes to different keys are not atomic with each other, so
//! loading tolerates missing and corrupt records: reads fall back to a
//! default, and a corrupt ledger or balance is reset and written back.
use crate::account::{Account, User};
use crate::ledger::{Ledger, LedgerEntry};
use crate::types::{Amount, TimeStamp};
use chrono::Utc;
use minicbor::data::Type;
use minicbor::{Decode, Encode};
use sled::Batch;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod keys {
    pub const USER: &str = "user";
    pub const ACCOUNT: &str = "account";
    pub const LEDGER: &str = "ledger";
    pub const LAST_LOGIN: &str = "last_login";
}

#[derive(Clone)]
pub struct BankStore {
    instance: Arc<sled::Db>,
}

// Account record as written to the store. The ledger lives under its own key.
#[derive(minicbor::Encode, minicbor::Decode, Debug)]
struct StoredAccount {
    #[n(0)]
    name: String,
    #[n(1)]
    balance: StoredBalance,
    #[n(2)]
    account_number: Option<String>,
}

// A balance that decodes to None instead of failing when the stored value is
// not an unsigned integer.
#[derive(Debug, Clone, Copy)]
struct StoredBalance(Option<Amount>);

impl BankStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Read `key`, falling back to `default` when it is missing or cannot be
    /// decoded.
    pub fn get<T>(&self, key: &str, default: T) -> T
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key, error = %e, "unreadable record, using default");
                default
            }
        }
    }

    pub fn set<T>(&self, key: &str, value: &T) -> anyhow::Result<()>
    where
        T: minicbor::Encode<()>,
    {
        self.instance.insert(key, minicbor::to_vec(value)?)?;
        self.instance.flush()?;
        Ok(())
    }

    fn read<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.instance.get(key)? {
            Some(bytes) => Ok(Some(minicbor::decode(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn has_user(&self) -> anyhow::Result<bool> {
        Ok(self.instance.contains_key(keys::USER)?)
    }

    pub fn load_user(&self) -> Option<User> {
        self.get(keys::USER, None)
    }

    pub fn save_user(&self, user: &User) -> anyhow::Result<()> {
        self.set(keys::USER, user)
    }

    /// Load the account and its ledger, healing corrupt records.
    ///
    /// A missing account comes back as an empty "Main Account" without an
    /// account number; callers decide whether to assign one.
    pub fn load_account(&self) -> anyhow::Result<Account> {
        let entries: Vec<LedgerEntry> = match self.read(keys::LEDGER) {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "ledger record is corrupt, resetting to empty");
                let empty: Vec<LedgerEntry> = Vec::new();
                self.set(keys::LEDGER, &empty)?;
                empty
            }
        };

        let stored = match self.read::<StoredAccount>(keys::ACCOUNT) {
            Ok(Some(stored)) => Some(stored),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "account record is corrupt, resetting");
                None
            }
        };

        let Some(stored) = stored else {
            return Ok(Account::from_parts(
                Account::DEFAULT_NAME.to_string(),
                None,
                Ledger::from_parts(Amount::ZERO, entries),
            ));
        };

        let balance = match stored.balance.0 {
            Some(balance) => balance,
            None => {
                warn!("stored balance is not a number, resetting to zero");
                let healed = StoredAccount {
                    balance: StoredBalance(Some(Amount::ZERO)),
                    ..stored
                };
                self.set(keys::ACCOUNT, &healed)?;
                return Ok(Account::from_parts(
                    healed.name,
                    healed.account_number,
                    Ledger::from_parts(Amount::ZERO, entries),
                ));
            }
        };

        let ledger = Ledger::from_parts(balance, entries);
        if !ledger.verify_chain() {
            warn!("ledger history does not add up to the stored balance");
        }

        Ok(Account::from_parts(stored.name, stored.account_number, ledger))
    }

    /// Write the account and ledger records
    pub fn save_account(&self, account: &Account) -> anyhow::Result<()> {
        let mut batch = Batch::default();
        batch.insert(keys::ACCOUNT, minicbor::to_vec(StoredAccount::from(account))?);
        batch.insert(keys::LEDGER, minicbor::to_vec(account.ledger().entries())?);
        self.instance.apply_batch(batch)?;
        self.instance.flush()?;

        debug!(entries = account.ledger().len(), "account saved");
        Ok(())
    }

    /// Write user, account and ledger together
    pub fn save_all(&self, user: &User, account: &Account) -> anyhow::Result<()> {
        let mut batch = Batch::default();
        batch.insert(keys::USER, minicbor::to_vec(user)?);
        batch.insert(keys::ACCOUNT, minicbor::to_vec(StoredAccount::from(account))?);
        batch.insert(keys::LEDGER, minicbor::to_vec(account.ledger().entries())?);
        self.instance.apply_batch(batch)?;
        self.instance.flush()?;
        Ok(())
    }

    pub fn last_login(&self) -> Option<TimeStamp<Utc>> {
        self.get(keys::LAST_LOGIN, None)
    }

    pub fn set_last_login(&self, at: &TimeStamp<Utc>) -> anyhow::Result<()> {
        self.set(keys::LAST_LOGIN, at)
    }
}

impl From<&Account> for StoredAccount {
    fn from(account: &Account) -> Self {
        Self {
            name: account.name().to_string(),
            balance: StoredBalance(Some(account.ledger().balance())),
            account_number: account.account_number().map(str::to_string),
        }
    }
}

impl<C> minicbor::Encode<C> for StoredBalance {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self.0 {
            Some(amount) => amount.encode(e, ctx),
            None => e.null()?.ok(),
        }
    }
}

impl<'b, C> minicbor::Decode<'b, C> for StoredBalance {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
                Ok(StoredBalance(Some(Amount::decode(d, ctx)?)))
            }
            _ => {
                d.skip()?;
                Ok(StoredBalance(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::EntryKind;

    fn temp_store() -> BankStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        BankStore::new(Arc::new(db))
    }

    fn funded_account() -> Account {
        let mut account = Account::open();
        account
            .ledger_mut()
            .apply(EntryKind::Deposit, Amount::from_major(1_000), "Cash Deposit")
            .unwrap();
        account
            .ledger_mut()
            .apply(EntryKind::Transfer, Amount::from_minor(25_050), "To: 9876543211")
            .unwrap();
        account
    }

    #[test]
    fn user_and_account_round_trip() {
        let store = temp_store();
        let user = User::new("Asha".into(), "9876543210".into(), "1234").unwrap();
        let account = funded_account();

        store.save_all(&user, &account).unwrap();

        assert_eq!(store.load_user(), Some(user));
        assert_eq!(store.load_account().unwrap(), account);
    }

    #[test]
    fn missing_records_fall_back() {
        let store = temp_store();

        assert_eq!(store.load_user(), None);
        assert_eq!(store.last_login(), None);

        let account = store.load_account().unwrap();
        assert_eq!(account.name(), Account::DEFAULT_NAME);
        assert_eq!(account.account_number(), None);
        assert!(account.ledger().is_empty());
    }

    #[test]
    fn corrupt_ledger_is_reset_and_rewritten() {
        let store = temp_store();
        store.save_account(&funded_account()).unwrap();
        store.instance.insert(keys::LEDGER, &b"not cbor"[..]).unwrap();

        let account = store.load_account().unwrap();
        assert!(account.ledger().is_empty());

        // the healed record now decodes cleanly
        let entries: Vec<LedgerEntry> = store.read(keys::LEDGER).unwrap().unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn non_numeric_balance_is_reset_and_rewritten() {
        let store = temp_store();
        let corrupt = minicbor::to_vec(StoredAccount {
            name: "Main Account".into(),
            balance: StoredBalance(None),
            account_number: Some("1234-5678-9012".into()),
        })
        .unwrap();
        store.instance.insert(keys::ACCOUNT, corrupt).unwrap();

        let account = store.load_account().unwrap();
        assert!(account.ledger().balance().is_zero());
        assert_eq!(account.account_number(), Some("1234-5678-9012"));

        let stored: StoredAccount = store.read(keys::ACCOUNT).unwrap().unwrap();
        assert_eq!(stored.balance.0, Some(Amount::ZERO));
    }

    #[test]
    fn get_tolerates_garbage() {
        let store = temp_store();
        store.instance.insert(keys::LAST_LOGIN, &b"\xff\xff"[..]).unwrap();

        assert_eq!(store.last_login(), None);
    }
}
