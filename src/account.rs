//! The single user and their account
use crate::ledger::Ledger;
use crate::utils;
use rand::Rng;

const USER_ID_PREFIX: &str = "user_";

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    id: String, // bech32m encoded uuid7
    #[n(1)]
    name: String, // html escaped
    #[n(2)]
    mobile: String, // normalized
    #[n(3)]
    credential_hash: String,
}

impl User {
    /// Expects an escaped name, a normalized mobile and a validated PIN
    pub fn new(name: String, mobile: String, pin: &str) -> anyhow::Result<Self> {
        let id = utils::new_uuid_to_bech32(USER_ID_PREFIX)?;
        let credential_hash = credential_hash(&id, pin);

        Ok(Self {
            id,
            name,
            mobile,
            credential_hash,
        })
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn mobile(&self) -> &str {
        &self.mobile
    }
    pub fn verify_pin(&self, pin: &str) -> bool {
        credential_hash(&self.id, pin) == self.credential_hash
    }
    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }
    pub(crate) fn set_pin(&mut self, pin: &str) {
        self.credential_hash = credential_hash(&self.id, pin);
    }
}

// Demo credential: sha256 over the user id and PIN. A 4 digit PIN is trivially
// brute forced, so this only keeps the plaintext out of the store.
fn credential_hash(user_id: &str, pin: &str) -> String {
    sha256::digest(format!("{}:{}", user_id, pin).as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    name: String,
    account_number: Option<String>, // DDDD-DDDD-DDDD, absent in older data
    ledger: Ledger,
}

impl Account {
    pub const DEFAULT_NAME: &'static str = "Main Account";

    /// A fresh zero balance account with a new account number
    pub fn open() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            account_number: Some(generate_account_number()),
            ledger: Ledger::new(),
        }
    }
    pub fn from_parts(name: String, account_number: Option<String>, ledger: Ledger) -> Self {
        Self {
            name,
            account_number,
            ledger,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn account_number(&self) -> Option<&str> {
        self.account_number.as_deref()
    }
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
    pub(crate) fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }
    /// Generate an account number if there is none. Returns whether one was
    /// generated.
    pub fn ensure_account_number(&mut self) -> bool {
        if self.account_number.is_some() {
            return false;
        }
        self.account_number = Some(generate_account_number());
        true
    }
}

pub fn generate_account_number() -> String {
    let mut rng = rand::thread_rng();
    let mut group = || rng.gen_range(1000..=9999u32);

    format!("{}-{}-{}", group(), group(), group())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_is_hashed_per_user() {
        let a = User::new("Asha".into(), "9876543210".into(), "1234").unwrap();
        let b = User::new("Ravi".into(), "9876543211".into(), "1234").unwrap();

        assert!(a.verify_pin("1234"));
        assert!(!a.verify_pin("4321"));
        assert_ne!(a.credential_hash, "1234");
        assert_ne!(a.credential_hash, b.credential_hash);
    }

    #[test]
    fn pin_change_replaces_hash() {
        let mut user = User::new("Asha".into(), "9876543210".into(), "1234").unwrap();
        user.set_pin("9999");

        assert!(user.verify_pin("9999"));
        assert!(!user.verify_pin("1234"));
    }

    #[test]
    fn account_number_shape() {
        let number = generate_account_number();
        let groups: Vec<&str> = number.split('-').collect();

        assert_eq!(groups.len(), 3);
        for g in groups {
            assert_eq!(g.len(), 4);
            let n: u32 = g.parse().unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn missing_account_number_is_generated_once() {
        let mut account = Account::from_parts("Main Account".into(), None, Ledger::new());

        assert!(account.ensure_account_number());
        let first = account.account_number().map(str::to_string);
        assert!(!account.ensure_account_number());
        assert_eq!(account.account_number().map(str::to_string), first);
    }
}
