//! A single-user toy bank: one locally stored user, one account and an
//! append-only ledger, persisted to an embedded sled database.

pub mod account;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod session;
pub mod store;
pub mod types;
pub mod utils;
pub mod validator;
pub mod view;

pub use config::BankConfig;
pub use coordinator::{Action, ActionCoordinator, AutoConfirm, Confirm, Submission};
pub use error::{BankError, BankResult};
pub use ledger::{EntryKind, LedgerEntry};
pub use types::Amount;
