//! Scripted walkthrough of a toy bank session.
//!
//! Runs against a throwaway database unless a path is given:
//!
//! ```text
//! RUST_LOG=toy_bank=debug cargo run --example walkthrough -- ./bank.db
//! ```
use std::path::PathBuf;
use std::sync::Arc;
use toy_bank::{
    Action, ActionCoordinator, AutoConfirm, BankConfig, BankError, EntryKind, Submission,
    types::Amount,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let temp_dir = tempfile::tempdir()?;
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| temp_dir.path().join("bank.db"));

    info!(path = %path.display(), "opening store");
    let db = Arc::new(sled::open(&path)?);
    let mut bank = ActionCoordinator::open(db, BankConfig::new())?;

    if bank.session().is_authenticated() {
        info!("restored a stored session");
    } else {
        if let Err(e) = bank.signup("A", "12345", "12") {
            warn!(error = %e, "signup rejected");
        }
        bank.signup("Asha Rao", "+91 98765 43210", "1234")?;
    }

    bank.execute(Action::deposit("12500"), &mut AutoConfirm)?;
    bank.execute(Action::withdraw("250.75"), &mut AutoConfirm)?;

    // a second action is turned away while the first settles
    if let Submission::Scheduled(pending) =
        bank.submit(Action::transfer("0712345678", "1200"), &mut AutoConfirm)?
    {
        match bank.submit(Action::deposit("10"), &mut AutoConfirm) {
            Err(BankError::ActionInFlight) => info!("second action rejected while in flight"),
            other => warn!(?other, "expected the second action to be rejected"),
        }
        bank.complete(pending)?;
    }

    let mut decline_large = |kind: EntryKind, amount: Amount| {
        info!(kind = kind.label(), %amount, "declining large action");
        false
    };
    bank.execute(Action::withdraw("10000"), &mut decline_large)?;

    if let Err(e) = bank.execute(Action::transfer("+91 98765-43210", "5"), &mut AutoConfirm) {
        warn!(error = %e, "self transfer rejected");
    }

    let dash = bank.session().dashboard("")?;
    println!("{} ({})", dash.profile.name, dash.profile.mobile);
    if let Some(number) = dash.profile.account_number {
        println!("account {number}");
    }
    println!(
        "balance {}  credit score {} ({:?})",
        dash.balance, dash.credit_score.score, dash.credit_score.band
    );
    for entry in dash.statement {
        println!(
            "{}  {:<8} {:>12}  {:>12}  {}",
            entry.timestamp().to_rfc3339(),
            entry.kind().label(),
            entry.amount(),
            entry.balance_after(),
            entry.reference()
        );
    }

    Ok(())
}
