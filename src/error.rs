use crate::types::Amount;
use std::fmt;

/// Format or range violations on user input. Always recoverable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Enter an amount")]
    AmountRequired,
    #[error("Enter a valid number")]
    NotANumber,
    #[error("Amount must be positive")]
    NonPositive,
    #[error("Maximum amount is {max}")]
    TooLarge { max: Amount },
    #[error("Maximum 2 decimal places allowed")]
    TooManyDecimals,
    #[error("Enter your name")]
    NameRequired,
    #[error("Name must be at least {min} characters")]
    NameTooShort { min: usize },
    #[error("Name cannot exceed {max} characters")]
    NameTooLong { max: usize },
    #[error("Name contains invalid characters")]
    InvalidNameChars,
    #[error("Only one + allowed, at the start")]
    MalformedSign,
    #[error("Mobile contains invalid characters")]
    InvalidPhoneChars,
    #[error("Enter a valid mobile number (9876543210 or +91 9876543210)")]
    InvalidPhoneFormat,
    #[error("PIN must be exactly 4 digits")]
    InvalidPin,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No account found. Please sign up first.")]
    NoAccount,
    #[error("Mobile number not registered")]
    MobileMismatch,
    #[error("Incorrect PIN")]
    WrongPin,
    #[error("Not logged in")]
    NotAuthenticated,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BusinessRuleError {
    #[error("Insufficient balance. Available: {available}")]
    InsufficientBalance { available: Amount },
    #[error("Cannot transfer to yourself")]
    SelfTransfer,
}

/// The input a rejection is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Mobile,
    Pin,
    Amount,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Rule(#[from] BusinessRuleError),
}

/// Every failing field of a form, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(Field, FieldError)>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, field: Field, error: impl Into<FieldError>) {
        self.0.push((field, error.into()));
    }
    /// Record the error of a failed check, passing the value through
    pub fn check<T, E: Into<FieldError>>(&mut self, field: Field, res: Result<T, E>) -> Option<T> {
        match res {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(field, e);
                None
            }
        }
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn get(&self, field: Field) -> Option<&FieldError> {
        self.0.iter().find(|(f, _)| *f == field).map(|(_, e)| e)
    }
    pub fn iter(&self) -> impl Iterator<Item = &(Field, FieldError)> {
        self.0.iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, error)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{:?}: {}", field, error)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BankError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Fields(FieldErrors),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Rule(#[from] BusinessRuleError),
    #[error("Please wait...")]
    ActionInFlight,
    #[error("store failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<FieldErrors> for BankError {
    fn from(value: FieldErrors) -> Self {
        BankError::Fields(value)
    }
}

impl From<FieldError> for BankError {
    fn from(value: FieldError) -> Self {
        match value {
            FieldError::Invalid(e) => BankError::Validation(e),
            FieldError::Rule(e) => BankError::Rule(e),
        }
    }
}

impl BankError {
    /// The rejection reported against `field`, if any
    pub fn field(&self, field: Field) -> Option<FieldError> {
        match self {
            BankError::Fields(errors) => errors.get(field).cloned(),
            _ => None,
        }
    }
}

pub type BankResult<T> = Result<T, BankError>;
