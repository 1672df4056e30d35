//! Error types for oddjobz
//!
//! A single error hierarchy is shared by the store and every engine component.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Errors fall into two families that callers must treat differently:
//!
//! - **Business outcomes** (`InsufficientCredits`, `SelfFollow`) and malformed
//!   input (`InvalidAmount`, `InvalidInput`): expected, recoverable, mapped to
//!   a client error by the request layer. Never logged as faults.
//! - **Infrastructure faults** (`StoreUnavailable`, `StoreTimeout`, `WrongType`,
//!   `Serialization`): propagated unmodified, mapped to a server error. The
//!   core never retries them.

use crate::types::UserId;
use thiserror::Error;

/// Result type alias for oddjobz operations
pub type MarketResult<T> = std::result::Result<T, MarketError>;

/// Error types for the marketplace core
#[derive(Debug, Error)]
pub enum MarketError {
    /// Debit larger than the balance observed inside the script
    #[error("Insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits {
        /// Balance at decision time
        balance: u64,
        /// Amount the caller tried to debit
        requested: u64,
    },

    /// Non-numeric or non-positive credit amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A user tried to follow themselves
    #[error("User {0} cannot follow themselves")]
    SelfFollow(UserId),

    /// Malformed request input other than amounts
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store is closed or refused the operation
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A key lock could not be acquired within the configured timeout
    #[error("Store timeout on key '{key}' after {waited_ms}ms")]
    StoreTimeout {
        /// Key whose lock was contended
        key: String,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// Operation applied to a value of the wrong type
    #[error("Wrong type for key '{key}': expected {expected}, found {found}")]
    WrongType {
        /// Offending key
        key: String,
        /// Type the operation needs
        expected: &'static str,
        /// Type actually stored
        found: &'static str,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be read or is invalid
    #[error("Config error: {0}")]
    Config(String),
}

impl MarketError {
    /// Create an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        MarketError::InvalidInput(msg.into())
    }

    /// Create an `InvalidAmount` error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        MarketError::InvalidAmount(msg.into())
    }

    /// Create a `StoreUnavailable` error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        MarketError::StoreUnavailable(msg.into())
    }

    /// Create a `Config` error
    pub fn config(msg: impl Into<String>) -> Self {
        MarketError::Config(msg.into())
    }

    /// Expected negative results the caller must branch on
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            MarketError::InsufficientCredits { .. } | MarketError::SelfFollow(_)
        )
    }

    /// Errors caused by the request rather than the system (4xx-class)
    pub fn is_client_error(&self) -> bool {
        self.is_business_outcome()
            || matches!(
                self,
                MarketError::InvalidAmount(_) | MarketError::InvalidInput(_)
            )
    }

    /// Faults of the store or its data (5xx-class). The caller may retry
    /// the whole request; the core never does.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            MarketError::StoreUnavailable(_)
                | MarketError::StoreTimeout { .. }
                | MarketError::WrongType { .. }
                | MarketError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(e: serde_json::Error) -> Self {
        MarketError::Serialization(e.to_string())
    }
}
