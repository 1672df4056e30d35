//! CreditLedger: per-user credit balances
//!
//! ## Design
//!
//! CreditLedger is a stateless facade over the store. It holds only an
//! `Arc<dyn KeyValueStore>`; balances live under `users:{user}:credits`.
//!
//! Every balance change runs as one script keyed by the affected balance:
//! the balance is read, checked and written without another writer able to
//! interleave. The history entry describing the change is appended in the
//! same script, so history and balance never disagree.
//!
//! ## Outcomes
//!
//! `InsufficientCredits` is a normal result, not a fault. It is logged at
//! `debug` only.

use chrono::{DateTime, Utc};
use oddjobz_core::{
    keys, KeyValueStore, MarketError, MarketResult, Script, ScriptContext, ScriptExt, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parse a credit amount submitted as text
///
/// # Errors
///
/// `InvalidAmount` for non-numeric, zero or negative input.
pub fn parse_amount(raw: &str) -> MarketResult<i64> {
    let amount: i64 = raw
        .trim()
        .parse()
        .map_err(|_| MarketError::invalid_amount(format!("'{}' is not a whole number", raw)))?;
    check_amount(amount)?;
    Ok(amount)
}

fn check_amount(amount: i64) -> MarketResult<()> {
    if amount <= 0 {
        return Err(MarketError::invalid_amount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

fn as_balance(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

/// Kind of ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// Credits added
    Credit,
    /// Credits spent
    Debit,
    /// Credits received from another user
    TransferIn,
    /// Credits sent to another user
    TransferOut,
}

/// One balance movement in a user's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Movement kind
    pub kind: LedgerEntryKind,
    /// Credits moved (always positive)
    pub amount: u64,
    /// Balance right after the movement
    pub balance_after: u64,
    /// Other side of a transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<UserId>,
    /// When the movement happened
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn record(&self, ctx: &mut dyn ScriptContext, user: &UserId) -> MarketResult<()> {
        ctx.lpush(&keys::transactions(user), serde_json::to_string(self)?)?;
        Ok(())
    }
}

// ========== Scripts ==========

struct DebitScript<'a> {
    user: &'a UserId,
    amount: i64,
    at: DateTime<Utc>,
}

impl Script for DebitScript<'_> {
    type Output = u64;

    fn name(&self) -> &'static str {
        "ledger_debit"
    }

    fn keys(&self) -> Vec<String> {
        vec![keys::credits(self.user), keys::transactions(self.user)]
    }

    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<u64> {
        let key = keys::credits(self.user);
        let balance = ctx.get_int(&key)?;
        if balance < self.amount {
            return Err(MarketError::InsufficientCredits {
                balance: as_balance(balance),
                requested: as_balance(self.amount),
            });
        }
        let after = as_balance(ctx.incr_by(&key, -self.amount)?);
        LedgerEntry {
            kind: LedgerEntryKind::Debit,
            amount: as_balance(self.amount),
            balance_after: after,
            counterparty: None,
            created_at: self.at,
        }
        .record(ctx, self.user)?;
        Ok(after)
    }
}

struct CreditScript<'a> {
    user: &'a UserId,
    amount: i64,
    at: DateTime<Utc>,
}

impl Script for CreditScript<'_> {
    type Output = u64;

    fn name(&self) -> &'static str {
        "ledger_credit"
    }

    fn keys(&self) -> Vec<String> {
        vec![keys::credits(self.user), keys::transactions(self.user)]
    }

    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<u64> {
        let after = as_balance(ctx.incr_by(&keys::credits(self.user), self.amount)?);
        LedgerEntry {
            kind: LedgerEntryKind::Credit,
            amount: as_balance(self.amount),
            balance_after: after,
            counterparty: None,
            created_at: self.at,
        }
        .record(ctx, self.user)?;
        Ok(after)
    }
}

struct TransferScript<'a> {
    from: &'a UserId,
    to: &'a UserId,
    amount: i64,
    at: DateTime<Utc>,
}

impl Script for TransferScript<'_> {
    type Output = u64;

    fn name(&self) -> &'static str {
        "ledger_transfer"
    }

    fn keys(&self) -> Vec<String> {
        vec![
            keys::credits(self.from),
            keys::credits(self.to),
            keys::transactions(self.from),
            keys::transactions(self.to),
        ]
    }

    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<u64> {
        let from_key = keys::credits(self.from);
        let balance = ctx.get_int(&from_key)?;
        if balance < self.amount {
            return Err(MarketError::InsufficientCredits {
                balance: as_balance(balance),
                requested: as_balance(self.amount),
            });
        }
        let sender_after = as_balance(ctx.incr_by(&from_key, -self.amount)?);
        let receiver_after = as_balance(ctx.incr_by(&keys::credits(self.to), self.amount)?);

        LedgerEntry {
            kind: LedgerEntryKind::TransferOut,
            amount: as_balance(self.amount),
            balance_after: sender_after,
            counterparty: Some(self.to.clone()),
            created_at: self.at,
        }
        .record(ctx, self.from)?;
        LedgerEntry {
            kind: LedgerEntryKind::TransferIn,
            amount: as_balance(self.amount),
            balance_after: receiver_after,
            counterparty: Some(self.from.clone()),
            created_at: self.at,
        }
        .record(ctx, self.to)?;
        Ok(sender_after)
    }
}

// ========== Facade ==========

/// Per-user credit balances with atomic debit and credit
///
/// # Example
///
/// ```ignore
/// let ledger = CreditLedger::new(store);
/// ledger.credit(&alice, 100)?;
/// match ledger.debit(&alice, 70) {
///     Ok(balance) => println!("left: {}", balance),
///     Err(MarketError::InsufficientCredits { balance, .. }) => println!("only {}", balance),
///     Err(e) => return Err(e),
/// }
/// ```
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn KeyValueStore>,
}

impl CreditLedger {
    /// Create a ledger over `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current balance; a user with no balance has 0
    pub fn balance(&self, user: &UserId) -> MarketResult<u64> {
        let raw = match self.store.get(&keys::credits(user))? {
            None => 0,
            Some(value) => value
                .as_int()
                .ok_or_else(|| value.wrong_type(&keys::credits(user), "int"))?,
        };
        Ok(as_balance(raw))
    }

    /// Spend `amount` credits if the balance covers it
    ///
    /// Returns the balance after the debit.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount <= 0`
    /// - `InsufficientCredits` if the balance is smaller than `amount`; the
    ///   balance is left unchanged
    pub fn debit(&self, user: &UserId, amount: i64) -> MarketResult<u64> {
        check_amount(amount)?;
        let result = self.store.run_script(&DebitScript {
            user,
            amount,
            at: Utc::now(),
        });
        match &result {
            Ok(balance) => tracing::debug!(
                target: "oddjobz::ledger",
                user = %user,
                amount,
                balance,
                "Debited credits"
            ),
            Err(MarketError::InsufficientCredits { balance, requested }) => tracing::debug!(
                target: "oddjobz::ledger",
                user = %user,
                balance,
                requested,
                "Debit refused: insufficient credits"
            ),
            Err(_) => {}
        }
        result
    }

    /// Add `amount` credits, creating the balance if needed
    ///
    /// Returns the balance after the credit.
    pub fn credit(&self, user: &UserId, amount: i64) -> MarketResult<u64> {
        check_amount(amount)?;
        let balance = self.store.run_script(&CreditScript {
            user,
            amount,
            at: Utc::now(),
        })?;
        tracing::debug!(
            target: "oddjobz::ledger",
            user = %user,
            amount,
            balance,
            "Credited credits"
        );
        Ok(balance)
    }

    /// Move `amount` from `from` to `to` in one step
    ///
    /// Returns the sender's balance after the transfer.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `from == to`
    /// - `InvalidAmount` / `InsufficientCredits` as for [`debit`](Self::debit)
    pub fn transfer(&self, from: &UserId, to: &UserId, amount: i64) -> MarketResult<u64> {
        if from == to {
            return Err(MarketError::invalid_input(format!(
                "cannot transfer credits from {} to themselves",
                from
            )));
        }
        check_amount(amount)?;
        let balance = self.store.run_script(&TransferScript {
            from,
            to,
            amount,
            at: Utc::now(),
        })?;
        tracing::debug!(
            target: "oddjobz::ledger",
            from = %from,
            to = %to,
            amount,
            balance,
            "Transferred credits"
        );
        Ok(balance)
    }

    /// Ledger history, newest first
    pub fn history(
        &self,
        user: &UserId,
        offset: usize,
        limit: usize,
    ) -> MarketResult<Vec<LedgerEntry>> {
        let Ok(start) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }
        let span = i64::try_from(limit).unwrap_or(i64::MAX);
        let stop = start.saturating_add(span - 1);
        self.store
            .lrange(&keys::transactions(user), start, stop)?
            .iter()
            .map(|raw| serde_json::from_str::<LedgerEntry>(raw).map_err(MarketError::from))
            .collect()
    }
}
