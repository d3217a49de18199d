//! Ledger account and transaction models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's virtual-currency balance. Never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LedgerAccount {
    pub user_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

impl LedgerAccount {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            balance: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Append-only transaction record for audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Signed: credits are positive, debits negative
    pub amount: i64,
    pub description: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

/// A signed balance change to apply to one account
#[derive(Debug, Clone)]
pub struct Posting {
    pub user_id: Uuid,
    pub amount: i64,
    pub description: String,
    /// When set, a second posting with the same key is ignored
    pub idempotency_key: Option<String>,
}

impl Posting {
    pub fn credit(user_id: Uuid, amount: i64, description: impl Into<String>) -> Self {
        Self {
            user_id,
            amount,
            description: description.into(),
            idempotency_key: None,
        }
    }

    pub fn debit(user_id: Uuid, amount: i64, description: impl Into<String>) -> Self {
        Self {
            user_id,
            amount: -amount,
            description: description.into(),
            idempotency_key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Result of applying a [`Posting`]
#[derive(Debug, Clone, PartialEq)]
pub enum PostingOutcome {
    Applied(LedgerAccount),
    /// The idempotency key was already used; balance unchanged
    Duplicate(LedgerAccount),
}

impl PostingOutcome {
    pub fn account(&self) -> &LedgerAccount {
        match self {
            PostingOutcome::Applied(account) | PostingOutcome::Duplicate(account) => account,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, PostingOutcome::Applied(_))
    }
}
