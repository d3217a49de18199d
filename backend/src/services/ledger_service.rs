use crate::error::{AppError, AppResult};
use crate::models::{LedgerAccount, LedgerTransaction, Posting, PostingOutcome};
use crate::repositories::LedgerRepository;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Per-user virtual currency balances
pub struct LedgerService {
    repo: Arc<dyn LedgerRepository>,
}

impl LedgerService {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    /// Account for a user, created with a zero balance on first touch
    pub async fn account(&self, user_id: Uuid) -> AppResult<LedgerAccount> {
        Ok(self.repo.get_or_create(user_id).await?)
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self.account(user_id).await?.balance)
    }

    pub async fn credit(&self, user_id: Uuid, amount: i64, description: &str) -> AppResult<LedgerAccount> {
        ensure_positive(amount)?;
        let outcome = self.apply(Posting::credit(user_id, amount, description)).await?;
        Ok(outcome.account().clone())
    }

    /// Fails with `InsufficientFunds` rather than going negative.
    pub async fn debit(&self, user_id: Uuid, amount: i64, description: &str) -> AppResult<LedgerAccount> {
        ensure_positive(amount)?;
        let outcome = self.apply(Posting::debit(user_id, amount, description)).await?;
        Ok(outcome.account().clone())
    }

    /// Credit at most once per `key`.
    pub async fn credit_once(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
        key: impl Into<String>,
    ) -> AppResult<PostingOutcome> {
        ensure_positive(amount)?;
        self.apply(Posting::credit(user_id, amount, description).with_key(key))
            .await
    }

    /// Debit at most once per `key`.
    pub async fn debit_once(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
        key: impl Into<String>,
    ) -> AppResult<PostingOutcome> {
        ensure_positive(amount)?;
        self.apply(Posting::debit(user_id, amount, description).with_key(key))
            .await
    }

    /// Most recent transactions first
    pub async fn history(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<LedgerTransaction>> {
        if limit <= 0 {
            return Err(AppError::Validation("Limit must be greater than zero".to_string()));
        }
        Ok(self.repo.transactions(user_id, limit).await?)
    }

    async fn apply(&self, posting: Posting) -> AppResult<PostingOutcome> {
        let outcome = self.repo.post(&posting).await?;
        match &outcome {
            PostingOutcome::Applied(account) => info!(
                user_id = %posting.user_id,
                amount = posting.amount,
                balance = account.balance,
                description = %posting.description,
                "Ledger posting applied"
            ),
            PostingOutcome::Duplicate(_) => debug!(
                user_id = %posting.user_id,
                key = ?posting.idempotency_key,
                "Ledger posting already applied"
            ),
        }
        Ok(outcome)
    }
}

fn ensure_positive(amount: i64) -> AppResult<()> {
    if amount <= 0 {
        return Err(AppError::Validation(format!(
            "Amount must be greater than zero, got {}",
            amount
        )));
    }
    Ok(())
}
