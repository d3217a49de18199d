//! Repository for ledger accounts and transactions

use super::{balance_after, LedgerRepository};
use crate::error::RepositoryError;
use crate::models::{LedgerAccount, LedgerTransaction, Posting, PostingOutcome};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensure the account row exists and lock it for the rest of the transaction
    async fn lock_account(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<LedgerAccount, RepositoryError> {
        sqlx::query("INSERT INTO ledger_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        let account = sqlx::query_as::<_, LedgerAccount>(
            r#"
            SELECT user_id, balance, updated_at
            FROM ledger_accounts
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(account)
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn get_or_create(&self, user_id: Uuid) -> Result<LedgerAccount, RepositoryError> {
        let account = sqlx::query_as::<_, LedgerAccount>(
            r#"
            INSERT INTO ledger_accounts (user_id, balance)
            VALUES ($1, 0)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, balance, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn post(&self, posting: &Posting) -> Result<PostingOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_account(&mut tx, posting.user_id).await?;

        if let Some(key) = &posting.idempotency_key {
            let seen = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM ledger_transactions WHERE idempotency_key = $1",
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

            if seen.is_some() {
                tx.rollback().await?;
                return Ok(PostingOutcome::Duplicate(current));
            }
        }

        balance_after(&current, posting)?;

        // a concurrent posting may have committed the same key after our check
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO ledger_transactions (id, user_id, amount, description, idempotency_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(posting.user_id)
        .bind(posting.amount)
        .bind(&posting.description)
        .bind(&posting.idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.rollback().await?;
            return Ok(PostingOutcome::Duplicate(current));
        }

        let updated = sqlx::query_as::<_, LedgerAccount>(
            r#"
            UPDATE ledger_accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, balance, updated_at
            "#,
        )
        .bind(posting.user_id)
        .bind(posting.amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PostingOutcome::Applied(updated))
    }

    async fn transactions(&self, user_id: Uuid, limit: i64) -> Result<Vec<LedgerTransaction>, RepositoryError> {
        let transactions = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, user_id, amount, description, idempotency_key, created_at
            FROM ledger_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}
