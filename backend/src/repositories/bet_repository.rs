use super::BetRepository;
use crate::error::RepositoryError;
use crate::models::Bet;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

const BET_COLUMNS: &str = r#"
    id,
    tournament_id,
    user_id,
    match_id,
    amount,
    predicted_winner,
    won,
    is_processed,
    created_at,
    updated_at
"#;

/// Repository for bet data access
pub struct PgBetRepository {
    pool: PgPool,
}

impl PgBetRepository {
    /// Create a new PgBetRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BetRepository for PgBetRepository {
    async fn insert(&self, bet: &Bet) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO bets (id, tournament_id, user_id, match_id, amount, predicted_winner, won, is_processed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(bet.id)
        .bind(bet.tournament_id)
        .bind(bet.user_id)
        .bind(&bet.match_id)
        .bind(bet.amount)
        .bind(&bet.predicted_winner)
        .bind(bet.won)
        .bind(bet.is_processed)
        .bind(bet.created_at)
        .bind(bet.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, tournament_id: Uuid, user_id: Uuid, match_id: &str) -> Result<Option<Bet>, RepositoryError> {
        let bet = sqlx::query_as::<_, Bet>(&format!(
            "SELECT {} FROM bets WHERE tournament_id = $1 AND user_id = $2 AND match_id = $3",
            BET_COLUMNS
        ))
        .bind(tournament_id)
        .bind(user_id)
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bet)
    }

    async fn update_prediction(&self, bet_id: Uuid, predicted_winner: &str, amount: i64) -> Result<Bet, RepositoryError> {
        sqlx::query_as::<_, Bet>(&format!(
            r#"
            UPDATE bets
            SET predicted_winner = $2, amount = $3, updated_at = NOW()
            WHERE id = $1 AND is_processed = FALSE
            RETURNING {}
            "#,
            BET_COLUMNS
        ))
        .bind(bet_id)
        .bind(predicted_winner)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Open bet {} not found", bet_id)))
    }

    async fn delete(&self, bet_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM bets WHERE id = $1")
            .bind(bet_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_user(&self, tournament_id: Uuid, user_id: Uuid) -> Result<Vec<Bet>, RepositoryError> {
        let bets = sqlx::query_as::<_, Bet>(&format!(
            "SELECT {} FROM bets WHERE tournament_id = $1 AND user_id = $2 ORDER BY created_at DESC",
            BET_COLUMNS
        ))
        .bind(tournament_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bets)
    }

    async fn find_unprocessed_by_match(&self, tournament_id: Uuid, match_id: &str) -> Result<Vec<Bet>, RepositoryError> {
        let bets = sqlx::query_as::<_, Bet>(&format!(
            r#"
            SELECT {}
            FROM bets
            WHERE tournament_id = $1 AND match_id = $2 AND is_processed = FALSE
            ORDER BY created_at ASC
            "#,
            BET_COLUMNS
        ))
        .bind(tournament_id)
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bets)
    }

    async fn tournaments_with_open_bets(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT tournament_id FROM bets WHERE is_processed = FALSE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn try_claim_match(&self, tournament_id: Uuid, match_id: &str, lease: Duration) -> Result<bool, RepositoryError> {
        let claimed = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO settlement_claims (tournament_id, match_id, claimed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (tournament_id, match_id) DO UPDATE
            SET claimed_at = NOW(), completed_at = NULL
            WHERE settlement_claims.completed_at IS NOT NULL
               OR settlement_claims.claimed_at < NOW() - make_interval(secs => $3)
            RETURNING tournament_id
            "#,
        )
        .bind(tournament_id)
        .bind(match_id)
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.is_some())
    }

    async fn complete_match(
        &self,
        tournament_id: Uuid,
        match_id: &str,
        results: &[(Uuid, bool)],
    ) -> Result<(), RepositoryError> {
        let (ids, outcomes): (Vec<Uuid>, Vec<bool>) = results.iter().copied().unzip();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE bets
            SET is_processed = TRUE, won = r.won, updated_at = NOW()
            FROM UNNEST($1::uuid[], $2::bool[]) AS r(id, won)
            WHERE bets.id = r.id AND bets.is_processed = FALSE
            "#,
        )
        .bind(&ids)
        .bind(&outcomes)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE settlement_claims SET completed_at = NOW() WHERE tournament_id = $1 AND match_id = $2",
        )
        .bind(tournament_id)
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn release_match(&self, tournament_id: Uuid, match_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM settlement_claims WHERE tournament_id = $1 AND match_id = $2 AND completed_at IS NULL",
        )
        .bind(tournament_id)
        .bind(match_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
