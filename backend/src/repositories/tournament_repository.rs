//! Postgres storage for tournament aggregates

use super::TournamentRepository;
use crate::error::RepositoryError;
use crate::models::Tournament;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Tournaments are stored as a JSONB document plus the columns we filter on.
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn hydrate((version, Json(mut tournament)): (i64, Json<Tournament>)) -> Tournament {
    // the column is authoritative, the copy inside the document may be stale
    tournament.version = version;
    tournament
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn insert(&self, tournament: &Tournament) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tournaments (id, version, name, date, finished, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tournament.id)
        .bind(tournament.version)
        .bind(&tournament.name)
        .bind(tournament.date)
        .bind(tournament.finished)
        .bind(Json(tournament))
        .bind(tournament.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tournament>, RepositoryError> {
        let row = sqlx::query_as::<_, (i64, Json<Tournament>)>(
            "SELECT version, data FROM tournaments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(hydrate))
    }

    async fn list(&self) -> Result<Vec<Tournament>, RepositoryError> {
        let rows = sqlx::query_as::<_, (i64, Json<Tournament>)>(
            "SELECT version, data FROM tournaments ORDER BY date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn save(&self, tournament: &Tournament) -> Result<i64, RepositoryError> {
        let new_version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE tournaments
            SET version = version + 1, name = $3, date = $4, finished = $5, data = $6, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(tournament.id)
        .bind(tournament.version)
        .bind(&tournament.name)
        .bind(tournament.date)
        .bind(tournament.finished)
        .bind(Json(tournament))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(version) = new_version {
            return Ok(version);
        }

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM tournaments WHERE id = $1")
            .bind(tournament.id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Err(RepositoryError::VersionConflict {
                entity: format!("tournament {}", tournament.id),
                expected: tournament.version,
            }),
            None => Err(RepositoryError::NotFound(format!("Tournament {} not found", tournament.id))),
        }
    }
}
