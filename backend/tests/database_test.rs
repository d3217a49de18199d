//! Postgres-backed repository tests. They need `DATABASE_URL` pointing at a
//! server where `sqlx::test` may create scratch databases:
//!
//! ```text
//! cargo test --test database_test -- --ignored
//! ```

mod helpers;

use arena_ledger::error::RepositoryError;
use arena_ledger::models::*;
use arena_ledger::repositories::*;
use helpers::*;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Migration Tests
// ============================================================================

#[sqlx::test]
#[ignore]
async fn test_migrations_ran(pool: PgPool) {
    let tables = ["tournaments", "ledger_accounts", "ledger_transactions", "bets", "settlement_claims"];

    for table in tables {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        let exists: bool = row.get(0);
        assert!(exists, "Table {} should exist", table);
    }
}

// ============================================================================
// Tournament Repository Tests
// ============================================================================

#[sqlx::test]
#[ignore]
async fn test_tournament_round_trip_and_version(pool: PgPool) {
    let repo = PgTournamentRepository::new(pool);
    let mut tournament = Tournament::new(new_tournament(8, Some(BRACKET_ID)));
    repo.insert(&tournament).await.unwrap();

    let user = Uuid::new_v4();
    tournament.register(user, false, chrono::Utc::now()).unwrap();
    assert_eq!(repo.save(&tournament).await.unwrap(), 1);

    let loaded = repo.find_by_id(tournament.id).await.unwrap().unwrap();
    assert_eq!(loaded.version, 1);
    assert!(loaded.participant(user).is_some());
    assert_eq!(loaded.external_bracket_id.as_deref(), Some(BRACKET_ID));

    // saving the stale copy again must not overwrite the newer row
    let err = repo.save(&tournament).await.unwrap_err();
    assert!(matches!(err, RepositoryError::VersionConflict { expected: 0, .. }));

    let mut missing = Tournament::new(new_tournament(0, None));
    missing.version = 3;
    assert!(matches!(repo.save(&missing).await, Err(RepositoryError::NotFound(_))));
}

// ============================================================================
// Ledger Repository Tests
// ============================================================================

#[sqlx::test]
#[ignore]
async fn test_ledger_postings(pool: PgPool) {
    let repo = PgLedgerRepository::new(pool);
    let user = Uuid::new_v4();

    assert_eq!(repo.get_or_create(user).await.unwrap().balance, 0);

    let applied = repo
        .post(&Posting::credit(user, 100, "dailyquiz | participation").with_key("reward:x"))
        .await
        .unwrap();
    assert_eq!(applied.account().balance, 100);

    let duplicate = repo
        .post(&Posting::credit(user, 100, "dailyquiz | participation").with_key("reward:x"))
        .await
        .unwrap();
    assert!(!duplicate.is_applied());
    assert_eq!(duplicate.account().balance, 100);

    let err = repo.post(&Posting::debit(user, 150, "stake")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InsufficientFunds { available: 100, required: 150 }));

    repo.post(&Posting::debit(user, 40, "stake")).await.unwrap();
    let history = repo.transactions(user, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(repo.get_or_create(user).await.unwrap().balance, 60);
}

// ============================================================================
// Bet Repository Tests
// ============================================================================

#[sqlx::test]
#[ignore]
async fn test_bets_and_settlement_claims(pool: PgPool) {
    let tournaments = PgTournamentRepository::new(pool.clone());
    let repo = PgBetRepository::new(pool);
    let tournament = Tournament::new(new_tournament(0, Some(BRACKET_ID)));
    tournaments.insert(&tournament).await.unwrap();

    let user = Uuid::new_v4();
    let bet = Bet::new(tournament.id, user, "m1", "Red", 100);
    repo.insert(&bet).await.unwrap();

    let duplicate = Bet::new(tournament.id, user, "m1", "Blue", 50);
    assert!(matches!(repo.insert(&duplicate).await, Err(RepositoryError::Duplicate(_))));

    let edited = repo.update_prediction(bet.id, "Blue", 150).await.unwrap();
    assert_eq!(edited.predicted_winner, "Blue");
    assert_eq!(repo.tournaments_with_open_bets().await.unwrap(), vec![tournament.id]);

    let lease = Duration::from_secs(300);
    assert!(repo.try_claim_match(tournament.id, "m1", lease).await.unwrap());
    assert!(!repo.try_claim_match(tournament.id, "m1", lease).await.unwrap());

    repo.complete_match(tournament.id, "m1", &[(bet.id, true)]).await.unwrap();
    assert!(repo.find_unprocessed_by_match(tournament.id, "m1").await.unwrap().is_empty());
    let settled = repo.find(tournament.id, user, "m1").await.unwrap().unwrap();
    assert!(settled.is_processed && settled.won);
    assert!(repo.update_prediction(bet.id, "Red", 10).await.is_err());

    assert!(repo.delete(bet.id).await.unwrap());
    assert!(!repo.delete(bet.id).await.unwrap());
}
