pub mod bet_repository;
pub mod ledger_repository;
pub mod memory;
pub mod tournament_repository;

// Re-export all repositories for convenient access
pub use bet_repository::PgBetRepository;
pub use ledger_repository::PgLedgerRepository;
pub use memory::{MemoryBetRepository, MemoryLedgerRepository, MemoryTournamentRepository};
pub use tournament_repository::PgTournamentRepository;

use crate::error::RepositoryError;
use crate::models::{Bet, LedgerAccount, LedgerTransaction, Posting, PostingOutcome, Tournament};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Whole-aggregate storage for tournaments
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn insert(&self, tournament: &Tournament) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tournament>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Tournament>, RepositoryError>;

    /// Persist the aggregate if the stored version still equals
    /// `tournament.version`. Returns the new version.
    async fn save(&self, tournament: &Tournament) -> Result<i64, RepositoryError>;
}

/// Balance after applying `posting` to `current`.
///
/// Rejects postings that would overflow or drive the balance below zero.
pub(crate) fn balance_after(current: &LedgerAccount, posting: &Posting) -> Result<i64, RepositoryError> {
    let balance = current.balance.checked_add(posting.amount).ok_or_else(|| {
        RepositoryError::InvalidInput(format!(
            "Posting of {} overflows the balance of {}",
            posting.amount, posting.user_id
        ))
    })?;
    if balance < 0 {
        return Err(RepositoryError::InsufficientFunds {
            available: current.balance,
            required: posting.amount.saturating_neg(),
        });
    }
    Ok(balance)
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn get_or_create(&self, user_id: Uuid) -> Result<LedgerAccount, RepositoryError>;

    /// Apply a signed posting atomically with its transaction record.
    ///
    /// Fails with `InsufficientFunds` if the balance would go negative. A
    /// posting whose idempotency key was already used is a `Duplicate`.
    async fn post(&self, posting: &Posting) -> Result<PostingOutcome, RepositoryError>;

    /// Most recent first
    async fn transactions(&self, user_id: Uuid, limit: i64) -> Result<Vec<LedgerTransaction>, RepositoryError>;
}

#[async_trait]
pub trait BetRepository: Send + Sync {
    /// `Duplicate` if the user already has a bet on the match
    async fn insert(&self, bet: &Bet) -> Result<(), RepositoryError>;

    async fn find(&self, tournament_id: Uuid, user_id: Uuid, match_id: &str) -> Result<Option<Bet>, RepositoryError>;

    /// Edit an unprocessed bet in place
    async fn update_prediction(&self, bet_id: Uuid, predicted_winner: &str, amount: i64) -> Result<Bet, RepositoryError>;

    async fn delete(&self, bet_id: Uuid) -> Result<bool, RepositoryError>;

    async fn find_by_user(&self, tournament_id: Uuid, user_id: Uuid) -> Result<Vec<Bet>, RepositoryError>;

    async fn find_unprocessed_by_match(&self, tournament_id: Uuid, match_id: &str) -> Result<Vec<Bet>, RepositoryError>;

    async fn tournaments_with_open_bets(&self) -> Result<Vec<Uuid>, RepositoryError>;

    /// Take the settlement claim for a match. A claim can be re-taken once it
    /// is completed or older than `lease`.
    async fn try_claim_match(&self, tournament_id: Uuid, match_id: &str, lease: Duration) -> Result<bool, RepositoryError>;

    /// Mark the given bets processed with their outcome and complete the
    /// claim, in one atomic step.
    async fn complete_match(
        &self,
        tournament_id: Uuid,
        match_id: &str,
        results: &[(Uuid, bool)],
    ) -> Result<(), RepositoryError>;

    async fn release_match(&self, tournament_id: Uuid, match_id: &str) -> Result<(), RepositoryError>;
}
