//! In-process repositories with the same semantics as the Postgres ones.
//! Used by tests and by local runs without a database.

use super::{balance_after, BetRepository, LedgerRepository, TournamentRepository};
use crate::error::RepositoryError;
use crate::models::{Bet, LedgerAccount, LedgerTransaction, Posting, PostingOutcome, Tournament};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryTournamentRepository {
    tournaments: RwLock<HashMap<Uuid, Tournament>>,
}

impl MemoryTournamentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentRepository for MemoryTournamentRepository {
    async fn insert(&self, tournament: &Tournament) -> Result<(), RepositoryError> {
        let mut tournaments = self.tournaments.write().await;
        if tournaments.contains_key(&tournament.id) {
            return Err(RepositoryError::Duplicate(format!("Tournament {}", tournament.id)));
        }
        tournaments.insert(tournament.id, tournament.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tournament>, RepositoryError> {
        Ok(self.tournaments.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Tournament>, RepositoryError> {
        let mut all: Vec<Tournament> = self.tournaments.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(all)
    }

    async fn save(&self, tournament: &Tournament) -> Result<i64, RepositoryError> {
        let mut tournaments = self.tournaments.write().await;
        let stored = tournaments
            .get_mut(&tournament.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Tournament {} not found", tournament.id)))?;

        if stored.version != tournament.version {
            return Err(RepositoryError::VersionConflict {
                entity: format!("tournament {}", tournament.id),
                expected: tournament.version,
            });
        }

        let mut next = tournament.clone();
        next.version += 1;
        *stored = next;
        Ok(stored.version)
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Uuid, LedgerAccount>,
    transactions: Vec<LedgerTransaction>,
    keys: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryLedgerRepository {
    state: Mutex<LedgerState>,
}

impl MemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn get_or_create(&self, user_id: Uuid) -> Result<LedgerAccount, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .accounts
            .entry(user_id)
            .or_insert_with(|| LedgerAccount::empty(user_id))
            .clone())
    }

    async fn post(&self, posting: &Posting) -> Result<PostingOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        let current = state
            .accounts
            .entry(posting.user_id)
            .or_insert_with(|| LedgerAccount::empty(posting.user_id))
            .clone();

        if let Some(key) = &posting.idempotency_key {
            if state.keys.contains(key) {
                return Ok(PostingOutcome::Duplicate(current));
            }
        }

        let balance = balance_after(&current, posting)?;

        let now = Utc::now();
        if let Some(key) = &posting.idempotency_key {
            state.keys.insert(key.clone());
        }
        state.transactions.push(LedgerTransaction {
            id: Uuid::new_v4(),
            user_id: posting.user_id,
            amount: posting.amount,
            description: posting.description.clone(),
            idempotency_key: posting.idempotency_key.clone(),
            created_at: now,
        });

        let account = LedgerAccount {
            user_id: posting.user_id,
            balance,
            updated_at: now,
        };
        state.accounts.insert(posting.user_id, account.clone());
        Ok(PostingOutcome::Applied(account))
    }

    async fn transactions(&self, user_id: Uuid, limit: i64) -> Result<Vec<LedgerTransaction>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

struct Claim {
    claimed_at: Instant,
    completed: bool,
}

#[derive(Default)]
struct BetState {
    bets: HashMap<Uuid, Bet>,
    claims: HashMap<(Uuid, String), Claim>,
}

#[derive(Default)]
pub struct MemoryBetRepository {
    state: Mutex<BetState>,
}

impl MemoryBetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BetRepository for MemoryBetRepository {
    async fn insert(&self, bet: &Bet) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let taken = state.bets.values().any(|b| {
            b.tournament_id == bet.tournament_id && b.user_id == bet.user_id && b.match_id == bet.match_id
        });
        if taken || state.bets.contains_key(&bet.id) {
            return Err(RepositoryError::Duplicate(format!(
                "Bet by {} on match {}",
                bet.user_id, bet.match_id
            )));
        }
        state.bets.insert(bet.id, bet.clone());
        Ok(())
    }

    async fn find(&self, tournament_id: Uuid, user_id: Uuid, match_id: &str) -> Result<Option<Bet>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .bets
            .values()
            .find(|b| b.tournament_id == tournament_id && b.user_id == user_id && b.match_id == match_id)
            .cloned())
    }

    async fn update_prediction(&self, bet_id: Uuid, predicted_winner: &str, amount: i64) -> Result<Bet, RepositoryError> {
        let mut state = self.state.lock().await;
        let bet = state
            .bets
            .get_mut(&bet_id)
            .filter(|b| !b.is_processed)
            .ok_or_else(|| RepositoryError::NotFound(format!("Open bet {} not found", bet_id)))?;
        bet.predicted_winner = predicted_winner.to_string();
        bet.amount = amount;
        bet.updated_at = Utc::now();
        Ok(bet.clone())
    }

    async fn delete(&self, bet_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.bets.remove(&bet_id).is_some())
    }

    async fn find_by_user(&self, tournament_id: Uuid, user_id: Uuid) -> Result<Vec<Bet>, RepositoryError> {
        let state = self.state.lock().await;
        let mut bets: Vec<Bet> = state
            .bets
            .values()
            .filter(|b| b.tournament_id == tournament_id && b.user_id == user_id)
            .cloned()
            .collect();
        bets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bets)
    }

    async fn find_unprocessed_by_match(&self, tournament_id: Uuid, match_id: &str) -> Result<Vec<Bet>, RepositoryError> {
        let state = self.state.lock().await;
        let mut bets: Vec<Bet> = state
            .bets
            .values()
            .filter(|b| b.tournament_id == tournament_id && b.match_id == match_id && !b.is_processed)
            .cloned()
            .collect();
        bets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(bets)
    }

    async fn tournaments_with_open_bets(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let state = self.state.lock().await;
        let ids: HashSet<Uuid> = state
            .bets
            .values()
            .filter(|b| !b.is_processed)
            .map(|b| b.tournament_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn try_claim_match(&self, tournament_id: Uuid, match_id: &str, lease: Duration) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let key = (tournament_id, match_id.to_string());
        let now = Instant::now();
        match state.claims.get_mut(&key) {
            Some(claim) if !claim.completed && now.duration_since(claim.claimed_at) < lease => Ok(false),
            Some(claim) => {
                claim.claimed_at = now;
                claim.completed = false;
                Ok(true)
            }
            None => {
                state.claims.insert(
                    key,
                    Claim {
                        claimed_at: now,
                        completed: false,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn complete_match(
        &self,
        tournament_id: Uuid,
        match_id: &str,
        results: &[(Uuid, bool)],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        for (bet_id, won) in results {
            if let Some(bet) = state.bets.get_mut(bet_id).filter(|b| !b.is_processed) {
                bet.won = *won;
                bet.is_processed = true;
                bet.updated_at = now;
            }
        }
        if let Some(claim) = state.claims.get_mut(&(tournament_id, match_id.to_string())) {
            claim.completed = true;
        }
        Ok(())
    }

    async fn release_match(&self, tournament_id: Uuid, match_id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let key = (tournament_id, match_id.to_string());
        if state.claims.get(&key).is_some_and(|c| !c.completed) {
            state.claims.remove(&key);
        }
        Ok(())
    }
}
