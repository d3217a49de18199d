//! Arena Ledger Library
//!
//! Tournament lifecycle (registration, check-in, teams, MVP voting) and the
//! virtual-currency ledger behind rewards and match bets.

pub mod bracket;
pub mod clips;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod notifier;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use bracket::{BracketProvider, ChallongeClient, UnconfiguredProvider};
use database::Database;
use notifier::{LogNotifier, NotificationSink, WebhookNotifier};
use repositories::*;
use services::{LedgerService, RewardIssuer, TournamentService, WagerService};
use std::sync::Arc;
use tracing::warn;

/// Application state containing all services
pub struct AppState {
    pub database: Option<Database>,
    pub ledger: Arc<LedgerService>,
    pub rewards: Arc<RewardIssuer>,
    pub tournaments: Arc<TournamentService>,
    pub wagers: Arc<WagerService>,
}

impl AppState {
    /// Wire services over the given storage and collaborators
    pub fn new(
        config: &AppConfig,
        tournament_repo: Arc<dyn TournamentRepository>,
        ledger_repo: Arc<dyn LedgerRepository>,
        bet_repo: Arc<dyn BetRepository>,
        provider: Arc<dyn BracketProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let ledger = Arc::new(LedgerService::new(ledger_repo));
        let rewards = Arc::new(RewardIssuer::new(ledger.clone(), config.rewards.clone()));
        let tournaments = Arc::new(TournamentService::new(
            tournament_repo.clone(),
            notifier,
            rewards.clone(),
            config.clip_embed_parent.clone(),
        ));
        let wagers = Arc::new(
            WagerService::new(tournament_repo, bet_repo, ledger.clone(), provider)
                .with_claim_lease(config.settlement.claim_lease()),
        );

        Self {
            database: None,
            ledger,
            rewards,
            tournaments,
            wagers,
        }
    }

    /// Postgres-backed state with the configured provider and notifier
    pub fn with_pool(config: &AppConfig, pool: sqlx::PgPool) -> AppResult<Self> {
        let mut state = Self::new(
            config,
            Arc::new(PgTournamentRepository::new(pool.clone())),
            Arc::new(PgLedgerRepository::new(pool.clone())),
            Arc::new(PgBetRepository::new(pool.clone())),
            bracket_provider(config)?,
            notification_sink(config)?,
        );
        state.database = Some(Database::new(pool));
        Ok(state)
    }

    /// State over in-process repositories
    pub fn in_memory(
        config: &AppConfig,
        provider: Arc<dyn BracketProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(MemoryTournamentRepository::new()),
            Arc::new(MemoryLedgerRepository::new()),
            Arc::new(MemoryBetRepository::new()),
            provider,
            notifier,
        )
    }
}

fn bracket_provider(config: &AppConfig) -> AppResult<Arc<dyn BracketProvider>> {
    if !config.bracket.is_configured() {
        warn!("CHALLONGE_API_KEY not set - bracket provider disabled");
        return Ok(Arc::new(UnconfiguredProvider));
    }
    Ok(Arc::new(ChallongeClient::new(&config.bracket)?))
}

fn notification_sink(config: &AppConfig) -> AppResult<Arc<dyn NotificationSink>> {
    match &config.notifier.webhook_url {
        Some(url) => {
            let notifier = WebhookNotifier::new(url.clone(), &config.notifier)
                .map_err(|e| AppError::Config(e.to_string()))?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}
