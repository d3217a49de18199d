//! Activity rewards, granted at most once per user and calendar day

use super::LedgerService;
use crate::error::{AppError, AppResult};
use crate::models::reward::{
    reward_description, reward_key, GrantOutcome, RewardTable, FIRST_PLACE, PARTICIPATION, TOP25,
    TOURNAMENTS,
};
use crate::models::{Placement, Tournament};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementAward {
    pub user_id: Uuid,
    pub reward: &'static str,
    pub outcome: GrantOutcome,
}

pub struct RewardIssuer {
    ledger: Arc<LedgerService>,
    table: RewardTable,
}

impl RewardIssuer {
    pub fn new(ledger: Arc<LedgerService>, table: RewardTable) -> Self {
        Self { ledger, table }
    }

    pub fn table(&self) -> &RewardTable {
        &self.table
    }

    /// Grant a reward for today's local calendar day.
    pub async fn grant(&self, user_id: Uuid, activity: &str, reward: &str) -> AppResult<GrantOutcome> {
        self.grant_on(user_id, activity, reward, Local::now().date_naive())
            .await
    }

    pub async fn grant_on(
        &self,
        user_id: Uuid,
        activity: &str,
        reward: &str,
        day: NaiveDate,
    ) -> AppResult<GrantOutcome> {
        let Some(points) = self.table.points(activity, reward) else {
            debug!(activity, reward, "Unknown reward, nothing granted");
            return Ok(GrantOutcome::UnknownReward);
        };

        let outcome = self
            .ledger
            .credit_once(
                user_id,
                points,
                &reward_description(activity, reward),
                reward_key(user_id, activity, reward, day),
            )
            .await?;

        if outcome.is_applied() {
            info!(user_id = %user_id, activity, reward, points, "Reward granted");
            Ok(GrantOutcome::Granted(points))
        } else {
            Ok(GrantOutcome::AlreadyGranted)
        }
    }

    /// Grant participation and placement rewards for a finished tournament.
    ///
    /// Grants are keyed on the tournament's day, so repeating this is a no-op.
    pub async fn award_placements(&self, tournament: &Tournament) -> AppResult<Vec<PlacementAward>> {
        if !tournament.finished {
            return Err(AppError::InvalidState(format!(
                "Tournament {} is not finished",
                tournament.id
            )));
        }

        let day = tournament.date.with_timezone(&Local).date_naive();
        let mut users: BTreeSet<Uuid> = tournament
            .players
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.user_id)
            .collect();
        users.extend(tournament.teams.iter().flat_map(|t| t.users.iter().copied()));

        let mut awards = Vec::new();
        for user_id in users {
            let active = tournament.participant(user_id).is_some_and(|p| p.is_active());
            let mut rewards = Vec::new();
            if active {
                rewards.push(PARTICIPATION);
            }
            match tournament.placement(user_id) {
                Some(Placement::Winner) => rewards.push(FIRST_PLACE),
                Some(Placement::TopBracket) => rewards.push(TOP25),
                _ => {}
            }

            for reward_type in rewards {
                let outcome = self
                    .grant_on(user_id, TOURNAMENTS, reward_type, day)
                    .await?;
                awards.push(PlacementAward {
                    user_id,
                    reward: reward_type,
                    outcome,
                });
            }
        }

        info!(
            tournament_id = %tournament.id,
            grants = awards.len(),
            "Tournament rewards processed"
        );
        Ok(awards)
    }
}
