//! Tournament lifecycle commands.
//!
//! Each command loads the aggregate, applies itself in memory and saves with
//! the version it loaded. A version conflict reloads and re-applies the
//! command, up to [`MAX_SAVE_ATTEMPTS`] times.

use super::{PlacementAward, RewardIssuer};
use crate::clips::normalize_clip_url;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{
    Clip, NewTournament, Participant, Placement, Team, TeamPatch, Tournament, TournamentPatch,
};
use crate::notifier::{Notification, NotificationDispatcher, NotificationSink, ResyncReason};
use crate::repositories::TournamentRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_SAVE_ATTEMPTS: usize = 3;

pub struct TournamentService {
    repo: Arc<dyn TournamentRepository>,
    notifications: NotificationDispatcher,
    rewards: Arc<RewardIssuer>,
    clip_embed_parent: String,
}

impl TournamentService {
    pub fn new(
        repo: Arc<dyn TournamentRepository>,
        notifier: Arc<dyn NotificationSink>,
        rewards: Arc<RewardIssuer>,
        clip_embed_parent: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            notifications: NotificationDispatcher::spawn(notifier),
            rewards,
            clip_embed_parent: clip_embed_parent.into(),
        }
    }

    pub async fn create(&self, input: NewTournament) -> AppResult<Tournament> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation("Tournament name cannot be empty".to_string()));
        }
        if input.discord_channel_name.trim().is_empty() {
            return Err(AppError::Validation("Channel name cannot be empty".to_string()));
        }

        let tournament = Tournament::new(input);
        self.repo.insert(&tournament).await?;
        info!(tournament_id = %tournament.id, name = %tournament.name, "Tournament created");
        Ok(tournament)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Tournament> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tournament {} not found", id)))
    }

    /// Most recent first
    pub async fn list(&self) -> AppResult<Vec<Tournament>> {
        Ok(self.repo.list().await?)
    }

    pub async fn register(&self, id: Uuid, user_id: Uuid, as_caster: bool) -> AppResult<Participant> {
        let (tournament, participant) = self
            .mutate(id, |t| t.register(user_id, as_caster, Utc::now()).cloned())
            .await?;

        info!(
            tournament_id = %id,
            user_id = %user_id,
            waitlisted = participant.in_waitlist,
            "Participant registered"
        );
        self.notify(Notification::resync(ResyncReason::Registered, &tournament));
        Ok(participant)
    }

    /// Does not promote anyone from the waitlist.
    pub async fn unregister(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Participant>> {
        let (tournament, removed) = self.mutate(id, |t| Ok(t.unregister(user_id))).await?;

        if removed.is_some() {
            info!(tournament_id = %id, user_id = %user_id, "Participant unregistered");
            self.notify(Notification::resync(ResyncReason::Unregistered, &tournament));
        }
        Ok(removed)
    }

    /// Returns false if the user is not registered.
    pub async fn checkin(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        self.set_checkin(id, user_id, true).await
    }

    pub async fn checkout(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        self.set_checkin(id, user_id, false).await
    }

    async fn set_checkin(&self, id: Uuid, user_id: Uuid, checked_in: bool) -> AppResult<bool> {
        let (tournament, found) = self
            .mutate(id, |t| Ok(t.set_checkin(user_id, checked_in)))
            .await?;

        if found {
            let reason = if checked_in {
                ResyncReason::Checkin
            } else {
                ResyncReason::Checkout
            };
            self.notify(Notification::resync(reason, &tournament));
        }
        Ok(found)
    }

    pub async fn open_checkin(&self, id: Uuid) -> AppResult<Tournament> {
        let (tournament, ()) = self.mutate(id, |t| t.open_checkin()).await?;
        info!(tournament_id = %id, "Check-in opened");
        Ok(tournament)
    }

    pub async fn close_checkin(&self, id: Uuid) -> AppResult<Tournament> {
        let (tournament, ()) = self
            .mutate(id, |t| {
                t.close_checkin();
                Ok(())
            })
            .await?;
        info!(tournament_id = %id, "Check-in closed");
        Ok(tournament)
    }

    pub async fn add_clip(&self, id: Uuid, user_id: Uuid, raw_url: &str) -> AppResult<Clip> {
        let url = normalize_clip_url(raw_url, &self.clip_embed_parent)?;
        let (_, clip) = self
            .mutate(id, |t| Ok(t.add_clip(url.clone(), user_id, Utc::now()).clone()))
            .await?;
        info!(tournament_id = %id, user_id = %user_id, url = %clip.url, "Clip added");
        Ok(clip)
    }

    pub async fn vote_mvp(&self, id: Uuid, voter_id: Uuid, candidate_id: Uuid) -> AppResult<()> {
        self.mutate(id, |t| t.vote_mvp(voter_id, candidate_id)).await?;
        info!(tournament_id = %id, voter_id = %voter_id, candidate_id = %candidate_id, "MVP vote cast");
        Ok(())
    }

    /// Close the ballot and announce the result. Returns the winner, if any.
    pub async fn close_mvp_voting(&self, id: Uuid) -> AppResult<Option<Uuid>> {
        let (tournament, winner) = self.mutate(id, |t| Ok(t.close_mvp_voting())).await?;

        info!(tournament_id = %id, winner = ?winner, "MVP voting closed");
        self.notify(Notification::mvp_announcement(&tournament, winner));
        self.notify(Notification::resync(ResyncReason::MvpClosed, &tournament));
        Ok(winner)
    }

    pub async fn draft_teams(&self, id: Uuid, teams: Vec<Team>) -> AppResult<Tournament> {
        let (tournament, ()) = self.mutate(id, |t| t.draft_teams(teams.clone())).await?;
        info!(tournament_id = %id, teams = tournament.teams.len(), "Teams drafted");
        Ok(tournament)
    }

    /// Replace the team list wholesale and publish it.
    pub async fn publish_teams(&self, id: Uuid, teams: Vec<Team>) -> AppResult<Tournament> {
        let (tournament, ()) = self.mutate(id, |t| t.publish_teams(teams.clone())).await?;
        info!(tournament_id = %id, teams = tournament.teams.len(), "Teams published");
        self.notify(Notification::resync(ResyncReason::TeamsPublished, &tournament));
        Ok(tournament)
    }

    pub async fn finish(&self, id: Uuid) -> AppResult<Tournament> {
        let (tournament, ()) = self.mutate(id, |t| t.finish()).await?;
        info!(tournament_id = %id, "Tournament finished");
        self.notify(Notification::resync(ResyncReason::ResultsFinal, &tournament));
        Ok(tournament)
    }

    pub async fn update_participant(
        &self,
        id: Uuid,
        user_id: Uuid,
        tier: Option<String>,
        description: Option<String>,
    ) -> AppResult<Participant> {
        let (_, participant) = self
            .mutate(id, |t| {
                t.update_participant(user_id, tier.clone(), description.clone())
                    .cloned()
            })
            .await?;
        Ok(participant)
    }

    pub async fn update_team(&self, id: Uuid, old_name: &str, patch: TeamPatch) -> AppResult<Team> {
        let (_, team) = self
            .mutate(id, |t| t.update_team(old_name, patch.clone()).cloned())
            .await?;
        info!(tournament_id = %id, team = %old_name, "Team updated");
        Ok(team)
    }

    pub async fn update_details(&self, id: Uuid, patch: TournamentPatch) -> AppResult<Tournament> {
        let (tournament, ()) = self.mutate(id, |t| t.apply_patch(patch.clone())).await?;
        info!(tournament_id = %id, "Tournament details updated");
        Ok(tournament)
    }

    pub async fn placement(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Placement>> {
        Ok(self.get(id).await?.placement(user_id))
    }

    /// Grant participation and placement rewards of a finished tournament.
    pub async fn award_placements(&self, id: Uuid) -> AppResult<Vec<PlacementAward>> {
        let tournament = self.get(id).await?;
        self.rewards.award_placements(&tournament).await
    }

    /// Load, apply `command`, save. Unchanged aggregates are not written.
    async fn mutate<T, F>(&self, id: Uuid, mut command: F) -> AppResult<(Tournament, T)>
    where
        F: FnMut(&mut Tournament) -> AppResult<T>,
    {
        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let loaded = self.get(id).await?;
            let mut tournament = loaded.clone();
            let output = command(&mut tournament)?;
            if tournament == loaded {
                return Ok((tournament, output));
            }

            match self.repo.save(&tournament).await {
                Ok(version) => {
                    tournament.version = version;
                    return Ok((tournament, output));
                }
                Err(RepositoryError::VersionConflict { expected, .. }) => {
                    warn!(tournament_id = %id, attempt, expected, "Tournament modified concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(format!(
            "Tournament {} is being modified concurrently, gave up after {} attempts",
            id, MAX_SAVE_ATTEMPTS
        )))
    }

    fn notify(&self, notification: Notification) {
        self.notifications.send(notification);
    }
}
