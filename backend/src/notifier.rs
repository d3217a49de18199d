//! Outbound notifications to the chat platform.
//!
//! Delivery is best effort and happens off the caller's path. Failures are
//! logged and never roll back the state change that produced them.

use crate::config::NotifierConfig;
use crate::models::{Participant, Team, Tournament, TournamentPhase};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Notification endpoint returned {0}")]
    Status(u16),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Delivery(err.to_string())
    }
}

/// What caused a tournament summary resync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncReason {
    Registered,
    Unregistered,
    Checkin,
    Checkout,
    TeamsPublished,
    MvpClosed,
    ResultsFinal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantSummary {
    pub user_id: Uuid,
    pub in_waitlist: bool,
    pub has_checkin: bool,
    pub is_caster: bool,
    pub is_mvp: bool,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id,
            in_waitlist: p.in_waitlist,
            has_checkin: p.has_checkin,
            is_caster: p.is_caster,
            is_mvp: p.is_mvp,
        }
    }
}

/// Projection of a tournament sent to the chat platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TournamentSummary {
    pub id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub phase: TournamentPhase,
    pub player_cap: u32,
    pub discord_channel_name: String,
    pub external_message_ref: Option<String>,
    pub participants: Vec<ParticipantSummary>,
    pub teams: Vec<Team>,
}

impl From<&Tournament> for TournamentSummary {
    fn from(t: &Tournament) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            date: t.date,
            phase: t.phase(),
            player_cap: t.player_cap,
            discord_channel_name: t.discord_channel_name.clone(),
            external_message_ref: t.external_message_ref.clone(),
            participants: t.players.iter().map(ParticipantSummary::from).collect(),
            teams: t.teams.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// Refresh the tournament summary message
    TournamentResync {
        reason: ResyncReason,
        summary: TournamentSummary,
    },
    /// Announce the MVP; `winner` is `None` when nobody received a vote
    MvpAnnouncement {
        tournament_id: Uuid,
        winner: Option<Uuid>,
        votes: usize,
        summary: TournamentSummary,
    },
}

impl Notification {
    pub fn resync(reason: ResyncReason, tournament: &Tournament) -> Self {
        Notification::TournamentResync {
            reason,
            summary: TournamentSummary::from(tournament),
        }
    }

    pub fn mvp_announcement(tournament: &Tournament, winner: Option<Uuid>) -> Self {
        let votes = winner
            .and_then(|id| tournament.participant(id))
            .map_or(0, |p| p.mvp_votes.len());
        Notification::MvpAnnouncement {
            tournament_id: tournament.id,
            winner,
            votes,
            summary: TournamentSummary::from(tournament),
        }
    }

    pub fn tournament_id(&self) -> Uuid {
        match self {
            Notification::TournamentResync { summary, .. } => summary.id,
            Notification::MvpAnnouncement { tournament_id, .. } => *tournament_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::TournamentResync { .. } => "tournament_resync",
            Notification::MvpAnnouncement { .. } => "mvp_announcement",
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Hands notifications to a background task that delivers them to the sink
/// one at a time, in the order they were sent.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    /// Spawns the delivery task, so this needs a running Tokio runtime.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sink.notify(&notification).await {
                    error!(
                        tournament_id = %notification.tournament_id(),
                        kind = notification.kind(),
                        error = %e,
                        "Failed to deliver notification"
                    );
                }
            }
        });
        Self { tx }
    }

    /// Queue a notification without waiting for delivery.
    pub fn send(&self, notification: Notification) {
        if let Err(mpsc::error::SendError(dropped)) = self.tx.send(notification) {
            warn!(
                tournament_id = %dropped.tournament_id(),
                kind = dropped.kind(),
                "Notification task has stopped, dropping notification"
            );
        }
    }
}

/// Posts each notification as JSON to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, config: &NotifierConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no webhook is configured
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            tournament_id = %notification.tournament_id(),
            kind = notification.kind(),
            "Notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTournament;

    #[test]
    fn test_notification_is_tagged() {
        let tournament = Tournament::new(NewTournament {
            name: "Cup".to_string(),
            game_id: Uuid::new_v4(),
            date: Utc::now(),
            player_cap: 8,
            discord_channel_name: "cup".to_string(),
            description: None,
            external_bracket_id: None,
        });
        let json = serde_json::to_value(Notification::resync(ResyncReason::Checkin, &tournament)).unwrap();
        assert_eq!(json["type"], "TournamentResync");
        assert_eq!(json["reason"], "checkin");
        assert_eq!(json["summary"]["phase"], "registering");

        let announcement = Notification::mvp_announcement(&tournament, None);
        assert_eq!(announcement.tournament_id(), tournament.id);
        assert!(matches!(announcement, Notification::MvpAnnouncement { votes: 0, .. }));
    }
}
