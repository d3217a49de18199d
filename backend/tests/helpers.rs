#![allow(dead_code)]

use arena_ledger::bracket::{BracketProvider, ProviderError};
use arena_ledger::models::*;
use arena_ledger::notifier::{Notification, NotificationSink, NotifyError};
use arena_ledger::{AppConfig, AppState};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const BRACKET_ID: &str = "spring_cup";

/// Bracket provider whose matches are driven by the test
pub struct FakeBracketProvider {
    matches: Mutex<Vec<BracketMatch>>,
    participants: Vec<BracketParticipant>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeBracketProvider {
    /// Two contenders, "Red" (id 1) and "Blue" (id 2)
    pub fn new() -> Self {
        Self {
            matches: Mutex::new(Vec::new()),
            participants: vec![
                BracketParticipant { id: "1".to_string(), name: "Red".to_string() },
                BracketParticipant { id: "2".to_string(), name: "Blue".to_string() },
            ],
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn add_match(&self, id: &str) {
        self.matches.lock().unwrap().push(BracketMatch {
            id: id.to_string(),
            state: MatchState::Pending,
            winner_participant_id: None,
            participant_ids: vec!["1".to_string(), "2".to_string()],
        });
    }

    pub fn start_match(&self, id: &str) {
        self.update(id, |m| m.state = MatchState::Started);
    }

    pub fn complete_match(&self, id: &str, winner: &str) {
        let winner_id = self
            .participants
            .iter()
            .find(|p| p.name == winner)
            .map(|p| p.id.clone());
        self.update(id, |m| {
            m.state = MatchState::Complete;
            m.winner_participant_id = winner_id.clone();
        });
    }

    /// Complete a match without a usable winner
    pub fn complete_without_winner(&self, id: &str) {
        self.update(id, |m| {
            m.state = MatchState::Complete;
            m.winner_participant_id = None;
        });
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn update(&self, id: &str, f: impl Fn(&mut BracketMatch)) {
        let mut matches = self.matches.lock().unwrap();
        let m = matches.iter_mut().find(|m| m.id == id).expect("unknown match");
        f(m);
    }

    fn check(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BracketProvider for FakeBracketProvider {
    async fn get_matches(&self, _bracket_id: &str) -> Result<Vec<BracketMatch>, ProviderError> {
        self.check()?;
        Ok(self.matches.lock().unwrap().clone())
    }

    async fn get_participants(&self, _bracket_id: &str) -> Result<Vec<BracketParticipant>, ProviderError> {
        self.check()?;
        Ok(self.participants.clone())
    }
}

/// Notification sink that keeps everything it is sent
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background delivery until `done` holds for what was sent.
    pub async fn wait_until(&self, done: impl Fn(&[Notification]) -> bool) -> Vec<Notification> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let sent = self.sent();
                if done(&sent) {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Timed out waiting for notifications")
    }

    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        self.wait_until(|sent| sent.len() >= count).await
    }

    /// Wait until `count` deliveries were attempted, failed ones included.
    pub async fn wait_for_attempts(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.attempts.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Timed out waiting for delivery attempts")
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let _attempt = AttemptGuard(&self.attempts);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Status(500));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Counts an attempt once the delivery call has finished
struct AttemptGuard<'a>(&'a AtomicUsize);

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory application with fake collaborators
pub struct TestApp {
    pub state: AppState,
    pub provider: Arc<FakeBracketProvider>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        let provider = Arc::new(FakeBracketProvider::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = AppConfig::default();
        let state = AppState::in_memory(&config, provider.clone(), notifier.clone());
        Self {
            state,
            provider,
            notifier,
        }
    }

    pub async fn create_tournament(&self, player_cap: u32) -> Tournament {
        self.state
            .tournaments
            .create(new_tournament(player_cap, None))
            .await
            .expect("Failed to create tournament")
    }

    /// Tournament linked to the fake bracket
    pub async fn create_bracket_tournament(&self) -> Tournament {
        self.state
            .tournaments
            .create(new_tournament(0, Some(BRACKET_ID)))
            .await
            .expect("Failed to create tournament")
    }

    /// A new user holding `amount` points
    pub async fn funded_user(&self, amount: i64) -> Uuid {
        let user = Uuid::new_v4();
        self.state
            .ledger
            .credit(user, amount, "test funding")
            .await
            .expect("Failed to fund user");
        user
    }

    pub async fn balance(&self, user_id: Uuid) -> i64 {
        self.state.ledger.balance(user_id).await.expect("Failed to read balance")
    }
}

pub fn new_tournament(player_cap: u32, bracket_id: Option<&str>) -> NewTournament {
    NewTournament {
        name: "Spring Cup".to_string(),
        game_id: Uuid::new_v4(),
        date: Utc::now(),
        player_cap,
        discord_channel_name: "spring-cup".to_string(),
        description: Some("Weekly community cup".to_string()),
        external_bracket_id: bracket_id.map(str::to_string),
    }
}
