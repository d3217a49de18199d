//! Data contracts of the external bracket provider

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Pending,
    Started,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketMatch {
    pub id: String,
    pub state: MatchState,
    pub winner_participant_id: Option<String>,
    pub participant_ids: Vec<String>,
}

impl BracketMatch {
    /// Underway or complete; bets are frozen from this point on.
    pub fn has_started(&self) -> bool {
        matches!(self.state, MatchState::Started | MatchState::Complete)
    }

    pub fn is_complete(&self) -> bool {
        self.state == MatchState::Complete
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketParticipant {
    pub id: String,
    pub name: String,
}

/// Resolve the winner's display name for a match.
pub fn winner_name<'a>(m: &BracketMatch, participants: &'a [BracketParticipant]) -> Option<&'a str> {
    let winner_id = m.winner_participant_id.as_deref()?;
    participants
        .iter()
        .find(|p| p.id == winner_id)
        .map(|p| p.name.as_str())
}
