//! Domain models for the arena backend.
//!
//! Tournaments are aggregates persisted as a whole; bets and ledger entries
//! are rows keyed for idempotent money movement.

pub mod bet;
pub mod bracket;
pub mod ledger;
pub mod reward;
pub mod tournament;

// Re-export all models for convenient access
pub use bet::{Bet, SettlementReport};
pub use bracket::{BracketMatch, BracketParticipant, MatchState};
pub use ledger::{LedgerAccount, LedgerTransaction, Posting, PostingOutcome};
pub use reward::{GrantOutcome, RewardTable};
pub use tournament::{
    Clip, NewTournament, Participant, Placement, Team, TeamPatch, Tournament, TournamentPatch,
    TournamentPhase,
};
