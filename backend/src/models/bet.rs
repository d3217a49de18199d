use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A wager on the winner of one bracket match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bet {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    /// Match id as reported by the bracket provider
    pub match_id: String,
    /// Already withdrawn from the ledger when the bet was created
    pub amount: i64,
    /// Bracket participant name
    pub predicted_winner: String,
    pub won: bool,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bet {
    /// Create a new Bet
    pub fn new(
        tournament_id: Uuid,
        user_id: Uuid,
        match_id: impl Into<String>,
        predicted_winner: impl Into<String>,
        amount: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            user_id,
            match_id: match_id.into(),
            amount,
            predicted_winner: predicted_winner.into(),
            won: false,
            is_processed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// What a winning bet pays out: the stake back plus the same again.
    pub fn payout(&self) -> Option<i64> {
        self.amount.checked_mul(2)
    }

    pub fn stake_description(&self) -> String {
        format!("Bet on match {} ({})", self.match_id, self.predicted_winner)
    }

    pub fn refund_description(&self) -> String {
        format!("Bet cancelled on match {}", self.match_id)
    }

    pub fn payout_description(&self) -> String {
        format!("Bet won on match {}", self.match_id)
    }

    // Ledger idempotency keys: each money movement of a bet happens once.

    pub fn stake_key(&self) -> String {
        format!("bet:{}:stake", self.id)
    }

    pub fn refund_key(&self) -> String {
        format!("bet:{}:refund", self.id)
    }

    pub fn payout_key(&self) -> String {
        format!("bet:{}:payout", self.id)
    }

    /// Validate that the bet is well formed
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err("Amount must be greater than zero".to_string());
        }
        if self.match_id.trim().is_empty() {
            return Err("Match id is required".to_string());
        }
        if self.predicted_winner.trim().is_empty() {
            return Err("Predicted winner is required".to_string());
        }
        Ok(())
    }
}

/// Outcome of one `settle_matches` run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementReport {
    pub tournament_id: Uuid,
    pub matches_settled: usize,
    /// Complete matches left for a later run (claimed elsewhere, no winner, or failed)
    pub matches_skipped: usize,
    pub bets_won: usize,
    pub bets_lost: usize,
    pub total_paid_out: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_keys_are_distinct() {
        let bet = Bet::new(Uuid::new_v4(), Uuid::new_v4(), "42", "Team Rocket", 100);
        assert_ne!(bet.stake_key(), bet.refund_key());
        assert_ne!(bet.stake_key(), bet.payout_key());
        assert_ne!(bet.stake_description(), bet.refund_description());
        assert_eq!(bet.payout(), Some(200));
    }

    #[test]
    fn test_validate() {
        let mut bet = Bet::new(Uuid::new_v4(), Uuid::new_v4(), "42", "Team Rocket", 100);
        assert!(bet.validate().is_ok());
        bet.amount = 0;
        assert!(bet.validate().is_err());
        bet.amount = 10;
        bet.predicted_winner = "  ".to_string();
        assert!(bet.validate().is_err());
    }
}
