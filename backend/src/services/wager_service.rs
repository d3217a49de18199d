use super::LedgerService;
use crate::bracket::BracketProvider;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::bracket::winner_name;
use crate::models::{Bet, BracketMatch, BracketParticipant, SettlementReport, Tournament};
use crate::repositories::{BetRepository, TournamentRepository};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Service for per-match bets backed by the ledger
pub struct WagerService {
    tournaments: Arc<dyn TournamentRepository>,
    bets: Arc<dyn BetRepository>,
    ledger: Arc<LedgerService>,
    provider: Arc<dyn BracketProvider>,
    claim_lease: Duration,
}

/// Totals for one settled match
struct MatchOutcome {
    results: Vec<(Uuid, bool)>,
    won: usize,
    lost: usize,
    paid_out: i64,
}

impl WagerService {
    pub fn new(
        tournaments: Arc<dyn TournamentRepository>,
        bets: Arc<dyn BetRepository>,
        ledger: Arc<LedgerService>,
        provider: Arc<dyn BracketProvider>,
    ) -> Self {
        Self {
            tournaments,
            bets,
            ledger,
            provider,
            claim_lease: Duration::from_secs(300),
        }
    }

    /// Set how long a settlement claim is honored before another run may take it
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    /// Place a bet, or edit the caller's open bet on the same match.
    ///
    /// The stake is withdrawn when the bet is created. Editing changes the
    /// prediction and amount without another withdrawal.
    pub async fn place_bet(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        match_id: &str,
        predicted_winner: &str,
        amount: i64,
    ) -> AppResult<Bet> {
        if amount <= 0 {
            return Err(AppError::Validation("Amount must be greater than zero".to_string()));
        }
        let predicted_winner = predicted_winner.trim();
        if predicted_winner.is_empty() {
            return Err(AppError::Validation("Predicted winner is required".to_string()));
        }

        let tournament = self.load(tournament_id).await?;
        let bracket_id = bracket_id(&tournament)?;

        // provider state is confirmed before any ledger mutation
        let matches = self.provider.get_matches(bracket_id).await?;
        let bracket_match = find_open_match(&matches, match_id)?;
        let participants = self.provider.get_participants(bracket_id).await?;
        ensure_contender(bracket_match, &participants, predicted_winner)?;

        if let Some(existing) = self.bets.find(tournament_id, user_id, match_id).await? {
            if existing.is_processed {
                return Err(AppError::InvalidState(format!(
                    "Bet on match {} is already settled",
                    match_id
                )));
            }
            let bet = self
                .bets
                .update_prediction(existing.id, predicted_winner, amount)
                .await?;
            info!(
                tournament_id = %tournament_id,
                user_id = %user_id,
                match_id,
                amount,
                "Bet updated"
            );
            return Ok(bet);
        }

        let bet = Bet::new(tournament_id, user_id, match_id, predicted_winner, amount);
        bet.validate().map_err(AppError::Validation)?;

        self.ledger
            .debit_once(user_id, amount, &bet.stake_description(), bet.stake_key())
            .await?;

        if let Err(e) = self.bets.insert(&bet).await {
            // the stake was taken but no bet exists; give it back
            self.ledger
                .credit_once(
                    user_id,
                    amount,
                    &format!("Bet reversed on match {}", match_id),
                    format!("bet:{}:reversal", bet.id),
                )
                .await?;
            return Err(match e {
                RepositoryError::Duplicate(_) => AppError::Conflict(format!(
                    "User {} already has a bet on match {}",
                    user_id, match_id
                )),
                other => other.into(),
            });
        }

        info!(
            tournament_id = %tournament_id,
            user_id = %user_id,
            match_id,
            amount,
            predicted_winner,
            "Bet placed"
        );
        Ok(bet)
    }

    /// Cancel an open bet before its match starts and refund the stake.
    pub async fn cancel_bet(&self, tournament_id: Uuid, user_id: Uuid, match_id: &str) -> AppResult<Bet> {
        let tournament = self.load(tournament_id).await?;
        let bet = self
            .bets
            .find(tournament_id, user_id, match_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No bet by {} on match {}", user_id, match_id))
            })?;
        if bet.is_processed {
            return Err(AppError::InvalidState(format!(
                "Bet on match {} is already settled",
                match_id
            )));
        }

        let bracket_id = bracket_id(&tournament)?;
        let matches = self.provider.get_matches(bracket_id).await?;
        find_open_match(&matches, match_id)?;

        self.ledger
            .credit_once(user_id, bet.amount, &bet.refund_description(), bet.refund_key())
            .await?;
        self.bets.delete(bet.id).await?;

        info!(
            tournament_id = %tournament_id,
            user_id = %user_id,
            match_id,
            amount = bet.amount,
            "Bet cancelled"
        );
        Ok(bet)
    }

    pub async fn list_bets(&self, tournament_id: Uuid, user_id: Uuid) -> AppResult<Vec<Bet>> {
        Ok(self.bets.find_by_user(tournament_id, user_id).await?)
    }

    /// Pay out and close the open bets of every completed match.
    ///
    /// Safe to run repeatedly and concurrently. A match whose payouts fail is
    /// released untouched for a later run.
    pub async fn settle_matches(&self, tournament_id: Uuid) -> AppResult<SettlementReport> {
        let tournament = self.load(tournament_id).await?;
        let bracket_id = bracket_id(&tournament)?;

        let matches = self.provider.get_matches(bracket_id).await?;
        let participants = self.provider.get_participants(bracket_id).await?;

        let mut report = SettlementReport {
            tournament_id,
            ..SettlementReport::default()
        };

        for bracket_match in matches.iter().filter(|m| m.is_complete()) {
            let match_id = bracket_match.id.as_str();
            if self
                .bets
                .find_unprocessed_by_match(tournament_id, match_id)
                .await?
                .is_empty()
            {
                continue;
            }

            let Some(winner) = winner_name(bracket_match, &participants) else {
                warn!(
                    tournament_id = %tournament_id,
                    match_id,
                    "Completed match has no resolvable winner, skipping"
                );
                report.matches_skipped += 1;
                continue;
            };

            if !self
                .bets
                .try_claim_match(tournament_id, match_id, self.claim_lease)
                .await?
            {
                report.matches_skipped += 1;
                continue;
            }

            // only bets read under the claim are paid
            let open_bets = match self.bets.find_unprocessed_by_match(tournament_id, match_id).await {
                Ok(bets) => bets,
                Err(e) => {
                    self.release_claim(tournament_id, match_id).await;
                    return Err(e.into());
                }
            };
            if open_bets.is_empty() {
                self.release_claim(tournament_id, match_id).await;
                continue;
            }

            let settled = match self.pay_out(&open_bets, winner).await {
                Ok(outcome) => self
                    .bets
                    .complete_match(tournament_id, match_id, &outcome.results)
                    .await
                    .map(|_| outcome)
                    .map_err(AppError::from),
                Err(e) => Err(e),
            };

            match settled {
                Ok(outcome) => {
                    report.matches_settled += 1;
                    report.bets_won += outcome.won;
                    report.bets_lost += outcome.lost;
                    report.total_paid_out += outcome.paid_out;
                    info!(
                        tournament_id = %tournament_id,
                        match_id,
                        winner,
                        won = outcome.won,
                        lost = outcome.lost,
                        paid_out = outcome.paid_out,
                        "Match settled"
                    );
                }
                Err(e) => {
                    error!(
                        tournament_id = %tournament_id,
                        match_id,
                        error = %e,
                        "Match settlement failed, releasing claim"
                    );
                    self.release_claim(tournament_id, match_id).await;
                    report.matches_skipped += 1;
                }
            }
        }

        Ok(report)
    }

    /// Settle every tournament that still has open bets. Failures are logged
    /// per tournament.
    pub async fn settle_open_tournaments(&self) -> AppResult<Vec<SettlementReport>> {
        let mut reports = Vec::new();
        for tournament_id in self.bets.tournaments_with_open_bets().await? {
            match self.settle_matches(tournament_id).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(tournament_id = %tournament_id, error = %e, "Settlement run failed"),
            }
        }
        Ok(reports)
    }

    async fn release_claim(&self, tournament_id: Uuid, match_id: &str) {
        if let Err(e) = self.bets.release_match(tournament_id, match_id).await {
            error!(
                tournament_id = %tournament_id,
                match_id,
                error = %e,
                "Failed to release settlement claim"
            );
        }
    }

    /// Credit winners. Payouts are keyed per bet, so a retried match pays
    /// each winner once.
    async fn pay_out(&self, bets: &[Bet], winner: &str) -> AppResult<MatchOutcome> {
        let mut outcome = MatchOutcome {
            results: Vec::with_capacity(bets.len()),
            won: 0,
            lost: 0,
            paid_out: 0,
        };

        for bet in bets {
            let won = bet.predicted_winner == winner;
            if won {
                let payout = bet.payout().ok_or_else(|| {
                    AppError::Validation(format!("Payout overflow for bet {}", bet.id))
                })?;
                let posting = self
                    .ledger
                    .credit_once(bet.user_id, payout, &bet.payout_description(), bet.payout_key())
                    .await
                    .map_err(|e| {
                        error!(
                            tournament_id = %bet.tournament_id,
                            match_id = %bet.match_id,
                            user_id = %bet.user_id,
                            bet_id = %bet.id,
                            payout,
                            error = %e,
                            "Failed to credit bet payout"
                        );
                        e
                    })?;
                if posting.is_applied() {
                    outcome.paid_out += payout;
                }
                outcome.won += 1;
            } else {
                outcome.lost += 1;
            }
            outcome.results.push((bet.id, won));
        }

        Ok(outcome)
    }

    async fn load(&self, tournament_id: Uuid) -> AppResult<Tournament> {
        self.tournaments
            .find_by_id(tournament_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tournament {} not found", tournament_id)))
    }
}

fn bracket_id(tournament: &Tournament) -> AppResult<&str> {
    tournament.external_bracket_id.as_deref().ok_or_else(|| {
        AppError::InvalidState(format!(
            "Tournament {} has no external bracket",
            tournament.id
        ))
    })
}

/// The match must exist and must not have started.
fn find_open_match<'a>(matches: &'a [BracketMatch], match_id: &str) -> AppResult<&'a BracketMatch> {
    let found = matches
        .iter()
        .find(|m| m.id == match_id)
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;
    if found.has_started() {
        return Err(AppError::MatchAlreadyStarted(match_id.to_string()));
    }
    Ok(found)
}

fn ensure_contender(
    bracket_match: &BracketMatch,
    participants: &[BracketParticipant],
    predicted_winner: &str,
) -> AppResult<()> {
    let participant = participants
        .iter()
        .find(|p| p.name == predicted_winner)
        .ok_or_else(|| {
            AppError::Validation(format!("{} is not in the bracket", predicted_winner))
        })?;
    if !bracket_match.participant_ids.is_empty()
        && !bracket_match.participant_ids.contains(&participant.id)
    {
        return Err(AppError::Validation(format!(
            "{} does not play in match {}",
            predicted_winner, bracket_match.id
        )));
    }
    Ok(())
}
