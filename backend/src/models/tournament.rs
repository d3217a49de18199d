//! Tournament aggregate root.
//!
//! A tournament owns its participants, waitlist, teams, clips and MVP ballot.
//! Every mutation goes through a command method on [`Tournament`]; the
//! repository persists the whole aggregate guarded by [`Tournament::version`].

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Lifecycle phase, derived from the aggregate's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentPhase {
    Registering,
    CheckinWindow,
    TeamsFormed,
    TeamsPublished,
    Finished,
}

/// How a user placed in a finished tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Winner,
    TopBracket,
    Participant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub in_waitlist: bool,
    pub registration_date: DateTime<Utc>,
    pub has_checkin: bool,
    pub is_caster: bool,
    pub is_mvp: bool,
    /// Voters who picked this participant
    pub mvp_votes: BTreeSet<Uuid>,
    pub tier: Option<String>,
    pub description: Option<String>,
}

impl Participant {
    fn new(user_id: Uuid, is_caster: bool, in_waitlist: bool, registration_date: DateTime<Utc>) -> Self {
        Self {
            user_id,
            in_waitlist,
            registration_date,
            has_checkin: false,
            is_caster,
            is_mvp: false,
            mvp_votes: BTreeSet::new(),
            tier: None,
            description: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.in_waitlist
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub users: BTreeSet<Uuid>,
    #[serde(default)]
    pub score: i32,
    /// 1 is first place, 0 means unranked
    #[serde(default)]
    pub ranking: u32,
}

impl Team {
    pub fn new(name: impl Into<String>, users: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            name: name.into(),
            users: users.into_iter().collect(),
            score: 0,
            ranking: 0,
        }
    }

    pub fn with_ranking(mut self, ranking: u32) -> Self {
        self.ranking = ranking;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub url: String,
    pub added_by: Uuid,
    pub added_at: DateTime<Utc>,
}

/// Admin edit of a single team, addressed by its current name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub score: Option<i32>,
    pub ranking: Option<u32>,
}

/// Partial update of tournament details
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TournamentPatch {
    pub name: Option<String>,
    pub game_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    pub discord_channel_name: Option<String>,
    pub player_cap: Option<u32>,
    pub description: Option<String>,
    pub discord_reminder_date: Option<DateTime<Utc>>,
    pub private_reminder_date: Option<DateTime<Utc>>,
    pub reminder_sent: Option<bool>,
    pub reminder_sent_players: Option<bool>,
    pub external_message_ref: Option<String>,
    pub external_bracket_id: Option<String>,
    pub mvp_vote_open: Option<bool>,
}

/// Input for creating a tournament
#[derive(Debug, Clone, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub game_id: Uuid,
    pub date: DateTime<Utc>,
    /// 0 means unlimited
    pub player_cap: u32,
    pub discord_channel_name: String,
    pub description: Option<String>,
    pub external_bracket_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    /// Optimistic concurrency token, owned by the repository
    #[serde(default)]
    pub version: i64,
    pub name: String,
    pub game_id: Uuid,
    pub date: DateTime<Utc>,
    pub player_cap: u32,
    pub discord_channel_name: String,
    pub description: Option<String>,
    pub players: Vec<Participant>,
    pub teams: Vec<Team>,
    pub clips: Vec<Clip>,
    pub teams_published: bool,
    pub finished: bool,
    pub mvp_vote_open: bool,
    pub checkin_open: bool,
    pub reminder_sent: bool,
    pub reminder_sent_players: bool,
    pub discord_reminder_date: Option<DateTime<Utc>>,
    pub private_reminder_date: Option<DateTime<Utc>>,
    pub external_bracket_id: Option<String>,
    pub external_message_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    pub fn new(input: NewTournament) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 0,
            name: input.name,
            game_id: input.game_id,
            date: input.date,
            player_cap: input.player_cap,
            discord_channel_name: input.discord_channel_name,
            description: input.description,
            players: Vec::new(),
            teams: Vec::new(),
            clips: Vec::new(),
            teams_published: false,
            finished: false,
            mvp_vote_open: true,
            checkin_open: false,
            reminder_sent: false,
            reminder_sent_players: false,
            discord_reminder_date: None,
            private_reminder_date: None,
            external_bracket_id: input.external_bracket_id,
            external_message_ref: None,
            created_at: Utc::now(),
        }
    }

    pub fn phase(&self) -> TournamentPhase {
        if self.finished {
            TournamentPhase::Finished
        } else if self.teams_published {
            TournamentPhase::TeamsPublished
        } else if !self.teams.is_empty() {
            TournamentPhase::TeamsFormed
        } else if self.checkin_open {
            TournamentPhase::CheckinWindow
        } else {
            TournamentPhase::Registering
        }
    }

    /// Participants counted against the cap
    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active()).count()
    }

    pub fn waitlist(&self) -> impl Iterator<Item = &Participant> {
        self.players.iter().filter(|p| p.in_waitlist)
    }

    pub fn is_full(&self) -> bool {
        self.player_cap > 0 && self.active_count() >= self.player_cap as usize
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    fn participant_mut(&mut self, user_id: Uuid) -> Option<&mut Participant> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    fn ensure_not_finished(&self) -> AppResult<()> {
        if self.finished {
            return Err(AppError::InvalidState(format!(
                "Tournament {} is finished",
                self.id
            )));
        }
        Ok(())
    }

    /// Register a user, placing them on the waitlist once the cap is reached.
    pub fn register(&mut self, user_id: Uuid, as_caster: bool, now: DateTime<Utc>) -> AppResult<&Participant> {
        self.ensure_not_finished()?;
        if self.participant(user_id).is_some() {
            return Err(AppError::InvalidState(format!(
                "User {} is already registered for tournament {}",
                user_id, self.id
            )));
        }

        let in_waitlist = self.is_full();
        // registration dates never go backwards, even if the clock does
        let registration_date = self
            .players
            .iter()
            .map(|p| p.registration_date)
            .max()
            .map_or(now, |last| last.max(now));

        self.players
            .push(Participant::new(user_id, as_caster, in_waitlist, registration_date));
        Ok(&self.players[self.players.len() - 1])
    }

    /// Remove a participant. Waitlisted users are not promoted.
    pub fn unregister(&mut self, user_id: Uuid) -> Option<Participant> {
        let index = self.players.iter().position(|p| p.user_id == user_id)?;
        Some(self.players.remove(index))
    }

    /// Returns false when the user is not registered.
    pub fn set_checkin(&mut self, user_id: Uuid, checked_in: bool) -> bool {
        match self.participant_mut(user_id) {
            Some(participant) => {
                participant.has_checkin = checked_in;
                true
            }
            None => false,
        }
    }

    pub fn open_checkin(&mut self) -> AppResult<()> {
        self.ensure_not_finished()?;
        self.checkin_open = true;
        Ok(())
    }

    pub fn close_checkin(&mut self) {
        self.checkin_open = false;
    }

    pub fn add_clip(&mut self, url: String, added_by: Uuid, now: DateTime<Utc>) -> &Clip {
        self.clips.push(Clip {
            url,
            added_by,
            added_at: now,
        });
        &self.clips[self.clips.len() - 1]
    }

    /// Single-choice ballot: the voter ends up in exactly one candidate's set.
    pub fn vote_mvp(&mut self, voter_id: Uuid, candidate_id: Uuid) -> AppResult<()> {
        if !self.mvp_vote_open {
            return Err(AppError::VotingClosed(self.id));
        }
        match self.participant(voter_id) {
            Some(voter) if voter.is_active() => {}
            _ => {
                return Err(AppError::Unauthorized(format!(
                    "User {} is not an active participant of tournament {}",
                    voter_id, self.id
                )))
            }
        }
        if self.participant(candidate_id).is_none() {
            return Err(AppError::NotFound(format!(
                "Candidate {} is not registered for tournament {}",
                candidate_id, self.id
            )));
        }

        for participant in &mut self.players {
            if participant.user_id == candidate_id {
                participant.mvp_votes.insert(voter_id);
            } else {
                participant.mvp_votes.remove(&voter_id);
            }
        }
        Ok(())
    }

    /// Participant with the strictly greatest vote count; ties go to the
    /// earliest in player-list order. No votes means no winner.
    pub fn mvp_leader(&self) -> Option<&Participant> {
        let mut leader: Option<&Participant> = None;
        for participant in &self.players {
            let votes = participant.mvp_votes.len();
            if votes == 0 {
                continue;
            }
            match leader {
                Some(current) if current.mvp_votes.len() >= votes => {}
                _ => leader = Some(participant),
            }
        }
        leader
    }

    /// Close the ballot and flag the winner. Returns the winner's user id.
    pub fn close_mvp_voting(&mut self) -> Option<Uuid> {
        self.mvp_vote_open = false;
        let winner = self.mvp_leader().map(|p| p.user_id);
        for participant in &mut self.players {
            participant.is_mvp = Some(participant.user_id) == winner;
        }
        winner
    }

    /// Replace the team list without publishing it.
    pub fn draft_teams(&mut self, teams: Vec<Team>) -> AppResult<()> {
        self.ensure_not_finished()?;
        validate_teams(&teams)?;
        self.teams = teams;
        Ok(())
    }

    /// Replace the team list wholesale and publish it.
    pub fn publish_teams(&mut self, teams: Vec<Team>) -> AppResult<()> {
        self.draft_teams(teams)?;
        self.teams_published = true;
        Ok(())
    }

    /// After this, team rankings are authoritative for reporting.
    pub fn finish(&mut self) -> AppResult<()> {
        self.ensure_not_finished()?;
        if !self.teams_published {
            return Err(AppError::InvalidState(format!(
                "Teams not yet published for tournament {}",
                self.id
            )));
        }
        self.finished = true;
        self.checkin_open = false;
        Ok(())
    }

    pub fn update_participant(
        &mut self,
        user_id: Uuid,
        tier: Option<String>,
        description: Option<String>,
    ) -> AppResult<&Participant> {
        let tournament_id = self.id;
        let participant = self.participant_mut(user_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "Participant {} not found in tournament {}",
                user_id, tournament_id
            ))
        })?;
        if tier.is_some() {
            participant.tier = tier;
        }
        if description.is_some() {
            participant.description = description;
        }
        Ok(participant)
    }

    pub fn update_team(&mut self, old_name: &str, patch: TeamPatch) -> AppResult<&Team> {
        if let Some(new_name) = &patch.name {
            if new_name != old_name && self.teams.iter().any(|t| &t.name == new_name) {
                return Err(AppError::Validation(format!("Team name {} already in use", new_name)));
            }
        }
        let tournament_id = self.id;
        let team = self
            .teams
            .iter_mut()
            .find(|t| t.name == old_name)
            .ok_or_else(|| {
                AppError::NotFound(format!("Team {} not found in tournament {}", old_name, tournament_id))
            })?;
        if let Some(name) = patch.name {
            team.name = name;
        }
        if let Some(score) = patch.score {
            team.score = score;
        }
        if let Some(ranking) = patch.ranking {
            team.ranking = ranking;
        }
        Ok(team)
    }

    pub fn apply_patch(&mut self, patch: TournamentPatch) -> AppResult<()> {
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Tournament name cannot be empty".to_string()));
            }
            self.name = name.trim().to_string();
        }
        if let Some(game_id) = patch.game_id {
            self.game_id = game_id;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(channel) = patch.discord_channel_name {
            self.discord_channel_name = channel.trim().to_string();
        }
        if let Some(cap) = patch.player_cap {
            self.player_cap = cap;
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if patch.discord_reminder_date.is_some() {
            self.discord_reminder_date = patch.discord_reminder_date;
        }
        if patch.private_reminder_date.is_some() {
            self.private_reminder_date = patch.private_reminder_date;
        }
        if let Some(sent) = patch.reminder_sent {
            self.reminder_sent = sent;
        }
        if let Some(sent) = patch.reminder_sent_players {
            self.reminder_sent_players = sent;
        }
        if patch.external_message_ref.is_some() {
            self.external_message_ref = patch.external_message_ref;
        }
        if patch.external_bracket_id.is_some() {
            self.external_bracket_id = patch.external_bracket_id;
        }
        if let Some(open) = patch.mvp_vote_open {
            self.mvp_vote_open = open;
        }
        Ok(())
    }

    /// Lowest ranking that still counts as top bracket: ceil(teams / 4).
    pub fn top_bracket_cutoff(&self) -> u32 {
        (self.teams.len() as u32).div_ceil(4)
    }

    /// Placement of a user once results are final. `None` for users who
    /// neither played on a team nor held an active registration.
    pub fn placement(&self, user_id: Uuid) -> Option<Placement> {
        if !self.finished {
            return None;
        }
        let cutoff = self.top_bracket_cutoff();
        match self.teams.iter().find(|t| t.users.contains(&user_id)) {
            Some(team) if team.ranking == 1 => Some(Placement::Winner),
            Some(team) if team.ranking > 0 && team.ranking <= cutoff => Some(Placement::TopBracket),
            Some(_) => Some(Placement::Participant),
            None => self
                .participant(user_id)
                .filter(|p| p.is_active())
                .map(|_| Placement::Participant),
        }
    }
}

fn validate_teams(teams: &[Team]) -> AppResult<()> {
    let mut names = BTreeSet::new();
    for team in teams {
        if team.name.trim().is_empty() {
            return Err(AppError::Validation("Team name cannot be empty".to_string()));
        }
        if !names.insert(team.name.as_str()) {
            return Err(AppError::Validation(format!("Duplicate team name {}", team.name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tournament(cap: u32) -> Tournament {
        Tournament::new(NewTournament {
            name: "Spring Cup".to_string(),
            game_id: Uuid::new_v4(),
            date: Utc::now(),
            player_cap: cap,
            discord_channel_name: "spring-cup".to_string(),
            description: None,
            external_bracket_id: None,
        })
    }

    #[test]
    fn test_waitlist_after_cap() {
        let mut t = tournament(2);
        let now = Utc::now();
        for _ in 0..2 {
            assert!(!t.register(Uuid::new_v4(), false, now).unwrap().in_waitlist);
        }
        for _ in 0..3 {
            assert!(t.register(Uuid::new_v4(), false, now).unwrap().in_waitlist);
        }
        assert_eq!(t.active_count(), 2);
        assert_eq!(t.waitlist().count(), 3);
    }

    #[test]
    fn test_unlimited_cap_never_waitlists() {
        let mut t = tournament(0);
        for _ in 0..50 {
            assert!(!t.register(Uuid::new_v4(), false, Utc::now()).unwrap().in_waitlist);
        }
    }

    #[test]
    fn test_unregister_does_not_promote_waitlist() {
        let mut t = tournament(1);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        t.register(first, false, Utc::now()).unwrap();
        t.register(second, false, Utc::now()).unwrap();

        assert!(t.unregister(first).is_some());
        assert!(t.participant(second).unwrap().in_waitlist);
        assert_eq!(t.active_count(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut t = tournament(0);
        let user = Uuid::new_v4();
        t.register(user, false, Utc::now()).unwrap();
        let err = t.register(user, true, Utc::now()).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(t.players.len(), 1);
    }

    #[test]
    fn test_registration_dates_monotonic() {
        let mut t = tournament(0);
        let now = Utc::now();
        t.register(Uuid::new_v4(), false, now).unwrap();
        let earlier = now - Duration::minutes(5);
        let second = t.register(Uuid::new_v4(), false, earlier).unwrap();
        assert_eq!(second.registration_date, now);
    }

    #[test]
    fn test_checkin_absent_participant_is_noop() {
        let mut t = tournament(0);
        assert!(!t.set_checkin(Uuid::new_v4(), true));
        let user = Uuid::new_v4();
        t.register(user, false, Utc::now()).unwrap();
        assert!(t.set_checkin(user, true));
        assert!(t.participant(user).unwrap().has_checkin);
        assert!(t.set_checkin(user, false));
        assert!(!t.participant(user).unwrap().has_checkin);
    }

    #[test]
    fn test_vote_is_single_choice() {
        let mut t = tournament(0);
        let voter = Uuid::new_v4();
        let candidates: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        t.register(voter, false, Utc::now()).unwrap();
        for c in &candidates {
            t.register(*c, false, Utc::now()).unwrap();
        }

        for c in candidates.iter().chain(candidates.iter().rev()) {
            t.vote_mvp(voter, *c).unwrap();
        }

        let holders: Vec<_> = t
            .players
            .iter()
            .filter(|p| p.mvp_votes.contains(&voter))
            .map(|p| p.user_id)
            .collect();
        assert_eq!(holders, vec![candidates[0]]);
    }

    #[test]
    fn test_waitlisted_voter_unauthorized() {
        let mut t = tournament(1);
        let active = Uuid::new_v4();
        let waiting = Uuid::new_v4();
        t.register(active, false, Utc::now()).unwrap();
        t.register(waiting, false, Utc::now()).unwrap();

        let err = t.vote_mvp(waiting, active).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_vote_after_close_fails() {
        let mut t = tournament(0);
        let a = Uuid::new_v4();
        t.register(a, false, Utc::now()).unwrap();
        t.close_mvp_voting();
        assert!(matches!(t.vote_mvp(a, a), Err(AppError::VotingClosed(_))));
    }

    #[test]
    fn test_mvp_tie_goes_to_first_in_list() {
        let mut t = tournament(0);
        let ids: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            t.register(*id, false, Utc::now()).unwrap();
        }
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        // A: 2 votes, B: 2 votes, C: 1 vote
        t.vote_mvp(ids[3], a).unwrap();
        t.vote_mvp(ids[4], a).unwrap();
        t.vote_mvp(ids[5], b).unwrap();
        t.vote_mvp(ids[6], b).unwrap();
        t.vote_mvp(ids[7], c).unwrap();

        assert_eq!(t.close_mvp_voting(), Some(a));
        assert!(t.participant(a).unwrap().is_mvp);
        assert!(!t.participant(b).unwrap().is_mvp);
        assert!(!t.mvp_vote_open);
    }

    #[test]
    fn test_close_without_votes_has_no_winner() {
        let mut t = tournament(0);
        t.register(Uuid::new_v4(), false, Utc::now()).unwrap();
        assert_eq!(t.close_mvp_voting(), None);
        assert!(t.players.iter().all(|p| !p.is_mvp));
    }

    #[test]
    fn test_phase_transitions() {
        let mut t = tournament(0);
        assert_eq!(t.phase(), TournamentPhase::Registering);
        t.open_checkin().unwrap();
        assert_eq!(t.phase(), TournamentPhase::CheckinWindow);
        t.draft_teams(vec![Team::new("Red", [Uuid::new_v4()])]).unwrap();
        assert_eq!(t.phase(), TournamentPhase::TeamsFormed);
        assert!(t.finish().unwrap_err().is_invalid_state());
        t.publish_teams(vec![Team::new("Blue", [Uuid::new_v4()])]).unwrap();
        assert_eq!(t.phase(), TournamentPhase::TeamsPublished);
        assert_eq!(t.teams.len(), 1);
        t.finish().unwrap();
        assert_eq!(t.phase(), TournamentPhase::Finished);
        assert!(t.register(Uuid::new_v4(), false, Utc::now()).is_err());
    }

    #[test]
    fn test_duplicate_team_names_rejected() {
        let mut t = tournament(0);
        let teams = vec![Team::new("Red", []), Team::new("Red", [])];
        assert!(matches!(t.publish_teams(teams), Err(AppError::Validation(_))));
        assert!(!t.teams_published);
    }

    #[test]
    fn test_placements() {
        let mut t = tournament(0);
        let users: Vec<Uuid> = (0..9).map(|_| Uuid::new_v4()).collect();
        for u in &users {
            t.register(*u, false, Utc::now()).unwrap();
        }
        // 5 teams: cutoff is ceil(5/4) = 2
        let teams = vec![
            Team::new("A", [users[0]]).with_ranking(1),
            Team::new("B", [users[1]]).with_ranking(2),
            Team::new("C", [users[2]]).with_ranking(3),
            Team::new("D", [users[3]]).with_ranking(4),
            Team::new("E", [users[4]]),
        ];
        t.publish_teams(teams).unwrap();
        assert_eq!(t.placement(users[0]), None);
        t.finish().unwrap();

        assert_eq!(t.top_bracket_cutoff(), 2);
        assert_eq!(t.placement(users[0]), Some(Placement::Winner));
        assert_eq!(t.placement(users[1]), Some(Placement::TopBracket));
        assert_eq!(t.placement(users[2]), Some(Placement::Participant));
        assert_eq!(t.placement(users[4]), Some(Placement::Participant));
        assert_eq!(t.placement(users[8]), Some(Placement::Participant));
        assert_eq!(t.placement(Uuid::new_v4()), None);
    }

    #[test]
    fn test_update_team_and_participant() {
        let mut t = tournament(0);
        let user = Uuid::new_v4();
        t.register(user, false, Utc::now()).unwrap();
        t.draft_teams(vec![Team::new("Red", [user]), Team::new("Blue", [])]).unwrap();

        let team = t
            .update_team("Red", TeamPatch { name: Some("Crimson".into()), score: Some(12), ranking: Some(1) })
            .unwrap();
        assert_eq!(team.name, "Crimson");
        assert_eq!(team.ranking, 1);
        assert!(t
            .update_team("Crimson", TeamPatch { name: Some("Blue".into()), ..Default::default() })
            .is_err());
        assert!(t.update_team("Green", TeamPatch::default()).unwrap_err().is_not_found());

        let p = t.update_participant(user, Some("S".into()), None).unwrap();
        assert_eq!(p.tier.as_deref(), Some("S"));
        assert!(t.update_participant(Uuid::new_v4(), None, None).is_err());
    }
}
