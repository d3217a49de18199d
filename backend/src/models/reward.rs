//! Reward table and grant identity

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const TOURNAMENTS: &str = "tournaments";
pub const PARTICIPATION: &str = "participation";
pub const FIRST_PLACE: &str = "first_place";
pub const TOP25: &str = "top25";

/// Static `{activity: {reward: points}}` mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardTable(BTreeMap<String, BTreeMap<String, i64>>);

impl RewardTable {
    pub fn from_json(json: &str) -> Result<Self, String> {
        let table: Self =
            serde_json::from_str(json).map_err(|e| format!("Invalid reward table: {}", e))?;
        for (activity, rewards) in &table.0 {
            if let Some((reward, points)) = rewards.iter().find(|(_, points)| **points <= 0) {
                return Err(format!(
                    "Reward {} | {} must be positive, got {}",
                    activity, reward, points
                ));
            }
        }
        Ok(table)
    }

    /// Points for a combination, `None` if the table does not know it
    pub fn points(&self, activity: &str, reward: &str) -> Option<i64> {
        self.0.get(activity)?.get(reward).copied()
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        let entries: [(&str, &[(&str, i64)]); 3] = [
            (
                "dailyquiz",
                &[
                    (PARTICIPATION, 50),
                    ("weekly_winner", 250),
                    ("weekly_second_place", 150),
                    ("weekly_third_place", 100),
                ],
            ),
            ("acsdle", &[(PARTICIPATION, 50), ("completion", 100)]),
            (TOURNAMENTS, &[(PARTICIPATION, 100), (FIRST_PLACE, 250), (TOP25, 150)]),
        ];
        Self(
            entries
                .iter()
                .map(|(activity, rewards)| {
                    let rewards = rewards.iter().map(|(r, p)| (r.to_string(), *p)).collect();
                    (activity.to_string(), rewards)
                })
                .collect(),
        )
    }
}

/// Ledger description of a grant, `"{activity} | {reward}"`
pub fn reward_description(activity: &str, reward: &str) -> String {
    format!("{} | {}", activity, reward)
}

/// Unique per user, activity, reward and calendar day.
pub fn reward_key(user_id: Uuid, activity: &str, reward: &str, day: NaiveDate) -> String {
    format!("reward:{}:{}:{}:{}", user_id, activity, reward, day.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "points")]
pub enum GrantOutcome {
    Granted(i64),
    AlreadyGranted,
    UnknownReward,
}
