//! Challonge v2.1 client (JSON:API documents)

use super::{BracketProvider, ProviderError};
use crate::config::BracketProviderConfig;
use crate::models::{BracketMatch, BracketParticipant, MatchState};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

pub struct ChallongeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChallongeClient {
    pub fn new(config: &BracketProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or(ProviderError::NotConfigured)?;
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "Challonge request");

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .header("Authorization-Type", "v1")
            .header(CONTENT_TYPE, "application/vnd.api+json")
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), "Challonge request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BracketProvider for ChallongeClient {
    async fn get_matches(&self, bracket_id: &str) -> Result<Vec<BracketMatch>, ProviderError> {
        let document: Document<MatchAttributes> = self
            .get(&format!("/tournaments/{}/matches.json", bracket_id))
            .await?;
        Ok(document.data.into_iter().map(Resource::into_match).collect())
    }

    async fn get_participants(&self, bracket_id: &str) -> Result<Vec<BracketParticipant>, ProviderError> {
        let document: Document<ParticipantAttributes> = self
            .get(&format!("/tournaments/{}/participants.json", bracket_id))
            .await?;
        Ok(document
            .data
            .into_iter()
            .map(|r| BracketParticipant {
                id: r.id,
                name: r.attributes.name,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: Vec<Resource<T>>,
}

#[derive(Debug, Deserialize)]
struct Resource<T> {
    #[serde(deserialize_with = "id_string")]
    id: String,
    attributes: T,
}

#[derive(Debug, Deserialize)]
struct MatchAttributes {
    state: String,
    #[serde(default)]
    winners: Value,
    #[serde(default)]
    timestamps: Option<MatchTimestamps>,
    #[serde(default)]
    points_by_participant: Option<Vec<ParticipantPoints>>,
}

#[derive(Debug, Deserialize)]
struct MatchTimestamps {
    #[serde(default)]
    underway_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParticipantPoints {
    #[serde(deserialize_with = "id_string")]
    participant_id: String,
}

#[derive(Debug, Deserialize)]
struct ParticipantAttributes {
    name: String,
}

impl Resource<MatchAttributes> {
    fn into_match(self) -> BracketMatch {
        let attrs = self.attributes;
        let underway = attrs
            .timestamps
            .as_ref()
            .and_then(|t| t.underway_at.as_deref())
            .is_some();

        let state = if attrs.state == "complete" {
            MatchState::Complete
        } else if underway {
            MatchState::Started
        } else {
            MatchState::Pending
        };

        BracketMatch {
            id: self.id,
            state,
            winner_participant_id: first_id(&attrs.winners),
            participant_ids: attrs
                .points_by_participant
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.participant_id)
                .collect(),
        }
    }
}

/// `winners` is a single id for head-to-head matches and a list otherwise.
fn first_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.first().and_then(first_id),
        _ => None,
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected an id, got {}", other))),
    }
}
