//! Read-only access to the external bracket provider

mod challonge;

pub use challonge::ChallongeClient;

use crate::error::AppError;
use crate::models::{BracketMatch, BracketParticipant};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Bracket provider is not configured")]
    NotConfigured,

    #[error("Bracket provider unreachable: {0}")]
    Unreachable(String),

    #[error("Bracket provider timed out")]
    Timeout,

    #[error("Bracket provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected bracket provider payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::ExternalProvider(err.to_string())
    }
}

/// System of record for match timing and outcome
#[async_trait]
pub trait BracketProvider: Send + Sync {
    async fn get_matches(&self, bracket_id: &str) -> Result<Vec<BracketMatch>, ProviderError>;

    async fn get_participants(&self, bracket_id: &str) -> Result<Vec<BracketParticipant>, ProviderError>;
}

/// Stand-in when no provider credentials are configured
pub struct UnconfiguredProvider;

#[async_trait]
impl BracketProvider for UnconfiguredProvider {
    async fn get_matches(&self, _bracket_id: &str) -> Result<Vec<BracketMatch>, ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn get_participants(&self, _bracket_id: &str) -> Result<Vec<BracketParticipant>, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}
