pub mod ledger_service;
pub mod reward_service;
pub mod settlement_poller;
pub mod tournament_service;
pub mod wager_service;

pub use ledger_service::LedgerService;
pub use reward_service::{PlacementAward, RewardIssuer};
pub use settlement_poller::SettlementPoller;
pub use tournament_service::TournamentService;
pub use wager_service::WagerService;
