// Reward Notifier Library
//
// Exposes modules for the binary, integration tests and benches

pub mod chain;
pub mod config;
pub mod cursor;
pub mod events;
pub mod health;
pub mod ledger;
pub mod notifier;
pub mod persist;
pub mod pipeline;
pub mod scheduler;
pub mod stats;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod token_meta;
pub mod types;
pub mod validator;

// Re-export commonly used items
pub use chain::{ChainReader, RpcChainReader};
pub use config::{Config, NotifierKind};
pub use cursor::CursorTracker;
pub use events::decode_reward_log;
pub use ledger::DedupLedger;
pub use notifier::{AnyNotifier, Notification, Notifier};
pub use pipeline::{PipelineState, RewardScanner, ScanReport, ScannerConfig};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use stats::{StatsPublisher, StatsSnapshot};
pub use types::{EventKey, EventKind, KeyMode, RawEvent, ScanWindow, TokenMeta, ValidatedReward};
pub use validator::{EventValidator, Validation, ValidatorConfig};
