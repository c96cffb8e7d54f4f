//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `OwnershipResolver`: Maps an asset to its owning account
//! - `FanoutBroker`: Room-based pub/sub over live connections
//! - `IngestionPipeline`: Bus message to persisted record and live event

mod broker;
mod ingestion;
mod ownership;

pub use broker::{ClientMessage, FanoutBroker, PublishReport, ServerEvent, SubscribeError, WhoamiReply};
pub use ingestion::{BusMessage, IngestionOutcome, IngestionPipeline};
pub use ownership::{OwnershipError, OwnershipResolver};
