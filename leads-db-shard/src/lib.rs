//! Sharded record store for B2B leads
//!
//! Holds an unbounded lead collection in a document database whose documents
//! are size-capped, by spreading the leads over numbered shard documents
//! (`shard_000`, `shard_001`, ...). The main entry point is
//! [`LeadRepository`]:
//!
//! - [`LeadRepository::get_all`], [`LeadRepository::add`],
//!   [`LeadRepository::update`], [`LeadRepository::delete`] and
//!   [`LeadRepository::import_batch`] for day-to-day traffic
//! - [`LeadRepository::migrate_shard`] and
//!   [`LeadRepository::migrate_all_shards`] to convert list-encoded shards to
//!   the dictionary encoding, splitting shards that are too large
//! - [`LeadRepository::migrate_all_records`] for the one-time cutover from the
//!   flat legacy collection
//!
//! Shards come in two encodings, see [`codec`]. Callers that want to skip
//! shard scans on update or delete keep a [`ShardIndex`] and pass its hints.

pub mod allocator;
pub mod codec;
pub mod config;
pub mod cutover;
pub mod directory;
mod error;
pub mod index;
pub mod migration;
pub mod record;
pub mod repository;
pub mod strategy;

pub use allocator::{ShardAllocator, WriteTarget};
pub use codec::{Encoding, ShardPayload};
pub use config::ShardConfig;
pub use cutover::{CutoverReport, CutoverState};
pub use directory::{Shard, ShardDirectory, ShardId};
pub use error::{Result, ShardError};
pub use index::ShardIndex;
pub use migration::{MigrationOutcome, MigrationReport};
pub use record::{generate_lead_id, Lead, LeadInput, LeadPatch, ShardedLead};
pub use repository::{ImportReport, LeadRepository, ShardSummary};
pub use strategy::{OptimisticWrite, SerializedWrite, WritePermit, WriteStrategy};
