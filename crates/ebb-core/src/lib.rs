//! # ebb-core
//! Foundation types and traits for the ebb lock-accounting engine.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod migrator;
pub mod traits;
pub mod types;
pub mod vault;

pub use clock::ManualClock;
pub use config::EscrowConfig;
pub use error::{ConfigError, EscrowError, TransferError};
pub use migrator::MemoryMigrator;
pub use traits::{Clock, Migrator, TokenVault};
pub use types::{AccountId, LockedBalance, Point};
pub use vault::MemoryVault;
