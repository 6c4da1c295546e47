//! # Lumina Client
//!
//! The device side of Lumina profile sync: durable local storage of the
//! document, the remote profile table, and the coordinator that merges the
//! two. [`ProfileStore`] is the surface the games talk to.
//!
//! ## Example
//!
//! ```no_run
//! use lumina_client::{ProfileStore, ShutdownMode, SyncConfig};
//!
//! # async fn run() -> lumina_client::Result<()> {
//! let config = SyncConfig::from_env()?;
//! let store = ProfileStore::open(&config).await?;
//!
//! store.subscribe(|doc| println!("{} players", doc.players().count()));
//! store.create_profile("ada", "Ada", Some("2468".into()))?;
//! store.record_game_start("ada", "spellSiege")?;
//! store.add_xp("ada", 25)?;
//!
//! store.shutdown(ShutdownMode::Await).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod local;
pub mod remote;
pub mod store;

pub use config::{ConfigError, SyncConfig};
pub use coordinator::{
    ShutdownMode, SkipReason, SyncCoordinator, SyncOutcome, SyncReport, SyncStatus,
};
pub use error::{ClientError, RemoteError, Result};
pub use local::{DocumentStorage, FileStorage, LocalStore, MemoryStorage};
pub use remote::{HttpRemoteStore, RemoteStore, RetryPolicy};
pub use store::{ProfileStore, SubscriptionId};

pub use lumina_engine;
