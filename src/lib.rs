//! # eculease
//!
//! A DHCP lease lifecycle manager that guarantees a vehicle ECU a
//! deterministic, persistent IP address across discovery handshakes and
//! process restarts.
//!
//! The DHCP wire protocol itself is handled by an external engine; this
//! crate consumes the engine's structured discover/request/bound events,
//! tracks which addresses are leased to which clients, persists that state
//! durably, reclaims expired addresses into a free pool, and applies a
//! sticky-lease policy for the distinguished device so a downstream
//! diagnostic session can always reach it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use eculease::{Config, LeaseServer};
//!
//! #[tokio::main]
//! async fn main() -> eculease::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let server = LeaseServer::new(config).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`Config`] - Pool range, lease duration, grace window, ECU identity
//! - [`LeaseServer`] - Event loop bridging the protocol engine on stdin
//! - [`LeaseManager`] - The lease lifecycle state machine and expiry sweep
//! - [`LeaseStore`] - Lease records with JSON persistence
//! - [`AddressPool`] - Ordered free-address pool
//! - [`Event`] / [`Response`] - The engine boundary types

pub mod config;
pub mod ecu_log;
pub mod error;
pub mod events;
pub mod lease;
pub mod mac;
pub mod manager;
pub mod pool;
pub mod server;

pub use config::Config;
pub use ecu_log::EcuAuditLog;
pub use error::{Error, Result};
pub use events::{Binding, EcuNotification, Event, Response};
pub use lease::{Lease, LeaseState, LeaseStore};
pub use manager::LeaseManager;
pub use pool::AddressPool;
pub use server::LeaseServer;
