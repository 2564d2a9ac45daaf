//! Lease records, the lease store, and its persistence codec.
//!
//! A lease binds a normalized hardware address to a network address for a
//! bounded time. The store is a plain map keyed by normalized hardware
//! address; it is serialized in full to a single pretty-printed JSON document
//! after every mutating event and reloaded (with grace-window filtering) at
//! startup. The document layout is stable across restarts — the sticky-lease
//! recovery for the distinguished device depends on it.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::mac;

/// Milliseconds since the Unix epoch, the timestamp unit of the lease
/// document.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Persisted lease state. Transient protocol states (offer, request) are
/// never written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseState {
    #[serde(rename = "BOUND")]
    Bound,
}

/// A confirmed binding of a network address to a hardware address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    /// The leased network address.
    pub address: Ipv4Addr,

    /// Absolute expiry, milliseconds since epoch.
    pub expires_at: i64,

    /// When the binding was confirmed, milliseconds since epoch.
    pub bind_time: i64,

    /// Configured lease duration in seconds at the time of binding.
    pub lease_period: u32,

    /// Address of the allocating server, kept for audit.
    pub server: Ipv4Addr,

    pub state: LeaseState,
}

impl Lease {
    /// Creates a lease bound at `bind_time` for `lease_period` seconds.
    pub fn bound(
        address: Ipv4Addr,
        bind_time: i64,
        lease_period: u32,
        server: Ipv4Addr,
    ) -> Self {
        Self {
            address,
            expires_at: bind_time + i64::from(lease_period) * 1000,
            bind_time,
            lease_period,
            server,
            state: LeaseState::Bound,
        }
    }

    /// Hard expiry, used by the periodic sweep.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Grace-extended validity, used at load time and when deciding whether
    /// an existing lease can be re-offered.
    pub fn is_valid_within_grace(&self, now: i64, grace_ms: i64) -> bool {
        self.expires_at > now - grace_ms
    }
}

/// In-memory lease store keyed by normalized hardware address.
///
/// Normalization is applied on every entry point, including keys read back
/// from a document written with an older delimiter convention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaseStore {
    leases: HashMap<String, Lease>,
}

impl LeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hw_addr: &str) -> Option<&Lease> {
        self.leases.get(&mac::normalize(hw_addr))
    }

    /// Upserts the lease for `hw_addr`, replacing any existing record.
    pub fn put(&mut self, hw_addr: &str, lease: Lease) {
        self.leases.insert(mac::normalize(hw_addr), lease);
    }

    /// Removes the lease for `hw_addr` if present. Idempotent.
    pub fn remove(&mut self, hw_addr: &str) -> Option<Lease> {
        self.leases.remove(&mac::normalize(hw_addr))
    }

    /// Snapshot of all current records.
    pub fn all(&self) -> impl Iterator<Item = (&String, &Lease)> {
        self.leases.iter()
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Loads the persisted document, keeping only records still valid within
    /// the grace window.
    ///
    /// A missing file, unreadable file, or malformed document is not a
    /// startup error: the server proceeds with an empty store. Stale records
    /// are expected garbage and dropped silently (logged at debug).
    pub async fn load<P: AsRef<Path>>(path: P, now: i64, grace_ms: i64) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            debug!("No lease file at {}, starting empty", path.display());
            return Self::new();
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(error) => {
                warn!("Failed to read lease file {}: {}", path.display(), error);
                return Self::new();
            }
        };

        let parsed: HashMap<String, Lease> = match serde_json::from_str(&content) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(
                    "Lease file {} is malformed, starting empty: {}",
                    path.display(),
                    error
                );
                return Self::new();
            }
        };

        let mut store = Self::new();
        for (hw_addr, lease) in parsed {
            let key = mac::normalize(&hw_addr);
            if lease.is_valid_within_grace(now, grace_ms) {
                debug!("Loaded valid lease for MAC {}", key);
                store.leases.insert(key, lease);
            } else {
                debug!("Skipped expired lease for MAC {}", key);
            }
        }
        store
    }

    /// Writes the full store as one pretty-printed JSON document.
    ///
    /// The write goes to a temporary sibling first and is renamed into
    /// place, so a crash mid-write never leaves a truncated document.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.leases)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
