//! The lease lifecycle state machine.
//!
//! Consumes protocol-engine events, consults and mutates the lease store and
//! the address pool, applies the sticky-lease policy for the distinguished
//! ECU, and runs the periodic expiry sweep. Per hardware address the
//! transient lifecycle is `NONE → OFFERED → BOUND → EXPIRED (removed)`; only
//! `BOUND` is ever persisted.
//!
//! # Offer priority
//!
//! For both discover and request the branch order is strict:
//!
//! 1. an existing lease still valid within the grace window (any client),
//! 2. the sticky initial address recovered from a previous run (ECU only,
//!    and only while it has no active lease),
//! 3. a fresh address from the pool.
//!
//! # Persistence
//!
//! Mutating transitions persist the full store once per event. The write is
//! fire-and-forget: it is spawned on the runtime and never awaited by the
//! event path, so a slow disk cannot stall address serving. Failures are
//! logged and the in-memory store stays authoritative until the next
//! successful write.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ecu_log::EcuAuditLog;
use crate::error::{Error, Result};
use crate::events::{Binding, EcuNotification, Response};
use crate::lease::{Lease, LeaseStore, now_ms};
use crate::mac;
use crate::pool::AddressPool;

pub struct LeaseManager {
    config: Arc<Config>,
    store: LeaseStore,
    pool: AddressPool,
    /// Normalized hardware address of the distinguished device.
    ecu_key: String,
    /// Address the ECU held in a previous run (or earlier in this one);
    /// re-offered whenever the ECU shows up without an active lease.
    initial_ecu_address: Option<Ipv4Addr>,
    ecu_log: EcuAuditLog,
    /// Serializes file writes between the detached persistence task and an
    /// awaited flush.
    save_lock: Arc<Mutex<()>>,
}

impl LeaseManager {
    /// Builds a manager from an already-loaded store and pool.
    ///
    /// The pool is expected to exclude every address owned by a lease in
    /// `store`; [`LeaseManager::bootstrap`] sets that up from disk.
    pub fn new(
        config: Arc<Config>,
        store: LeaseStore,
        pool: AddressPool,
        ecu_log: EcuAuditLog,
    ) -> Self {
        let ecu_key = mac::normalize(&config.ecu_mac);
        let initial_ecu_address = store.get(&ecu_key).map(|lease| lease.address);

        if let Some(address) = initial_ecu_address {
            info!("Recovered sticky ECU address {} for {}", address, ecu_key);
        }

        Self {
            config,
            store,
            pool,
            ecu_key,
            initial_ecu_address,
            ecu_log,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Loads persisted state and derives the free pool from the configured
    /// range minus every surviving lease.
    pub async fn bootstrap(config: Arc<Config>) -> Result<Self> {
        let now = now_ms();
        let store =
            LeaseStore::load(&config.leases_file, now, config.grace_window_ms).await;
        info!(
            "Loaded {} lease(s) from {}",
            store.len(),
            config.leases_file
        );

        let mut pool = AddressPool::new(config.pool_start, config.pool_end)?;
        for (_, lease) in store.all() {
            pool.reserve(lease.address);
        }
        info!(
            "Address pool: {} - {} ({} free of {})",
            config.pool_start,
            config.pool_end,
            pool.len(),
            config.pool_size()
        );

        let ecu_log = match &config.ecu_log_file {
            Some(path) => EcuAuditLog::open(path),
            None => EcuAuditLog::disabled(),
        };

        Ok(Self::new(config, store, pool, ecu_log))
    }

    /// Handles a discover event, returning the offer for the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] when no lease applies and the pool
    /// is empty; the caller surfaces this as a NAK-equivalent.
    pub fn handle_discover(&self, hw_addr: &str) -> Result<Response> {
        self.discover_at(hw_addr, now_ms())
    }

    fn discover_at(&self, hw_addr: &str, now: i64) -> Result<Response> {
        let key = mac::normalize(hw_addr);
        debug!("DISCOVER from {}", key);

        if let Some(lease) = self.store.get(&key)
            && lease.is_valid_within_grace(now, self.config.grace_window_ms)
        {
            info!("Offering existing lease {} for MAC {}", lease.address, key);
            if key == self.ecu_key {
                self.ecu_log.info("[ECU] DISCOVER, re-offering valid lease");
            }
            return Ok(Response::Offer {
                address: lease.address,
            });
        }

        if key == self.ecu_key
            && let Some(initial) = self.initial_ecu_address
            && self.store.get(&key).is_none()
        {
            info!("Offering initial ECU lease {}", initial);
            self.ecu_log.info("[ECU] DISCOVER, using initial lease");
            return Ok(Response::Offer { address: initial });
        }

        info!("No valid lease for MAC {}, assigning new IP", key);
        if key == self.ecu_key {
            self.ecu_log.info("[ECU] DISCOVER, assigning new IP");
        }
        let address = self.pool.first_free().ok_or(Error::PoolExhausted)?;
        Ok(Response::Offer { address })
    }

    /// Handles a request event, returning the ack or nak for the engine.
    ///
    /// A request that disagrees with the client's existing valid lease is
    /// rejected rather than silently rebinding; see the nak reason.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] when no lease applies and the pool
    /// is empty.
    pub fn handle_request(
        &self,
        hw_addr: &str,
        requested: Option<Ipv4Addr>,
    ) -> Result<Response> {
        self.request_at(hw_addr, requested, now_ms())
    }

    fn request_at(
        &self,
        hw_addr: &str,
        requested: Option<Ipv4Addr>,
        now: i64,
    ) -> Result<Response> {
        let key = mac::normalize(hw_addr);
        debug!("REQUEST from {}, requested IP: {:?}", key, requested);

        if let Some(lease) = self.store.get(&key)
            && lease.is_valid_within_grace(now, self.config.grace_window_ms)
        {
            if let Some(requested) = requested
                && requested != lease.address
            {
                warn!(
                    "Rejecting REQUEST from {} for IP {} (leased {})",
                    key, requested, lease.address
                );
                if key == self.ecu_key {
                    self.ecu_log.info("[ECU] REQUEST, rejecting conflicting IP");
                }
                return Ok(Response::Nak {
                    reason: "requested IP conflict".to_string(),
                });
            }
            info!("Acknowledging existing lease {} for MAC {}", lease.address, key);
            if key == self.ecu_key {
                self.ecu_log.info("[ECU] REQUEST, acknowledging valid lease");
            }
            return Ok(Response::Ack {
                address: lease.address,
            });
        }

        if key == self.ecu_key
            && let Some(initial) = self.initial_ecu_address
            && self.store.get(&key).is_none()
        {
            info!("Acknowledging initial ECU lease {}", initial);
            self.ecu_log.info("[ECU] REQUEST, using initial lease");
            return Ok(Response::Ack { address: initial });
        }

        info!("No valid lease for MAC {}, assigning new IP", key);
        if key == self.ecu_key {
            self.ecu_log.info("[ECU] REQUEST, assigning new IP");
        }
        let address = self.pool.first_free().ok_or(Error::PoolExhausted)?;
        Ok(Response::Ack { address })
    }

    /// Handles a bulk binding report from the engine.
    ///
    /// Upserts one lease per binding, reserves each bound address out of the
    /// pool, and returns the ECU notification when the distinguished device
    /// is among the bindings — at most one per event. The caller persists
    /// once after this returns.
    pub fn handle_bound<I>(&mut self, bindings: I) -> Option<EcuNotification>
    where
        I: IntoIterator<Item = (String, Binding)>,
    {
        self.bound_at(bindings, now_ms())
    }

    fn bound_at<I>(&mut self, bindings: I, now: i64) -> Option<EcuNotification>
    where
        I: IntoIterator<Item = (String, Binding)>,
    {
        let mut notification = None;

        for (hw_addr, binding) in bindings {
            let key = mac::normalize(&hw_addr);

            let mut lease = Lease::bound(
                binding.address,
                now,
                self.config.lease_duration_seconds,
                self.config.server_ip,
            );
            if let Some(bind_time) = binding.bind_time {
                lease.bind_time = bind_time;
            }

            info!("BOUND {} -> {}", key, binding.address);
            self.store.put(&key, lease);
            self.pool.reserve(binding.address);

            if key == self.ecu_key {
                self.ecu_log
                    .info(&format!("[ECU] BOUND to {}", binding.address));
                self.initial_ecu_address = Some(binding.address);
                notification = Some(EcuNotification::new(key, binding.address));
            }
        }

        notification
    }

    /// Removes every lease past hard expiry and returns its address to the
    /// pool. The grace window deliberately does not apply here: grace only
    /// protects reloads and re-offers, the sweep guarantees reclamation.
    ///
    /// Returns the number of leases removed; the caller persists iff it is
    /// nonzero.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(now_ms())
    }

    fn sweep_at(&mut self, now: i64) -> usize {
        let expired: Vec<(String, Ipv4Addr)> = self
            .store
            .all()
            .filter(|(_, lease)| lease.is_expired(now))
            .map(|(key, lease)| (key.clone(), lease.address))
            .collect();

        for (key, address) in &expired {
            self.store.remove(key);
            self.pool.release(*address);
            info!("Expired lease for MAC {}, IP {} returned to pool", key, address);
            if *key == self.ecu_key {
                self.ecu_log.info("[ECU] lease expired, IP returned to pool");
            }
        }

        expired.len()
    }

    /// Flushes the store to disk without blocking the event path.
    ///
    /// The write runs as a detached task; a failure leaves the in-memory
    /// store authoritative and is retried by the next mutating event.
    pub fn persist(&self) {
        let store = self.store.clone();
        let path = self.config.leases_file.clone();
        let save_lock = Arc::clone(&self.save_lock);
        tokio::spawn(async move {
            let _lock = save_lock.lock().await;
            match store.save(&path).await {
                Ok(()) => debug!("Leases persisted to {}", path),
                Err(error) => error!("Failed to persist leases to {}: {}", path, error),
            }
        });
    }

    /// Awaited flush, used at shutdown and by the cleanup subcommand.
    pub async fn save_now(&self) -> Result<()> {
        let _lock = self.save_lock.lock().await;
        self.store.save(&self.config.leases_file).await
    }

    pub fn store(&self) -> &LeaseStore {
        &self.store
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    pub fn initial_ecu_address(&self) -> Option<Ipv4Addr> {
        self.initial_ecu_address
    }

    pub fn ecu_key(&self) -> &str {
        &self.ecu_key
    }
}
