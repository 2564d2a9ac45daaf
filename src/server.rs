//! Event loop bridging the protocol engine to the lease manager.
//!
//! The engine delivers one JSON event per line on stdin; offers, acks, naks,
//! and the ECU notification go back as single JSON lines on stdout. Log
//! output is kept on stderr so every stdout line is machine-parseable.
//!
//! Events and the periodic sweep run on one task via `select!`, so exactly
//! one handler mutates the store at a time and events are processed in
//! arrival order. The only detached work is the fire-and-forget persistence
//! write inside the manager.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, Response};
use crate::manager::LeaseManager;

pub struct LeaseServer {
    config: Arc<Config>,
    manager: Mutex<LeaseManager>,
}

impl LeaseServer {
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let manager = LeaseManager::bootstrap(Arc::clone(&config)).await?;

        info!(
            "Lease server up on {} (iface {})",
            config.server_ip, config.interface
        );

        Ok(Self {
            config,
            manager: Mutex::new(manager),
        })
    }

    /// Runs until the engine closes stdin. The caller handles termination
    /// signals and invokes [`LeaseServer::save_leases`] for the final flush.
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut sweep_timer = tokio::time::interval(Duration::from_secs(
            self.config.sweep_interval_seconds,
        ));
        // The first tick fires immediately; skip it so startup is quiet.
        sweep_timer.tick().await;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => self.handle_line(&line).await,
                        None => {
                            info!("Engine closed the event stream");
                            return Ok(());
                        }
                    }
                }
                _ = sweep_timer.tick() => {
                    let mut manager = self.manager.lock().await;
                    let removed = manager.sweep();
                    if removed > 0 {
                        info!("Sweep removed {} expired lease(s)", removed);
                        manager.persist();
                    }
                }
            }
        }
    }

    async fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let event: Event = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(error) => {
                warn!("{}", Error::MalformedEvent(error.to_string()));
                return;
            }
        };

        let mut manager = self.manager.lock().await;
        match event {
            Event::Discover { hardware_address } => {
                let response = match manager.handle_discover(&hardware_address) {
                    Ok(response) => response,
                    Err(Error::PoolExhausted) => Response::Nak {
                        reason: "no assignable address".to_string(),
                    },
                    Err(error) => {
                        warn!("Discover from {} failed: {}", hardware_address, error);
                        return;
                    }
                };
                emit(&response);
            }
            Event::Request {
                hardware_address,
                requested_address,
            } => {
                let response =
                    match manager.handle_request(&hardware_address, requested_address) {
                        Ok(response) => response,
                        Err(Error::PoolExhausted) => Response::Nak {
                            reason: "no assignable address".to_string(),
                        },
                        Err(error) => {
                            warn!("Request from {} failed: {}", hardware_address, error);
                            return;
                        }
                    };
                emit(&response);
            }
            Event::Bound {
                bindings_by_hardware_address,
            } => {
                let notification = manager.handle_bound(bindings_by_hardware_address);
                if let Some(notification) = notification {
                    emit(&notification);
                }
                // One flush per bound event, regardless of binding count.
                manager.persist();
            }
        }
    }

    /// Final synchronous flush, called on shutdown.
    pub async fn save_leases(&self) -> Result<()> {
        self.manager.lock().await.save_now().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Writes one self-contained JSON line to stdout.
fn emit<T: serde::Serialize>(message: &T) {
    match serde_json::to_string(message) {
        Ok(line) => println!("{}", line),
        Err(error) => warn!("Failed to encode stdout message: {}", error),
    }
}
