use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::{Error, Result};
use crate::mac;

/// Default lease duration in seconds (2 hours).
pub const DEFAULT_LEASE_SECONDS: u32 = 7200;

/// Default grace window in milliseconds (10 minutes).
///
/// A lease is still honored for reload and re-offer this long past its
/// nominal expiry, so a short server restart does not reshuffle addresses.
pub const DEFAULT_GRACE_WINDOW_MS: i64 = 10 * 60 * 1000;

/// Default expiry sweep interval in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Hardware address of the vehicle ECU that must keep a stable address.
pub const DEFAULT_ECU_MAC: &str = "AA-BB-CC-DD-30-60";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub interface: String,
    pub server_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub pool_start: Ipv4Addr,
    pub pool_end: Ipv4Addr,
    pub lease_duration_seconds: u32,
    pub grace_window_ms: i64,
    pub sweep_interval_seconds: u64,
    /// The distinguished device; stored in any delimiter convention,
    /// normalized before use.
    pub ecu_mac: String,
    pub leases_file: String,
    /// Dedicated audit log for distinguished-device transitions.
    /// Disabled when absent.
    pub ecu_log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            server_ip: Ipv4Addr::new(192, 168, 1, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            pool_start: Ipv4Addr::new(192, 168, 1, 100),
            pool_end: Ipv4Addr::new(192, 168, 1, 200),
            lease_duration_seconds: DEFAULT_LEASE_SECONDS,
            grace_window_ms: DEFAULT_GRACE_WINDOW_MS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            ecu_mac: DEFAULT_ECU_MAC.to_string(),
            leases_file: "leases.json".to_string(),
            ecu_log_file: Some("ecu_dhcp.log".to_string()),
        }
    }
}

impl Config {
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let start = u32::from(self.pool_start);
        let end = u32::from(self.pool_end);

        if start > end {
            return Err(Error::InvalidConfig(
                "pool_start must be less than or equal to pool_end".to_string(),
            ));
        }

        let server = u32::from(self.server_ip);
        if server >= start && server <= end {
            return Err(Error::InvalidConfig(
                "server_ip must not be within the pool range".to_string(),
            ));
        }

        if self.lease_duration_seconds == 0 {
            return Err(Error::InvalidConfig(
                "lease_duration_seconds must be greater than 0".to_string(),
            ));
        }

        if self.grace_window_ms < 0 {
            return Err(Error::InvalidConfig(
                "grace_window_ms must not be negative".to_string(),
            ));
        }

        if self.sweep_interval_seconds == 0 {
            return Err(Error::InvalidConfig(
                "sweep_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if !mac::is_valid(&self.ecu_mac) {
            return Err(Error::InvalidConfig(format!(
                "ecu_mac {:?} is not a valid hardware address",
                self.ecu_mac
            )));
        }

        Ok(())
    }

    pub fn ip_in_pool(&self, ip: Ipv4Addr) -> bool {
        let addr = u32::from(ip);
        let start = u32::from(self.pool_start);
        let end = u32::from(self.pool_end);
        addr >= start && addr <= end
    }

    pub fn pool_size(&self) -> u32 {
        u32::from(self.pool_end) - u32::from(self.pool_start) + 1
    }

    /// Lease duration in milliseconds, the unit the lease document uses.
    pub fn lease_duration_ms(&self) -> i64 {
        i64::from(self.lease_duration_seconds) * 1000
    }
}
