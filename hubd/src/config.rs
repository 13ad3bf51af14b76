use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use dotenv::dotenv;

#[derive(Clone, Debug, PartialEq)]
pub enum BusKind {
    InMem,
}

impl FromStr for BusKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inmem" => Ok(BusKind::InMem),
            _ => Err(()),
        }
    }
}

impl BusKind {
    fn as_str(&self) -> &'static str {
        match self {
            BusKind::InMem => "inmem",
        }
    }
}

impl Display for BusKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StorageKind {
    InMem,
}

impl FromStr for StorageKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inmem" => Ok(StorageKind::InMem),
            _ => Err(()),
        }
    }
}

impl StorageKind {
    fn as_str(&self) -> &'static str {
        match self {
            StorageKind::InMem => "inmem",
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry per protocol handler to load at startup: the registry name
/// (`zigbee`, `tuya`, `mqtt`, `shelly`, `wifi`) and its JSON config blob.
#[derive(Clone, Debug)]
pub struct Config {
    pub bus: BusKind,
    pub storage: StorageKind,
    pub protocols: HashMap<String, serde_json::Value>,
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self { bus: BusKind::InMem, storage: StorageKind::InMem, protocols: HashMap::new(), heartbeat_interval: Duration::from_secs(30) }
    }
}

impl Config {
    /// Reads `.env` (if present) then the process environment. Per-handler
    /// config blobs come from `KRYPIN_PROTOCOLS`, a JSON object mapping
    /// registry name to that handler's config value, e.g.
    /// `{"zigbee": {"port": "/dev/ttyACM0"}, "mqtt": {"host": "broker.local"}}`.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let mut c = Self::default();

        if let Ok(s) = std::env::var("KRYPIN_BUS") {
            c.bus = BusKind::from_str(&s).unwrap_or(c.bus);
        }
        if let Ok(s) = std::env::var("KRYPIN_STORAGE") {
            c.storage = StorageKind::from_str(&s).unwrap_or(c.storage);
        }
        if let Ok(secs) = std::env::var("KRYPIN_HEARTBEAT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                c.heartbeat_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(raw) = std::env::var("KRYPIN_PROTOCOLS") {
            let parsed: HashMap<String, serde_json::Value> = serde_json::from_str(&raw)?;
            c.protocols = parsed;
        }

        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_kind_round_trips_through_display_and_from_str() {
        assert_eq!(BusKind::from_str("inmem"), Ok(BusKind::InMem));
        assert_eq!(BusKind::InMem.to_string(), "inmem");
    }

    #[test]
    fn default_config_loads_no_protocols() {
        let c = Config::default();
        assert!(c.protocols.is_empty());
        assert_eq!(c.heartbeat_interval, Duration::from_secs(30));
    }
}
