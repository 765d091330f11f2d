pub const DEFAULT_BIND: &str = "127.0.0.1:8189";
pub const DEFAULT_BUS_CAPACITY: usize = 16;
/// Large enough for a full-resolution PNG data URI from the editor.
pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// How many undelivered previews a slow editor connection may lag behind.
    pub bus_capacity: usize,
    /// Upper bound on callback request bodies.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Reads `RELIGHT_BIND`, `RELIGHT_BUS_CAPACITY` and `RELIGHT_MAX_BODY_BYTES`,
    /// keeping defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(bind) = lookup("RELIGHT_BIND").filter(|b| !b.is_empty()) {
            cfg.bind_addr = bind;
        }
        if let Some(raw) = lookup("RELIGHT_BUS_CAPACITY") {
            match raw.parse::<usize>() {
                Ok(capacity) if capacity > 0 => cfg.bus_capacity = capacity,
                _ => tracing::warn!("ignoring RELIGHT_BUS_CAPACITY={raw:?}"),
            }
        }
        if let Some(raw) = lookup("RELIGHT_MAX_BODY_BYTES") {
            match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => cfg.max_body_bytes = limit,
                _ => tracing::warn!("ignoring RELIGHT_MAX_BODY_BYTES={raw:?}"),
            }
        }
        cfg
    }
}
