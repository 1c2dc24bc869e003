use serde::{Deserialize, Serialize};

/// Process-wide configuration, spec.md section 6.3. Loaded from an
/// optional JSON/YAML file and overridden by CLI flags and
/// environment variables in `broadcaster-daemon`'s `Args::merge_config`,
/// the same layering `moor-daemon`'s `Args` uses over its `Config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_latency_ms: u32,
    pub max_jitter_ms: u32,
    pub warning_latency_ms: u32,
    pub warning_jitter_ms: u32,
    pub latency_samples: usize,

    pub default_tick_ms: u32,
    pub countdown_ms: u32,

    pub connection_ttl_seconds: u64,
    pub session_ttl_seconds: u64,

    pub region: String,

    /// How often the tick loop rescans the store for active sessions
    /// (spec.md section 4.4.1). Not itself a named `§6.3` option, but
    /// the "default 5 s" refresh interval that section names.
    pub session_refresh_interval_ms: u64,

    /// Staleness bound for the connection reaper (section 4.3.5,
    /// "default 60 s").
    pub connection_stale_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_latency_ms: 150,
            max_jitter_ms: 50,
            warning_latency_ms: 100,
            warning_jitter_ms: 30,
            latency_samples: 5,
            default_tick_ms: 100,
            countdown_ms: 3000,
            connection_ttl_seconds: 3600,
            session_ttl_seconds: 86_400,
            region: "local".to_string(),
            session_refresh_interval_ms: 5_000,
            connection_stale_seconds: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6_3() {
        let c = Config::default();
        assert_eq!(c.max_latency_ms, 150);
        assert_eq!(c.max_jitter_ms, 50);
        assert_eq!(c.warning_latency_ms, 100);
        assert_eq!(c.warning_jitter_ms, 30);
        assert_eq!(c.latency_samples, 5);
        assert_eq!(c.default_tick_ms, 100);
        assert_eq!(c.countdown_ms, 3000);
        assert_eq!(c.connection_ttl_seconds, 3600);
        assert_eq!(c.session_ttl_seconds, 86_400);
    }

    #[test]
    fn round_trips_through_json() {
        let c = Config::default();
        let json = serde_json::to_string(&c).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.region, c.region);
        assert_eq!(back.max_latency_ms, c.max_latency_ms);
    }
}
