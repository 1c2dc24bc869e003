use std::path::PathBuf;

use clap_derive::Parser;

use broadcaster_wire::Config;

/// CLI surface, layered over an optional config file and then process
/// defaults — the same `Option<T>`-overrides-then-`merge_config`
/// pattern `moor-daemon`'s `Args`/`DatabaseArgs`/`FeatureArgs` use, with
/// the file layer added via `figment` instead of hand-rolled parsing.
#[derive(Parser, Debug)]
#[command(name = "broadcaster-node", version, about)]
pub struct Args {
    #[arg(
        long,
        value_name = "listen-address",
        help = "HTTP/WebSocket listen address",
        default_value = "0.0.0.0:8080"
    )]
    pub listen_address: String,

    #[arg(
        long,
        value_name = "config-file",
        help = "Optional JSON or YAML file with Config overrides"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "data-dir",
        help = "Directory for the Fjall-backed session/connection store; omit for in-memory only"
    )]
    pub data_dir: Option<PathBuf>,

    #[command(flatten)]
    pub latency_args: LatencyArgs,

    #[arg(long, value_name = "default-tick-ms", help = "Default tick cadence for new sessions")]
    pub default_tick_ms: Option<u32>,

    #[arg(long, value_name = "countdown-ms", help = "Countdown duration before a session's startAt")]
    pub countdown_ms: Option<u32>,

    #[arg(long, value_name = "connection-ttl-seconds")]
    pub connection_ttl_seconds: Option<u64>,

    #[arg(long, value_name = "session-ttl-seconds")]
    pub session_ttl_seconds: Option<u64>,

    #[arg(long, value_name = "region", help = "Region identifier tagged onto sessions created by this node")]
    pub region: Option<String>,

    #[arg(long, value_name = "session-refresh-interval-ms")]
    pub session_refresh_interval_ms: Option<u64>,

    #[arg(long, value_name = "connection-stale-seconds")]
    pub connection_stale_seconds: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct LatencyArgs {
    #[arg(long, value_name = "max-latency-ms")]
    pub max_latency_ms: Option<u32>,

    #[arg(long, value_name = "max-jitter-ms")]
    pub max_jitter_ms: Option<u32>,

    #[arg(long, value_name = "warning-latency-ms")]
    pub warning_latency_ms: Option<u32>,

    #[arg(long, value_name = "warning-jitter-ms")]
    pub warning_jitter_ms: Option<u32>,

    #[arg(long, value_name = "latency-samples")]
    pub latency_samples: Option<usize>,
}

impl LatencyArgs {
    pub fn merge_config(&self, config: &mut Config) {
        if let Some(v) = self.max_latency_ms {
            config.max_latency_ms = v;
        }
        if let Some(v) = self.max_jitter_ms {
            config.max_jitter_ms = v;
        }
        if let Some(v) = self.warning_latency_ms {
            config.warning_latency_ms = v;
        }
        if let Some(v) = self.warning_jitter_ms {
            config.warning_jitter_ms = v;
        }
        if let Some(v) = self.latency_samples {
            config.latency_samples = v;
        }
    }
}

impl Args {
    pub fn merge_config(&self, mut config: Config) -> Config {
        self.latency_args.merge_config(&mut config);
        if let Some(v) = self.default_tick_ms {
            config.default_tick_ms = v;
        }
        if let Some(v) = self.countdown_ms {
            config.countdown_ms = v;
        }
        if let Some(v) = self.connection_ttl_seconds {
            config.connection_ttl_seconds = v;
        }
        if let Some(v) = self.session_ttl_seconds {
            config.session_ttl_seconds = v;
        }
        if let Some(v) = self.region.clone() {
            config.region = v;
        }
        if let Some(v) = self.session_refresh_interval_ms {
            config.session_refresh_interval_ms = v;
        }
        if let Some(v) = self.connection_stale_seconds {
            config.connection_stale_seconds = v;
        }
        config
    }
}

/// Loads the file layer (if any) with `figment`, then applies the CLI
/// overrides on top, mirroring `moor-daemon`'s "file, then flags" merge
/// order.
pub fn load_config(args: &Args) -> Result<Config, eyre::Error> {
    use figment::providers::{Format, Json, Yaml};
    use figment::Figment;

    let base = match &args.config_file {
        None => Config::default(),
        Some(path) => {
            let figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => Figment::from(Yaml::file(path)),
                _ => Figment::from(Json::file(path)),
            };
            figment
                .join(figment::providers::Serialized::defaults(Config::default()))
                .extract()?
        }
    };
    Ok(args.merge_config(base))
}
