//! On-disk settings file, optionally loaded before CLI flags are
//! overlaid on top: a typed `Settings` struct optionally loaded from a
//! TOML file and overridden by flags, mirroring `cli/src/config.rs`'s
//! `Config::load` / `Config::default` pattern.

use serde::{Deserialize, Serialize};

/// Every field is optional: an absent field simply leaves the CLI
/// flag's own default in place. This is a thinner struct than
/// [`ddos_engine::EngineConfig`] deliberately — it only exists to
/// give an operator a file to check in, not to be the engine's
/// internal representation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    pub port: Option<u16>,
    pub nic_pci: Option<String>,
    pub worker_cores: Option<Vec<usize>>,
    pub coordinator_core: Option<usize>,
    pub baseline_cidr: Option<Vec<String>>,
    pub attack_cidr: Option<Vec<String>>,
    pub server_ports: Option<Vec<u16>>,
    pub fast_tick_ms: Option<u64>,
    pub stats_tick_ms: Option<u64>,
    pub sample_rate: Option<u32>,
    pub sketch_depth: Option<usize>,
    pub sketch_width: Option<usize>,
    pub model_path: Option<String>,
    pub log_file: Option<String>,

    pub amplification_threshold: Option<f64>,
    pub attack_ratio_min: Option<f64>,
    pub min_packets: Option<u64>,
    pub udp_per_ip_pps: Option<f64>,
    pub syn_per_ip_pps: Option<f64>,
    pub icmp_per_ip_pps: Option<f64>,
    pub http_per_ip_pps: Option<f64>,
    pub heavy_hitter_threshold: Option<u32>,
    pub heavy_hitter_ip_limit: Option<usize>,
    pub baseline_udp_per_ip_pps: Option<f64>,
    pub burst_threshold: Option<u32>,
    pub burst_sub_window_ms: Option<u64>,
}

impl Settings {
    /// Load a TOML settings file. The caller only invokes this when a
    /// `--config` path was explicitly given, so an unreadable or
    /// malformed file here is a startup error rather than a silent
    /// fallback; the "missing file isn't an error" posture
    /// (`edge/src/main.rs`'s `Config::load`) applies one level up, in
    /// `main.rs`'s decision of whether to call `load` at all.
    pub fn load(path: &std::path::Path) -> Result<Self, ddos_common::AppError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ddos_common::AppError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error_not_a_panic() {
        let result = Settings::load(std::path::Path::new("/nonexistent/octosketch.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("octosketch-settings-test-{}.toml", std::process::id()));
        std::fs::write(&path, "sample_rate = 50\nworker_cores = [1, 2, 3]\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.sample_rate, Some(50));
        assert_eq!(settings.worker_cores, Some(vec![1, 2, 3]));
        assert_eq!(settings.port, None);

        let _ = std::fs::remove_file(&path);
    }
}
