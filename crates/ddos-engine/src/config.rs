//! Engine configuration: the binding point for the CLI surface.

use ddos_common::net::{parse_cidr, PrefixSet, ServerPortSet};
use ipnetwork::Ipv4Network;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub port_id: u16,
    pub nic_pci_address: String,
    pub worker_cores: Vec<usize>,
    pub coordinator_core: usize,
    pub baseline_cidrs: Vec<Ipv4Network>,
    pub attack_cidrs: Vec<Ipv4Network>,
    pub server_ports: ServerPortSet,
    pub fast_tick: Duration,
    pub stats_tick: Duration,
    pub sample_rate: u32,
    pub sketch_depth: usize,
    pub sketch_width: usize,
    pub heavy_hitter_k: usize,
    pub model_path: Option<std::path::PathBuf>,
    pub log_file: Option<std::path::PathBuf>,
}

impl EngineConfig {
    pub fn prefix_set(&self) -> PrefixSet {
        PrefixSet::new().with_baseline(&self.baseline_cidrs).with_attack(&self.attack_cidrs)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_cores.len()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port_id: 0,
            nic_pci_address: String::new(),
            worker_cores: vec![1, 2],
            coordinator_core: 0,
            baseline_cidrs: Vec::new(),
            attack_cidrs: Vec::new(),
            server_ports: ServerPortSet::default(),
            fast_tick: Duration::from_millis(50),
            stats_tick: Duration::from_secs(5),
            sample_rate: 100,
            sketch_depth: 4,
            sketch_width: 16_384,
            heavy_hitter_k: 32,
            model_path: None,
            log_file: None,
        }
    }
}

/// Parse a comma-separated CIDR list from the CLI surface.
pub fn parse_cidr_list(s: &str) -> Result<Vec<Ipv4Network>, String> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(|part| parse_cidr(part.trim())).collect()
}
