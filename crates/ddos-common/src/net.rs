//! CIDR-based traffic classification.
//!
//! The classifier design admits a parallel IPv6 prefix set without
//! restructuring; `PrefixSet` is therefore
//! generic over the tagged network type rather than hard-coded to
//! `Ipv4Network`, even though only IPv4 parsing is wired up today.

use ipnetwork::{IpNetwork, Ipv4Network};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// The three traffic classes the engine sketches and rules evaluate
/// against (baseline / attack / other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficClass {
    Baseline,
    Attack,
    Other,
}

impl TrafficClass {
    /// All classes the sketch engine maintains one sketch per, in a
    /// fixed, stable iteration order.
    pub const ALL: [TrafficClass; 3] = [TrafficClass::Baseline, TrafficClass::Attack, TrafficClass::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficClass::Baseline => "baseline",
            TrafficClass::Attack => "attack",
            TrafficClass::Other => "other",
        }
    }
}

/// A set of CIDR prefixes tagged with the traffic class they denote.
/// Membership is resolved by longest-prefix match across baseline and
/// attack prefixes combined; on a tie, attack takes precedence (an
/// appliance defending against attack traffic should not silently
/// reclassify an overlapping attack prefix as baseline — see
/// DESIGN.md's Open Question log).
#[derive(Debug, Clone, Default)]
pub struct PrefixSet {
    entries: Vec<(Ipv4Network, TrafficClass)>,
}

impl PrefixSet {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_baseline(mut self, cidrs: &[Ipv4Network]) -> Self {
        self.entries.extend(cidrs.iter().map(|c| (*c, TrafficClass::Baseline)));
        self
    }

    pub fn with_attack(mut self, cidrs: &[Ipv4Network]) -> Self {
        self.entries.extend(cidrs.iter().map(|c| (*c, TrafficClass::Attack)));
        self
    }

    /// Classify a source address by longest-prefix membership. Returns
    /// `Other` if no configured prefix contains the address.
    pub fn classify(&self, ip: Ipv4Addr) -> TrafficClass {
        let mut best: Option<(u8, TrafficClass)> = None;
        for (net, class) in &self.entries {
            if net.contains(ip) {
                let prefix = net.prefix();
                let better = match best {
                    None => true,
                    Some((best_prefix, best_class)) => {
                        prefix > best_prefix
                            || (prefix == best_prefix && *class == TrafficClass::Attack && best_class != TrafficClass::Attack)
                    }
                };
                if better {
                    best = Some((prefix, *class));
                }
            }
        }
        best.map(|(_, class)| class).unwrap_or(TrafficClass::Other)
    }
}

/// Parse a CIDR string (`"10.0.0.0/8"`) into an `Ipv4Network`,
/// returning a readable error for the configuration surface.
pub fn parse_cidr(s: &str) -> Result<Ipv4Network, String> {
    match s.parse::<IpNetwork>() {
        Ok(IpNetwork::V4(net)) => Ok(net),
        Ok(IpNetwork::V6(_)) => Err(format!("{s}: IPv6 CIDRs are not supported by the core")),
        Err(e) => Err(format!("{s}: {e}")),
    }
}

/// The configured set of server ports used to determine packet
/// direction (bytes-in vs bytes-out).
#[derive(Debug, Clone)]
pub struct ServerPortSet(Vec<u16>);

impl ServerPortSet {
    pub fn new(ports: Vec<u16>) -> Self {
        Self(ports)
    }

    #[inline(always)]
    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(&port)
    }

    /// The lowest configured server port, or `None` if the set is
    /// empty. Used by callers (e.g. the demo traffic generator) that
    /// need one concrete server port rather than membership tests.
    pub fn first(&self) -> Option<u16> {
        self.0.iter().copied().min()
    }
}

impl Default for ServerPortSet {
    fn default() -> Self {
        Self(vec![80, 443, 8080])
    }
}

/// TCP/UDP destination ports treated as HTTP indicators.
pub const HTTP_INDICATOR_PORTS: [u16; 3] = [80, 443, 8080];

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn classifies_baseline_and_attack() {
        let set = PrefixSet::new()
            .with_baseline(&[net("10.0.0.0/8")])
            .with_attack(&[net("203.0.113.0/24")]);

        assert_eq!(set.classify("10.1.2.3".parse().unwrap()), TrafficClass::Baseline);
        assert_eq!(set.classify("203.0.113.5".parse().unwrap()), TrafficClass::Attack);
        assert_eq!(set.classify("8.8.8.8".parse().unwrap()), TrafficClass::Other);
    }

    #[test]
    fn longest_prefix_wins() {
        let set = PrefixSet::new()
            .with_baseline(&[net("10.0.0.0/8")])
            .with_attack(&[net("10.0.0.0/24")]);

        // The /24 attack prefix is more specific than the /8 baseline.
        assert_eq!(set.classify("10.0.0.5".parse().unwrap()), TrafficClass::Attack);
        assert_eq!(set.classify("10.1.0.5".parse().unwrap()), TrafficClass::Baseline);
    }

    #[test]
    fn attack_wins_prefix_tie() {
        let set = PrefixSet::new()
            .with_baseline(&[net("10.0.0.0/8")])
            .with_attack(&[net("10.0.0.0/8")]);
        assert_eq!(set.classify("10.1.1.1".parse().unwrap()), TrafficClass::Attack);
    }

    #[test]
    fn server_port_set_membership() {
        let ports = ServerPortSet::default();
        assert!(ports.contains(443));
        assert!(!ports.contains(22));
    }
}
