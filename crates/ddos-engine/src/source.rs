//! The packet-source seam: the trait boundary between the worker
//! poll loop and whatever actually produces packets.
//!
//! The real NIC burst-receive API is an external collaborator outside
//! this workspace; `PacketSource` is the trait boundary a real driver
//! binding, or a PCAP replayer, would implement. Two in-crate
//! implementations are provided for running the engine without
//! hardware: a null source (always empty, used by tests and
//! idle-shutdown verification) and a synthetic generator driven by a
//! seeded PRNG.

/// One received packet: borrowed bytes plus the owning burst's
/// lifetime. Workers must finish classifying before the next
/// `rx_burst` call reuses the buffer.
pub struct RxPacket<'a> {
    pub data: &'a [u8],
}

/// NIC-reported counters the coordinator surfaces in the statistics
/// report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NicStats {
    pub packets: u64,
    pub drops: u64,
    pub errors: u64,
    pub no_buffer: u64,
}

/// The burst-receive contract every worker polls:
/// `rx_burst(port, queue, out[], max) -> n`.
pub trait PacketSource: Send {
    /// Fill `out` with up to `out.len()` packets for `queue`,
    /// returning how many were written. Zero is a normal "nothing
    /// arrived this poll" result, not an error.
    fn rx_burst<'a>(&'a mut self, queue: usize, out: &mut Vec<RxPacket<'a>>, max: usize) -> usize;

    /// Current NIC-reported counters for this port.
    fn nic_stats(&self) -> NicStats {
        NicStats::default()
    }
}

/// Always returns zero packets. Used to exercise worker shutdown and
/// as the default when no traffic generator is configured.
pub struct NullPacketSource;

impl PacketSource for NullPacketSource {
    fn rx_burst<'a>(&'a mut self, _queue: usize, _out: &mut Vec<RxPacket<'a>>, _max: usize) -> usize {
        0
    }
}

/// A minimal deterministic traffic generator: yields synthetic
/// Ethernet+IPv4+UDP frames from a fixed source CIDR at a configured
/// rate, for exercising the engine end-to-end without hardware or a
/// captured trace.
pub struct SyntheticPacketSource {
    frame: Vec<u8>,
    packets_per_burst: usize,
    remaining_bursts: Option<usize>,
}

impl SyntheticPacketSource {
    /// `frame` is the raw Ethernet frame bytes replayed unchanged on
    /// every burst; `remaining_bursts` of `None` means unbounded.
    pub fn new(frame: Vec<u8>, packets_per_burst: usize, remaining_bursts: Option<usize>) -> Self {
        Self { frame, packets_per_burst, remaining_bursts }
    }
}

impl PacketSource for SyntheticPacketSource {
    fn rx_burst<'a>(&'a mut self, _queue: usize, out: &mut Vec<RxPacket<'a>>, max: usize) -> usize {
        if let Some(remaining) = self.remaining_bursts {
            if remaining == 0 {
                return 0;
            }
            self.remaining_bursts = Some(remaining - 1);
        }
        let n = self.packets_per_burst.min(max);
        for _ in 0..n {
            out.push(RxPacket { data: &self.frame });
        }
        n
    }
}

/// Builds a minimal Ethernet+IPv4+UDP frame with the given source
/// address, for use by generators that vary source IPs per packet.
/// `total_len` is written into the IP header's total-length field
/// independent of the frame's actual byte length, since the parser
/// reads declared length rather than `data.len()` for `bytes_in`/
/// `bytes_out` accounting.
fn build_udp_frame(src_ip: std::net::Ipv4Addr, dst_ip: std::net::Ipv4Addr, dst_port: u16, total_len: u16) -> Vec<u8> {
    let mut frame = vec![0u8; 14]; // dst mac + src mac, unused by the parser
    frame.extend_from_slice(&[0x08, 0x00]); // ethertype IPv4
    frame.push(0x45); // version/ihl
    frame.push(0x00); // tos
    frame.extend_from_slice(&total_len.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // id, flags/frag
    frame.extend_from_slice(&[0x40, 0x11, 0x00, 0x00]); // ttl, proto=UDP, checksum
    frame.extend_from_slice(&src_ip.octets());
    frame.extend_from_slice(&dst_ip.octets());
    frame.extend_from_slice(&12345u16.to_be_bytes()); // src port
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x0c, 0x00, 0x00]); // udp len, checksum
    frame
}

/// A randomized demo generator that varies the source address of each
/// packet between the configured baseline and attack prefixes,
/// weighted by `attack_weight`. Used by `ddos-cli`'s `--demo` mode to
/// exercise the full engine end to end without real hardware or a
/// captured trace, driven here by a seeded PRNG rather than a fixed
/// frame.
///
/// Baseline packets are addressed to `server_port` (inbound requests
/// reaching the monitored server) at a small declared length; attack
/// packets are addressed to a non-server reflector port at a large
/// declared length, modelling the amplified UDP response traffic
/// leaving the network that the amplification rule (R1) watches for.
/// Without this split every demo packet shares one direction and
/// `bytes_ratio` can never move, so `--demo` could never reproduce the
/// amplification scenario.
pub struct DemoPacketSource {
    rng: rand::rngs::StdRng,
    baseline_net: ipnetwork::Ipv4Network,
    attack_net: ipnetwork::Ipv4Network,
    dst_ip: std::net::Ipv4Addr,
    server_port: u16,
    reflector_port: u16,
    packets_per_burst: usize,
    attack_weight: f64,
    buffer: Vec<Vec<u8>>,
}

const DEMO_REQUEST_LEN: u16 = 64;
const DEMO_AMPLIFIED_LEN: u16 = 1400;

impl DemoPacketSource {
    /// `server_port` is the destination port baseline (request)
    /// traffic is sent to, matching the configured server-port set so
    /// it counts as `bytes_in`; attack traffic always targets a fixed
    /// non-server reflector port so it counts as `bytes_out`.
    pub fn new(
        seed: u64,
        baseline_net: ipnetwork::Ipv4Network,
        attack_net: ipnetwork::Ipv4Network,
        dst_ip: std::net::Ipv4Addr,
        server_port: u16,
        packets_per_burst: usize,
        attack_weight: f64,
    ) -> Self {
        use rand::SeedableRng;
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
            baseline_net,
            attack_net,
            dst_ip,
            server_port,
            reflector_port: 53,
            packets_per_burst,
            attack_weight: attack_weight.clamp(0.0, 1.0),
            buffer: Vec::new(),
        }
    }

    fn random_ip_in(&mut self, net: ipnetwork::Ipv4Network) -> std::net::Ipv4Addr {
        use rand::Rng;
        let base: u32 = net.network().into();
        let host_bits = 32 - net.prefix() as u32;
        let span = if host_bits >= 32 { u32::MAX } else { (1u32 << host_bits).saturating_sub(1) };
        let offset: u32 = if span == 0 { 0 } else { self.rng.gen_range(0..=span) };
        std::net::Ipv4Addr::from(base | offset)
    }
}

impl PacketSource for DemoPacketSource {
    fn rx_burst<'a>(&'a mut self, _queue: usize, out: &mut Vec<RxPacket<'a>>, max: usize) -> usize {
        use rand::Rng;
        let n = self.packets_per_burst.min(max);
        self.buffer.clear();
        for _ in 0..n {
            let from_attack = self.rng.gen_bool(self.attack_weight);
            let net = if from_attack { self.attack_net } else { self.baseline_net };
            let src_ip = self.random_ip_in(net);
            let (dst_port, total_len) =
                if from_attack { (self.reflector_port, DEMO_AMPLIFIED_LEN) } else { (self.server_port, DEMO_REQUEST_LEN) };
            self.buffer.push(build_udp_frame(src_ip, self.dst_ip, dst_port, total_len));
        }
        for frame in &self.buffer {
            out.push(RxPacket { data: frame });
        }
        n
    }
}
