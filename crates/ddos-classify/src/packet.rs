//! Ethernet → IPv4 → (UDP|TCP|ICMP) header parsing.
//!
//! No allocation, no copying: every field is read directly out of the
//! caller-owned byte slice.

const ETHERNET_HEADER_LEN: usize = 14;
const MIN_IPV4_HEADER_LEN: usize = 20;
const ETHER_TYPE_IPV4: u16 = 0x0800;

const PROTO_ICMP: u8 = 1;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;

/// TCP flag bits relevant to the rule engine.
pub mod tcp_flags {
    pub const SYN: u8 = 0b0000_0010;
    pub const ACK: u8 = 0b0001_0000;
}

/// Transport-layer detail extracted for TCP/UDP packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub tcp_flags: u8,
}

/// The subset of a parsed packet the classifier needs. Not a 1:1
/// wire-format mirror: only the fields rules and sketches consult are
/// kept.
#[derive(Debug, Clone, Copy)]
pub struct ParsedPacket {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub protocol: u8,
    pub total_len: u16,
    pub transport: Option<TransportHeader>,
}

impl ParsedPacket {
    pub fn is_tcp(&self) -> bool {
        self.protocol == PROTO_TCP
    }

    pub fn is_udp(&self) -> bool {
        self.protocol == PROTO_UDP
    }

    pub fn is_icmp(&self) -> bool {
        self.protocol == PROTO_ICMP
    }
}

/// Parse an Ethernet frame down to its IPv4 + transport header.
/// Returns `None` for anything malformed or non-IPv4 (these are
/// counted under `other` by the caller, not here).
#[inline]
pub fn parse_ipv4_packet(data: &[u8]) -> Option<ParsedPacket> {
    if data.len() < ETHERNET_HEADER_LEN + MIN_IPV4_HEADER_LEN {
        return None;
    }

    let eth_type = u16::from_be_bytes([data[12], data[13]]);
    if eth_type != ETHER_TYPE_IPV4 {
        return None;
    }

    let ip = &data[ETHERNET_HEADER_LEN..];
    let version = ip[0] >> 4;
    if version != 4 {
        return None;
    }
    let ihl = ((ip[0] & 0x0f) as usize) * 4;
    if ihl < MIN_IPV4_HEADER_LEN || ip.len() < ihl {
        return None;
    }

    let protocol = ip[9];
    let src_ip = u32::from_be_bytes([ip[12], ip[13], ip[14], ip[15]]);
    let dst_ip = u32::from_be_bytes([ip[16], ip[17], ip[18], ip[19]]);
    let total_len = u16::from_be_bytes([ip[2], ip[3]]);

    let l4 = &ip[ihl..];
    let transport = match protocol {
        PROTO_TCP if l4.len() >= 14 => Some(TransportHeader {
            src_port: u16::from_be_bytes([l4[0], l4[1]]),
            dst_port: u16::from_be_bytes([l4[2], l4[3]]),
            tcp_flags: l4[13],
        }),
        PROTO_UDP if l4.len() >= 4 => Some(TransportHeader {
            src_port: u16::from_be_bytes([l4[0], l4[1]]),
            dst_port: u16::from_be_bytes([l4[2], l4[3]]),
            tcp_flags: 0,
        }),
        _ => None,
    };

    Some(ParsedPacket { src_ip, dst_ip, protocol, total_len, transport })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udp_packet() -> Vec<u8> {
        vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // dst mac
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // src mac
            0x08, 0x00, // ethertype: IPv4
            0x45, 0x00, 0x00, 0x20, // version/ihl, tos, total_len=32
            0x00, 0x00, 0x00, 0x00, // id, flags/frag
            0x40, 0x11, 0x00, 0x00, // ttl, proto=UDP, checksum
            0xc0, 0xa8, 0x01, 0x01, // src 192.168.1.1
            0x0a, 0x00, 0x00, 0x01, // dst 10.0.0.1
            0x30, 0x39, // src port 12345
            0x00, 0x35, // dst port 53
            0x00, 0x0c, 0x00, 0x00, // udp len, checksum
        ]
    }

    fn tcp_syn_packet() -> Vec<u8> {
        let mut pkt = vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x08, 0x00,
            0x45, 0x00, 0x00, 0x28,
            0x00, 0x00, 0x00, 0x00,
            0x40, 0x06, 0x00, 0x00,
            0xc0, 0xa8, 0x01, 0x01,
            0x0a, 0x00, 0x00, 0x01,
        ];
        pkt.extend_from_slice(&[0x30, 0x39]); // src port
        pkt.extend_from_slice(&[0x01, 0xbb]); // dst port 443
        pkt.extend_from_slice(&[0; 8]); // seq/ack
        pkt.extend_from_slice(&[0x50, tcp_flags::SYN]); // data offset, flags=SYN
        pkt.extend_from_slice(&[0; 2]); // window
        pkt
    }

    #[test]
    fn parses_udp_packet() {
        let pkt = udp_packet();
        let parsed = parse_ipv4_packet(&pkt).expect("parse failed");
        assert!(parsed.is_udp());
        assert_eq!(parsed.src_ip, 0xC0A80101);
        assert_eq!(parsed.transport.unwrap().dst_port, 53);
    }

    #[test]
    fn parses_tcp_syn_flag() {
        let pkt = tcp_syn_packet();
        let parsed = parse_ipv4_packet(&pkt).expect("parse failed");
        assert!(parsed.is_tcp());
        let t = parsed.transport.unwrap();
        assert_eq!(t.dst_port, 443);
        assert_ne!(t.tcp_flags & tcp_flags::SYN, 0);
    }

    #[test]
    fn rejects_truncated_packet() {
        assert!(parse_ipv4_packet(&[0u8; 10]).is_none());
    }

    #[test]
    fn rejects_non_ipv4_ethertype() {
        let mut pkt = udp_packet();
        pkt[12] = 0x86;
        pkt[13] = 0xDD; // IPv6
        assert!(parse_ipv4_packet(&pkt).is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The parser sees every byte a malicious or malformed peer
        /// could ever send; it must never panic, regardless of
        /// content or length, on the worker's hot path.
        #[test]
        fn never_panics_on_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = parse_ipv4_packet(&data);
        }

        /// A well-formed IPv4+UDP frame always parses and always
        /// reports the source address that was written into it.
        #[test]
        fn roundtrips_src_ip_for_well_formed_udp_frames(
            a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>(),
            dst_port in any::<u16>(),
        ) {
            let mut pkt = vec![
                0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                0x08, 0x00,
                0x45, 0x00, 0x00, 0x20,
                0x00, 0x00, 0x00, 0x00,
                0x40, PROTO_UDP, 0x00, 0x00,
            ];
            pkt.extend_from_slice(&[a, b, c, d]);
            pkt.extend_from_slice(&[10, 0, 0, 1]);
            pkt.extend_from_slice(&[0x30, 0x39]);
            pkt.extend_from_slice(&dst_port.to_be_bytes());
            pkt.extend_from_slice(&[0, 0, 0, 0]);

            let parsed = parse_ipv4_packet(&pkt).expect("well-formed frame must parse");
            prop_assert_eq!(parsed.src_ip, u32::from_be_bytes([a, b, c, d]));
            prop_assert_eq!(parsed.transport.unwrap().dst_port, dst_port);
        }
    }
}
