//! Parsers for `/proc/net/{tcp,tcp6,udp,icmp}`.
//!
//! Line layout after the header:
//! `sl local_address rem_address st tx_queue:rx_queue tr:tm->when retrnsmt uid timeout inode ...`
//! Addresses are `HEXIP:HEXPORT`, the IP being the raw in-memory address
//! printed as host-endian 32-bit words.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::models::TrafficInfo;

/// Minimum columns for a usable line (up to and including inode).
const MIN_FIELDS: usize = 10;

/// Kernel state code of a listening TCP socket.
pub const TCP_LISTEN: &str = "0A";

/// Decodes `0100007F:0016` into `("127.0.0.1", 22)`.
///
/// Malformed input yields an empty address and port 0 instead of an error.
pub fn decode_address(packed: &str) -> (String, u16) {
    let Some((ip_hex, port_hex)) = packed.rsplit_once(':') else {
        return (String::new(), 0);
    };
    let Ok(port) = u16::from_str_radix(port_hex, 16) else {
        return (String::new(), 0);
    };
    match decode_ip(ip_hex) {
        Some(ip) => (ip, port),
        None => (String::new(), 0),
    }
}

fn decode_ip(hex: &str) -> Option<String> {
    match hex.len() {
        8 => {
            let word = u32::from_str_radix(hex, 16).ok()?;
            Some(Ipv4Addr::from(word.to_ne_bytes()).to_string())
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(hex.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            Some(Ipv6Addr::from(octets).to_string())
        }
        _ => None,
    }
}

/// Kernel name of a `st` column code; unknown codes are returned as-is.
pub fn tcp_state_label(code: &str) -> String {
    let label = match code.to_ascii_uppercase().as_str() {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        "0C" => "NEW_SYN_RECV",
        _ => return code.to_string(),
    };
    label.to_string()
}

/// Parses one connection table. The receive queue becomes the sample's byte
/// count. Short lines or an unparseable queue column drop only that line.
pub fn parse_connection_table(protocol: &str, content: &str) -> Vec<TrafficInfo> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_connection_line(protocol, line))
        .collect()
}

fn parse_connection_line(protocol: &str, line: &str) -> Option<TrafficInfo> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }
    let (_tx_queue, rx_queue) = fields[4].split_once(':')?;
    let rx_queue = i64::from_str_radix(rx_queue, 16).ok()?;
    let (source_ip, source_port) = decode_address(fields[1]);
    let (dest_ip, dest_port) = decode_address(fields[2]);
    Some(TrafficInfo {
        source_ip,
        source_port,
        dest_ip,
        dest_port,
        protocol: protocol.to_string(),
        bytes: rx_queue,
        state: tcp_state_label(fields[3]),
        bytes_per_sec: 0.0,
    })
}

/// Local port, state and inode of one socket table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub port: u16,
    pub state: String,
    pub inode: u64,
}

/// Parses a tcp/tcp6 table for socket ownership lookup.
pub fn parse_socket_table(content: &str) -> Vec<SocketEntry> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < MIN_FIELDS {
                return None;
            }
            let (_, port_hex) = fields[1].rsplit_once(':')?;
            Some(SocketEntry {
                port: u16::from_str_radix(port_hex, 16).ok()?,
                state: fields[3].to_ascii_uppercase(),
                inode: fields[9].parse().ok()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
   0: 0100007F:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 5555 1 0000000000000000 100 0 0 10 0\n\
   1: 0100007F:9C40 0100007F:0016 01 00000000:0000001A 00:00000000 00000000  1000        0 6666 1 0000000000000000 20 4 30 10 -1\n\
   2: garbage\n";

    #[cfg(target_endian = "little")]
    #[test]
    fn decode_loopback_in_kernel_byte_order() {
        assert_eq!(decode_address("0100007F:0016"), ("127.0.0.1".to_string(), 22));
        assert_eq!(
            decode_address("0101A8C0:1F90"),
            ("192.168.1.1".to_string(), 8080)
        );
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn decode_ipv6_loopback() {
        let (ip, port) = decode_address("00000000000000000000000001000000:0050");
        assert_eq!(ip, "::1");
        assert_eq!(port, 80);
    }

    #[test]
    fn decode_malformed_is_empty() {
        assert_eq!(decode_address("zz00007F:0016"), (String::new(), 0));
        assert_eq!(decode_address("0100007F"), (String::new(), 0));
        assert_eq!(decode_address("0100007F:XYZ1"), (String::new(), 0));
        assert_eq!(decode_address("0100:0016"), (String::new(), 0));
    }

    #[test]
    fn state_labels() {
        assert_eq!(tcp_state_label("0A"), "LISTEN");
        assert_eq!(tcp_state_label("01"), "ESTABLISHED");
        assert_eq!(tcp_state_label("0a"), "LISTEN");
        assert_eq!(tcp_state_label("FF"), "FF");
    }

    #[test]
    fn connection_table_skips_header_and_bad_lines() {
        let conns = parse_connection_table("tcp", TCP);
        assert_eq!(conns.len(), 2);
        assert_eq!(conns[0].source_port, 22);
        assert_eq!(conns[0].state, "LISTEN");
        assert_eq!(conns[0].bytes, 0);
        assert_eq!(conns[1].source_port, 40000);
        assert_eq!(conns[1].dest_port, 22);
        assert_eq!(conns[1].state, "ESTABLISHED");
        assert_eq!(conns[1].bytes, 26);
        assert_eq!(conns[1].protocol, "tcp");
    }

    #[test]
    fn connection_line_with_bad_queue_is_dropped() {
        let content = "header\n   0: 0100007F:0016 00000000:0000 0A nocolon 00:00000000 0 0 0 1\n";
        assert!(parse_connection_table("udp", content).is_empty());
    }

    #[test]
    fn socket_table_reads_port_state_inode() {
        let entries = parse_socket_table(TCP);
        assert_eq!(
            entries,
            vec![
                SocketEntry {
                    port: 22,
                    state: "0A".into(),
                    inode: 5555
                },
                SocketEntry {
                    port: 40000,
                    state: "01".into(),
                    inode: 6666
                },
            ]
        );
    }
}
