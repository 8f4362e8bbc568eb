// ABOUTME: Parses listening TCP ports from a container's /proc/net/tcp tables
// ABOUTME: Backs the active-ports surface without shelling out to netstat

use std::collections::BTreeSet;

/// Socket state code for LISTEN in /proc/net/tcp.
const TCP_LISTEN: &str = "0A";

/// Extract listening ports from concatenated `/proc/net/tcp` and
/// `/proc/net/tcp6` contents. Unparseable lines are skipped; this runs on
/// whatever a container's procfs happens to contain.
pub fn parse_listening_ports(proc_net_tcp: &str) -> Vec<u16> {
    let mut ports = BTreeSet::new();

    for line in proc_net_tcp.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // sl local_address rem_address st ...
        if fields.len() < 4 || !fields[0].ends_with(':') {
            continue;
        }
        if !fields[3].eq_ignore_ascii_case(TCP_LISTEN) {
            continue;
        }
        let Some((_, port_hex)) = fields[1].rsplit_once(':') else {
            continue;
        };
        if let Ok(port) = u16::from_str_radix(port_hex, 16) {
            if port > 0 {
                ports.insert(port);
            }
        }
    }

    ports.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0BB8 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 31337 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 31338 1 0000000000000000 100 0 0 10 0
   2: 0100007F:0016 0100007F:B87A 01 00000000:00000000 00:00000000 00000000     0        0 31339 1 0000000000000000 100 0 0 10 0
   3: 00000000000000000000000000000000:0BB8 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 31340 1 0000000000000000 100 0 0 10 0
";

    #[test]
    fn extracts_listening_ports_only() {
        let ports = parse_listening_ports(SAMPLE);
        // 0x0BB8 = 3000, 0x1F90 = 8080; the established 22 connection is skipped
        assert_eq!(ports, vec![3000, 8080]);
    }

    #[test]
    fn ipv6_duplicates_are_collapsed() {
        let ports = parse_listening_ports(SAMPLE);
        assert_eq!(ports.iter().filter(|p| **p == 3000).count(), 1);
    }

    #[test]
    fn garbage_input_yields_nothing() {
        assert!(parse_listening_ports("").is_empty());
        assert!(parse_listening_ports("not a proc table\nat all").is_empty());
    }
}
