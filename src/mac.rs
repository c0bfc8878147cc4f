// MIT License - Copyright (c) 2026 Peter Wright

//! Best-effort MAC address lookup for the central.
//!
//! HomeKit wants a serial number; the central's MAC is the closest stable
//! identifier we can get without vendor support. After the first TCP
//! contact the kernel ARP table usually has the entry, so we resolve the
//! host and scan `/proc/net/arp`. Absence is fine, callers fall back.

use tokio::net::lookup_host;
use tracing::debug;

const ARP_TABLE: &str = "/proc/net/arp";
const NULL_MAC: &str = "00:00:00:00:00:00";

/// Look up the MAC address of `host` in the kernel ARP table.
pub async fn lookup(host: &str, port: u16) -> Option<String> {
    let addrs: Vec<String> = match lookup_host((host, port)).await {
        Ok(addrs) => addrs.map(|a| a.ip().to_string()).collect(),
        Err(err) => {
            debug!("could not resolve {host}: {err}");
            vec![host.to_string()]
        }
    };

    let table = match tokio::fs::read_to_string(ARP_TABLE).await {
        Ok(table) => table,
        Err(err) => {
            debug!("could not read {ARP_TABLE}: {err}");
            return None;
        }
    };

    find_in_table(&table, &addrs)
}

fn find_in_table(table: &str, addrs: &[String]) -> Option<String> {
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        if addrs.iter().any(|a| a == fields[0]) && fields[3] != NULL_MAC {
            return Some(fields[3].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "IP address       HW type     Flags       HW address            Mask     Device\n\
        192.168.1.111    0x1         0x2         60:e3:27:aa:bb:cc     *        eth0\n\
        192.168.1.50     0x1         0x0         00:00:00:00:00:00     *        eth0\n";

    #[test]
    fn test_finds_entry() {
        let addrs = vec!["192.168.1.111".to_string()];
        assert_eq!(
            find_in_table(TABLE, &addrs),
            Some("60:e3:27:aa:bb:cc".to_string())
        );
    }

    #[test]
    fn test_skips_incomplete_entries() {
        let addrs = vec!["192.168.1.50".to_string()];
        assert_eq!(find_in_table(TABLE, &addrs), None);
    }

    #[test]
    fn test_unknown_host() {
        let addrs = vec!["10.0.0.1".to_string()];
        assert_eq!(find_in_table(TABLE, &addrs), None);
    }
}
