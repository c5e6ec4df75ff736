//! MAC resolution - transport identity to hardware address
//!
//! Device-facing endpoints identify the caller by MAC address, resolved
//! from the connection's peer IP through the kernel neighbor table. The
//! table is read from `/proc/net/arp`; when that is unavailable the
//! `ip neigh` output is parsed instead.

use axum::http::{header::HeaderName, HeaderMap};
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use tokio::process::Command;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const ARP_TABLE_PATH: &str = "/proc/net/arp";

/// A neighbor entry with no resolved link address yet
const INCOMPLETE_MAC: &str = "00:00:00:00:00:00";

/// Determine the client IP: first `X-Forwarded-For` hop, else peer address
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    if let Some(forwarded) = headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return ip;
            }
        }
    }
    peer.ip()
}

/// Resolve the MAC address for an IP from the neighbor table
pub async fn resolve_mac(ip: IpAddr) -> Option<String> {
    let ip_str = ip.to_string();

    if let Ok(table) = tokio::fs::read_to_string(ARP_TABLE_PATH).await {
        if let Some(mac) = parse_arp_table(&table, &ip_str) {
            return Some(mac);
        }
    }

    let output = Command::new("ip")
        .args(["neigh", "show"])
        .arg(&ip_str)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        tracing::warn!(ip = %ip_str, "ip neigh returned non-zero status");
        return None;
    }

    parse_ip_neigh(&String::from_utf8_lossy(&output.stdout))
}

/// Parse /proc/net/arp. Format:
/// `IP address  HW type  Flags  HW address  Mask  Device`
fn parse_arp_table(table: &str, ip: &str) -> Option<String> {
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[0] != ip {
            continue;
        }
        let mac = fields[3];
        if mac == INCOMPLETE_MAC {
            continue;
        }
        return Some(mac.to_uppercase());
    }
    None
}

/// Parse `ip neigh show <ip>` output, e.g.
/// `192.168.1.7 dev wlan0 lladdr aa:bb:cc:11:22:33 REACHABLE`
fn parse_ip_neigh(output: &str) -> Option<String> {
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        while let Some(field) = fields.next() {
            if field == "lladdr" {
                if let Some(mac) = fields.next() {
                    if mac != INCOMPLETE_MAC {
                        return Some(mac.to_uppercase());
                    }
                }
            }
        }
    }
    None
}
