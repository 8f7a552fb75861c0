//! Local-deployment guard.
//!
//! The app is meant to run next to the model server on someone's own
//! machine or LAN. If the machine's outbound address resolves outside the
//! private ranges, startup is refused. This is a deployment convenience,
//! not a security boundary; resolution failures are ignored.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Refuse to start when the machine does not look locally deployed.
///
/// `allow_public` (or `CONFAB_ALLOW_PUBLIC=1`, for containers) skips the
/// check.
pub fn verify_local(allow_public: bool) -> anyhow::Result<()> {
    if allow_public || std::env::var("CONFAB_ALLOW_PUBLIC").as_deref() == Ok("1") {
        return Ok(());
    }

    match resolve_outbound_ipv4() {
        Some(ip) if !is_private(ip) => anyhow::bail!(
            "refusing to start: resolved address {ip} is not in a private range. \
             This app is designed for local use; pass --allow-public to override."
        ),
        _ => Ok(()),
    }
}

/// The IPv4 address the OS would route outbound traffic from.
///
/// Connecting a UDP socket picks a route without sending any packets.
fn resolve_outbound_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    }
}

fn is_private(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local()
}
