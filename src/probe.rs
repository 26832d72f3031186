use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time;

use crate::ports::service_name;
use crate::types::ScanResult;

/// Lower bound for name resolution, which can be slower than a loopback dial.
const MIN_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe `host:port` with a TCP connect bounded by `timeout`.
///
/// The port is open iff the handshake completes in time. The connection is
/// dropped immediately. Refused, unreachable, unresolvable and timed-out
/// attempts all yield `open == false`.
pub async fn scan_port(host: &str, port: u16, timeout: Duration) -> ScanResult {
    let open = connect_within(TcpStream::connect((host, port)), timeout).await;
    result_for(port, open)
}

/// Same as [`scan_port`] against an already resolved address.
pub async fn probe_addr(addr: SocketAddr, timeout: Duration) -> ScanResult {
    let open = connect_within(TcpStream::connect(addr), timeout).await;
    result_for(addr.port(), open)
}

async fn connect_within(
    connect: impl std::future::Future<Output = std::io::Result<TcpStream>>,
    timeout: Duration,
) -> bool {
    match time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        _ => false,
    }
}

fn result_for(port: u16, open: bool) -> ScanResult {
    ScanResult {
        port,
        open,
        service: service_name(port).to_string(),
    }
}

/// Resolve `host` to one address, preferring IPv4. IP literals pass through.
pub async fn resolve_host(host: &str, timeout: Duration) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let addrs: Vec<SocketAddr> = time::timeout(timeout.max(MIN_RESOLVE_TIMEOUT), lookup_host((host, 0)))
        .await
        .with_context(|| format!("timed out resolving host: {host}"))?
        .with_context(|| format!("failed to resolve host: {host}"))?
        .collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .map(SocketAddr::ip)
        .with_context(|| format!("no addresses found for host: {host}"))
}
