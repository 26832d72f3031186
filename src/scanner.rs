use crate::executor::TaskExecutor;
use crate::ports::common_ports;
use crate::probe::{probe_addr, resolve_host};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::types::{ScanResult, ScanSummary};
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_WORKERS: usize = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// TCP connect scanner that fans probes out over a [`TaskExecutor`].
///
/// Every scan call builds its own executor, submits one probe per port,
/// waits for the pool to drain and returns the results sorted by port.
#[derive(Debug, Clone)]
pub struct PortScanner {
    host: String,
    timeout: Duration,
    workers: usize,
    queue_capacity: usize,
}

impl PortScanner {
    pub fn new(host: impl Into<String>, timeout: Duration, workers: usize) -> Self {
        Self {
            host: host.into(),
            timeout,
            workers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Scan every port in `start..=end`.
    pub async fn scan_range(&self, start: u16, end: u16) -> Result<Vec<ScanResult>> {
        if start == 0 {
            bail!("port out of range: 0");
        }
        if start > end {
            bail!("invalid range {start}-{end} (start > end)");
        }
        self.scan_ports((start..=end).collect()).await
    }

    /// Scan an explicit list. Duplicates are probed once.
    pub async fn scan_specific_ports(&self, ports: &[u16]) -> Result<Vec<ScanResult>> {
        if ports.contains(&0) {
            bail!("port out of range: 0");
        }
        let unique: BTreeSet<u16> = ports.iter().copied().collect();
        self.scan_ports(unique.into_iter().collect()).await
    }

    /// Scan the ports of the well-known service table.
    pub async fn scan_common_ports(&self) -> Result<Vec<ScanResult>> {
        self.scan_ports(common_ports()).await
    }

    async fn scan_ports(&self, ports: Vec<u16>) -> Result<Vec<ScanResult>> {
        let ip = resolve_host(&self.host, self.timeout).await?;
        let executor = TaskExecutor::with_capacity(self.workers, self.queue_capacity)
            .context("failed to start scan workers")?;
        let expected = ports.len();

        for port in ports {
            let addr = SocketAddr::new(ip, port);
            let timeout = self.timeout;
            executor
                .submit(move || probe_addr(addr, timeout), format!("probe {addr}"))
                .await?;
        }
        executor.shutdown().await?;

        let failed = executor.failed_tasks().await;
        if !failed.is_empty() {
            bail!("{} probe task(s) failed: {:?}", failed.len(), failed);
        }

        let mut results: Vec<ScanResult> = executor.into_results().await?.into_values().collect();
        // Completion order is arbitrary.
        results.sort_by_key(|r| r.port);
        debug_assert_eq!(results.len(), expected);

        let summary = ScanSummary::from_results(&results);
        info!(
            host = %self.host,
            %ip,
            total = summary.total,
            open = summary.open,
            "scan finished"
        );
        Ok(results)
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_TIMEOUT, DEFAULT_WORKERS)
    }
}
