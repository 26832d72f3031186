use serde::{Deserialize, Serialize};

/// Outcome of probing a single port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub port: u16,
    pub open: bool,
    /// Well-known service name, empty if the port is not in the table.
    pub service: String,
}

/// Counts over one scan phase.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
}

impl ScanSummary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let open = results.iter().filter(|r| r.open).count();
        Self {
            total: results.len(),
            open,
            closed: results.len() - open,
        }
    }
}

/// One completed scan phase, as written to the JSON output file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub phase: String,
    pub host: String,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub summary: ScanSummary,
    pub results: Vec<ScanResult>,
}
