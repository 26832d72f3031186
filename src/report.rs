use std::fmt::{self, Write};

use crate::types::{ScanResult, ScanSummary};

const RULE: &str = "===============================================================";

/// Render the text report for one scan phase: open ports with their service,
/// closed ports if `show_closed`, then totals.
pub fn render_report(results: &[ScanResult], show_closed: bool) -> String {
    let mut out = String::new();
    write_report(&mut out, results, show_closed).expect("writing to a String cannot fail");
    out
}

/// Write the text report into any formatter sink.
pub fn write_report(out: &mut impl Write, results: &[ScanResult], show_closed: bool) -> fmt::Result {
    let summary = ScanSummary::from_results(results);

    writeln!(out, "\n{RULE}")?;
    writeln!(out, "PORT SCAN RESULTS")?;
    writeln!(out, "{RULE}")?;
    for r in results {
        if r.open {
            let service = if r.service.is_empty() { "Unknown" } else { &r.service };
            writeln!(out, "Port {} is OPEN - {}", r.port, service)?;
        } else if show_closed {
            writeln!(out, "Port {} is CLOSED", r.port)?;
        }
    }
    writeln!(out, "{RULE}")?;
    writeln!(out, "Total Ports Scanned: {}", summary.total)?;
    writeln!(out, "Open: {} | Closed: {}", summary.open, summary.closed)?;
    writeln!(out, "{RULE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(port: u16, open: bool, service: &str) -> ScanResult {
        ScanResult {
            port,
            open,
            service: service.to_string(),
        }
    }

    #[test]
    fn open_ports_listed_with_service() {
        let results = vec![r(22, true, "SSH"), r(3000, true, ""), r(80, false, "HTTP")];
        let text = render_report(&results, false);
        assert!(text.contains("Port 22 is OPEN - SSH"));
        assert!(text.contains("Port 3000 is OPEN - Unknown"));
        assert!(!text.contains("Port 80 is CLOSED"));
        assert!(text.contains("Total Ports Scanned: 3"));
        assert!(text.contains("Open: 2 | Closed: 1"));
    }

    #[test]
    fn closed_ports_optional() {
        let results = vec![r(80, false, "HTTP")];
        assert!(render_report(&results, true).contains("Port 80 is CLOSED"));
    }

    #[test]
    fn sink_errors_propagate() {
        struct Refuse;
        impl Write for Refuse {
            fn write_str(&mut self, _: &str) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        assert!(write_report(&mut Refuse, &[r(22, true, "SSH")], false).is_err());

        let mut text = String::new();
        write_report(&mut text, &[r(22, true, "SSH")], false).unwrap();
        assert_eq!(text, render_report(&[r(22, true, "SSH")], false));
    }

    #[test]
    fn summary_counts() {
        let results = vec![r(1, true, ""), r(2, false, ""), r(3, false, "")];
        assert_eq!(
            ScanSummary::from_results(&results),
            ScanSummary { total: 3, open: 1, closed: 2 }
        );
        assert_eq!(ScanSummary::from_results(&[]), ScanSummary::default());
    }
}
