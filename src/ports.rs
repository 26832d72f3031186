use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Well-known TCP ports and the service usually found on them.
pub const WELL_KNOWN_SERVICES: &[(u16, &str)] = &[
    (20, "FTP Data"),
    (21, "FTP Control"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
];

/// Service name for a port, or `""` if the port is not in the table.
pub fn service_name(port: u16) -> &'static str {
    WELL_KNOWN_SERVICES
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
        .unwrap_or("")
}

/// Ports of [`WELL_KNOWN_SERVICES`], ascending.
pub fn common_ports() -> Vec<u16> {
    let mut ports: Vec<u16> = WELL_KNOWN_SERVICES.iter().map(|(p, _)| *p).collect();
    ports.sort_unstable();
    ports
}

/// Parse a port list into a deduplicated list of TCP ports (1..=65535).
///
/// Entries are separated by newlines or commas:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
/// - whitespace and blank entries are ignored
///
/// Order of first appearance is preserved.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");

        for item in line.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if item.contains('-') {
                let (start, end) =
                    parse_range(item).with_context(|| format!("line {line_no}: bad entry"))?;
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port_str(item)
                .with_context(|| format!("line {line_no}: invalid port value: {item}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// Parse an inclusive `start-end` range.
pub fn parse_range(s: &str) -> Result<(u16, u16)> {
    let Some((a, b)) = s.split_once('-') else {
        bail!("expected a range like 1-1024, got: {s}");
    };
    let start = parse_port_str(a.trim()).with_context(|| format!("invalid start in range: {a}"))?;
    let end = parse_port_str(b.trim()).with_context(|| format!("invalid end in range: {b}"))?;
    if start > end {
        bail!("invalid range {start}-{end} (start > end)");
    }
    Ok((start, end))
}

/// Load a port list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
