//! Hosts-format output: `<address> <domain>` lines for the resolver.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{BufRead, Write};

/// Synthetic record clients can resolve to check the sinkhole is live
pub const LIVENESS_DOMAIN: &str = "pyhole.isworking.ok";

/// Write the lines mapping `domain` to every address.
///
/// With no address configured the domain is written on its own.
pub fn write_entry<W: Write>(out: &mut W, domain: &str, addrs: &[String]) -> std::io::Result<()> {
    write_prefixed(out, "", domain, addrs)
}

fn write_prefixed<W: Write>(
    out: &mut W,
    prefix: &str,
    domain: &str,
    addrs: &[String],
) -> std::io::Result<()> {
    if addrs.is_empty() {
        return writeln!(out, "{}{}", prefix, domain);
    }
    for addr in addrs {
        writeln!(out, "{}{} {}", prefix, addr, domain)?;
    }
    Ok(())
}

/// What [`format_hosts`] wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostsCounts {
    /// Domains written, commented or not
    pub domains: usize,
    /// Lines written commented out because their domain is whitelisted
    pub whitelisted_lines: usize,
}

/// Format a sorted, deduplicated domain stream into a gravity hosts file.
///
/// The liveness record comes first, then every domain in input order.
/// Lines for domains in `whitelist` are written already commented out.
pub fn format_hosts<R: BufRead, W: Write>(
    domains: R,
    addrs: &[String],
    whitelist: &HashSet<String>,
    out: &mut W,
) -> Result<HostsCounts> {
    let mut counts = HostsCounts::default();
    let lines_per_entry = addrs.len().max(1);
    let entry = |out: &mut W, domain: &str| -> std::io::Result<bool> {
        let listed = whitelist.contains(domain);
        write_prefixed(out, if listed { "#" } else { "" }, domain, addrs)?;
        Ok(listed)
    };

    if !addrs.is_empty() && entry(out, LIVENESS_DOMAIN).context("Failed to write hosts file")? {
        counts.whitelisted_lines += lines_per_entry;
    }

    for line in domains.lines() {
        let line = line.context("Failed to read deduplicated domain list")?;
        let domain = line.trim();
        if domain.is_empty() {
            continue;
        }
        if entry(out, domain).context("Failed to write hosts file")? {
            counts.whitelisted_lines += lines_per_entry;
        }
        counts.domains += 1;
    }
    out.flush().context("Failed to flush hosts file")?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_ipv4_only() {
        let mut out = Vec::new();
        let counts =
            format_hosts("a.com\nb.com\n".as_bytes(), &addrs(&["10.0.0.1"]), &none(), &mut out).unwrap();
        assert_eq!(counts.domains, 2);
        assert_eq!(counts.whitelisted_lines, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "10.0.0.1 pyhole.isworking.ok\n10.0.0.1 a.com\n10.0.0.1 b.com\n"
        );
    }

    #[test]
    fn test_dual_stack() {
        let mut out = Vec::new();
        format_hosts("a.com\n".as_bytes(), &addrs(&["10.0.0.1", "fd00::1"]), &none(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "10.0.0.1 pyhole.isworking.ok\nfd00::1 pyhole.isworking.ok\n10.0.0.1 a.com\nfd00::1 a.com\n"
        );
    }

    #[test]
    fn test_no_address() {
        let mut out = Vec::new();
        let counts = format_hosts("a.com\n".as_bytes(), &[], &none(), &mut out).unwrap();
        assert_eq!(counts.domains, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "a.com\n");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut out = Vec::new();
        let counts =
            format_hosts("\na.com\n\n".as_bytes(), &addrs(&["0.0.0.0"]), &none(), &mut out).unwrap();
        assert_eq!(counts.domains, 1);
    }

    #[test]
    fn test_whitelisted_domains_written_commented() {
        let whitelist: HashSet<String> = ["b.com".to_string()].into_iter().collect();
        let mut out = Vec::new();
        let counts = format_hosts(
            "a.com\nb.com\nc.com\n".as_bytes(),
            &addrs(&["10.0.0.1", "fd00::1"]),
            &whitelist,
            &mut out,
        )
        .unwrap();
        assert_eq!(counts.domains, 3);
        assert_eq!(counts.whitelisted_lines, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\n#10.0.0.1 b.com\n#fd00::1 b.com\n"));
        assert!(text.contains("\n10.0.0.1 c.com\n"));
    }
}
