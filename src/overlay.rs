//! Whitelist and blacklist overlays on top of the generated hosts files.
//!
//! Whitelisting never regenerates gravity. A whitelisted domain's lines are
//! commented out in place (`#` prefix) and uncommented again when the domain
//! leaves the whitelist. Every rewrite streams the file into a scratch copy
//! that replaces the original only when at least one line changed.
//!
//! The blacklist has no comment state: its hosts file is rebuilt from the
//! list on every change.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::atomic::{write_atomic, AtomicFile};
use crate::config::Config;
use crate::hosts::write_entry;

/// Outcome of adding or removing domains on a user list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListChange {
    /// Domains actually added or removed
    pub changed: usize,
    /// Domains that were already present (add) or already absent (remove)
    pub unchanged: usize,
}

/// Which user list an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListKind::Whitelist => f.write_str("whitelist"),
            ListKind::Blacklist => f.write_str("blacklist"),
        }
    }
}

/// Read a user list: one domain per line, blank lines ignored. Missing file = empty list.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read list {:?}", path)),
    };
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_list(path: &Path, entries: &[String]) -> Result<()> {
    let mut content = entries.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    write_atomic(path, content.as_bytes())
}

/// Append the domains not already on the list.
pub fn add_to_list(path: &Path, domains: &[String]) -> Result<ListChange> {
    let mut entries = read_list(path)?;
    let mut change = ListChange::default();

    for domain in domains.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        if entries.iter().any(|e| e == domain) {
            debug!("{} already listed in {:?}", domain, path);
            change.unchanged += 1;
        } else {
            entries.push(domain.to_string());
            change.changed += 1;
        }
    }

    if change.changed > 0 {
        write_list(path, &entries)?;
    }
    Ok(change)
}

/// Remove the given domains from the list.
pub fn remove_from_list(path: &Path, domains: &[String]) -> Result<ListChange> {
    let mut entries = read_list(path)?;
    let mut change = ListChange::default();

    for domain in domains.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        let before = entries.len();
        entries.retain(|e| e != domain);
        if entries.len() == before {
            debug!("{} not listed in {:?}", domain, path);
            change.unchanged += 1;
        } else {
            change.changed += 1;
        }
    }

    if change.changed > 0 {
        write_list(path, &entries)?;
    }
    Ok(change)
}

/// Domain token of a hosts line: the second whitespace-separated field,
/// ignoring any leading `#` characters.
pub fn domain_token(line: &str) -> Option<&str> {
    line.trim()
        .trim_start_matches('#')
        .split_whitespace()
        .nth(1)
}

fn is_commented(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Comment out every active line of `hosts` whose domain is in `targets`.
///
/// Returns the number of lines commented.
pub fn comment_domains(hosts: &Path, targets: &[String]) -> Result<usize> {
    let targets: HashSet<&str> = targets.iter().map(|d| d.trim()).collect();
    if targets.is_empty() {
        return Ok(0);
    }
    rewrite_lines(hosts, |line| {
        if is_commented(line) {
            return None;
        }
        match domain_token(line) {
            Some(domain) if targets.contains(domain) => Some(format!("#{}", line)),
            _ => None,
        }
    })
}

/// Strip all leading `#` from every commented line of `hosts` whose domain is in `targets`.
///
/// Returns the number of lines uncommented.
pub fn uncomment_domains(hosts: &Path, targets: &[String]) -> Result<usize> {
    let targets: HashSet<&str> = targets.iter().map(|d| d.trim()).collect();
    if targets.is_empty() {
        return Ok(0);
    }
    rewrite_lines(hosts, |line| {
        if !is_commented(line) {
            return None;
        }
        match domain_token(line) {
            Some(domain) if targets.contains(domain) => {
                let body = line.trim_start();
                let indent = &line[..line.len() - body.len()];
                Some(format!("{}{}", indent, body.trim_start_matches('#')))
            }
            _ => None,
        }
    })
}

/// Stream `path` through `edit`, replacing the file only if some line changed.
///
/// `edit` sees each line without its `\n` and returns the replacement, if
/// any. Line terminators and untouched lines are copied byte for byte. Lines
/// that are not valid UTF-8 are left alone.
fn rewrite_lines<F>(path: &Path, mut edit: F) -> Result<usize>
where
    F: FnMut(&str) -> Option<String>,
{
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{:?} does not exist yet, nothing to rewrite", path);
            return Ok(0);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to open {:?}", path)),
    };
    let mut reader = BufReader::new(file);
    let mut scratch = AtomicFile::create(path)?;
    let mut buf = Vec::new();
    let mut changed = 0;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("Failed to read {:?}", path))?;
        if n == 0 {
            break;
        }
        let (body, terminator) = match buf.strip_suffix(b"\n") {
            Some(body) => (body, &b"\n"[..]),
            None => (&buf[..], &b""[..]),
        };

        let replacement = std::str::from_utf8(body).ok().and_then(&mut edit);
        let result = match replacement {
            Some(new_body) => {
                changed += 1;
                scratch
                    .write_all(new_body.as_bytes())
                    .and_then(|_| scratch.write_all(terminator))
            }
            None => scratch.write_all(&buf),
        };
        result.with_context(|| format!("Failed to write scratch copy of {:?}", path))?;
    }

    if changed > 0 {
        scratch.commit()?;
    }
    // Otherwise the scratch file is dropped and the original never touched
    Ok(changed)
}

/// Rebuild the blacklist hosts file from `blacklist` with the given addresses.
///
/// Returns the number of domains written.
pub fn regenerate_blacklist(blacklist: &Path, output: &Path, addrs: &[String]) -> Result<usize> {
    let domains = read_list(blacklist)?;
    let mut out = AtomicFile::create(output)?;
    for domain in &domains {
        write_entry(&mut out, domain, addrs)
            .with_context(|| format!("Failed to write {:?}", output))?;
    }
    out.commit()?;
    Ok(domains.len())
}

/// The overlay engine bound to one configuration.
pub struct Overlay {
    whitelist: PathBuf,
    blacklist: PathBuf,
    gravity: PathBuf,
    blacklist_hosts: PathBuf,
    addrs: Vec<String>,
}

impl Overlay {
    pub fn new(config: &Config) -> Self {
        Self {
            whitelist: config.paths.whitelist.clone(),
            blacklist: config.paths.blacklist.clone(),
            gravity: config.paths.gravity.clone(),
            blacklist_hosts: config.paths.blacklist_hosts.clone(),
            addrs: config.sinkhole_addresses(),
        }
    }

    fn list_path(&self, kind: ListKind) -> &Path {
        match kind {
            ListKind::Whitelist => &self.whitelist,
            ListKind::Blacklist => &self.blacklist,
        }
    }

    pub fn read(&self, kind: ListKind) -> Result<Vec<String>> {
        read_list(self.list_path(kind))
    }

    pub fn add_to_list(&self, kind: ListKind, domains: &[String]) -> Result<ListChange> {
        let change = add_to_list(self.list_path(kind), domains)?;
        info!(
            "{}: {} added, {} already present",
            kind, change.changed, change.unchanged
        );
        Ok(change)
    }

    pub fn remove_from_list(&self, kind: ListKind, domains: &[String]) -> Result<ListChange> {
        let change = remove_from_list(self.list_path(kind), domains)?;
        info!(
            "{}: {} removed, {} not present",
            kind, change.changed, change.unchanged
        );
        Ok(change)
    }

    /// Comment out gravity lines for `domains`, or for the whole whitelist when `None`.
    pub fn whitelist_apply(&self, domains: Option<&[String]>) -> Result<usize> {
        let commented = match domains {
            Some(list) => comment_domains(&self.gravity, list)?,
            None => comment_domains(&self.gravity, &read_list(&self.whitelist)?)?,
        };
        info!("Whitelisted {} gravity line(s)", commented);
        Ok(commented)
    }

    /// Uncomment gravity lines for exactly `domains`.
    pub fn whitelist_revert(&self, domains: &[String]) -> Result<usize> {
        let restored = uncomment_domains(&self.gravity, domains)?;
        info!("Restored {} gravity line(s)", restored);
        Ok(restored)
    }

    pub fn blacklist_regenerate(&self) -> Result<usize> {
        let count = regenerate_blacklist(&self.blacklist, &self.blacklist_hosts, &self.addrs)?;
        info!("Blacklist hosts file rebuilt with {} domain(s)", count);
        Ok(count)
    }
}
