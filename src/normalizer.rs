//! Turns raw list files into one bare domain per line.
//!
//! Sources come as plain domain lists or hosts files, with full-line and
//! inline `#` comments. Each line is reduced by a fixed rule:
//!
//! 1. drop everything from the first `#`
//! 2. drop everything from the first `/`
//! 3. trim; skip if nothing is left
//! 4. two or more tokens: hosts format, keep the second; otherwise keep the only one
//!
//! Step 2 also truncates anything that legitimately contains a slash. That is
//! the accepted behaviour of the list format, not something to repair here.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::utils::format_count;

/// Extract the domain from one source line, if it carries one.
pub fn extract_domain(line: &str) -> Option<&str> {
    let line = cut_at(line, '#');
    let line = cut_at(line, '/').trim();
    if line.is_empty() {
        return None;
    }
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    Some(tokens.next().unwrap_or(first))
}

fn cut_at(s: &str, c: char) -> &str {
    match s.find(c) {
        Some(i) => &s[..i],
        None => s,
    }
}

/// Normalize every line read from `reader` into `out`; returns the number of domains written.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn normalize_stream<R: BufRead, W: Write>(mut reader: R, out: &mut W) -> Result<usize> {
    let mut buf = Vec::new();
    let mut count = 0;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .context("Failed to read source line")?;
        if n == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if let Some(domain) = extract_domain(&line) {
            out.write_all(domain.as_bytes())
                .and_then(|_| out.write_all(b"\n"))
                .context("Failed to write aggregate domain file")?;
            count += 1;
        }
    }
    Ok(count)
}

/// Concatenate the normalized contents of `files` into `out`, in the given order.
///
/// Returns the number of domains contributed by each file. A file that cannot
/// be opened contributes nothing; a failure writing `out` aborts.
pub fn aggregate<P: AsRef<Path>, W: Write>(files: &[P], out: &mut W) -> Result<Vec<usize>> {
    let mut counts = Vec::with_capacity(files.len());
    for path in files {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping unreadable source file {:?}: {}", path, e);
                counts.push(0);
                continue;
            }
        };
        let count = normalize_stream(BufReader::new(file), out)
            .with_context(|| format!("Failed to normalize {:?}", path))?;
        debug!("{:?}: {} domains", path, format_count(count));
        counts.push(count);
    }
    out.flush().context("Failed to flush aggregate domain file")?;
    Ok(counts)
}
