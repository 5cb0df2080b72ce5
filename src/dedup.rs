//! External merge sort with duplicate removal.
//!
//! Aggregated lists run to hundreds of thousands of lines, so the input is
//! never held in memory as a whole: it is cut into sorted, deduplicated runs
//! of at most `chunk_lines` lines, each run is spilled to an anonymous temp
//! file, and the runs are merged through a min-heap. Ordering is plain byte
//! order, the same as `LC_ALL=C sort -u`.

use anyhow::{Context, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Counters from one dedupe pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Non-empty lines read
    pub input_lines: usize,
    /// Lines written
    pub unique_lines: usize,
    /// Runs spilled to disk (0 when everything fit in one chunk)
    pub runs: usize,
}

/// Sort `input` and write each distinct non-empty line once to `output`.
///
/// Spill files are created in `scratch_dir` and removed automatically.
pub fn dedupe<R: BufRead, W: Write>(
    mut input: R,
    output: &mut W,
    chunk_lines: usize,
    scratch_dir: &Path,
) -> Result<DedupStats> {
    let chunk_lines = chunk_lines.max(1);
    let mut stats = DedupStats::default();
    let mut chunk: Vec<Vec<u8>> = Vec::with_capacity(chunk_lines.min(65_536));
    let mut runs: Vec<File> = Vec::new();

    while let Some(line) = next_line(&mut input).context("Failed to read domain list")? {
        if line.is_empty() {
            continue;
        }
        stats.input_lines += 1;
        chunk.push(line);
        if chunk.len() >= chunk_lines {
            runs.push(spill(&mut chunk, scratch_dir)?);
        }
    }

    if runs.is_empty() {
        sort_unique(&mut chunk);
        for line in &chunk {
            write_line(output, line)?;
        }
        stats.unique_lines = chunk.len();
    } else {
        if !chunk.is_empty() {
            runs.push(spill(&mut chunk, scratch_dir)?);
        }
        stats.runs = runs.len();
        debug!("Merging {} sorted runs", runs.len());
        stats.unique_lines = merge(runs, output)?;
    }

    output.flush().context("Failed to flush deduplicated list")?;
    Ok(stats)
}

fn next_line<R: BufRead>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(Some(buf))
}

fn sort_unique(chunk: &mut Vec<Vec<u8>>) {
    chunk.sort_unstable();
    chunk.dedup();
}

fn write_line<W: Write>(out: &mut W, line: &[u8]) -> Result<()> {
    out.write_all(line)
        .and_then(|_| out.write_all(b"\n"))
        .context("Failed to write deduplicated list")
}

/// Sort, dedupe and write `chunk` to a fresh anonymous file, leaving `chunk` empty.
fn spill(chunk: &mut Vec<Vec<u8>>, scratch_dir: &Path) -> Result<File> {
    sort_unique(chunk);
    let file = tempfile::tempfile_in(scratch_dir)
        .with_context(|| format!("Failed to create sort run in {:?}", scratch_dir))?;
    let mut writer = BufWriter::new(file);
    for line in chunk.drain(..) {
        write_line(&mut writer, &line)?;
    }
    let mut file = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush sort run")?;
    file.seek(SeekFrom::Start(0))
        .context("Failed to rewind sort run")?;
    Ok(file)
}

/// k-way merge of sorted runs, collapsing equal neighbours.
fn merge<W: Write>(runs: Vec<File>, output: &mut W) -> Result<usize> {
    let mut readers: Vec<BufReader<File>> = runs.into_iter().map(BufReader::new).collect();
    let mut heap = BinaryHeap::with_capacity(readers.len());

    for (idx, reader) in readers.iter_mut().enumerate() {
        if let Some(line) = next_line(reader).context("Failed to read sort run")? {
            heap.push(Reverse((line, idx)));
        }
    }

    let mut last: Option<Vec<u8>> = None;
    let mut written = 0;
    while let Some(Reverse((line, idx))) = heap.pop() {
        if let Some(next) = next_line(&mut readers[idx]).context("Failed to read sort run")? {
            heap.push(Reverse((next, idx)));
        }
        if last.as_deref() != Some(line.as_slice()) {
            write_line(output, &line)?;
            written += 1;
            last = Some(line);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run(input: &str, chunk_lines: usize) -> (String, DedupStats) {
        let dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        let stats = dedupe(input.as_bytes(), &mut out, chunk_lines, dir.path()).unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[test]
    fn test_in_memory_path() {
        let (out, stats) = run("b.com\na.com\nb.com\nc.com\n", 100);
        assert_eq!(out, "a.com\nb.com\nc.com\n");
        assert_eq!(stats.input_lines, 4);
        assert_eq!(stats.unique_lines, 3);
        assert_eq!(stats.runs, 0);
    }

    #[test]
    fn test_spilled_runs_merge() {
        let (out, stats) = run("d\nc\nb\na\nd\nc\nb\na\ne\n", 2);
        assert_eq!(out, "a\nb\nc\nd\ne\n");
        assert_eq!(stats.runs, 5);
        assert_eq!(stats.unique_lines, 5);
    }

    #[test]
    fn test_empty_input() {
        let (out, stats) = run("", 10);
        assert!(out.is_empty());
        assert_eq!(stats, DedupStats::default());
    }

    #[test]
    fn test_empty_lines_dropped() {
        let (out, _) = run("\n\nb\n\na\n", 1);
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn test_missing_final_newline() {
        let (out, _) = run("b\na", 10);
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn test_byte_order() {
        // Uppercase sorts before lowercase, digits before letters
        let (out, _) = run("b.com\nB.com\n1.com\n-x.com\n", 2);
        assert_eq!(out, "-x.com\n1.com\nB.com\nb.com\n");
    }

    #[test]
    fn test_spill_files_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        dedupe("c\nb\na\n".as_bytes(), &mut out, 1, dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-e]{1,3}(\\.[a-c]{1,2})?", 0..200)
    }

    proptest! {
        /// Output is exactly the sorted set of distinct input lines, for any chunk size
        #[test]
        fn prop_sorted_unique_permutation(lines in lines_strategy(), chunk in 1usize..50) {
            let dir = TempDir::new().unwrap();
            let input = lines.iter().map(|l| format!("{}\n", l)).collect::<String>();
            let mut out = Vec::new();
            let stats = dedupe(input.as_bytes(), &mut out, chunk, dir.path()).unwrap();

            let expected: Vec<&str> = lines
                .iter()
                .map(String::as_str)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let text = String::from_utf8(out).unwrap();
            let got: Vec<&str> = text.lines().collect();

            prop_assert_eq!(&got, &expected);
            prop_assert_eq!(stats.unique_lines, expected.len());
            prop_assert_eq!(stats.input_lines, lines.len());
        }
    }
}
