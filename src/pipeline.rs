//! The gravity run and the list edits, wired together under the run lock.
//!
//! ```text
//! adlists ─▶ spin_up ─▶ aggregate ─▶ dedupe ─▶ format_hosts ─▶ gravity.list
//!                                                  ▲                │
//!            whitelist ────────────────────────────┘                │
//!            whitelist edits ─▶ comment/uncomment ◀─────────────────┘
//!            blacklist ─▶ black.list
//! ```
//!
//! Intermediate files are anonymous temp files in the cache directory. The
//! gravity file is replaced only once the whole chain has succeeded, so any
//! failure before that point leaves the previous gravity file serving.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::atomic::AtomicFile;
use crate::cmd_abstraction::{CommandExecutor, ServiceReloader};
use crate::config::Config;
use crate::dedup::dedupe;
use crate::error::PyholeError;
use crate::fetcher::SourceFetcher;
use crate::hosts::{format_hosts, HostsCounts};
use crate::lock::LockGuard;
use crate::normalizer::aggregate;
use crate::orchestrator::{spin_up, usable_files, SourceReport, SourceStatus};
use crate::overlay::{add_to_list, ListChange, ListKind, Overlay};
use crate::privilege::PrivilegeContext;
use crate::reaper::reap;
use crate::sources::{read_sources, Source};
use crate::stats::GravityState;
use crate::utils::format_count;

/// What a gravity run did
#[derive(Debug, Clone)]
pub struct UpdateSummary {
    pub reports: Vec<SourceReport>,
    pub total_domains: usize,
    pub unique_domains: usize,
    pub whitelisted_lines: usize,
    pub blacklisted: usize,
    pub reaped: Vec<PathBuf>,
    pub reloaded: bool,
}

/// Add or remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEdit {
    Add,
    Remove,
}

/// What a list edit did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditSummary {
    pub change: ListChange,
    /// Hosts lines commented, uncommented or rewritten as a result
    pub lines_touched: usize,
    pub reloaded: bool,
}

/// The pipeline bound to its configuration and collaborators.
pub struct Gravity<'a> {
    config: &'a Config,
    executor: &'a dyn CommandExecutor,
    privilege: &'a dyn PrivilegeContext,
}

impl<'a> Gravity<'a> {
    pub fn new(
        config: &'a Config,
        executor: &'a dyn CommandExecutor,
        privilege: &'a dyn PrivilegeContext,
    ) -> Self {
        Self {
            config,
            executor,
            privilege,
        }
    }

    fn protected_paths(&self) -> Vec<&Path> {
        let paths = &self.config.paths;
        vec![
            paths.cache_dir.as_path(),
            paths.gravity.as_path(),
            paths.blacklist_hosts.as_path(),
            paths.whitelist.as_path(),
            paths.blacklist.as_path(),
        ]
    }

    fn lock(&self) -> Result<LockGuard> {
        self.privilege.ensure_access(&self.protected_paths())?;
        let lock = LockGuard::acquire(&self.config.paths.lock_file())?;
        debug!("Holding run lock {:?}", lock.path());
        Ok(lock)
    }

    fn reloader(&self) -> ServiceReloader<'_> {
        ServiceReloader::new(self.executor, self.config.reload.clone())
    }

    /// Full run: fetch, aggregate, dedupe, format, overlay, reap, record.
    pub async fn update(&self, fetcher: &dyn SourceFetcher, reload: bool) -> Result<UpdateSummary> {
        self.config.require_sinkhole()?;
        let _lock = self.lock()?;
        let paths = &self.config.paths;
        let cache_dir = paths.cache_dir.as_path();

        info!("Reading adlists from {:?}", paths.adlists);
        let sources = read_sources(&paths.adlists, &self.config.source_overrides)?;
        info!("{} source(s) configured", sources.len());

        let reports = spin_up(
            fetcher,
            &sources,
            cache_dir,
            self.config.fetch.max_concurrent,
        )
        .await;

        let usable = usable_files(&reports);
        if usable.is_empty() {
            return Err(PyholeError::NoUsableSources.into());
        }
        let files: Vec<PathBuf> = usable.into_iter().map(|(_, path)| path).collect();

        if self.config.protect_sources {
            protect_sources(&paths.whitelist, &sources)?;
        }
        let overlay = Overlay::new(self.config);
        let whitelist: HashSet<String> = overlay.read(ListKind::Whitelist)?.into_iter().collect();

        let (counts, hosts) = self.build_gravity(&files, &whitelist)?;
        let total_domains: usize = counts.iter().sum();
        let unique_domains = hosts.domains;
        let whitelisted_lines = hosts.whitelisted_lines;
        info!(
            "Gravity: {} unique domain(s) from {} listed, {} line(s) whitelisted",
            format_count(unique_domains),
            format_count(total_domains),
            whitelisted_lines
        );

        let blacklisted = overlay.blacklist_regenerate()?;

        let live: Vec<PathBuf> = reports.iter().map(|r| r.cache_path.clone()).collect();
        let reaped = reap(cache_dir, &live)?;

        let mut state = GravityState {
            last_update: Some(Utc::now()),
            unique_domains,
            whitelisted_lines,
            blacklisted,
            ..Default::default()
        };
        state.update_sources(&reports, &counts);
        if let Err(e) = state.save(&paths.state_file()) {
            warn!("Failed to save state: {:#}", e);
        }

        let reloaded = if reload {
            self.reloader().reload()
        } else {
            info!("Skipping resolver reload");
            false
        };

        Ok(UpdateSummary {
            reports,
            total_domains,
            unique_domains,
            whitelisted_lines,
            blacklisted,
            reaped,
            reloaded,
        })
    }

    /// Aggregate `files`, dedupe, format with `whitelist` already commented
    /// out, and swap the result into the gravity file in one step.
    ///
    /// Returns per-file domain counts and what the formatter wrote.
    fn build_gravity(
        &self,
        files: &[PathBuf],
        whitelist: &HashSet<String>,
    ) -> Result<(Vec<usize>, HostsCounts)> {
        let paths = &self.config.paths;
        let scratch = paths.cache_dir.as_path();

        let mut aggregated = BufWriter::new(scratch_file(scratch)?);
        let counts = aggregate(files, &mut aggregated)?;
        let aggregated = rewind(aggregated)?;

        let mut deduped = BufWriter::new(scratch_file(scratch)?);
        let stats = dedupe(
            BufReader::new(aggregated),
            &mut deduped,
            self.config.dedup.chunk_lines,
            scratch,
        )?;
        let deduped = rewind(deduped)?;
        debug!(
            "Dedup: {} line(s) in, {} unique, {} sorted run(s)",
            stats.input_lines, stats.unique_lines, stats.runs
        );

        let mut gravity = AtomicFile::create(&paths.gravity)?;
        let hosts = format_hosts(
            BufReader::new(deduped),
            &self.config.sinkhole_addresses(),
            whitelist,
            &mut gravity,
        )?;
        gravity.commit()?;
        info!("Wrote {:?}", paths.gravity);

        Ok((counts, hosts))
    }

    /// Add or remove domains on a list and bring the hosts files in line.
    ///
    /// Whitelist additions comment their gravity lines and removals
    /// uncomment them; any blacklist change rebuilds the blacklist hosts
    /// file, so blacklist edits need a sinkhole address. The resolver is
    /// reloaded when something changed, or on `force`.
    pub fn edit_list(
        &self,
        kind: ListKind,
        edit: ListEdit,
        domains: &[String],
        force: bool,
    ) -> Result<EditSummary> {
        if kind == ListKind::Blacklist {
            self.config.require_sinkhole()?;
        }
        let _lock = self.lock()?;
        let overlay = Overlay::new(self.config);

        let change = match edit {
            ListEdit::Add => overlay.add_to_list(kind, domains)?,
            ListEdit::Remove => overlay.remove_from_list(kind, domains)?,
        };

        let lines_touched = match (kind, edit) {
            (ListKind::Whitelist, ListEdit::Add) => overlay.whitelist_apply(Some(domains))?,
            (ListKind::Whitelist, ListEdit::Remove) => overlay.whitelist_revert(domains)?,
            (ListKind::Blacklist, _) if change.changed > 0 => overlay.blacklist_regenerate()?,
            (ListKind::Blacklist, _) => 0,
        };

        let reloaded = self
            .reloader()
            .reload_if(change.changed > 0 || lines_touched > 0, force);

        Ok(EditSummary {
            change,
            lines_touched,
            reloaded,
        })
    }

    /// Re-apply the persisted whitelist to the gravity file.
    pub fn apply_whitelist(&self, force: bool) -> Result<usize> {
        let _lock = self.lock()?;
        let commented = Overlay::new(self.config).whitelist_apply(None)?;
        self.reloader().reload_if(commented > 0, force);
        Ok(commented)
    }
}

/// Whitelist the host of every source so no list can block its own download.
///
/// Sources whose URL does not parse have no host to protect.
fn protect_sources(whitelist: &Path, sources: &[Source]) -> Result<ListChange> {
    let mut hosts: Vec<String> = sources.iter().filter_map(Source::url_host).collect();
    hosts.sort();
    hosts.dedup();
    let change = add_to_list(whitelist, &hosts)?;
    if change.changed > 0 {
        info!("Whitelisted {} adlist host(s)", change.changed);
    }
    Ok(change)
}

fn scratch_file(dir: &Path) -> Result<File> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    tempfile::tempfile_in(dir).with_context(|| format!("Failed to create scratch file in {:?}", dir))
}

fn rewind(writer: BufWriter<File>) -> Result<File> {
    let mut file = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush scratch file")?;
    file.seek(SeekFrom::Start(0))
        .context("Failed to rewind scratch file")?;
    Ok(file)
}

/// One status line per source, for the end of a run.
pub fn log_reports(reports: &[SourceReport]) {
    for report in reports {
        match report.status {
            SourceStatus::Fresh => info!("  [fresh]   {}", report.source.url),
            SourceStatus::Cached => warn!(
                "  [cached]  {} ({})",
                report.source.url,
                report.error.as_deref().unwrap_or("unknown error")
            ),
            SourceStatus::Dropped => warn!(
                "  [dropped] {} ({})",
                report.source.url,
                report.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
