//! Long-term memory lifecycle.
//!
//! Periodic batch maintenance over one owner's long-term entries:
//! - Archive: old entries are deleted when unimportant, summarized otherwise
//! - Consolidate: near-duplicate entries are merged into one
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      LifecycleManager                         │
//! │  ┌────────────────────────────────────────────────────────┐   │
//! │  │                    Lifecycle Cycle                     │   │
//! │  │  ┌────────────────────────┐  ┌──────────────────────┐  │   │
//! │  │  │        Archive         │─▶│     Consolidate      │  │   │
//! │  │  │  delete or summarize   │  │  merge similar pairs │  │   │
//! │  │  └────────────────────────┘  └──────────────────────┘  │   │
//! │  └────────────────────────────────────────────────────────┘   │
//! │                            ↓                                  │
//! │                      LongTermMemory                           │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! A replacement entry is always committed before its sources are deleted.
//! Batches are not safe to run concurrently for the same owner; callers
//! serialize them.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::long_term::LongTermMemory;
use super::similarity::entry_similarity;
use crate::error::{Error, Result};
use crate::types::{keys, LongTermEntry, Metadata};

/// Characters of the original kept in a summary.
pub const SUMMARY_PREVIEW_CHARS: usize = 100;

/// Separator between texts of a consolidated entry.
pub const CONSOLIDATION_SEPARATOR: &str = " | ";

/// Configuration for lifecycle batches.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Entries older than this many days are archived.
    pub archive_after_days: i64,
    /// Old entries below this importance are deleted instead of summarized.
    pub archive_importance_threshold: f64,
    /// Similarity at or above which two entries are merged.
    pub consolidation_threshold: f64,
    /// Delete sources once their replacement is stored.
    pub prune_sources: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            archive_after_days: 90,
            archive_importance_threshold: 0.3,
            consolidation_threshold: 0.95,
            prune_sources: true,
        }
    }
}

/// Result of an archive pass.
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    /// Entries old enough to be considered.
    pub examined: usize,
    /// Low-importance entries deleted outright.
    pub deleted: usize,
    /// Entries replaced by a summary.
    pub summarized: usize,
    /// Old entries that are already summaries.
    pub skipped: usize,
    /// Per-entry failures; the batch continued past each.
    pub errors: Vec<String>,
    /// Sources whose summary was stored but which could not be deleted.
    pub unpruned: Vec<String>,
}

/// Result of a consolidation pass.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    /// Consolidated entries created.
    pub groups: usize,
    /// Source entries folded into those groups.
    pub consolidated: usize,
    /// Source entries deleted, including retried leftovers.
    pub deleted: usize,
    pub errors: Vec<String>,
    /// Sources that belong to a stored group but could not be deleted.
    pub unpruned: Vec<String>,
}

/// Result of a full lifecycle cycle.
#[derive(Debug, Clone, Default)]
pub struct LifecycleReport {
    pub archive: ArchiveReport,
    pub consolidation: ConsolidationReport,
    /// Passes that failed as a whole.
    pub errors: Vec<String>,
}

impl LifecycleReport {
    /// Check if any work was done.
    pub fn has_changes(&self) -> bool {
        self.total_affected() > 0
    }

    /// Total entries affected.
    pub fn total_affected(&self) -> usize {
        self.archive.deleted
            + self.archive.summarized
            + self.consolidation.consolidated
            + self.consolidation.deleted
    }
}

/// Archive and consolidation over long-term storage.
pub struct LifecycleManager {
    ltm: LongTermMemory,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(ltm: LongTermMemory, config: LifecycleConfig) -> Self {
        Self { ltm, config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Run archive then consolidation for an owner.
    ///
    /// A pass that fails as a whole is recorded in `errors` and the other
    /// pass still runs.
    pub async fn run_cycle(&self, owner_id: &str) -> Result<LifecycleReport> {
        let mut report = LifecycleReport::default();

        match self.archive(owner_id).await {
            Ok(archive) => report.archive = archive,
            Err(e) => report.errors.push(format!("Archive failed: {}", e)),
        }

        match self.consolidate(owner_id).await {
            Ok(consolidation) => report.consolidation = consolidation,
            Err(e) => report.errors.push(format!("Consolidation failed: {}", e)),
        }

        info!(
            owner_id = %owner_id,
            affected = report.total_affected(),
            errors = report.errors.len(),
            "Lifecycle cycle complete"
        );
        Ok(report)
    }

    /// Archive entries older than the configured age.
    pub async fn archive(&self, owner_id: &str) -> Result<ArchiveReport> {
        let days = self.config.archive_after_days;
        let cutoff = Duration::try_days(days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| Error::validation(format!("archive_after_days out of range: {}", days)))?;
        self.archive_older_than(owner_id, cutoff).await
    }

    /// Archive entries created before `cutoff`.
    ///
    /// Entries below the importance threshold are deleted. Others get a
    /// summary entry, and the original is deleted only once the summary is
    /// stored. Summaries, and originals that already have one, are never
    /// summarized again.
    pub async fn archive_older_than(&self, owner_id: &str, cutoff: DateTime<Utc>) -> Result<ArchiveReport> {
        let mut report = ArchiveReport::default();
        let mut entries = self.ltm.export_owner(owner_id).await?;
        sort_entries(&mut entries);

        let summarized: HashSet<String> = entries
            .iter()
            .filter(|e| e.is_summary())
            .filter_map(|e| e.metadata.get(keys::ORIGINAL_ID).and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        for entry in entries.into_iter().filter(|e| e.created_at < cutoff) {
            report.examined += 1;

            if entry.importance() < self.config.archive_importance_threshold {
                match self.ltm.delete(std::slice::from_ref(&entry.id)).await {
                    Ok(n) => report.deleted += n,
                    Err(e) => {
                        warn!(owner_id = %owner_id, id = %entry.id, error = %e, "Failed to delete archived entry");
                        report.errors.push(format!("Delete {} failed: {}", entry.id, e));
                    }
                }
                continue;
            }

            if entry.is_summary() || summarized.contains(&entry.id) {
                report.skipped += 1;
                continue;
            }

            let (text, metadata) = summarize(&entry);
            let summary_id = match self.ltm.add(owner_id, &text, metadata).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(owner_id = %owner_id, id = %entry.id, error = %e, "Failed to store summary");
                    report.errors.push(format!("Summarize {} failed: {}", entry.id, e));
                    continue;
                }
            };
            report.summarized += 1;
            debug!(original_id = %entry.id, summary_id = %summary_id, "Summarized entry");

            if self.config.prune_sources {
                if let Err(e) = self.ltm.delete(std::slice::from_ref(&entry.id)).await {
                    error!(
                        owner_id = %owner_id,
                        original_id = %entry.id,
                        summary_id = %summary_id,
                        error = %e,
                        "Summary stored but original could not be pruned"
                    );
                    report.errors.push(format!("Prune {} failed: {}", entry.id, e));
                    report.unpruned.push(entry.id);
                }
            }
        }

        info!(
            owner_id = %owner_id,
            deleted = report.deleted,
            summarized = report.summarized,
            "Archive pass complete"
        );
        Ok(report)
    }

    /// Merge near-duplicate entries of an owner.
    ///
    /// Entries are scanned pairwise in (created_at, id) order. Each entry
    /// joins at most one group. Entries already listed in a surviving
    /// entry's `consolidated_from` are left out of new groups; when pruning
    /// is enabled their deletion is retried.
    pub async fn consolidate(&self, owner_id: &str) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();
        let mut entries = self.ltm.export_owner(owner_id).await?;
        sort_entries(&mut entries);

        let claimed: HashSet<String> = entries
            .iter()
            .flat_map(LongTermEntry::consolidated_from)
            .collect();
        let (leftovers, candidates): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| claimed.contains(&e.id));

        if !leftovers.is_empty() {
            let ids: Vec<String> = leftovers.into_iter().map(|e| e.id).collect();
            warn!(owner_id = %owner_id, ids = ?ids, "Found consolidated sources still stored");
            if self.config.prune_sources {
                self.prune_group(owner_id, None, ids, &mut report).await;
            }
        }

        let mut processed = vec![false; candidates.len()];
        for i in 0..candidates.len() {
            if processed[i] {
                continue;
            }

            let mut group = vec![i];
            for j in (i + 1)..candidates.len() {
                if !processed[j]
                    && entry_similarity(&candidates[i], &candidates[j]) >= self.config.consolidation_threshold
                {
                    group.push(j);
                }
            }
            if group.len() < 2 {
                continue;
            }
            for &idx in &group {
                processed[idx] = true;
            }

            let members: Vec<&LongTermEntry> = group.iter().map(|&idx| &candidates[idx]).collect();
            let source_ids: Vec<String> = members.iter().map(|e| e.id.clone()).collect();
            let (text, metadata) = consolidate_group(&members);

            let consolidated_id = match self.ltm.add(owner_id, &text, metadata).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(owner_id = %owner_id, sources = ?source_ids, error = %e, "Failed to store consolidated entry");
                    report.errors.push(format!("Consolidate {:?} failed: {}", source_ids, e));
                    continue;
                }
            };
            report.groups += 1;
            report.consolidated += source_ids.len();
            debug!(consolidated_id = %consolidated_id, sources = source_ids.len(), "Consolidated entries");

            if self.config.prune_sources {
                self.prune_group(owner_id, Some(&consolidated_id), source_ids, &mut report).await;
            }
        }

        info!(
            owner_id = %owner_id,
            groups = report.groups,
            consolidated = report.consolidated,
            "Consolidation pass complete"
        );
        Ok(report)
    }

    async fn prune_group(
        &self,
        owner_id: &str,
        consolidated_id: Option<&str>,
        ids: Vec<String>,
        report: &mut ConsolidationReport,
    ) {
        match self.ltm.delete(&ids).await {
            Ok(n) => report.deleted += n,
            Err(e) => {
                error!(
                    owner_id = %owner_id,
                    consolidated_id = ?consolidated_id,
                    sources = ?ids,
                    error = %e,
                    "Consolidated entry stored but sources could not be pruned"
                );
                report.errors.push(format!("Prune {:?} failed: {}", ids, e));
                report.unpruned.extend(ids);
            }
        }
    }
}

fn sort_entries(entries: &mut [LongTermEntry]) {
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

fn summarize(entry: &LongTermEntry) -> (String, Metadata) {
    let preview: String = entry.text.chars().take(SUMMARY_PREVIEW_CHARS).collect();
    let text = format!("Summary: {}...", preview);

    // The original keeps any consolidation claims.
    let mut metadata = entry.metadata.clone();
    metadata.remove(keys::CONSOLIDATED_FROM);
    metadata.remove(keys::CONSOLIDATED_AT);
    metadata.insert(keys::ORIGINAL_ID.into(), Value::from(entry.id.clone()));
    metadata.insert(keys::IS_SUMMARY.into(), Value::Bool(true));
    metadata.insert(keys::ORIGINAL_TIMESTAMP.into(), Value::from(entry.created_at.to_rfc3339()));
    metadata.insert(keys::SUMMARIZED_AT.into(), Value::from(Utc::now().to_rfc3339()));
    (text, metadata)
}

/// Text and metadata of the entry replacing `members`.
///
/// Metadata starts from the first member's; importance is the group maximum.
fn consolidate_group(members: &[&LongTermEntry]) -> (String, Metadata) {
    let texts: Vec<&str> = members.iter().map(|e| e.text.as_str()).collect();
    let text = format!("Consolidated memory: {}", texts.join(CONSOLIDATION_SEPARATOR));

    let mut metadata = members.first().map(|e| e.metadata.clone()).unwrap_or_default();
    metadata.remove(keys::IS_SUMMARY);
    let importance = members.iter().map(|e| e.importance()).fold(0.0, f64::max);
    metadata.insert(keys::IMPORTANCE.into(), Value::from(importance));
    metadata.insert(
        keys::CONSOLIDATED_FROM.into(),
        Value::from(members.iter().map(|e| e.id.clone()).collect::<Vec<_>>()),
    );
    metadata.insert(keys::CONSOLIDATED_AT.into(), Value::from(Utc::now().to_rfc3339()));
    (text, metadata)
}
