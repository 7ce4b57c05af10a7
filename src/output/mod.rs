//! Per-chunk result files and the size-bounded aggregate set.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::probe::ProbeResult;

/// Assumed serialized size of one result, used to pick the check interval.
const AVERAGE_RESULT_BYTES: u64 = 250;
/// Rotate once the estimate crosses this share of the cap.
const SIZE_THRESHOLD: f64 = 0.95;

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct BucketLists {
    #[serde(default)]
    pub public: Vec<ProbeResult>,
    #[serde(default)]
    pub private: Vec<ProbeResult>,
}

impl BucketLists {
    pub fn len(&self) -> usize {
        self.public.len() + self.private.len()
    }

    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && self.private.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RunStats {
    pub total_checked: u64,
    pub public_found: u64,
    pub private_found: u64,
}

/// One scan batch as persisted to `{date}_{domain}_chunk_{id}.json`.
/// A batch whose results exceed the size cap spills into numbered
/// continuation files (`..._chunk_{id}_1.json`, ...).
#[derive(Serialize, Deserialize, Debug)]
pub struct ChunkFile {
    pub chunk_id: usize,
    pub domain: String,
    pub date: String,
    pub timestamp: String,
    pub results: BucketLists,
    pub stats: RunStats,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct AggregateStats {
    pub public_buckets_in_file: usize,
    pub private_buckets_in_file: usize,
    pub total_buckets_in_file: usize,
    pub total_public_buckets: usize,
    pub total_private_buckets: usize,
    pub total_buckets: usize,
}

/// One file of the aggregate set (`buckets.json`, `buckets_1.json`, ...).
/// Every field except `buckets` is optional on load, so files written by
/// older versions of the tool still parse.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct BucketsFile {
    #[serde(default)]
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains_scanned: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(default)]
    pub file_index: usize,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub stats: AggregateStats,
    #[serde(default)]
    pub buckets: BucketLists,
}

/// Provenance fields stamped into every file of an aggregate rewrite.
#[derive(Debug, Default)]
pub struct AggregateMeta {
    pub validated_at: Option<String>,
    pub source_files: Option<usize>,
    pub domains_scanned: Option<usize>,
    pub total_chunks: Option<usize>,
}

fn chunk_file_name(date: &str, domain: &str, chunk_id: usize, part: usize) -> String {
    // slashes and colons in a domain would break the path
    let clean = domain.replace(['/', ':'], "_");
    if part == 0 {
        format!("{date}_{clean}_chunk_{chunk_id}.json")
    } else {
        format!("{date}_{clean}_chunk_{chunk_id}_{part}.json")
    }
}

/// Write one batch's results, spilling into numbered continuation files
/// once the serialized size would exceed `max_bytes`. A batch with no
/// findings still gets its file. `total_checked` is a batch-level count
/// and is repeated in every part.
pub async fn write_chunk_files(
    output_dir: &Path,
    chunk_id: usize,
    domain: &str,
    results: BucketLists,
    total_checked: u64,
    max_bytes: u64,
) -> Result<Vec<PathBuf>> {
    let mut groups = split_by_size(results.public, results.private, max_bytes);
    if groups.is_empty() {
        groups.push(BucketLists::default());
    }

    let now = Local::now();
    let date = now.format("%Y-%m-%d").to_string();
    let timestamp = now.to_rfc3339();
    let mut written = Vec::with_capacity(groups.len());

    for (part, buckets) in groups.into_iter().enumerate() {
        let stats = RunStats {
            total_checked,
            public_found: buckets.public.len() as u64,
            private_found: buckets.private.len() as u64,
        };
        let file = ChunkFile {
            chunk_id,
            domain: domain.to_string(),
            date: date.clone(),
            timestamp: timestamp.clone(),
            results: buckets,
            stats,
        };
        let path = output_dir.join(chunk_file_name(&date, domain, chunk_id, part));
        let body = serde_json::to_vec_pretty(&file).context("serialize chunk results")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn estimate_json_size(lists: &BucketLists) -> u64 {
    serde_json::to_vec_pretty(lists).map_or(0, |b| b.len() as u64)
}

/// Split results into groups whose serialized size stays under `max_bytes`.
///
/// The size estimate runs every K appends (K sized so checks fire roughly
/// every 2% of the cap) and flushes the current group once it exceeds 95%
/// of the cap. Groups therefore track the cap approximately: a group may
/// overshoot by whatever was appended since the last check. Order within
/// each list is preserved across group boundaries.
pub fn split_by_size(
    public: Vec<ProbeResult>,
    private: Vec<ProbeResult>,
    max_bytes: u64,
) -> Vec<BucketLists> {
    let check_interval = (max_bytes / (AVERAGE_RESULT_BYTES * 50)).max(1);
    let threshold = max_bytes as f64 * SIZE_THRESHOLD;

    let mut groups: Vec<BucketLists> = Vec::new();
    let mut current = BucketLists::default();
    let mut appended: u64 = 0;

    let tagged = public
        .into_iter()
        .map(|r| (r, true))
        .chain(private.into_iter().map(|r| (r, false)));
    for (result, is_public) in tagged {
        if is_public {
            current.public.push(result);
        } else {
            current.private.push(result);
        }
        appended += 1;
        if appended % check_interval == 0 && estimate_json_size(&current) as f64 > threshold {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

pub fn aggregate_path(dir: &Path, index: usize) -> PathBuf {
    if index == 0 {
        dir.join("buckets.json")
    } else {
        dir.join(format!("buckets_{index}.json"))
    }
}

/// Aggregate files present in `dir`, in index order. The numbered sequence
/// is contiguous: a missing `buckets_N.json` ends the scan.
pub async fn find_aggregate_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let base = aggregate_path(dir, 0);
    if tokio::fs::metadata(&base).await.is_ok() {
        files.push(base);
    }
    let mut index = 1;
    loop {
        let path = aggregate_path(dir, index);
        if tokio::fs::metadata(&path).await.is_err() {
            break;
        }
        files.push(path);
        index += 1;
    }
    files
}

/// Rewrite the aggregate set in `dir` from pre-split groups. New files are
/// written first; stale higher-numbered leftovers are removed afterwards.
/// An empty rewrite still produces one empty `buckets.json`.
pub async fn write_aggregate_files(
    dir: &Path,
    mut groups: Vec<BucketLists>,
    meta: AggregateMeta,
) -> Result<Vec<PathBuf>> {
    if groups.is_empty() {
        groups.push(BucketLists::default());
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create {}", dir.display()))?;

    let total_public: usize = groups.iter().map(|g| g.public.len()).sum();
    let total_private: usize = groups.iter().map(|g| g.private.len()).sum();
    let total_files = groups.len();
    let generated_at = Local::now().to_rfc3339();
    let mut written = Vec::with_capacity(total_files);

    for (index, buckets) in groups.into_iter().enumerate() {
        let file = BucketsFile {
            generated_at: generated_at.clone(),
            validated_at: meta.validated_at.clone(),
            source_files: meta.source_files,
            domains_scanned: meta.domains_scanned,
            total_chunks: meta.total_chunks,
            file_index: index,
            total_files,
            stats: AggregateStats {
                public_buckets_in_file: buckets.public.len(),
                private_buckets_in_file: buckets.private.len(),
                total_buckets_in_file: buckets.len(),
                total_public_buckets: total_public,
                total_private_buckets: total_private,
                total_buckets: total_public + total_private,
            },
            buckets,
        };
        let path = aggregate_path(dir, index);
        let body = serde_json::to_vec_pretty(&file).context("serialize aggregate")?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        println!(
            "  Written: {} ({:.2} MB)",
            path.display(),
            body.len() as f64 / (1024.0 * 1024.0)
        );
        written.push(path);
    }

    // files 0..total_files were overwritten in place, the rest are stale
    let mut index = total_files.max(1);
    loop {
        let path = aggregate_path(dir, index);
        if tokio::fs::metadata(&path).await.is_err() {
            break;
        }
        if let Err(err) = tokio::fs::remove_file(&path).await {
            eprintln!("[output] failed to remove stale {}: {}", path.display(), err);
            break;
        }
        index += 1;
    }

    Ok(written)
}
