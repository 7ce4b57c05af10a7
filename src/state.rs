use crate::permute::MAX_LEVEL;
use anyhow::Result;
use chrono::Local;
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hasher;
use std::path::Path;
use tokio::fs;

/// Domain-level state file name inside the state directory.
pub const STATE_FILE: &str = "scan_state.json";

/// Stable content hash for a wordlist domain. Completion is keyed by this,
/// not by position, so reordering the wordlist keeps progress.
pub fn domain_hash(word: &str) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(word.as_bytes());
    format!("{:016x}", hasher.finish())
}

/// Stable hash for one (bucket, region) probe target, for per-batch dedup.
pub fn target_hash(bucket: &str, region: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bucket.as_bytes());
    hasher.write(b":");
    hasher.write(region.as_bytes());
    hasher.finish()
}

/// Cross-run scan progress. `scanned_domains` holds the hashes of wordlist
/// entries that finished their pass at `permutation_level_completed`
/// (absent in files written before level escalation existed).
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ScanState {
    #[serde(default)]
    pub scanned_domains: HashSet<String>,
    #[serde(default)]
    pub last_scan_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permutation_level_completed: Option<u8>,
    #[serde(default)]
    pub additional_rounds: u32,
}

impl ScanState {
    /// Load persisted state. Missing or unparsable files degrade to the
    /// empty initial state, never an error.
    pub async fn load(path: &Path) -> ScanState {
        if !path.exists() {
            return ScanState::default();
        }
        let data = match fs::read(path).await {
            Ok(d) => d,
            Err(e) => {
                eprintln!("[state] read error for {}: {}, starting fresh", path.display(), e);
                return ScanState::default();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[state] corrupt state file {}: {}, starting fresh", path.display(), e);
                ScanState::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent).await;
            }
        }
        fs::write(path, data).await?;
        Ok(())
    }

    pub fn is_scanned(&self, hash: &str) -> bool {
        self.scanned_domains.contains(hash)
    }

    /// Level this run scans at: the configured base level, or the persisted
    /// pass level when that is higher. A finished lower pass never
    /// downgrades a richer request.
    pub fn effective_level(&self, base_level: u8) -> u8 {
        base_level
            .max(self.permutation_level_completed.unwrap_or(0))
            .min(MAX_LEVEL)
    }

    fn covers_all(&self, hashes: &[String]) -> bool {
        !hashes.is_empty() && hashes.iter().all(|h| self.scanned_domains.contains(h))
    }

    /// Run-start escalation check: once every wordlist hash is complete at
    /// the current level and a higher level exists, clear completeness and
    /// advance so the whole list is re-scanned with the richer candidate
    /// set. Returns the level this run should scan at.
    pub fn escalate_if_exhausted(&mut self, hashes: &[String], base_level: u8) -> u8 {
        let mut level = self.effective_level(base_level);
        if level < MAX_LEVEL && self.covers_all(hashes) {
            eprintln!(
                "[state] all {} domains complete at level {}, escalating to level {}",
                hashes.len(),
                level,
                level + 1
            );
            self.scanned_domains.clear();
            level += 1;
            self.permutation_level_completed = Some(level);
            self.additional_rounds += 1;
        }
        level
    }

    /// Record a batch of completed domains for the given pass level.
    pub fn mark_scanned<I: IntoIterator<Item = String>>(&mut self, hashes: I, level: u8) {
        self.scanned_domains.extend(hashes);
        self.permutation_level_completed = Some(level);
        self.last_scan_time = Some(Local::now().to_rfc3339());
    }
}
