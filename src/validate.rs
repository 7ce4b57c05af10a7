//! Re-check previously found buckets and drop the dead ones.

use anyhow::{Context, Result};
use chrono::Local;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Duration;

use crate::output::{self, AggregateMeta, BucketsFile};
use crate::probe::ProbeResult;

/// Final HEAD status of a URL, if the request got an answer at all.
pub trait AliveCheck: Send + Sync {
    fn status(&self, url: &str) -> impl Future<Output = Option<u16>> + Send;
}

/// HEAD with redirects followed, unlike the scan probes.
pub struct HttpAliveCheck {
    client: reqwest::Client,
}

impl HttpAliveCheck {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rubucket/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .context("build http client")?;
        Ok(HttpAliveCheck { client })
    }
}

impl AliveCheck for HttpAliveCheck {
    fn status(&self, url: &str) -> impl Future<Output = Option<u16>> + Send {
        async move {
            match self.client.head(url).send().await {
                Ok(resp) => Some(resp.status().as_u16()),
                Err(_) => None,
            }
        }
    }
}

struct ValidateStats {
    total: usize,
    alive: usize,
    dead: usize,
    errors: usize,
}

/// Check a list of buckets through a bounded worker pool. Alive entries get
/// a fresh timestamp and status, everything else is dropped.
async fn validate_parallel<C: AliveCheck + 'static>(
    checker: Arc<C>,
    buckets: Vec<ProbeResult>,
    workers: usize,
) -> (Vec<ProbeResult>, ValidateStats) {
    let total = buckets.len();
    println!("Validating {} buckets with {} workers...", total, workers);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let collector = tokio::spawn(async move {
        let mut alive: Vec<ProbeResult> = Vec::new();
        let mut dead = 0usize;
        let mut completed = 0usize;
        while let Some(outcome) = rx.recv().await {
            completed += 1;
            if completed % 50 == 0 || completed == total {
                println!("  Progress: {}/{} buckets validated", completed, total);
            }
            match outcome {
                Some(bucket) => alive.push(bucket),
                None => dead += 1,
            }
        }
        (alive, dead)
    });

    let sem = Arc::new(Semaphore::new(workers));
    let mut handles = FuturesUnordered::new();
    for mut bucket in buckets {
        let permit = sem.clone().acquire_owned().await.unwrap();
        let checker_task = checker.clone();
        let tx_task = tx.clone();
        handles.push(tokio::spawn(async move {
            let _p = permit;
            let outcome = match checker_task.status(&bucket.url).await {
                Some(200) => {
                    bucket.timestamp = Local::now().to_rfc3339();
                    bucket.status = 200;
                    Some(bucket)
                }
                _ => None,
            };
            let _ = tx_task.send(outcome);
        }));
    }
    drop(tx);

    let mut errors = 0usize;
    while let Some(res) = handles.next().await {
        if let Err(e) = res {
            errors += 1;
            eprintln!("  Error validating bucket: {}", e);
        }
    }

    let (alive, dead) = match collector.await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("collector join error: {}", e);
            (Vec::new(), 0)
        }
    };
    let stats = ValidateStats {
        total,
        alive: alive.len(),
        dead,
        errors,
    };
    (alive, stats)
}

pub async fn run(results_dir: &Path, timeout: u64, workers: usize, max_file_size: u64) -> Result<()> {
    let checker = Arc::new(HttpAliveCheck::new(timeout)?);
    run_with(checker, results_dir, workers, max_file_size).await
}

/// Validation loop over an arbitrary checker, so tests can drive it without
/// a network.
pub async fn run_with<C: AliveCheck + 'static>(
    checker: Arc<C>,
    results_dir: &Path,
    workers: usize,
    max_file_size: u64,
) -> Result<()> {
    tokio::fs::metadata(results_dir)
        .await
        .with_context(|| format!("results directory {} does not exist", results_dir.display()))?;

    let files = output::find_aggregate_files(results_dir).await;
    if files.is_empty() {
        println!("No bucket files found to validate");
        return Ok(());
    }
    println!("Found {} bucket file(s) to validate", files.len());

    println!("\nLoading buckets from all files...");
    let mut all_public: Vec<ProbeResult> = Vec::new();
    let mut all_private: Vec<ProbeResult> = Vec::new();
    for path in &files {
        println!("  Loading: {}", path.display());
        let parsed: Result<BucketsFile> = tokio::fs::read(path)
            .await
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_slice(&raw).map_err(anyhow::Error::from));
        match parsed {
            Ok(file) => {
                all_public.extend(file.buckets.public);
                all_private.extend(file.buckets.private);
            }
            Err(e) => println!("  Error loading {}: {}", path.display(), e),
        }
    }
    println!("\nLoaded {} public buckets", all_public.len());
    println!("Loaded {} private buckets", all_private.len());

    println!("\n=== Validating Public Buckets ===");
    let (mut alive_public, public_stats) =
        validate_parallel(checker.clone(), all_public, workers).await;
    println!("\n=== Validating Private Buckets ===");
    let (mut alive_private, private_stats) =
        validate_parallel(checker.clone(), all_private, workers).await;

    alive_public.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.url.cmp(&b.url)));
    alive_private.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.url.cmp(&b.url)));

    println!(
        "\nSplitting validated data into files (max {} MB each)...",
        max_file_size / (1024 * 1024)
    );
    let groups = output::split_by_size(alive_public, alive_private, max_file_size);
    if groups.is_empty() {
        println!("  No alive buckets found, will create empty buckets.json");
    }
    println!("  Data will be split into {} file(s)", groups.len().max(1));

    println!("\nWriting validated bucket files...");
    let meta = AggregateMeta {
        validated_at: Some(Local::now().to_rfc3339()),
        ..Default::default()
    };
    let written = output::write_aggregate_files(results_dir, groups, meta).await?;

    let total_kept = public_stats.alive + private_stats.alive;
    let total_removed = public_stats.dead + private_stats.dead;
    println!("\n{}", "=".repeat(60));
    println!("VALIDATION SUMMARY");
    println!("{}", "=".repeat(60));
    println!("\nPublic Buckets:");
    println!("  Total validated: {}", public_stats.total);
    println!("  Alive (kept): {}", public_stats.alive);
    println!("  Dead (removed): {}", public_stats.dead);
    println!("  Errors: {}", public_stats.errors);
    println!("\nPrivate Buckets:");
    println!("  Total validated: {}", private_stats.total);
    println!("  Alive (kept): {}", private_stats.alive);
    println!("  Dead (removed): {}", private_stats.dead);
    println!("  Errors: {}", private_stats.errors);
    println!("\nOverall:");
    println!(
        "  Total buckets processed: {}",
        public_stats.total + private_stats.total
    );
    println!("  Total kept: {}", total_kept);
    println!("  Total removed: {}", total_removed);
    println!("  Output files: {}", written.len());
    println!("{}", "=".repeat(60));
    Ok(())
}
