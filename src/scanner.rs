use crate::metrics::{progress_line, Metrics};
use crate::options::Options;
use crate::output::{self, BucketLists};
use crate::permute;
use crate::probe::{HttpProber, ProbeResult, Prober, REGIONS};
use crate::state::{self, ScanState, STATE_FILE};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{Duration, Instant};

/// Completions between progress lines in non-verbose mode.
const PROGRESS_EVERY: u64 = 50;
/// Pause between chunks so sustained runs stay polite.
const CHUNK_PAUSE_SECS: u64 = 2;

/// Read words from one or more list files, skipping blanks and `#` comments.
/// Files ending in `.gz` are decompressed on the fly.
fn read_wordlists(paths: &[PathBuf]) -> Result<Vec<String>> {
    let mut words = Vec::new();
    for path in paths {
        let f = File::open(path).with_context(|| format!("open wordlist {}", path.display()))?;
        let gz = path
            .as_os_str()
            .to_str()
            .map(|s| s.ends_with(".gz"))
            .unwrap_or(false);
        let reader: Box<dyn Read> = if gz { Box::new(GzDecoder::new(f)) } else { Box::new(f) };
        for line in BufReader::new(reader).lines() {
            let line = line.with_context(|| format!("read wordlist {}", path.display()))?;
            let s = line.trim();
            if s.is_empty() || s.starts_with('#') {
                continue;
            }
            words.push(s.to_string());
        }
    }
    Ok(words)
}

/// Load the environment tags, falling back to the embedded defaults when no
/// file is given or the file is unreadable.
fn read_environments(path: &Option<PathBuf>) -> Vec<String> {
    if let Some(p) = path {
        match std::fs::read_to_string(p) {
            Ok(body) => {
                let envs: Vec<String> = body
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string)
                    .collect();
                if !envs.is_empty() {
                    return envs;
                }
                eprintln!("[!] Error loading environment file: {} is empty", p.display());
            }
            Err(e) => eprintln!("[!] Error loading environment file: {}", e),
        }
        println!("[*] Using default environments");
    }
    crate::dicts::default_environments()
}

pub async fn run(opt: Options) -> Result<()> {
    let prober = Arc::new(HttpProber::new(opt.timeout, opt.verbose)?);
    run_with(prober, opt).await
}

/// Scan loop over an arbitrary prober, so tests can drive it without a
/// network.
pub async fn run_with<P: Prober + 'static>(prober: Arc<P>, opt: Options) -> Result<()> {
    if opt.verbose {
        println!("Parsed Options: {:#?}", opt);
    }
    tokio::fs::create_dir_all(&opt.state_dir)
        .await
        .with_context(|| format!("create state dir {}", opt.state_dir.display()))?;
    tokio::fs::create_dir_all(&opt.output_dir)
        .await
        .with_context(|| format!("create output dir {}", opt.output_dir.display()))?;

    for path in &opt.wordlists {
        println!("[*] Loading wordlist: {}", path.display());
    }
    let words = read_wordlists(&opt.wordlists)?;
    println!(
        "[*] Loaded {} words from {} wordlist(s)",
        words.len(),
        opt.wordlists.len()
    );

    let environments = read_environments(&opt.env_file);

    let state_path = opt.state_dir.join(STATE_FILE);
    let mut scan_state = if opt.resume {
        ScanState::load(&state_path).await
    } else {
        ScanState::default()
    };

    let hashes: Vec<String> = words.iter().map(|w| state::domain_hash(w)).collect();
    let level = scan_state.escalate_if_exhausted(&hashes, opt.level);

    let mut pending: Vec<String> = words
        .iter()
        .zip(&hashes)
        .filter(|(_, h)| !scan_state.is_scanned(h))
        .map(|(w, _)| w.clone())
        .collect();
    let skipped = words.len() - pending.len();
    if skipped > 0 {
        println!("[*] Resume: skipping {} already scanned domain(s)", skipped);
    }
    if let Some(cap) = opt.max_domains {
        if pending.len() > cap {
            println!("[*] Limiting run to {} of {} pending domain(s)", cap, pending.len());
            pending.truncate(cap);
        }
    }

    let chunks: Vec<&[String]> = pending.chunks(opt.chunk_size).collect();
    println!(
        "[*] Split into {} chunks of {} words each",
        chunks.len(),
        opt.chunk_size
    );

    let metrics = Metrics::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let chunk_id = index + 1;
        println!("\n[*] Starting chunk {}/{}", chunk_id, chunks.len());

        // the first word labels the chunk in file names and logs
        let domain = chunk[0].clone();
        let names = permute::generate(chunk, level, &environments);

        println!("\n{}", "=".repeat(60));
        println!("[*] Processing Chunk {}", chunk_id);
        println!("[*] Domain: {}", domain);
        println!("[*] Bucket names in chunk: {}", names.len());
        println!("[*] Total combinations to check: {}", names.len() * REGIONS.len());
        println!("[*] Using {} concurrent workers", opt.workers);
        println!("[*] Timeout per request: {} seconds", opt.timeout);
        println!("[*] Starting chunk scan...\n");

        let started = Instant::now();
        let (results, chunk_checked) =
            scan_chunk(prober.clone(), &names, metrics.clone(), &opt).await;
        let elapsed = started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { chunk_checked as f64 / elapsed } else { 0.0 };

        println!("\n[*] Chunk {} completed in {:.2} seconds", chunk_id, elapsed);
        println!("[*] Total requests made: {}", chunk_checked);
        println!("[*] Average rate: {:.1} requests/second", rate);
        println!("[*] Found {} public buckets", results.public.len());
        println!("[*] Found {} private buckets", results.private.len());

        match output::write_chunk_files(
            &opt.output_dir,
            chunk_id,
            &domain,
            results,
            chunk_checked,
            opt.max_file_size,
        )
        .await
        {
            Ok(paths) => {
                for path in paths {
                    println!("[*] Results saved to {}", path.display());
                }
            }
            Err(e) => eprintln!("[!] Error saving results: {}", e),
        }

        scan_state.mark_scanned(chunk.iter().map(|w| state::domain_hash(w)), level);
        if let Err(e) = scan_state.save(&state_path).await {
            eprintln!("[state] save error: {}", e);
        }

        if chunk_id < chunks.len() {
            tokio::time::sleep(Duration::from_secs(CHUNK_PAUSE_SECS)).await;
        }
    }

    println!("\n[*] All chunks completed!");
    Ok(())
}

/// Probe every (name, region) pair of one chunk through a bounded worker
/// pool. Returns the collected results and the number of targets checked.
pub async fn scan_chunk<P: Prober + 'static>(
    prober: Arc<P>,
    names: &BTreeSet<String>,
    metrics: Arc<Metrics>,
    opt: &Options,
) -> (BucketLists, u64) {
    // at most one dispatch per (name, region) pair within the batch
    let mut seen = HashSet::new();
    let mut targets: Vec<(String, String)> = Vec::new();
    for name in names {
        for region in REGIONS {
            if seen.insert(state::target_hash(name, region)) {
                targets.push((name.clone(), region.to_string()));
            }
        }
    }
    let total = targets.len() as u64;

    let (tx, mut rx) = mpsc::unbounded_channel::<Option<ProbeResult>>();
    let collector = {
        let metrics = metrics.clone();
        let public_only = opt.public_only;
        let verbose = opt.verbose;
        tokio::spawn(async move {
            let mut results = BucketLists::default();
            let mut completed: u64 = 0;
            let started = Instant::now();
            while let Some(outcome) = rx.recv().await {
                completed += 1;
                match outcome {
                    Some(result) => {
                        if result.access.is_open() {
                            println!(
                                "[+] PUBLIC  {} | Bucket: {} | Region: {}",
                                result.url, result.bucket, result.region
                            );
                            metrics.public_found.fetch_add(1, Ordering::Relaxed);
                            results.public.push(result);
                        } else if !public_only {
                            println!(
                                "[-] PRIVATE {} | Bucket: {} | Region: {}",
                                result.url, result.bucket, result.region
                            );
                            metrics.private_found.fetch_add(1, Ordering::Relaxed);
                            results.private.push(result);
                        }
                    }
                    None => {
                        metrics.absent.fetch_add(1, Ordering::Relaxed);
                    }
                }
                if !verbose && completed % PROGRESS_EVERY == 0 {
                    println!(
                        "{}",
                        progress_line(&metrics, completed, total, started.elapsed().as_secs_f64())
                    );
                }
            }
            results
        })
    };

    let sem = Arc::new(Semaphore::new(opt.workers));
    let mut handles = FuturesUnordered::new();
    for (i, (bucket, region)) in targets.into_iter().enumerate() {
        let permit = sem.clone().acquire_owned().await.unwrap();
        let prober_task = prober.clone();
        let metrics_task = metrics.clone();
        let tx_task = tx.clone();
        let verbose = opt.verbose;
        let task_no = i + 1;
        handles.push(tokio::spawn(async move {
            let _p = permit;
            metrics_task.checked.fetch_add(1, Ordering::Relaxed);
            if verbose {
                eprintln!("[*] [{}] Scanning: {} in {}", task_no, bucket, region);
            }
            let outcome = prober_task.probe(&bucket, &region).await;
            if verbose && outcome.is_none() {
                eprintln!("[x] [{}] Not found: {} in {}", task_no, bucket, region);
            }
            let _ = tx_task.send(outcome);
        }));
    }
    drop(tx);

    while let Some(res) = handles.next().await {
        if let Err(e) = res {
            eprintln!("task join error: {}", e);
        }
    }

    let results = match collector.await {
        Ok(results) => results,
        Err(e) => {
            eprintln!("collector join error: {}", e);
            BucketLists::default()
        }
    };
    (results, total)
}
