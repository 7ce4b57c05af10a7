use rubucket::options::Options;
use rubucket::output::ChunkFile;
use rubucket::probe::{virtual_hosted_url, Access, ProbeResult, Prober, REGIONS};
use rubucket::scanner;
use rubucket::state::{domain_hash, ScanState, STATE_FILE};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Prober that records every dispatched target and reports the scripted
/// names as public buckets in us-east-1.
struct ScriptedProber {
    open: HashSet<String>,
    seen: Mutex<HashSet<(String, String)>>,
}

impl ScriptedProber {
    fn new(open: &[&str]) -> Self {
        ScriptedProber {
            open: open.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(HashSet::new()),
        }
    }

    fn seen_buckets(&self) -> HashSet<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(bucket, _)| bucket.clone())
            .collect()
    }

    fn seen_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Prober for ScriptedProber {
    fn probe(&self, bucket: &str, region: &str) -> impl Future<Output = Option<ProbeResult>> + Send {
        self.seen
            .lock()
            .unwrap()
            .insert((bucket.to_string(), region.to_string()));
        let result = if region == "us-east-1" && self.open.contains(bucket) {
            Some(ProbeResult {
                url: virtual_hosted_url(bucket, region),
                bucket: bucket.to_string(),
                region: region.to_string(),
                status: 200,
                access: Access::Public,
                timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            })
        } else {
            None
        };
        async move { result }
    }
}

fn options(root: &Path, wordlist: &Path) -> Options {
    Options {
        wordlists: vec![wordlist.to_path_buf()],
        timeout: 1,
        workers: 8,
        chunk_size: 50,
        level: 0,
        max_domains: None,
        state_dir: root.join("state"),
        output_dir: root.join("results"),
        env_file: None,
        public_only: false,
        resume: true,
        verbose: false,
        max_file_size: 20 * 1024 * 1024,
    }
}

fn chunk_files(results_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(results_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.to_string_lossy().contains("_chunk_"))
        .collect();
    files.sort();
    files
}

async fn load_state(root: &Path) -> ScanState {
    ScanState::load(&root.join("state").join(STATE_FILE)).await
}

#[tokio::test]
async fn scan_writes_chunk_files_and_records_state() {
    let dir = tempfile::tempdir().unwrap();
    let wordlist = dir.path().join("words.txt");
    std::fs::write(&wordlist, "acme\nblob\nwidget\n").unwrap();

    let mut opt = options(dir.path(), &wordlist);
    opt.chunk_size = 2;
    let prober = Arc::new(ScriptedProber::new(&["acme"]));
    scanner::run_with(prober.clone(), opt).await.unwrap();

    // 3 words in chunks of 2, every (word, region) pair dispatched once
    assert_eq!(prober.seen_count(), 3 * REGIONS.len());

    let files = chunk_files(&dir.path().join("results"));
    assert_eq!(files.len(), 2, "one file per chunk: {files:?}");

    let mut public_buckets = Vec::new();
    for (i, path) in files.iter().enumerate() {
        let raw = std::fs::read(path).unwrap();
        let parsed: ChunkFile = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed.chunk_id, i + 1);
        public_buckets.extend(parsed.results.public.into_iter().map(|r| r.bucket));
    }
    assert_eq!(public_buckets, vec!["acme".to_string()]);

    let state = load_state(dir.path()).await;
    assert_eq!(state.scanned_domains.len(), 3);
    for word in ["acme", "blob", "widget"] {
        assert!(state.is_scanned(&domain_hash(word)), "{word} not recorded");
    }
    assert_eq!(state.permutation_level_completed, Some(0));
}

#[tokio::test]
async fn second_run_probes_only_pending_domains() {
    let dir = tempfile::tempdir().unwrap();
    let wordlist = dir.path().join("words.txt");
    std::fs::write(&wordlist, "acme\nblob\n").unwrap();

    let first = Arc::new(ScriptedProber::new(&[]));
    scanner::run_with(first.clone(), options(dir.path(), &wordlist)).await.unwrap();
    assert_eq!(first.seen_buckets(), HashSet::from(["acme".to_string(), "blob".to_string()]));

    // a new word appears; only it is pending on the next run
    std::fs::write(&wordlist, "acme\nblob\ngamma\n").unwrap();
    let second = Arc::new(ScriptedProber::new(&[]));
    scanner::run_with(second.clone(), options(dir.path(), &wordlist)).await.unwrap();
    assert_eq!(second.seen_buckets(), HashSet::from(["gamma".to_string()]));

    let state = load_state(dir.path()).await;
    assert_eq!(state.scanned_domains.len(), 3);
}

#[tokio::test]
async fn exhausted_wordlist_escalates_to_next_level() {
    let dir = tempfile::tempdir().unwrap();
    let wordlist = dir.path().join("words.txt");
    std::fs::write(&wordlist, "acme\n").unwrap();

    let first = Arc::new(ScriptedProber::new(&[]));
    scanner::run_with(first.clone(), options(dir.path(), &wordlist)).await.unwrap();
    assert_eq!(first.seen_count(), REGIONS.len());

    // everything finished at level 0, so the next run rescans at level 1
    // with the environment-tagged candidate set
    let second = Arc::new(ScriptedProber::new(&[]));
    scanner::run_with(second.clone(), options(dir.path(), &wordlist)).await.unwrap();
    assert!(
        second.seen_buckets().len() > 1,
        "expected permuted names, saw {:?}",
        second.seen_buckets().len()
    );
    assert!(second.seen_buckets().contains("acme-dev"));

    let state = load_state(dir.path()).await;
    assert_eq!(state.permutation_level_completed, Some(1));
    assert_eq!(state.additional_rounds, 1);
    assert!(state.is_scanned(&domain_hash("acme")));
}

#[tokio::test]
async fn no_resume_ignores_recorded_progress() {
    let dir = tempfile::tempdir().unwrap();
    let wordlist = dir.path().join("words.txt");
    std::fs::write(&wordlist, "acme\nblob\n").unwrap();

    scanner::run_with(Arc::new(ScriptedProber::new(&[])), options(dir.path(), &wordlist))
        .await
        .unwrap();

    let mut opt = options(dir.path(), &wordlist);
    opt.resume = false;
    let again = Arc::new(ScriptedProber::new(&[]));
    scanner::run_with(again.clone(), opt).await.unwrap();
    assert_eq!(again.seen_buckets(), HashSet::from(["acme".to_string(), "blob".to_string()]));
}

#[tokio::test]
async fn max_domains_caps_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let wordlist = dir.path().join("words.txt");
    std::fs::write(&wordlist, "acme\nblob\nwidget\n").unwrap();

    let mut opt = options(dir.path(), &wordlist);
    opt.max_domains = Some(1);
    let prober = Arc::new(ScriptedProber::new(&[]));
    scanner::run_with(prober.clone(), opt).await.unwrap();

    assert_eq!(prober.seen_buckets(), HashSet::from(["acme".to_string()]));
    let state = load_state(dir.path()).await;
    assert_eq!(state.scanned_domains.len(), 1);
}
