//! Merge per-chunk result files into the aggregate set.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::output::{self, AggregateMeta, ChunkFile};
use crate::probe::ProbeResult;

fn is_aggregate_name(name: &str) -> bool {
    name == "buckets.json" || (name.starts_with("buckets_") && name.ends_with(".json"))
}

/// Keep one result per URL, later occurrences winning, ordered by timestamp.
fn dedup_by_url(results: Vec<ProbeResult>) -> Vec<ProbeResult> {
    let mut unique: HashMap<String, ProbeResult> = HashMap::new();
    for result in results {
        if result.url.is_empty() {
            continue;
        }
        unique.insert(result.url.clone(), result);
    }
    let mut list: Vec<ProbeResult> = unique.into_values().collect();
    list.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.url.cmp(&b.url)));
    list
}

pub async fn run(results_dir: &Path, max_file_size: u64) -> Result<()> {
    tokio::fs::metadata(results_dir)
        .await
        .with_context(|| format!("results directory {} does not exist", results_dir.display()))?;

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(results_dir)
        .await
        .with_context(|| format!("read {}", results_dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if !name.ends_with(".json") || is_aggregate_name(&name) {
            continue;
        }
        files.push(path);
    }
    files.sort();

    if files.is_empty() {
        println!("No JSON files found to merge");
        return Ok(());
    }
    println!("Found {} JSON files to merge", files.len());

    let mut all_public: Vec<ProbeResult> = Vec::new();
    let mut all_private: Vec<ProbeResult> = Vec::new();
    let mut domains: HashSet<String> = HashSet::new();
    let mut total_chunks = 0usize;

    for path in &files {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) => {
                println!("Warning: Failed to process {}: {}", path.display(), e);
                continue;
            }
        };
        let parsed: ChunkFile = match serde_json::from_slice(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                println!("Warning: Failed to process {}: {}", path.display(), e);
                continue;
            }
        };
        domains.insert(parsed.domain);
        total_chunks += 1;
        all_public.extend(parsed.results.public);
        all_private.extend(parsed.results.private);
    }

    let unique_public = dedup_by_url(all_public);
    let unique_private = dedup_by_url(all_private);
    let public_count = unique_public.len();
    let private_count = unique_private.len();

    let groups = output::split_by_size(unique_public, unique_private, max_file_size);
    let meta = AggregateMeta {
        validated_at: None,
        source_files: Some(files.len()),
        domains_scanned: Some(domains.len()),
        total_chunks: Some(total_chunks),
    };
    let written = output::write_aggregate_files(results_dir, groups, meta).await?;

    println!("\nMerge Summary:");
    println!("  Source files: {}", files.len());
    println!("  Domains scanned: {}", domains.len());
    println!("  Total chunks: {}", total_chunks);
    println!("  Public buckets: {}", public_count);
    println!("  Private buckets: {}", private_count);
    println!("  Total unique buckets: {}", public_count + private_count);
    println!(
        "\nOutput written to {} file(s) in {}",
        written.len(),
        results_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{BucketLists, BucketsFile, RunStats};
    use crate::probe::Access;

    fn result(url: &str, status: u16, access: Access, timestamp: &str) -> ProbeResult {
        ProbeResult {
            url: url.to_string(),
            bucket: "acme".to_string(),
            region: "us-east-1".to_string(),
            status,
            access,
            timestamp: timestamp.to_string(),
        }
    }

    async fn write_chunk(dir: &Path, name: &str, domain: &str, results: BucketLists) {
        let stats = RunStats {
            total_checked: results.len() as u64,
            public_found: results.public.len() as u64,
            private_found: results.private.len() as u64,
        };
        let file = ChunkFile {
            chunk_id: 1,
            domain: domain.to_string(),
            date: "2024-01-01".to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            results,
            stats,
        };
        let body = serde_json::to_vec_pretty(&file).unwrap();
        tokio::fs::write(dir.join(name), body).await.unwrap();
    }

    #[test]
    fn aggregate_names_are_excluded() {
        assert!(is_aggregate_name("buckets.json"));
        assert!(is_aggregate_name("buckets_12.json"));
        assert!(!is_aggregate_name("2024-01-01_acme_chunk_1.json"));
        assert!(!is_aggregate_name("bucketsX.json"));
    }

    #[test]
    fn dedup_keeps_last_occurrence_per_url() {
        let url = "https://acme.s3.us-east-1.amazonaws.com";
        let first = result(url, 403, Access::Private, "2024-01-01T00:00:00+00:00");
        let second = result(url, 200, Access::Public, "2024-01-02T00:00:00+00:00");
        let other = result(
            "https://blob.s3.us-east-1.amazonaws.com",
            200,
            Access::Public,
            "2024-01-01T12:00:00+00:00",
        );

        let list = dedup_by_url(vec![first, other.clone(), second.clone()]);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0], other);
        assert_eq!(list[1], second);
    }

    #[tokio::test]
    async fn merge_combines_chunk_files_and_overwrites_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let shared = "https://shared.s3.us-east-1.amazonaws.com";

        write_chunk(
            dir.path(),
            "2024-01-01_acme_chunk_1.json",
            "acme",
            BucketLists {
                public: vec![result(shared, 403, Access::Private, "2024-01-01T00:00:00+00:00")],
                private: Vec::new(),
            },
        )
        .await;
        write_chunk(
            dir.path(),
            "2024-01-02_widget_chunk_1.json",
            "widget",
            BucketLists {
                public: vec![
                    result(shared, 200, Access::Public, "2024-01-02T00:00:00+00:00"),
                    result(
                        "https://widget.s3.eu-west-1.amazonaws.com",
                        200,
                        Access::Accessible,
                        "2024-01-02T01:00:00+00:00",
                    ),
                ],
                private: vec![result(
                    "https://locked.s3.us-east-1.amazonaws.com",
                    403,
                    Access::Private,
                    "2024-01-02T02:00:00+00:00",
                )],
            },
        )
        .await;
        // stale aggregate content must be ignored as input and then replaced
        tokio::fs::write(dir.path().join("buckets.json"), b"{\"buckets\":{}}")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("malformed.json"), b"not json")
            .await
            .unwrap();

        run(dir.path(), 20 * 1024 * 1024).await.unwrap();

        let raw = tokio::fs::read(dir.path().join("buckets.json")).await.unwrap();
        let parsed: BucketsFile = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed.source_files, Some(3));
        assert_eq!(parsed.total_chunks, Some(2));
        assert_eq!(parsed.domains_scanned, Some(2));
        assert_eq!(parsed.stats.total_public_buckets, 2);
        assert_eq!(parsed.stats.total_private_buckets, 1);
        assert_eq!(parsed.total_files, 1);

        let merged_shared: Vec<_> = parsed
            .buckets
            .public
            .iter()
            .filter(|r| r.url == shared)
            .collect();
        assert_eq!(merged_shared.len(), 1);
        assert_eq!(merged_shared[0].status, 200);
    }

    #[tokio::test]
    async fn merge_without_inputs_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), 20 * 1024 * 1024).await.unwrap();
        assert!(!dir.path().join("buckets.json").exists());
    }

    #[tokio::test]
    async fn merge_missing_directory_is_fatal() {
        assert!(run(Path::new("/nonexistent/results"), 1024).await.is_err());
    }
}
