//! Build a seed wordlist from the public bug bounty program list.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::time::Duration;

pub const BUGBOUNTY_LIST_URL: &str =
    "https://raw.githubusercontent.com/projectdiscovery/public-bugbounty-programs/main/chaos-bugbounty-list.json";

#[derive(Deserialize, Debug)]
struct ProgramList {
    #[serde(default)]
    programs: Vec<Program>,
}

#[derive(Deserialize, Debug)]
struct Program {
    #[serde(default)]
    name: String,
    #[serde(default)]
    bounty: bool,
    #[serde(default)]
    domains: Vec<String>,
}

/// Wordlist entries for one program: the lowercased, space-joined name,
/// each domain with `*.` stripped, and every domain label longer than two
/// characters.
fn extract_words(program: &Program, words: &mut BTreeSet<String>) {
    let name = program.name.to_lowercase();
    let name = name.split_whitespace().collect::<Vec<_>>().join("-");
    if !name.is_empty() {
        words.insert(name);
    }
    for domain in &program.domains {
        let domain = domain.to_lowercase().replace("*.", "");
        if domain.is_empty() {
            continue;
        }
        words.insert(domain.clone());
        for part in domain.split('.') {
            if part.len() > 2 {
                words.insert(part.to_string());
            }
        }
    }
}

pub async fn run(output: &Path, timeout: u64) -> Result<()> {
    println!("[*] Fetching bug bounty programs from ProjectDiscovery...");
    let client = reqwest::Client::builder()
        .user_agent(concat!("rubucket/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout.max(1)))
        .build()
        .context("build http client")?;
    let body = client
        .get(BUGBOUNTY_LIST_URL)
        .send()
        .await
        .context("fetch bug bounty list")?
        .error_for_status()
        .context("fetch bug bounty list")?
        .text()
        .await
        .context("read bug bounty list")?;
    let list: ProgramList = serde_json::from_str(&body).context("parse bug bounty list")?;

    let mut words = BTreeSet::new();
    let mut program_count = 0usize;
    for program in &list.programs {
        if !program.bounty {
            continue;
        }
        program_count += 1;
        extract_words(program, &mut words);
    }
    println!("[*] Found {} bug bounty programs", program_count);
    println!("[*] Generated {} unique words", words.len());

    let mut out = String::with_capacity(words.len() * 12);
    for word in &words {
        out.push_str(word);
        out.push('\n');
    }
    tokio::fs::write(output, out)
        .await
        .with_context(|| format!("write {}", output.display()))?;
    println!("[+] Wordlist saved to {}", output.display());
    Ok(())
}
