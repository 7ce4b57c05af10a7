use anyhow::Result;
use std::path::PathBuf;

use crate::permute::MAX_LEVEL;

/// Resolved scan configuration, assembled from the CLI in `main`.
#[derive(Debug, Clone)]
pub struct Options {
    pub wordlists: Vec<PathBuf>,
    pub timeout: u64,
    pub workers: usize,
    pub chunk_size: usize,
    pub level: u8,
    pub max_domains: Option<usize>,
    pub state_dir: PathBuf,
    pub output_dir: PathBuf,
    pub env_file: Option<PathBuf>,
    pub public_only: bool,
    pub resume: bool,
    pub verbose: bool,
    pub max_file_size: u64,
}

impl Options {
    /// Normalize values that would stall the scan loop.
    pub fn check(&mut self) {
        if self.workers == 0 {
            self.workers = 1;
        }
        if self.chunk_size == 0 {
            self.chunk_size = 1;
        }
        if self.timeout == 0 {
            self.timeout = 1;
        }
        if self.level > MAX_LEVEL {
            self.level = MAX_LEVEL;
        }
    }
}

/// Convert a size expression (e.g. 20M, 1G, 512K, 1048576) into bytes.
/// K/M/G are binary multipliers, a trailing `b`/`B` is ignored, and a bare
/// number is taken as bytes.
pub fn parse_size(size: &str) -> Result<u64> {
    let s = size.trim();
    if s.is_empty() {
        anyhow::bail!("empty size string")
    }
    let lower = s.to_ascii_lowercase();
    let lower = lower.strip_suffix('b').unwrap_or(&lower).to_string();

    let parse_num = |txt: &str| -> Result<f64> {
        let v: f64 = txt.trim().parse()?;
        if v <= 0.0 {
            anyhow::bail!("size value must be > 0")
        }
        Ok(v)
    };

    if let Some(last) = lower.chars().last() {
        let mult = match last {
            'k' => Some(1024f64),
            'm' => Some(1024f64 * 1024.0),
            'g' => Some(1024f64 * 1024.0 * 1024.0),
            _ => None,
        };
        if let Some(mult) = mult {
            let value = parse_num(&lower[..lower.len() - 1])?;
            let bytes = (value * mult).floor() as u64;
            if bytes == 0 {
                anyhow::bail!("calculated size is 0 for: {}", size)
            }
            return Ok(bytes);
        }
    }

    if lower.chars().all(|c| c.is_ascii_digit()) {
        let raw: u64 = lower.parse()?;
        if raw == 0 {
            anyhow::bail!("size value must be > 0")
        }
        return Ok(raw);
    }

    anyhow::bail!("invalid size format: {}", size)
}
