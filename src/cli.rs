use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rubucket - chunked cloud storage bucket recon with multi-region probing",
    long_about = "NAME:\n  rubucket - chunked, resumable cloud storage bucket recon\n\nUSAGE:\n  rubucket <SUBCOMMAND> [OPTIONS] [WORDLIST]...\n\nCOMMANDS:\n  scan (s)      chunked bucket scan: name permutation, multi-region HTTP probing, resume state\n  merge (m)     merge per-chunk result files into the buckets.json aggregate set\n  validate (v)  re-check stored buckets and drop dead entries\n  fetch (f)     build a seed wordlist from the public bug bounty program list\n\nNotes:\n  - scan splits the wordlist into chunks, expands each chunk into bucket name candidates,\n    probes every name/region pair with a bounded worker pool, and records finished domains\n    so interrupted runs resume where they left off.\n  - once every domain has completed a permutation level, the next run escalates to the\n    next level and rescans from scratch.\n\nQuick examples:\n  rubucket scan wordlist.txt --level 1 --workers 30\n  rubucket scan words1.txt words2.txt.gz -p -c 25 --output-dir results\n  rubucket merge --output-dir results\n  rubucket validate --output-dir results --timeout 10\n  rubucket fetch -o wordlist.txt",
    after_help = "Full flag reference\n\nCommon (scan/merge/validate):\n      --output-dir <DIR>          result directory (default results; alias --results-dir)\n      --max-file-size <SIZE>      per-file size cap, K/M/G suffixes (default 20M)\n\nscan:\n      [WORDLIST]...               one or more wordlist files (.gz supported)\n  -p, --public                    keep only public buckets in results\n  -t, --timeout <SEC>             per-request timeout (default 8)\n  -w, --workers <N>               concurrent probe workers (default 30)\n  -c, --chunk-size <N>            words per chunk (default 50)\n      --level <0-3>               permutation level (default 1)\n      --max-domains <N>           cap pending domains per run\n  -e, --env-file <PATH>           override the embedded environment tags\n      --state-dir <DIR>           resume state directory (default state)\n      --no-resume                 ignore recorded progress and rescan\n  -v, --verbose                   per-request diagnostics instead of progress lines\n\nvalidate:\n  -t, --timeout <SEC>             per-request timeout (default 10)\n  -w, --workers <N>               concurrent validation workers (default 30)\n\nfetch:\n  -o, --output <PATH>             wordlist output path (default wordlist.txt)\n      --timeout <SEC>             download timeout (default 30)\n\nExamples:\n  rubucket scan top100.txt --level 2 --max-domains 200 --no-resume\n  rubucket s internal.txt -e tags.txt -w 50 -t 5 -v\n  rubucket validate --output-dir results --max-file-size 10M"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunked bucket scan: permute names, probe every region, resume across runs
    #[command(
        alias = "s",
        after_help = "Flag groups:\n  input: [WORDLIST]... -e/--env-file\n  probing: -w/--workers -t/--timeout --level -p/--public\n  chunking: -c/--chunk-size --max-domains\n  persistence: --output-dir --state-dir --max-file-size --no-resume\n  diagnostics: -v/--verbose"
    )]
    Scan(ScanArgs),
    /// Merge per-chunk result files into the aggregate set
    #[command(alias = "m")]
    Merge(MergeArgs),
    /// Re-check stored buckets, refresh timestamps, drop dead entries
    #[command(alias = "v")]
    Validate(ValidateArgs),
    /// Download the bug bounty program list and derive a seed wordlist
    #[command(alias = "f")]
    Fetch(FetchArgs),
}

/// Args shared by the subcommands that touch the results directory
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Directory for chunk result and aggregate files
    #[arg(long = "output-dir", alias = "results-dir", default_value = "results")]
    pub output_dir: PathBuf,

    /// Per-file size cap for result files (K/M/G suffixes)
    #[arg(long = "max-file-size", default_value = "20M")]
    pub max_file_size: String,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Shared result directory options
    #[command(flatten)]
    pub common: CommonArgs,

    /// Wordlist files, one word per line (.gz supported)
    #[arg(value_name = "WORDLIST", required = true)]
    pub wordlists: Vec<PathBuf>,

    /// Keep only public buckets in results
    #[arg(short = 'p', long = "public")]
    pub public_only: bool,

    /// Per-request timeout in seconds
    #[arg(short = 't', long = "timeout", default_value_t = 8)]
    pub timeout: u64,

    /// Concurrent probe workers
    #[arg(short = 'w', long = "workers", default_value_t = 30)]
    pub workers: usize,

    /// Words per chunk
    #[arg(short = 'c', long = "chunk-size", default_value_t = 50)]
    pub chunk_size: usize,

    /// Name permutation level
    #[arg(long = "level", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub level: u8,

    /// Cap on pending domains processed this run
    #[arg(long = "max-domains")]
    pub max_domains: Option<usize>,

    /// Environment tag file overriding the embedded defaults
    #[arg(short = 'e', long = "env-file")]
    pub env_file: Option<PathBuf>,

    /// Directory for resume state
    #[arg(long = "state-dir", default_value = "state")]
    pub state_dir: PathBuf,

    /// Ignore recorded progress and rescan everything
    #[arg(long = "no-resume")]
    pub no_resume: bool,

    /// Per-request diagnostics instead of progress lines
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Shared result directory options
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Shared result directory options
    #[command(flatten)]
    pub common: CommonArgs,

    /// Per-request timeout in seconds
    #[arg(short = 't', long = "timeout", default_value_t = 10)]
    pub timeout: u64,

    /// Concurrent validation workers
    #[arg(short = 'w', long = "workers", default_value_t = 30)]
    pub workers: usize,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Wordlist output path
    #[arg(short = 'o', long = "output", default_value = "wordlist.txt")]
    pub output: PathBuf,

    /// Download timeout in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    pub timeout: u64,
}
