use anyhow::Result;
use clap::Parser;

use rubucket::cli::{Cli, Commands};
use rubucket::options::{parse_size, Options};
use rubucket::{fetch, merge, scanner, validate};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            let max_file_size = parse_size(&args.common.max_file_size)?;
            let mut opt = Options {
                wordlists: args.wordlists,
                timeout: args.timeout,
                workers: args.workers,
                chunk_size: args.chunk_size,
                level: args.level,
                max_domains: args.max_domains,
                state_dir: args.state_dir,
                output_dir: args.common.output_dir,
                env_file: args.env_file,
                public_only: args.public_only,
                resume: !args.no_resume,
                verbose: args.verbose,
                max_file_size,
            };
            opt.check();
            scanner::run(opt).await?;
        }
        Commands::Merge(args) => {
            let max_file_size = parse_size(&args.common.max_file_size)?;
            merge::run(&args.common.output_dir, max_file_size).await?;
        }
        Commands::Validate(args) => {
            let max_file_size = parse_size(&args.common.max_file_size)?;
            validate::run(
                &args.common.output_dir,
                args.timeout.max(1),
                args.workers.max(1),
                max_file_size,
            )
            .await?;
        }
        Commands::Fetch(args) => {
            fetch::run(&args.output, args.timeout.max(1)).await?;
        }
    }

    Ok(())
}
