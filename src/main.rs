use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use windi_preprocess::{handle_pipe_command, process_files, Cli, Commands};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    // stdout carries component output in pipe mode
    let formatter = fmt::layer().with_target(false).with_writer(std::io::stderr);
    tracing_subscriber::registry().with(formatter).with(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => {
            init_tracing(args.verbose);
            let run = tokio::task::spawn_blocking(move || process_files(&args)).await?;
            match run {
                Ok(result) => {
                    println!("Preprocessing successful!");
                    println!("  - Processed {} files", result.total_files_processed);
                    println!("  - Ignored {} unknown classes", result.total_ignored);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Pipe(args) => {
            init_tracing(false);
            handle_pipe_command(args).await?;
            Ok(())
        }
    }
}
