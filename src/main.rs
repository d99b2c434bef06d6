use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use pgn_trainingdata::config::default_log_level;
use pgn_trainingdata::container::summarize;
use pgn_trainingdata::{Config, Pipeline};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converts PGN files into gzip containers of lc0 V6 training records
    Convert(ConvertCommand),
    /// Summarizes the containers below a directory
    Inspect(InspectCommand),
}

#[derive(Args)]
struct ConvertCommand {
    /// PGN files or glob patterns (`.zst` files are decompressed)
    #[arg(required = true)]
    inputs: Vec<String>,

    #[command(flatten)]
    config: Config,
}

#[derive(Args)]
struct InspectCommand {
    /// Directory searched recursively for `*.gz` containers
    dir: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(level: LevelFilter) {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("CHESS_LOG", level.as_str()))
        .init();
}

fn convert(cmd: ConvertCommand) -> Result<(), Box<dyn Error>> {
    init_logging(cmd.config.log_level());

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner} {pos} games, {msg}")
            .expect("valid template"),
    );
    progress.enable_steady_tick(Duration::from_millis(200));

    let pipeline = Pipeline::new(cmd.config)?.with_progress(progress);
    let stats = pipeline.convert_files(&cmd.inputs)?;

    println!("games:       {}", stats.games);
    println!("aborted:     {}", stats.games_aborted);
    println!("plies:       {}", stats.plies_read);
    println!("samples:     {}", stats.samples_written);
    if stats.duplicates_dropped > 0 {
        println!("duplicates:  {}", stats.duplicates_dropped);
    }
    println!("containers:  {}", stats.containers_written);
    Ok(())
}

fn inspect(cmd: InspectCommand) -> Result<(), Box<dyn Error>> {
    init_logging(default_log_level(cmd.verbose));

    let summary = summarize(&cmd.dir)?;
    if cmd.json {
        let value = serde_json::json!({
            "containers": summary.containers,
            "records": summary.records,
            "wins": summary.wins,
            "draws": summary.draws,
            "losses": summary.losses,
            "undecided": summary.undecided,
            "mean_root_q": summary.mean_root_q,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("containers:  {}", summary.containers);
        println!("records:     {}", summary.records);
        println!(
            "results:     {} won / {} drawn / {} lost / {} undecided (side to move)",
            summary.wins, summary.draws, summary.losses, summary.undecided
        );
        println!("mean root q: {:.4}", summary.mean_root_q);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert(cmd) => convert(cmd),
        Commands::Inspect(cmd) => inspect(cmd),
    }
}
