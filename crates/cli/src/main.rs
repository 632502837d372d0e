mod commands;
mod scenario;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Heatmap brush selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum HeatmapMode {
    Click,
    Move,
}

/// Waymark tracking runtime toolchain.
#[derive(Parser)]
#[command(name = "waymark", version, about = "Waymark tracking runtime toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a tracker through a scripted scenario against in-memory transports
    Simulate {
        /// Path to the scenario TOML file
        scenario: PathBuf,
    },

    /// Render a heat point file to a PNG
    Heatmap {
        /// Path to a JSON file containing an array of heat points
        points: PathBuf,
        /// Output PNG path
        #[arg(long, default_value = "heatmap.png")]
        out: PathBuf,
        /// Brush mode (click or move)
        #[arg(long, default_value = "click", value_enum)]
        mode: HeatmapMode,
        /// Viewport dimensions as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x720")]
        viewport: String,
        /// Full page dimensions as WIDTHxHEIGHT (defaults to the viewport)
        #[arg(long)]
        page: Option<String>,
        /// Horizontal scroll offset in pixels
        #[arg(long, default_value_t = 0)]
        scroll_x: u32,
        /// Vertical scroll offset in pixels
        #[arg(long, default_value_t = 0)]
        scroll_y: u32,
        /// Global opacity multiplier
        #[arg(long, default_value_t = 1.0)]
        opacity: f32,
    },

    /// Generate collision-resistant identifiers
    Ids {
        /// How many identifiers to generate
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Simulate { scenario } => commands::simulate::run(&scenario, cli.output).await,
        Commands::Heatmap {
            points,
            out,
            mode,
            viewport,
            page,
            scroll_x,
            scroll_y,
            opacity,
        } => commands::heatmap::run(commands::heatmap::Args {
            points,
            out,
            mode,
            viewport,
            page,
            scroll_x,
            scroll_y,
            opacity,
            output: cli.output,
        }),
        Commands::Ids { count } => commands::ids::run(count, cli.output),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
