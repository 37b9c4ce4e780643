use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "s5p-composite")]
#[command(about = "Sentinel-5P pollutant composites, animations and retention")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Configuration file (TOML, YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Hide progress bars")]
    pub quiet: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert, prune, aggregate, render and animate in one pass
    Run {
        #[arg(long, help = "Do not delete outdated products or run directories")]
        skip_retention: bool,

        #[arg(long, help = "Keep only the most recent N frames per animation")]
        max_frames: Option<usize>,
    },

    /// Convert raw L2 granules that have no L3 product yet
    Convert,

    /// Aggregate derived products into composites and render them
    Aggregate,

    /// Rebuild the per-pollutant animations from rendered images
    Animate {
        #[arg(long, help = "Keep only the most recent N frames per animation")]
        max_frames: Option<usize>,
    },

    /// Delete raw products, derived products and run directories past retention
    Prune {
        #[arg(long, help = "Report what would be deleted without deleting")]
        dry_run: bool,
    },

    /// Show catalog counts and the acquisition window of every raw granule
    Inspect {
        #[arg(long, help = "List every indexed granule")]
        granules: bool,
    },
}
