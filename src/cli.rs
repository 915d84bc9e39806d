use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "coursedrill", about = "Course registration rush rehearsal")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Use the in-process backend instead of the practice server
    #[arg(long)]
    pub offline: bool,

    /// Seed every random draw (reproducible runs)
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive practice run
    Practice {
        /// Seconds before opening time the clock starts at (60, 30 or 15)
        #[arg(short, long)]
        offset: Option<u32>,
    },
    /// Preview the queue a submit would land in
    Queue {
        /// Milliseconds after opening time
        #[arg(short, long)]
        elapsed_ms: u64,

        /// Stop after this many processing steps
        #[arg(short, long, default_value = "60")]
        steps: u32,
    },
    /// Print sample verification codes
    Captcha {
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
}
