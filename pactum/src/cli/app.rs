use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pactum",
    version,
    about = "Pactum - Preconditions and postconditions for sync and async Rust",
    long_about = "Pactum checks contracts around plain and asynchronous callables. The bundled bookstore backend shows a contracted async lookup in action."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the contracts configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List books through the contracted bookstore backend
    #[command(about = "List the books of one or more categories")]
    Books(BooksArgs),

    /// Show the effective contracts configuration
    #[command(about = "Print the effective contracts configuration as TOML")]
    Config,
}

#[derive(Parser, Debug)]
pub struct BooksArgs {
    /// Category to list; repeat for several categories
    #[arg(short = 'c', long = "category", required = true)]
    pub categories: Vec<String>,

    /// Print books and violations as JSON
    #[arg(long)]
    pub json: bool,
}
