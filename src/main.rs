//! Grammarlens CLI - semantic queries over grammar workspaces

mod commands;

use clap::{Parser, Subcommand};
use grammarlens::config;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "grammarlens")]
#[command(version)]
#[command(about = "Incremental semantic analysis for ANTLR4 grammar workspaces")]
#[command(long_about = r#"
Grammarlens keeps a live semantic model of a grammar workspace:
  • Go to definition and find references across grammar files
  • Safe, validated renames
  • Diagnostics for syntax errors and undefined rules
  • Reformatting and rule reordering

Grammar files in one directory see each other's rules.

Example usage:
  grammarlens check --path ./grammars
  grammarlens defs --file ./grammars/Expr.g4 --offset 42
  grammarlens rename --file ./grammars/Expr.g4 --offset 42 --new-name term
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./grammarlens.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default grammarlens.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Load a directory and report diagnostics
    Check {
        /// Directory holding the grammars
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Outline the definitions of a grammar file
    Symbols {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Go to the definition of the symbol at an offset
    Defs {
        #[arg(short, long)]
        file: PathBuf,

        /// Character offset into the file
        #[arg(short, long)]
        offset: usize,
    },

    /// Find every definition and reference of the symbol at an offset
    Refs {
        #[arg(short, long)]
        file: PathBuf,

        /// Character offset into the file
        #[arg(short, long)]
        offset: usize,
    },

    /// Describe the symbol at an offset
    Hover {
        #[arg(short, long)]
        file: PathBuf,

        /// Character offset into the file
        #[arg(short, long)]
        offset: usize,
    },

    /// Compute the edits renaming the symbol at an offset
    Rename {
        #[arg(short, long)]
        file: PathBuf,

        /// Character offset into the file
        #[arg(short, long)]
        offset: usize,

        /// The new name
        #[arg(short, long)]
        new_name: String,
    },

    /// Compute the edits that reformat a grammar file
    Reformat {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Reorder parser rules alphabetically
    SortRules {
        #[arg(short, long)]
        file: PathBuf,

        /// Write the result back to disk
        #[arg(long)]
        write: bool,
    },

    /// Keep a directory bound and report diagnostics as files change
    Watch {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputMode::Human)
    }
}

/// Print a successful command result as a JSON envelope
pub fn emit_success(mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if mode.is_human() {
        return Ok(());
    }
    let envelope = serde_json::json!({
        "ok": true,
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    // Initialize logging; RUST_LOG wins over -v and the config file
    let default_level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            commands::run_init(&path, force, mode)
        }
        Commands::Check { path } => commands::run_check(config, &path, mode),
        Commands::Symbols { file } => commands::run_symbols(config, &file, mode),
        Commands::Defs { file, offset } => commands::run_defs(config, &file, offset, mode),
        Commands::Refs { file, offset } => commands::run_refs(config, &file, offset, mode),
        Commands::Hover { file, offset } => commands::run_hover(config, &file, offset, mode),
        Commands::Rename { file, offset, new_name } => {
            commands::run_rename(config, &file, offset, &new_name, mode)
        }
        Commands::Reformat { file } => commands::run_reformat(config, &file, mode),
        Commands::SortRules { file, write } => commands::run_sort_rules(config, &file, write, mode),
        Commands::Watch { path } => commands::run_watch(config, &path),
    }
}
