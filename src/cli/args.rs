//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Scriptorium authoring server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: scriptorium.toml, optional)
    #[arg(short = 'C', long, default_value = "scriptorium.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// The URL path that the authoring server is mounted at
    #[arg(short, long = "base-path", alias = "basepath")]
    pub base_path: Option<String>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<std::net::IpAddr>,

    /// HTTP port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// The location to clone the remote repository to
    #[arg(short = 'r', long = "repository-location", value_hint = clap::ValueHint::DirPath)]
    pub repository_location: Option<PathBuf>,

    /// Directory holding the prebuilt frontend
    #[arg(short = 'u', long = "ui-dir", value_hint = clap::ValueHint::DirPath)]
    pub ui_dir: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(long)]
    pub verbose: bool,
}
