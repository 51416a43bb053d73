//! Command-line interface of the `offmain` binary.

use anyhow::Result;
use clap::Parser;
use offmain_core::Config;
use std::path::PathBuf;

/// Build entry scripts into `dist/`, splitting every Worker into its own unit
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root; output lands in `<root>/dist`
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub root: PathBuf,

    /// Entry scripts, relative to the root
    #[arg(required = true)]
    pub entries: Vec<String>,

    /// Config file path (default: `<root>/offmain.toml` when present)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The explicit config file, or the one discovered under the root.
    pub fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::discover(&self.root)?,
        };
        Ok(config)
    }
}
