use std::path::PathBuf;

use clap::Parser;
use vde_builder::config::BuildOptions;

#[derive(Parser)]
#[command(name = "vde-build")]
#[command(about = "Build a vBulletin product XML and upload tree from a project directory")]
pub(crate) struct Cli {
    /// The project directory (the one holding config.toml)
    #[arg(default_value = ".")]
    pub(crate) dir: PathBuf,

    /// Write the build output here instead of the configured buildpath
    #[arg(short = 'b', long)]
    build_path: Option<PathBuf>,

    /// Print a JSON report instead of the build log
    #[arg(long)]
    json: bool,

    /// Show debug logging on stderr
    #[arg(short = 'v', long)]
    pub(crate) verbose: bool,
}

impl Cli {
    pub(crate) const fn json(&self) -> bool {
        self.json
    }

    pub(crate) fn build_options(&self) -> BuildOptions {
        BuildOptions {
            build_path: self.build_path.clone(),
            json: self.json,
        }
    }
}
