pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "signlink")]
#[command(about = "Talk to a remote signer over an encrypted relay session")]
pub struct Args {
    /// Path to the signlink config directory (defaults to ~/.signlink)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
