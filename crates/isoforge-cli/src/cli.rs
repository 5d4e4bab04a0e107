use clap::*;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Revision {
  /// RRIP 1.09 (`RRIP_1991A`)
  Rrip1991a,
  /// IEEE P1282 (`IEEE_P1282`)
  Ieee1282,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Captures a host directory into a new image.
  Create {
    output: PathBuf,
    #[clap(required = true)]
    directory: PathBuf,
    /// Interchange level: 1, 2 or 4.
    #[clap(long, default_value_t = 1)]
    level: u8,
    /// Also record a plain ISO 9660 hierarchy.
    #[clap(long)]
    plain: bool,
    /// Leave out the Rock Ridge hierarchy.
    #[clap(long)]
    no_rock_ridge: bool,
    /// Add a Joliet hierarchy.
    #[clap(long)]
    joliet: bool,
    #[clap(long)]
    volume_id: Option<String>,
    /// Rock Ridge revision to record.
    #[clap(long, value_enum, default_value_t = Revision::Rrip1991a)]
    rrip: Revision,
  },
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
  #[clap(subcommand)]
  pub command: Command,
}

pub fn parse() -> Cli {
  Cli::parse()
}
