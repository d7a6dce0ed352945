use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Emit logs as bunyan formatted JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Align the picked features of many runs.
    Align(AlignArgs),
    /// Write a template configuration file.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AlignArgs {
    /// Path to the JSON configuration file, defaults are used when missing
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the JSON peak lists, one list per file (will over-write the config file)
    #[arg(short, long)]
    pub peaks: Option<PathBuf>,

    /// Path to the JSON raw spectra used for gap filling (will over-write the config file)
    #[arg(short, long)]
    pub raw: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// File seeding the master list (will over-write the config file)
    #[arg(long)]
    pub reference_file: Option<usize>,

    /// Number of worker threads, 0 lets rayon decide
    #[arg(short, long)]
    pub threads: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The directory to write the template to.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
