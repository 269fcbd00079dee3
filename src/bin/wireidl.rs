//! Compile an XML protocol description and print its layout report.
//!
//! Usage:
//!   wireidl [OPTIONS] FILE.xml
//!
//! Imports are looked up next to FILE unless --proto-path is given. Nothing is
//! written when the compile fails.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use wireidl::{compile, emit, Config, LayoutReport, LoadOptions};

#[derive(Parser)]
#[command(name = "wireidl", version, about = "Compile an XML protocol description")]
struct Cli {
    /// Root description file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Directory searched for imported modules
    #[arg(short = 'p', long = "proto-path", value_name = "DIR")]
    proto_path: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let directive = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let search_dir = match cli.proto_path {
        Some(dir) => dir,
        None => cli
            .input
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default(),
    };
    let options = LoadOptions::new(search_dir);
    let set = compile(&cli.input, &options, &Config::default())
        .with_context(|| format!("compiling {}", cli.input.display()))?;
    let report = emit(&set, LayoutReport::new())?;

    match cli.output {
        Some(path) => std::fs::write(&path, report)
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout().write_all(report.as_bytes())?,
    }
    Ok(())
}
