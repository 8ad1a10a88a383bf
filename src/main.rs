//! CLI entrypoint for `rainbow`.
//!
//! Parses command-line flags, configures logging and color, arms the Ctrl-C
//! teardown, optionally preloads a table, then hands stdin/stdout to the
//! interactive session until `quit`, end of input, or an interrupt.
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{LevelFilter, error};
use rainbow::{
    interrupt,
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    session::{Session, SessionOptions},
};

#[derive(Parser, Debug)]
#[command(
    name = "rainbow",
    version,
    about = "Interactive rainbow table shell"
)]
struct Args {
    /// Load a saved table before the first prompt
    #[arg(short = 'l', long = "load")]
    load: Option<PathBuf>,

    /// Do not print the banner or the prompt
    #[arg(short = 's', long = "silent")]
    silent: bool,

    /// Override mmap threshold in bytes for password files. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn run(args: Args) -> Result<()> {
    let options = SessionOptions {
        silent: args.silent,
        mmap_threshold: if args.mmap_threshold == 0 {
            u64::MAX
        } else {
            args.mmap_threshold
        },
    };
    // Unlocked stdout: the interrupt thread writes its final newline too.
    let mut session = Session::new(io::stdin().lock(), io::stdout(), io::stderr(), options);
    interrupt::arm(session.table_slot()).context("failed to install Ctrl-C handler")?;
    if let Some(path) = &args.load {
        session.load_table(path).context("write to stdout")?;
    }
    session.run().context("write to stdout")?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
