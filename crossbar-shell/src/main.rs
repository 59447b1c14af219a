use anyhow::{Context, Result};
use clap::Parser;
use crossbar_shell::{Mode, ShellBuilder};
use flexi_logger::{FileSpec, Logger};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Params {
    /// enable logging and put the log in the specified directory. You
    /// should also set the RUST_LOG environment variable. e.g. RUST_LOG=debug
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// read commands from the script file instead of the terminal
    #[arg(short, long)]
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    let p = Params::parse();
    if let Some(dir) = &p.log_dir {
        let _ = Logger::try_with_env()
            .context("initializing log")?
            .log_to_file(
                FileSpec::default().directory(dir).basename("crossbar").use_timestamp(false),
            )
            .start()
            .context("starting log")?;
    }
    info!("crossbar shell starting");
    let mut shell = ShellBuilder::default();
    if let Some(f) = &p.script {
        shell = shell.mode(Mode::Script(f.clone()));
    }
    shell.build()?.run()
}
