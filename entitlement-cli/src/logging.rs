//! Logger setup: stderr, optionally duplicated into a log file

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writes every formatted line to the console and, when set, to a file
struct Tee<W: Write> {
    console: W,
    file: Option<File>,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.console.write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.console.flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// Initialise the global logger. `RUST_LOG` wins over the default level;
/// `verbose` forces debug output for this crate.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let file = log_file.map(open_log_file).transpose()?;

    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Debug);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(Tee {
            console: io::stderr(),
            file,
        })))
        .try_init()
        .context("Failed to initialise logging")?;

    if let Some(path) = log_file {
        log::debug!("Duplicating log output to {}", path.display());
    }
    Ok(())
}
