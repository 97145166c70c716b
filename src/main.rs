//! devcrypt - resumable in-place device encryption tool
//!
//! Encrypts or decrypts a block device (or regular file) in place with
//! AES-256-CBC, persisting crash-safe progress to a working directory so
//! the operation can be interrupted and resumed at any point.

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use devcrypt::{transform_device, Mode, Outcome, TransformConfig, DEFAULT_CHUNK_SIZE};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line interface definition
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Resumable, crash-safe in-place AES-256-CBC encryption or decryption \
                  of a block device. All progress state lives in the working directory; \
                  re-running with the same arguments resumes where the last run stopped."
)]
struct Cli {
    /// Transform direction
    #[arg(short = 'm', value_enum)]
    mode: CliMode,

    /// Working directory for key material and progress state
    #[arg(short = 'w')]
    workdir: PathBuf,

    /// Dry run: stage transformed chunks but never write to the device
    #[arg(short = 'n')]
    dry_run: bool,

    /// Chunk size in bytes; must be a positive multiple of 16
    #[arg(short = 's', default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Device or file to transform in place
    device: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliMode {
    /// Encrypt the device
    Enc,
    /// Decrypt the device
    Dec,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Enc => Mode::Encrypt,
            CliMode::Dec => Mode::Decrypt,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are not usage errors.
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = e.print();
            return code;
        }
    };

    let result = TransformConfig::new(cli.mode.into(), cli.chunk_size, cli.dry_run)
        .and_then(|config| transform_device(&cli.device, &cli.workdir, config));

    match result {
        Ok(Outcome::AlreadyDone) => {
            eprintln!("Already done");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Completed) => {
            eprintln!("Success!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
