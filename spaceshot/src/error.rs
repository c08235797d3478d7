//! Binary-local error types (SPEC_FULL.md "Error handling"): kept separate
//! from `libspaceshot::Error` so exit codes and message formatting for the
//! CLI/config/path layers stay under this crate's control, the way
//! `libwayshot`/`wayshot` keep distinct `Error` enums per crate.

use thiserror::Error;

/// An argument error (spec.md §7 "Argument errors"): always printed with a
/// usage hint and an exit code of 1.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("mode is required")]
    MissingMode,
    #[error("invalid mode '{0}'")]
    InvalidMode(String),
    #[error("an output name is required")]
    MissingOutputName,
    #[error("too many parameters for mode '{mode}' (max {max})")]
    TooManyParams { mode: &'static str, max: usize },
    #[error("invalid region\nregion format is 'X,Y WxH'")]
    InvalidRegion,
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("option '{0}' requires a value")]
    MissingValue(String),
}

/// Anything that aborts the process before the capture engine even connects
/// (spec.md §7 "Compositor connection / missing globals": fatal at
/// startup).
#[derive(Error, Debug)]
pub enum FatalError {
    #[error(transparent)]
    Cli(#[from] CliError),
    #[error(transparent)]
    Capture(#[from] libspaceshot::Error),
    #[error("couldn't find Pictures directory")]
    NoPicturesDirectory,
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
