//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell bad input, a missing file, an unreachable service and a
//! missing sign-in apart without parsing stderr.

use leafid_core::LeafError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments, missing API key).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The photo is not a usable JPEG/PNG.
/// Maps to EX_DATAERR from sysexits.h.
pub const INVALID_IMAGE: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Identification service, object storage or database unreachable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const SERVICE_UNAVAILABLE: i32 = 69;

/// I/O error (cannot write local state).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// No signed-in user for a hosted operation.
/// Maps to EX_NOPERM from sysexits.h.
pub const NOT_AUTHENTICATED: i32 = 77;

/// Shown at the bottom of `--help`.
pub const HELP: &str = "\
Exit codes:
  0   success
  1   general error
  64  usage error (bad arguments, missing API key)
  65  invalid image
  66  input file not found
  69  service unavailable
  74  I/O error
  77  not signed in";

/// A command was invoked in a way it refuses to run.
#[derive(Debug)]
pub struct UsageError(pub String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first typed error in the chain
        let code = err
            .chain()
            .find_map(|cause| {
                if let Some(e) = cause.downcast_ref::<LeafError>() {
                    Some(code_for(e))
                } else if cause.downcast_ref::<UsageError>().is_some() {
                    Some(USAGE_ERROR)
                } else {
                    cause.downcast_ref::<std::io::Error>().map(code_for_io)
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(message),
        }
    }
}

fn code_for(err: &LeafError) -> i32 {
    match err {
        LeafError::NoImage | LeafError::MissingCredential => USAGE_ERROR,
        LeafError::InvalidImage(_) | LeafError::ImageTooLarge { .. } => INVALID_IMAGE,
        LeafError::Unauthenticated(_) => NOT_AUTHENTICATED,
        LeafError::Identification(_)
        | LeafError::IdentificationUnavailable(_)
        | LeafError::Storage(_)
        | LeafError::Persistence(_)
        | LeafError::HttpError(_) => SERVICE_UNAVAILABLE,
        LeafError::Io(e) => code_for_io(e),
        LeafError::Serialization(_) | LeafError::Config(_) => GENERAL_ERROR,
    }
}

fn code_for_io(err: &std::io::Error) -> i32 {
    match err.kind() {
        std::io::ErrorKind::NotFound => INPUT_ERROR,
        _ => IO_ERROR,
    }
}
