//  ERRORS.rs
//    by Lut99
//
//  Created:
//    11 Feb 2022, 13:09:23
//  Last edited:
//    22 Mar 2023, 10:15:37
//  Auto updated?
//    Yes
//
//  Description:
//!   Collects errors for the packlet and the step runner.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;

use pack_spec::recipe::RecipeError;
use pack_spec::steps::PlanError;


/***** ERRORS *****/
/// Generic, top-level errors for the packlet and the runner.
#[derive(Debug)]
pub enum LetError {
    /// Could not load the local recipe file.
    LocalRecipeError{ path: PathBuf, err: RecipeError },
    /// The local recipe does not describe a valid plan.
    PlanError{ err: PlanError },

    /// Could not create the working directory
    WorkdirCreateError{ path: PathBuf, err: std::io::Error },

    /// Could not launch the package installer
    InstallLaunchError{ command: String, err: std::io::Error },
    /// The package installer returned a non-zero exit code
    InstallError{ command: String, code: i32 },

    /// The payload directory does not exist (or cannot be resolved)
    PayloadCanonicalizeError{ path: PathBuf, err: std::io::Error },
    /// Could not read the payload directory
    PayloadReadError{ path: PathBuf, err: std::io::Error },
    /// Could not copy a file from the payload to the working directory
    PayloadFileCopyError{ source: PathBuf, target: PathBuf, err: std::io::Error },
    /// Could not copy a directory from the payload to the working directory
    PayloadDirCopyError{ source: PathBuf, target: PathBuf, err: fs_extra::error::Error },

    /// Could not launch the batch script
    ScriptLaunchError{ command: String, err: std::io::Error },
    /// The script's stdout wasn't opened successfully
    ClosedStdout,
    /// Could not read from the script's stdout
    StdoutReadError{ err: std::io::Error },
    /// Could not write the script's output or a marker to our own output
    OutputWriteError{ err: std::io::Error },
    /// Somehow, we got an error while waiting for the script
    ScriptRunError{ err: std::io::Error },
}

impl Display for LetError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use LetError::*;
        match self {
            LocalRecipeError{ path, err } => write!(f, "Could not load local recipe file '{}': {}", path.display(), err),
            PlanError{ err }              => write!(f, "Local recipe does not describe a valid plan: {}", err),

            WorkdirCreateError{ path, err } => write!(f, "Could not create working directory '{}': {}", path.display(), err),

            InstallLaunchError{ command, err } => write!(f, "Could not run installer command '{}': {}", command, err),
            InstallError{ command, code }      => write!(f, "Installer command '{}' returned exit code {}", command, code),

            PayloadCanonicalizeError{ path, err }         => write!(f, "Could not resolve payload directory '{}': {}", path.display(), err),
            PayloadReadError{ path, err }                 => write!(f, "Could not read payload directory '{}': {}", path.display(), err),
            PayloadFileCopyError{ source, target, err }   => write!(f, "Could not copy payload file '{}' to '{}': {}", source.display(), target.display(), err),
            PayloadDirCopyError{ source, target, err }    => write!(f, "Could not copy payload directory '{}' to '{}': {}", source.display(), target.display(), err),

            ScriptLaunchError{ command, err } => write!(f, "Could not run batch script '{}': {}", command, err),
            ClosedStdout                      => write!(f, "Could not open batch script stdout"),
            StdoutReadError{ err }            => write!(f, "Could not read from batch script stdout: {}", err),
            OutputWriteError{ err }           => write!(f, "Could not write to stdout: {}", err),
            ScriptRunError{ err }             => write!(f, "Could not get batch script run status: {}", err),
        }
    }
}

impl Error for LetError {}
