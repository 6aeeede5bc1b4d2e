//  ERRORS.rs
//    by Lut99
//
//  Created:
//    15 Mar 2023, 13:48:06
//  Last edited:
//    23 Mar 2023, 11:05:19
//  Auto updated?
//    Yes
//
//  Description:
//!   File that contains file-spanning error definitions for the
//!   rcpsp-pack CLI.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;

use pack_let::errors::LetError;
use pack_spec::arch::ArchError;
use pack_spec::manifest::ManifestError;
use pack_spec::recipe::RecipeError;
use pack_spec::steps::PlanError;


/***** GLOBALS *****/
lazy_static! { static ref CLI_LINE_SEPARATOR: String = (0..80).map(|_| '-').collect::<String>(); }





/***** ERROR ENUMS *****/
/// Collects toplevel and uncategorized errors in the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Errors that occur during the build & dockerfile commands
    BuildError{ err: BuildError },
    /// Errors that occur while running a pack locally
    RunError{ err: RunError },
    /// Errors that occur during the verify command
    VerifyError{ err: VerifyError },
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use CliError::*;
        match self {
            BuildError{ err }  => write!(f, "{}", err),
            RunError{ err }    => write!(f, "{}", err),
            VerifyError{ err } => write!(f, "{}", err),
        }
    }
}

impl Error for CliError {}



/// Collects errors during the build and dockerfile subcommands
#[derive(Debug)]
pub enum BuildError {
    /// Could not load the pack
    PackError{ err: UtilError },
    /// Could not determine the host architecture
    HostArchError{ err: ArchError },

    /// Could not create or lock the lockfile
    LockCreateError{ path: PathBuf, err: std::io::Error },
    /// Could not remove the lockfile once the build was done.
    LockCleanupError{ path: PathBuf, err: std::io::Error },

    /// Could not render the Dockerfile.
    DockerfileStrWriteError{ err: std::fmt::Error },

    /// Could not create the build directory
    BuildDirCreateError{ path: PathBuf, err: std::io::Error },
    /// Could not write the Dockerfile to the build directory.
    DockerfileWriteError{ path: PathBuf, err: std::io::Error },
    /// Could not copy the payload to the build directory
    PayloadCopyError{ err: LetError },
    /// Could not copy the manifest to the build directory
    ManifestCopyError{ source: PathBuf, target: PathBuf, err: std::io::Error },
    /// The packlet executable was not found
    MissingLauncher{ path: PathBuf },
    /// Could not resolve where the packlet executable lives
    LauncherResolveError{ err: std::io::Error },
    /// Could not copy the packlet executable
    LauncherCopyError{ source: PathBuf, target: PathBuf, err: std::io::Error },
    /// Could not make the copied packlet executable
    LauncherPermissionsError{ path: PathBuf, err: std::io::Error },
    /// Could not write the local recipe to the build directory.
    LocalRecipeCreateError{ err: RecipeError },

    /// Could not run `docker buildx version`
    BuildKitLaunchError{ command: String, err: std::io::Error },
    /// `docker buildx version` failed, so BuildKit is probably missing
    BuildKitError{ command: String, code: i32, stdout: String, stderr: String },
    /// Could not launch the command to build the image
    ImageBuildLaunchError{ command: String, err: std::io::Error },
    /// The image build failed (its output has already been passed through)
    ImageBuildError{ command: String, code: i32 },

    /// Could not remove a file in the build directory
    FileCleanupError{ path: PathBuf, err: std::io::Error },
    /// Could not remove a directory in the build directory
    DirCleanupError{ path: PathBuf, err: std::io::Error },
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use BuildError::*;
        match self {
            PackError{ err }     => write!(f, "{}", err),
            HostArchError{ err } => write!(f, "Could not get host architecture: {}", err),

            LockCreateError{ path, err }  => write!(f, "Could not create lockfile '{}': {}", path.display(), err),
            LockCleanupError{ path, err } => write!(f, "Could not clean up lockfile '{}': {}", path.display(), err),

            DockerfileStrWriteError{ err }   => write!(f, "Could not write to the internal Dockerfile buffer: {}", err),

            BuildDirCreateError{ path, err }              => write!(f, "Could not create build directory '{}': {}", path.display(), err),
            DockerfileWriteError{ path, err }             => write!(f, "Could not write Dockerfile '{}': {}", path.display(), err),
            PayloadCopyError{ err }                       => write!(f, "Could not prepare payload: {}", err),
            ManifestCopyError{ source, target, err }      => write!(f, "Could not copy manifest '{}' to '{}': {}", source.display(), target.display(), err),
            MissingLauncher{ path }                       => write!(f, "Could not find the packlet executable at '{}'; build it for the image architecture and point to it with '--launcher'", path.display()),
            LauncherResolveError{ err }                   => write!(f, "Could not resolve the path of the current executable: {}", err),
            LauncherCopyError{ source, target, err }      => write!(f, "Could not copy packlet executable '{}' to '{}': {}", source.display(), target.display(), err),
            LauncherPermissionsError{ path, err }         => write!(f, "Could not make '{}' executable: {}", path.display(), err),
            LocalRecipeCreateError{ err }                 => write!(f, "Could not write local recipe: {}", err),

            BuildKitLaunchError{ command, err }                => write!(f, "Could not determine if Docker & BuildKit are installed: failed to run command '{}': {}", command, err),
            BuildKitError{ command, code, stdout, stderr }     => write!(f, "Could not run a Docker BuildKit (command '{}' returned exit code {}): is BuildKit installed?\n\nstdout:\n{}\n{}\n{}\n\nstderr:\n{}\n{}\n{}\n\n", command, code, *CLI_LINE_SEPARATOR, stdout, *CLI_LINE_SEPARATOR, *CLI_LINE_SEPARATOR, stderr, *CLI_LINE_SEPARATOR),
            ImageBuildLaunchError{ command, err }              => write!(f, "Could not run command '{}' to build the pack image: {}", command, err),
            ImageBuildError{ command, code }                   => write!(f, "Command '{}' to build the pack image returned exit code {}", command, code),

            FileCleanupError{ path, err } => write!(f, "Could not clean file '{}' from build directory: {}", path.display(), err),
            DirCleanupError{ path, err }  => write!(f, "Could not clean directory '{}' from build directory: {}", path.display(), err),
        }
    }
}

impl Error for BuildError {}



/// Collects errors during the run subcommand
#[derive(Debug)]
pub enum RunError {
    /// Could not load the pack
    PackError{ err: UtilError },
    /// Could not resolve the current directory to make the working directory absolute
    CurrentDirError{ err: std::io::Error },
    /// The plan failed to execute
    ExecuteError{ err: LetError },
}

impl Display for RunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use RunError::*;
        match self {
            PackError{ err }       => write!(f, "{}", err),
            CurrentDirError{ err } => write!(f, "Could not get current directory: {}", err),
            ExecuteError{ err }    => write!(f, "Failed to run pack: {}", err),
        }
    }
}

impl Error for RunError {}



/// Collects errors during the verify subcommand
#[derive(Debug)]
pub enum VerifyError {
    /// The pack did not load
    PackError{ err: UtilError },
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use VerifyError::*;
        match self {
            PackError{ err } => write!(f, "Pack is invalid: {}", err),
        }
    }
}

impl Error for VerifyError {}



/// Collects errors that occur while loading a pack for any of the subcommands.
#[derive(Debug)]
pub enum UtilError {
    /// Could not resolve the recipe file
    RecipeFileCanonicalizeError{ path: PathBuf, err: std::io::Error },
    /// Could not load the recipe
    RecipeError{ err: RecipeError },
    /// Could not load the manifest
    ManifestError{ path: PathBuf, err: ManifestError },
    /// Could not build a plan from the recipe
    PlanError{ err: PlanError },
    /// The payload directory does not exist
    MissingPayload{ path: PathBuf },
    /// The batch script is not in the payload
    MissingScript{ path: PathBuf },
}

impl Display for UtilError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use UtilError::*;
        match self {
            RecipeFileCanonicalizeError{ path, err } => write!(f, "Could not resolve recipe file '{}': {}", path.display(), err),
            RecipeError{ err }                       => write!(f, "{}", err),
            ManifestError{ path, err }               => write!(f, "Could not load manifest '{}': {}", path.display(), err),
            PlanError{ err }                         => write!(f, "Invalid recipe: {}", err),
            MissingPayload{ path }                   => write!(f, "Payload directory '{}' does not exist", path.display()),
            MissingScript{ path }                    => write!(f, "Batch script '{}' does not exist in the payload", path.display()),
        }
    }
}

impl Error for UtilError {}





/***** TESTS *****/
