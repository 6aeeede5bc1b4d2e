//  BUILD COMMON.rs
//    by Lut99
//
//  Created:
//    15 Mar 2023, 14:02:51
//  Last edited:
//    23 Mar 2023, 10:40:51
//  Auto updated?
//    Yes
//
//  Description:
//!   Contains the Dockerfile macro, the build directory lock and the
//!   Docker plumbing used while building a pack image.
//

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use console::style;
use file_lock::{FileLock, FileOptions};

use pack_spec::arch::Arch;

use crate::errors::BuildError;


/***** COMMON MACROS *****/
/// Wrapper around writeln! that returns BuildErrors instead of standard format errors.
macro_rules! writeln_build {
    ($($e:expr),*) => {
        writeln!($($e),*).map_err(|err| BuildError::DockerfileStrWriteError{ err })
    }
}

pub(crate) use writeln_build;





/***** HELPER FUNCTIONS *****/
/// Opens the lockfile at the given path and locks it.
fn open_lock(path: &Path, blocking: bool) -> std::io::Result<FileLock> {
    FileLock::lock(path, blocking, FileOptions::new().create(true).write(true).append(true))
}

/// Renders a command for in error messages.
#[inline]
fn describe(command: &Command) -> String { format!("{:?}", command) }





/***** COMMON STRUCTS *****/
/// Holds the lock on a pack's build directory for as long as it lives.
///
/// The lockfile doubles as a small log of which process held it.
#[derive(Debug)]
pub struct BuildLock {
    /// Where the lockfile lives.
    path : PathBuf,
    /// The lock on it.
    lock : FileLock,
}

impl BuildLock {
    /// Locks the build directory of the given pack, waiting for any other build of it to finish first.
    ///
    /// # Arguments
    /// - `pack`: The name of the pack, for the notice printed when we have to wait.
    /// - `path`: The path of the lockfile.
    ///
    /// # Errors
    /// This function errors if the lockfile could not be created or locked for any other reason than it already being locked.
    pub fn acquire(pack: impl AsRef<str>, path: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let path: PathBuf = path.into();

        let lock: FileLock = match open_lock(&path, false) {
            Ok(lock) => lock,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                println!("Pack {} is already being built; waiting until the other build completes...", style(pack.as_ref()).bold().cyan());
                open_lock(&path, true).map_err(|err| BuildError::LockCreateError{ path: path.clone(), err })?
            },
            Err(err) => { return Err(BuildError::LockCreateError{ path, err }); },
        };
        debug!("Acquired build lock '{}'", path.display());

        let mut this = Self { path, lock };
        this.note("acquired");
        Ok(this)
    }

    /// Appends a line about this process to the lockfile. Failing to do so is not fatal.
    fn note(&mut self, what: &str) {
        if let Err(err) = writeln!(self.lock.file, "{} by process {}", what, std::process::id()) {
            warn!("Could not write to build lock '{}': {}", self.path.display(), err);
        }
    }



    /// Returns the path to the lockfile.
    #[inline]
    pub fn path(&self) -> &Path { &self.path }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        self.note("released");
        if let Err(err) = self.lock.unlock() { warn!("Could not release build lock '{}': {}", self.path.display(), err); }
        debug!("Released build lock '{}'", self.path.display());
    }
}





/***** COMMON FUNCTIONS *****/
/// Removes the given build files from the build directory.
///
/// Files that cannot be removed are reported as warnings only; files that don't exist are skipped.
///
/// # Arguments
/// - `build_dir`: The build directory to clean.
/// - `files`: The names of the files and directories in it to remove.
pub fn clean_directory(build_dir: &Path, files: &[&str]) {
    for name in files {
        let path: PathBuf = build_dir.join(name);
        let res = if path.is_dir() {
            fs::remove_dir_all(&path).map_err(|err| BuildError::DirCleanupError{ path: path.clone(), err })
        } else if path.exists() {
            fs::remove_file(&path).map_err(|err| BuildError::FileCleanupError{ path: path.clone(), err })
        } else {
            continue;
        };
        if let Err(err) = res { warn!("{}", err); }
    }
}



/// Makes sure Docker has the BuildKit (`buildx`) plugin we build with.
///
/// # Errors
/// This function errors if `docker buildx version` could not be run or failed.
pub fn check_buildkit() -> Result<(), BuildError> {
    let mut command = Command::new("docker");
    command.args([ "buildx", "version" ]);
    let output = command.output().map_err(|err| BuildError::BuildKitLaunchError{ command: describe(&command), err })?;
    if !output.status.success() {
        return Err(BuildError::BuildKitError{
            command : describe(&command),
            code    : output.status.code().unwrap_or(-1),
            stdout  : String::from_utf8_lossy(&output.stdout).into(),
            stderr  : String::from_utf8_lossy(&output.stderr).into(),
        });
    }
    Ok(())
}

/// Builds the image from the Dockerfile in the given build directory and loads it into the local Docker daemon.
///
/// Docker's own output is passed through. Any failing instruction (e.g., a package that won't install) fails the whole build.
///
/// # Arguments
/// - `arch`: The architecture to build the image for.
/// - `build_dir`: The directory with the Dockerfile and everything it copies.
/// - `tag`: The tag to give the image.
///
/// # Errors
/// This function errors if BuildKit is missing, or if the build could not be started or failed.
pub fn build_docker_image(arch: Arch, build_dir: impl AsRef<Path>, tag: impl AsRef<str>) -> Result<(), BuildError> {
    check_buildkit()?;

    let mut command = Command::new("docker");
    command.args([ "buildx", "build", "--load" ]);
    command.args([ "--tag", tag.as_ref() ]);
    command.args([ "--platform", arch.platform().as_str() ]);
    command.arg(".");
    command.current_dir(build_dir.as_ref());
    debug!("Running '{}'", describe(&command));

    let status = command.status().map_err(|err| BuildError::ImageBuildLaunchError{ command: describe(&command), err })?;
    if !status.success() {
        return Err(BuildError::ImageBuildError{ command: describe(&command), code: status.code().unwrap_or(-1) });
    }
    Ok(())
}





/***** TESTS *****/
