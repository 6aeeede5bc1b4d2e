//  RUN.rs
//    by Lut99
// 
//  Created:
//    12 Sep 2022, 16:42:57
//  Last edited:
//    22 Mar 2023, 16:31:12
//  Auto updated?
//    Yes
// 
//  Description:
//!   Runs a pack directly on the host, without building an image for
//!   it first.
// 

use std::io;
use std::path::PathBuf;

use pack_let::runner::{LocalExecutor, Runner};

pub use crate::errors::RunError as Error;
use crate::utils::{check_script, load_pack, Pack, WorkdirChoice};


/***** LIBRARY *****/
/// Runs the pack described by the given recipe file on the local machine.
/// 
/// # Arguments
/// - `file`: Path to the recipe file.
/// - `workdir`: The working directory to run in. If omitted, runs in the payload directory itself (so nothing is copied).
/// - `skip_install`: If given, does not install any packages (i.e., assumes the host is already provisioned).
/// - `pip`: The installer command to use.
/// 
/// # Returns
/// The exit code of the batch script.
/// 
/// # Errors
/// This function errors if the pack could not be loaded or any step before running the script failed.
pub async fn handle(file: PathBuf, workdir: Option<PathBuf>, skip_install: bool, pip: String) -> Result<i32, Error> {
    // Resolve the working directory
    let workdir: WorkdirChoice = match workdir {
        Some(workdir) if workdir.is_absolute() => WorkdirChoice::Path(workdir),
        Some(workdir)                          => match std::env::current_dir() {
            Ok(cwd)  => WorkdirChoice::Path(cwd.join(workdir)),
            Err(err) => { return Err(Error::CurrentDirError{ err }); },
        },
        None => WorkdirChoice::InPlace,
    };

    // Load the pack
    let pack: Pack = load_pack(&file, workdir).map_err(|err| Error::PackError{ err })?;
    check_script(&pack).map_err(|err| Error::PackError{ err })?;
    debug!("Running pack '{}':\n{}", pack.recipe.name, pack.plan);

    // Run it
    let mut runner = Runner::new(LocalExecutor::new().with_pip(pip).with_skip_install(skip_install));
    runner.execute(&pack.plan, &mut io::stdout()).await.map_err(|err| Error::ExecuteError{ err })
}





/***** TESTS *****/
#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use crate::utils::tests::write_pack;

    use super::*;

    #[tokio::test]
    async fn runs_in_place_and_propagates_code() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\nscript: job.sh\ninterpreter: sh\n");
        fs::write(dir.path().join("job.sh"), "test \"$PYTHONUNBUFFERED\" = 1 || exit 9\nexit 2\n").unwrap();

        let code = handle(dir.path().join("recipe.yml"), None, true, "pip".into()).await.unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn copies_to_given_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\nscript: job.sh\ninterpreter: sh\n");
        fs::write(dir.path().join("job.sh"), "touch ran\n").unwrap();

        let code = handle(dir.path().join("recipe.yml"), Some(work.path().join("app")), true, "pip".into()).await.unwrap();
        assert_eq!(code, 0);
        assert!(work.path().join("app").join("job.sh").is_file());
        assert!(work.path().join("app").join("ran").is_file());
        assert!(!work.path().join("app").join("recipe.yml").exists());
    }

    #[tokio::test]
    async fn failing_install_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\nscript: job.sh\ninterpreter: sh\n");
        fs::write(dir.path().join("job.sh"), "touch ran\n").unwrap();

        assert!(matches!(handle(dir.path().join("recipe.yml"), None, false, "false".into()).await, Err(Error::ExecuteError{ .. })));
        assert!(!dir.path().join("ran").exists());
    }
}
