//  RUNNER.rs
//    by Lut99
//
//  Created:
//    15 Mar 2023, 14:18:55
//  Last edited:
//    22 Mar 2023, 11:27:40
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the sequential runner that executes a plan step by
//!   step, and the executor that performs those steps on the local
//!   machine.
//

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;

use pack_spec::manifest::Requirement;
use pack_spec::steps::{FailurePolicy, InstallOrigin, Invocation, Phase, Plan, Step};

use crate::common::ScriptOutcome;
use crate::errors::LetError;
use crate::exec;


/***** CONSTANTS *****/
/// The installer command used when nothing else is given.
pub const DEFAULT_PIP: &str = "pip";





/***** LIBRARY *****/
/// Performs the individual steps of a plan. This is what decides _where_ a plan runs.
#[async_trait]
pub trait StepExecutor: Send {
    /// Establishes the given directory as the execution root.
    ///
    /// # Errors
    /// This function errors if the directory could not be created.
    async fn prepare_workdir(&mut self, path: &Path) -> Result<(), LetError>;

    /// Installs the given packages.
    ///
    /// # Arguments
    /// - `origin`: Where the packages came from (used for debugging purposes).
    /// - `packages`: The packages to install. May be empty.
    ///
    /// # Errors
    /// This function errors if any of the packages fails to install. There are no retries.
    async fn install(&mut self, origin: &InstallOrigin, packages: &[Requirement]) -> Result<(), LetError>;

    /// Copies the payload into the working directory.
    ///
    /// # Arguments
    /// - `source`: The payload directory.
    /// - `exclude`: The top-level entries in the payload that are skipped.
    /// - `target`: The working directory to copy to.
    ///
    /// # Errors
    /// This function errors if the payload could not be read or copied.
    async fn copy_payload(&mut self, source: &Path, exclude: &[String], target: &Path) -> Result<(), LetError>;

    /// Runs the batch script, including the markers around it.
    ///
    /// # Arguments
    /// - `invocation`: The script to run.
    /// - `workdir`: The directory to run it in.
    /// - `environment`: The environment variables to pass to it, in order.
    /// - `out`: Where the markers and the script's output go.
    ///
    /// # Returns
    /// How the script returned.
    ///
    /// # Errors
    /// This function errors if the script could not be run at all.
    async fn run(&mut self, invocation: &Invocation, workdir: &Path, environment: &[(String, String)], out: &mut (dyn Write + Send)) -> Result<ScriptOutcome, LetError> {
        exec::run_sequence(invocation, workdir, environment, out).await
    }
}



/// Executes the steps of a plan on the local machine.
#[derive(Clone, Debug)]
pub struct LocalExecutor {
    /// The installer command (e.g., `pip` or `python -m pip`).
    pip          : String,
    /// Whether to skip the install steps altogether (e.g., because the environment is already provisioned).
    skip_install : bool,
}

impl LocalExecutor {
    /// Constructor for the LocalExecutor that uses the default installer.
    #[inline]
    pub fn new() -> Self {
        Self {
            pip          : DEFAULT_PIP.into(),
            skip_install : false,
        }
    }

    /// Sets the installer command to use. It is split on whitespace.
    #[inline]
    pub fn with_pip(mut self, pip: impl Into<String>) -> Self { self.pip = pip.into(); self }

    /// Sets whether to skip install steps.
    #[inline]
    pub fn with_skip_install(mut self, skip_install: bool) -> Self { self.skip_install = skip_install; self }
}

impl Default for LocalExecutor {
    #[inline]
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl StepExecutor for LocalExecutor {
    async fn prepare_workdir(&mut self, path: &Path) -> Result<(), LetError> {
        debug!("Preparing working directory '{}'", path.display());
        tokio::fs::create_dir_all(path).await.map_err(|err| LetError::WorkdirCreateError{ path: path.into(), err })
    }

    async fn install(&mut self, origin: &InstallOrigin, packages: &[Requirement]) -> Result<(), LetError> {
        if packages.is_empty() { debug!("Nothing to install from {}", origin); return Ok(()); }
        if self.skip_install { info!("Skipping install of {} package(s) from {}", packages.len(), origin); return Ok(()); }

        // Build the installer command
        let mut parts = self.pip.split_whitespace();
        let mut command = Command::new(parts.next().unwrap_or(DEFAULT_PIP));
        command.args(parts);
        command.arg("install");
        command.arg("--no-cache-dir");
        command.args(packages.iter().map(|p| p.to_string()));
        info!("Installing {} package(s) from {}", packages.len(), origin);
        debug!(" > Running '{:?}'", command.as_std());

        // Run it; its output is simply inherited
        let status = match command.status().await {
            Ok(status) => status,
            Err(err)   => { return Err(LetError::InstallLaunchError{ command: format!("{:?}", command.as_std()), err }); }
        };
        debug!(" > Return status: {}", status);
        if !status.success() {
            return Err(LetError::InstallError{ command: format!("{:?}", command.as_std()), code: status.code().unwrap_or(-1) });
        }
        Ok(())
    }

    async fn copy_payload(&mut self, source: &Path, exclude: &[String], target: &Path) -> Result<(), LetError> {
        let source: PathBuf = fs::canonicalize(source).map_err(|err| LetError::PayloadCanonicalizeError{ path: source.into(), err })?;
        let target: PathBuf = fs::canonicalize(target).unwrap_or_else(|_| target.into());
        if source == target { debug!("Payload '{}' already is the working directory", source.display()); return Ok(()); }
        debug!("Copying payload '{}' to '{}'", source.display(), target.display());

        let entries = fs::read_dir(&source).map_err(|err| LetError::PayloadReadError{ path: source.clone(), err })?;
        for entry in entries {
            let entry = entry.map_err(|err| LetError::PayloadReadError{ path: source.clone(), err })?;
            let path: PathBuf = entry.path();
            let name: String = entry.file_name().to_string_lossy().to_string();

            // Skip what we shouldn't copy, including the target itself if it lives in the payload
            if exclude.iter().any(|e| e == &name) { debug!(" > Skipping excluded '{}'", name); continue; }
            if path == target { continue; }

            if path.is_dir() {
                let mut options = fs_extra::dir::CopyOptions::new();
                options.overwrite = true;
                if let Err(err) = fs_extra::dir::copy(&path, &target, &options) {
                    return Err(LetError::PayloadDirCopyError{ source: path, target, err });
                }
            } else {
                let dest: PathBuf = target.join(&name);
                if let Err(err) = fs::copy(&path, &dest) {
                    return Err(LetError::PayloadFileCopyError{ source: path, target: dest, err });
                }
            }
        }
        Ok(())
    }
}



/// Executes a plan step by step, tracking which phase the pack is in.
#[derive(Debug)]
pub struct Runner<E> {
    /// The executor that performs the steps.
    executor : E,
    /// The phase we're currently in.
    phase    : Phase,
}

impl<E: StepExecutor + Send> Runner<E> {
    /// Constructor for the Runner.
    #[inline]
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            phase : Phase::Building,
        }
    }



    /// Executes the given plan to completion.
    ///
    /// Steps with [`FailurePolicy::Abort`] stop the plan as soon as they fail; steps with [`FailurePolicy::Continue`] only log their failure. The run step is always last and decides the exit code.
    ///
    /// # Arguments
    /// - `plan`: The plan to execute.
    /// - `out`: Where the markers and the script's output go.
    ///
    /// # Returns
    /// The exit code of the script.
    ///
    /// # Errors
    /// This function errors if any aborting step fails or the script could not be run.
    pub async fn execute<W: Write + Send>(&mut self, plan: &Plan, out: &mut W) -> Result<i32, LetError> {
        let steps: &[Step] = plan.steps();
        let mut workdir: PathBuf = PathBuf::from(".");
        let mut environment: Vec<(String, String)> = vec![];

        // Everything up to the run step
        for (i, step) in steps[..steps.len() - 1].iter().enumerate() {
            debug!("Step {}/{} ({}): {}", i + 1, steps.len(), self.phase, step);
            let res: Result<(), LetError> = match step {
                Step::Workdir{ path } => {
                    workdir = path.clone();
                    self.executor.prepare_workdir(path).await
                },
                Step::Install{ origin, packages } => self.executor.install(origin, packages).await,
                Step::Copy{ source, exclude }     => self.executor.copy_payload(source, exclude, &workdir).await,
                Step::Environment{ key, value }   => { environment.push((key.clone(), value.clone())); Ok(()) },
                // The plan guarantees the run step is last
                Step::Run{ .. } => Ok(()),
            };
            if let Err(err) = res {
                match step.failure_policy() {
                    FailurePolicy::Abort    => { return Err(err); },
                    FailurePolicy::Continue => { warn!("Step {} ({}) failed: {}", i + 1, step.kind(), err); },
                }
            }
            self.phase = self.phase.advance(step);
        }

        // Then the script itself
        let last: &Step = &steps[steps.len() - 1];
        self.phase = self.phase.advance(last);
        debug!("Step {}/{} ({}): {}", steps.len(), steps.len(), self.phase, last);
        let outcome: ScriptOutcome = self.executor.run(plan.invocation(), &workdir, &environment, out).await?;
        let code: i32 = outcome.exit_code();
        self.phase = self.phase.exit(code);
        debug!("Plan done ({})", self.phase);
        Ok(code)
    }



    /// Returns the phase the runner is in.
    #[inline]
    pub fn phase(&self) -> Phase { self.phase }

    /// Returns the executor of this runner.
    #[inline]
    pub fn executor(&self) -> &E { &self.executor }
}





/***** TESTS *****/
#[cfg(all(test, unix))]
mod tests {
    use std::str::FromStr;

    use pack_spec::manifest::Manifest;
    use pack_spec::recipe::Recipe;

    use super::*;

    /// Executor that records what it is asked to do and fails installing a chosen package.
    #[derive(Default)]
    struct RecordingExecutor {
        fail_on   : Option<String>,
        installed : Vec<String>,
        log       : Vec<String>,
    }

    #[async_trait]
    impl StepExecutor for RecordingExecutor {
        async fn prepare_workdir(&mut self, path: &Path) -> Result<(), LetError> {
            self.log.push(format!("workdir {}", path.display()));
            fs::create_dir_all(path).map_err(|err| LetError::WorkdirCreateError{ path: path.into(), err })
        }

        async fn install(&mut self, origin: &InstallOrigin, packages: &[Requirement]) -> Result<(), LetError> {
            self.log.push(format!("install {}", origin));
            for p in packages {
                if Some(&p.name) == self.fail_on.as_ref() { return Err(LetError::InstallError{ command: format!("pip install {}", p), code: 1 }); }
                self.installed.push(p.name.clone());
            }
            Ok(())
        }

        async fn copy_payload(&mut self, source: &Path, exclude: &[String], target: &Path) -> Result<(), LetError> {
            self.log.push("copy".into());
            LocalExecutor::new().copy_payload(source, exclude, target).await
        }
    }

    /// Prepares a payload with a shell job exiting with the given code, and a plan for it.
    fn setup(code: i32, manifest: &str) -> (tempfile::TempDir, Plan) {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload");
        fs::create_dir_all(payload.join("data")).unwrap();
        fs::write(payload.join("job.sh"), format!("echo \"unbuffered=$PYTHONUNBUFFERED\"\nexit {}\n", code)).unwrap();
        fs::write(payload.join("data").join("j301_1.data"), "32 4\n").unwrap();
        fs::write(payload.join("notes.txt"), "skip me").unwrap();

        let mut recipe = Recipe::new("test");
        recipe.workdir     = dir.path().join("wd");
        recipe.payload     = "payload".into();
        recipe.exclude     = vec![ "notes.txt".into() ];
        recipe.script      = "job.sh".into();
        recipe.interpreter = "sh".into();
        let plan = Plan::from_recipe(&recipe, &Manifest::from_str(manifest).unwrap(), dir.path()).unwrap();
        (dir, plan)
    }

    #[tokio::test]
    async fn runner_executes_full_plan() {
        let (dir, plan) = setup(0, "numpy==1.24.2\n");
        let mut runner = Runner::new(RecordingExecutor::default());

        let mut out: Vec<u8> = vec![];
        let code = runner.execute(&plan, &mut out).await.unwrap();
        assert_eq!(code, 0);
        assert_eq!(runner.phase(), Phase::Exited{ code: 0 });
        assert_eq!(runner.executor().installed, vec![ "numpy".to_string(), "google-cloud-storage".to_string() ]);
        assert_eq!(runner.executor().log.len(), 4);

        // The payload is there, minus the excluded file
        let wd = dir.path().join("wd");
        assert!(wd.join("job.sh").is_file());
        assert!(wd.join("data").join("j301_1.data").is_file());
        assert!(!wd.join("notes.txt").exists());

        // The flag was set explicitly
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "Starting RCPSP batch job...\nunbuffered=1\nFinished running job.sh\nBatch job complete.\n");
    }

    #[tokio::test]
    async fn runner_propagates_exit_code() {
        let (_dir, plan) = setup(2, "numpy==1.24.2\n");
        let mut runner = Runner::new(RecordingExecutor::default());

        let mut out: Vec<u8> = vec![];
        assert_eq!(runner.execute(&plan, &mut out).await.unwrap(), 2);
        assert_eq!(runner.phase(), Phase::Exited{ code: 2 });
        assert!(String::from_utf8(out).unwrap().ends_with("Finished running job.sh\nBatch job complete.\n"));
    }

    #[tokio::test]
    async fn runner_aborts_on_any_failed_install() {
        let manifest = "numpy==1.24.2\ndocplex==2.25.236\ncplex\n";
        for failing in [ "numpy", "docplex", "cplex", "google-cloud-storage" ] {
            let (dir, plan) = setup(0, manifest);
            let mut runner = Runner::new(RecordingExecutor{ fail_on: Some(failing.into()), ..Default::default() });

            let mut out: Vec<u8> = vec![];
            assert!(matches!(runner.execute(&plan, &mut out).await, Err(LetError::InstallError{ .. })), "'{}' failing should fail the plan", failing);
            assert!(out.is_empty());
            assert!(!runner.executor().log.iter().any(|l| l == "copy"));
            assert!(!dir.path().join("wd").join("job.sh").exists());
        }
    }

    #[tokio::test]
    async fn runner_with_local_executor_skipping_installs() {
        let (dir, plan) = setup(0, "numpy==1.24.2\n");
        let mut runner = Runner::new(LocalExecutor::new().with_skip_install(true));

        let mut out: Vec<u8> = vec![];
        assert_eq!(runner.execute(&plan, &mut out).await.unwrap(), 0);
        assert!(dir.path().join("wd").join("job.sh").is_file());
    }

    #[tokio::test]
    async fn local_install_failure_is_reported() {
        let mut executor = LocalExecutor::new().with_pip("false");
        let res = executor.install(&InstallOrigin::Auxiliary, &[ Requirement::new("google-cloud-storage", None::<String>) ]).await;
        assert!(matches!(res, Err(LetError::InstallError{ code: 1, .. })));

        let mut executor = LocalExecutor::new().with_pip("/nonexistent/pip");
        let res = executor.install(&InstallOrigin::Auxiliary, &[ Requirement::new("google-cloud-storage", None::<String>) ]).await;
        assert!(matches!(res, Err(LetError::InstallLaunchError{ .. })));
    }

    #[tokio::test]
    async fn local_copy_into_itself_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("job.sh"), "exit 0\n").unwrap();
        LocalExecutor::new().copy_payload(dir.path(), &[], dir.path()).await.unwrap();
        assert!(dir.path().join("job.sh").is_file());
    }
}
