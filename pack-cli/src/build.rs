//  BUILD.rs
//    by Lut99
//
//  Created:
//    21 Feb 2022, 12:41:55
//  Last edited:
//    23 Mar 2023, 10:52:08
//  Auto updated?
//    Yes
//
//  Description:
//!   Contains functions that build a pack into a container image.
//

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use console::style;

use pack_let::runner::{LocalExecutor, StepExecutor as _};
use pack_spec::arch::Arch;
use pack_spec::recipe::{LocalRecipe, Recipe, BUILD_DIR, LOCAL_RECIPE_PATH};
use pack_spec::steps::{InstallOrigin, Plan, Step};

use crate::build_common::{build_docker_image, clean_directory, writeln_build, BuildLock};
use crate::errors::BuildError;
pub use crate::errors::BuildError as Error;
use crate::utils::{check_script, load_pack, Pack, WorkdirChoice};


/***** CONSTANTS *****/
/// The name of the staged payload directory in the build directory.
pub const PAYLOAD_DIR: &str = "payload";
/// The name of the staged manifest in the build directory (and in the image).
pub const MANIFEST_FILE: &str = "requirements.txt";
/// The name of the staged launcher in the build directory.
pub const LAUNCHER_FILE: &str = "packlet";
/// The name of the staged local recipe in the build directory.
pub const LOCAL_RECIPE_FILE: &str = "packlet.yml";
/// The installer used inside the image.
pub const IMAGE_PIP: &str = "pip";

/// All the files that are put in the build directory (except the lock).
const BUILD_FILES: [&str; 5] = [ "Dockerfile", PAYLOAD_DIR, MANIFEST_FILE, LAUNCHER_FILE, LOCAL_RECIPE_FILE ];





/***** HELPER FUNCTIONS *****/
/// Quotes the given argument for a shell if it has any characters that the shell would interpret.
fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_alphanumeric() || "._-=/:@+,".contains(c)) {
        arg.into()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Escapes the given value so it can be put between double quotes in an `ENV` instruction.
fn env_escape(value: &str) -> String {
    let mut res: String = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '"' || c == '$' { res.push('\\'); }
        res.push(c);
    }
    res
}

/// Returns the launcher next to the currently running executable.
fn default_launcher() -> Result<PathBuf, Error> {
    let exe: PathBuf = std::env::current_exe().map_err(|err| Error::LauncherResolveError{ err })?;
    match exe.parent() {
        Some(parent) => Ok(parent.join(LAUNCHER_FILE)),
        None         => Ok(PathBuf::from(LAUNCHER_FILE)),
    }
}



/// Puts everything the Dockerfile needs in the given build directory.
///
/// # Arguments
/// - `pack`: The pack to stage.
/// - `build_dir`: The (existing) build directory to stage it in.
/// - `launcher`: The path to the packlet executable to put in the image.
///
/// # Errors
/// This function errors if any of the files failed to be copied or written.
async fn stage(pack: &Pack, build_dir: &Path, launcher: &Path) -> Result<(), Error> {
    // Start with a fresh payload
    clean_directory(build_dir, &BUILD_FILES);
    let payload_dir: PathBuf = build_dir.join(PAYLOAD_DIR);
    if let Err(err) = fs::create_dir_all(&payload_dir) { return Err(Error::BuildDirCreateError{ path: payload_dir, err }); }

    // Stage the files per step
    let mut executor = LocalExecutor::new();
    for step in pack.plan.steps() {
        match step {
            Step::Install{ origin: InstallOrigin::Manifest{ path }, .. } => {
                let target: PathBuf = build_dir.join(MANIFEST_FILE);
                debug!("Copying manifest '{}' to '{}'", path.display(), target.display());
                if let Err(err) = fs::copy(path, &target) { return Err(Error::ManifestCopyError{ source: path.clone(), target, err }); }
            },
            Step::Copy{ source, exclude } => {
                executor.copy_payload(source, exclude, &payload_dir).await.map_err(|err| Error::PayloadCopyError{ err })?;
            },

            Step::Workdir{ .. } | Step::Install{ .. } | Step::Environment{ .. } | Step::Run{ .. } => {},
        }
    }

    // Stage the launcher
    if !launcher.is_file() { return Err(Error::MissingLauncher{ path: launcher.into() }); }
    let target: PathBuf = build_dir.join(LAUNCHER_FILE);
    debug!("Copying launcher '{}' to '{}'", launcher.display(), target.display());
    if let Err(err) = fs::copy(launcher, &target) { return Err(Error::LauncherCopyError{ source: launcher.into(), target, err }); }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        if let Err(err) = fs::set_permissions(&target, fs::Permissions::from_mode(0o755)) { return Err(Error::LauncherPermissionsError{ path: target, err }); }
    }

    // Write what it needs to run
    LocalRecipe::from_plan(&pack.recipe.name, &pack.plan).to_path(build_dir.join(LOCAL_RECIPE_FILE)).map_err(|err| Error::LocalRecipeCreateError{ err })?;
    let dockerfile: String = generate_dockerfile(&pack.recipe, &pack.plan)?;
    let path: PathBuf = build_dir.join("Dockerfile");
    if let Err(err) = fs::write(&path, dockerfile) { return Err(Error::DockerfileWriteError{ path, err }); }

    Ok(())
}

/// Builds the given pack in the given build directory, while holding its lock.
async fn build(arch: Arch, pack: &Pack, build_dir: &Path, launcher: &Path, tag: &str) -> Result<(), Error> {
    stage(pack, build_dir, launcher).await?;
    build_docker_image(arch, build_dir, tag)
}





/***** LIBRARY *****/
/// Generates the Dockerfile for the given recipe and its plan.
///
/// Every step of the plan maps to (at most a few) instructions, in plan order. The payload, manifest, launcher and local recipe are expected to be staged next to the Dockerfile.
///
/// # Arguments
/// - `recipe`: The recipe for which to generate the Dockerfile.
/// - `plan`: The plan built from that recipe.
///
/// # Returns
/// The Dockerfile, as a string.
///
/// # Errors
/// This function errors if we failed to write to the string (which shouldn't really happen).
pub fn generate_dockerfile(recipe: &Recipe, plan: &Plan) -> Result<String, Error> {
    let mut contents = String::new();

    // Header
    writeln_build!(contents, "# Generated by rcpsp-pack v{}", env!("CARGO_PKG_VERSION"))?;
    writeln_build!(contents, "# Pack: {}", recipe.name)?;
    if let Some(description) = &recipe.description {
        for line in description.lines() { writeln_build!(contents, "#   {}", line)?; }
    }
    writeln_build!(contents)?;
    writeln_build!(contents, "FROM {}", recipe.base)?;

    // The steps themselves
    for step in plan.steps() {
        match step {
            Step::Workdir{ path } => {
                writeln_build!(contents, "WORKDIR {}", path.display())?;
            },

            Step::Install{ origin: InstallOrigin::Manifest{ .. }, .. } => {
                writeln_build!(contents, "COPY {} ./{}", MANIFEST_FILE, MANIFEST_FILE)?;
                writeln_build!(contents, "RUN {} install --no-cache-dir -r {}", IMAGE_PIP, MANIFEST_FILE)?;
            },
            Step::Install{ origin: InstallOrigin::Auxiliary, packages } => {
                if packages.is_empty() { continue; }
                writeln_build!(contents, "RUN {} install --no-cache-dir {}", IMAGE_PIP, packages.iter().map(|p| shell_quote(&p.to_string())).collect::<Vec<String>>().join(" "))?;
            },

            Step::Copy{ .. } => {
                writeln_build!(contents, "COPY {}/ ./", PAYLOAD_DIR)?;
            },

            Step::Environment{ key, value } => {
                writeln_build!(contents, "ENV {}=\"{}\"", key, env_escape(value))?;
            },

            Step::Run{ .. } => {
                writeln_build!(contents, "COPY {} /{}", LAUNCHER_FILE, LAUNCHER_FILE)?;
                writeln_build!(contents, "COPY {} {}", LOCAL_RECIPE_FILE, LOCAL_RECIPE_PATH)?;
                writeln_build!(contents, "ENTRYPOINT [\"/{}\"]", LAUNCHER_FILE)?;
            },
        }
    }

    Ok(contents)
}



/// Loads the recipe at the given path and returns the Dockerfile for it.
///
/// # Errors
/// This function errors if the pack could not be loaded.
pub fn dockerfile(file: impl AsRef<Path>) -> Result<String, Error> {
    let pack: Pack = load_pack(file, WorkdirChoice::Recipe).map_err(|err| Error::PackError{ err })?;
    generate_dockerfile(&pack.recipe, &pack.plan)
}



/// Builds the pack described by the given recipe file into a container image.
///
/// # Arguments
/// - `arch`: The architecture to build the image for.
/// - `file`: Path to the recipe file.
/// - `launcher`: The packlet executable to put in the image. Defaults to the one next to the running executable.
/// - `tag`: The tag to give the image. Defaults to the recipe's tag (or `<name>:latest`).
/// - `keep_files`: Whether to keep the build files after building.
///
/// # Errors
/// This function errors if the pack could not be loaded, staged or built. A failing install in the image fails the whole build.
pub async fn handle(arch: Arch, file: PathBuf, launcher: Option<PathBuf>, tag: Option<String>, keep_files: bool) -> Result<(), Error> {
    debug!("Building pack from recipe '{}'...", file.display());

    // Load the pack
    let pack: Pack = load_pack(&file, WorkdirChoice::Recipe).map_err(|err| Error::PackError{ err })?;
    check_script(&pack).map_err(|err| Error::PackError{ err })?;
    let launcher: PathBuf = match launcher {
        Some(launcher) => launcher,
        None           => default_launcher()?,
    };
    let tag: String = tag.unwrap_or_else(|| pack.recipe.image_tag());

    // Prepare the build directory
    let build_dir: PathBuf = pack.context.join(BUILD_DIR);
    if let Err(err) = fs::create_dir_all(&build_dir) { return Err(Error::BuildDirCreateError{ path: build_dir, err }); }

    // Lock it while we build
    let lock_path: PathBuf = build_dir.join(".lock");
    let res: Result<(), Error> = {
        let _lock: BuildLock = BuildLock::acquire(&pack.recipe.name, &lock_path)?;
        let res: Result<(), Error> = build(arch, &pack, &build_dir, &launcher, &tag).await;
        if !keep_files {
            debug!("Cleaning up build files...");
            clean_directory(&build_dir, &BUILD_FILES);
        }
        res
    };

    // Remove the lock (and the build directory, if it's empty)
    if !keep_files {
        if let Err(err) = fs::remove_file(&lock_path) { warn!("{}", Error::LockCleanupError{ path: lock_path, err }); }
        if let Err(err) = fs::remove_dir(&build_dir) { debug!("Not removing build directory '{}': {}", build_dir.display(), err); }
    }
    res?;

    println!("Successfully built pack {} as image {} for {}", style(&pack.recipe.name).bold().cyan(), style(&tag).bold(), style(arch).bold());
    Ok(())
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use pack_spec::manifest::Manifest;
    use pack_spec::recipe::Recipe;
    use pack_spec::steps::PlanError;

    use crate::errors::UtilError;
    use crate::utils::tests::write_pack;

    use super::*;

    fn plan_for(recipe: &Recipe, manifest: &str) -> Plan {
        let manifest: Manifest = manifest.parse().unwrap();
        Plan::from_recipe(recipe, &manifest, "/ctx").unwrap()
    }

    fn instructions(dockerfile: &str) -> Vec<&str> { dockerfile.lines().filter(|l| !l.is_empty() && !l.starts_with('#')).collect() }

    #[test]
    fn dockerfile_follows_plan_order() {
        let recipe = Recipe::new("test");
        let dockerfile = generate_dockerfile(&recipe, &plan_for(&recipe, "numpy==1.24.0\n")).unwrap();
        assert_eq!(instructions(&dockerfile), vec![
            "FROM python:3.9-slim",
            "WORKDIR /app",
            "COPY requirements.txt ./requirements.txt",
            "RUN pip install --no-cache-dir -r requirements.txt",
            "RUN pip install --no-cache-dir google-cloud-storage",
            "COPY payload/ ./",
            "ENV PYTHONUNBUFFERED=\"1\"",
            "COPY packlet /packlet",
            "COPY packlet.yml /packlet.yml",
            "ENTRYPOINT [\"/packlet\"]",
        ]);
    }

    #[test]
    fn dockerfile_without_manifest_still_installs_client() {
        let mut recipe = Recipe::new("test");
        recipe.auxiliary = vec![ "pandas>=2".into() ];
        recipe.environment.insert("GREETING".into(), "say \"$HI\"".into());
        let dockerfile = generate_dockerfile(&recipe, &plan_for(&recipe, "# nothing\n")).unwrap();
        let lines = instructions(&dockerfile);
        assert!(!lines.iter().any(|l| l.contains("-r requirements.txt")));
        assert!(lines.contains(&"RUN pip install --no-cache-dir google-cloud-storage 'pandas>=2'"));
        assert!(lines.contains(&"ENV GREETING=\"say \\\"\\$HI\\\"\""));
    }

    #[test]
    fn dockerfile_refuses_multiline_values() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\nenvironment:\n  GREETING: \"hi\\nRUN id\"\n");
        match dockerfile(dir.path().join("recipe.yml")) {
            Err(Error::PackError{ err: UtilError::PlanError{ err: PlanError::IllegalEnvironmentValue{ key, value } } }) => {
                assert_eq!(key, "GREETING");
                assert_eq!(value, "hi\nRUN id");
            },
            other => panic!("Expected IllegalEnvironmentValue, got {:?}", other),
        }

        write_pack(dir.path(), "name: test\nbase: \"python:3.9-slim\\nRUN id\"\n");
        assert!(matches!(dockerfile(dir.path().join("recipe.yml")), Err(Error::PackError{ err: UtilError::PlanError{ err: PlanError::IllegalBase{ .. } } })));
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("numpy==1.24.0"), "numpy==1.24.0");
        assert_eq!(shell_quote("numpy>=1"), "'numpy>=1'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(env_escape("a\\b"), "a\\\\b");
    }

    #[tokio::test]
    async fn stage_puts_everything_in_place() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\n");
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data").join("j30.sm"), "jobs\n").unwrap();
        let launcher = dir.path().join("fake-packlet");
        fs::write(&launcher, "#!/bin/sh\n").unwrap();

        let pack: Pack = load_pack(dir.path().join("recipe.yml"), WorkdirChoice::Recipe).unwrap();
        let build_dir = pack.context.join(BUILD_DIR);
        fs::create_dir_all(&build_dir).unwrap();
        stage(&pack, &build_dir, &launcher).await.unwrap();

        assert!(build_dir.join("Dockerfile").is_file());
        assert!(build_dir.join(MANIFEST_FILE).is_file());
        assert!(build_dir.join(LAUNCHER_FILE).is_file());
        assert!(build_dir.join(PAYLOAD_DIR).join("rcpsp_pack.py").is_file());
        assert!(build_dir.join(PAYLOAD_DIR).join("data").join("j30.sm").is_file());
        assert!(!build_dir.join(PAYLOAD_DIR).join("recipe.yml").exists());
        assert!(!build_dir.join(PAYLOAD_DIR).join(BUILD_DIR).exists());

        let local = LocalRecipe::from_path(build_dir.join(LOCAL_RECIPE_FILE)).unwrap();
        assert_eq!(local.name, "test");
        assert_eq!(local.environment, vec![ ("PYTHONUNBUFFERED".to_string(), "1".to_string()) ]);
    }

    #[tokio::test]
    async fn stage_requires_launcher() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\n");

        let pack: Pack = load_pack(dir.path().join("recipe.yml"), WorkdirChoice::Recipe).unwrap();
        let build_dir = pack.context.join(BUILD_DIR);
        fs::create_dir_all(&build_dir).unwrap();
        assert!(matches!(stage(&pack, &build_dir, &dir.path().join("missing")).await, Err(Error::MissingLauncher{ .. })));
    }
}
