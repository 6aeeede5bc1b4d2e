//  UTILS.rs
//    by Lut99
//
//  Created:
//    17 Oct 2022, 15:10:49
//  Last edited:
//    22 Mar 2023, 16:02:17
//  Auto updated?
//    Yes
//
//  Description:
//!   Contains utilities used across the subcommands: mostly loading a
//!   recipe together with its manifest and plan.
//

use std::fs;
use std::path::{Path, PathBuf};

use pack_spec::manifest::Manifest;
use pack_spec::recipe::Recipe;
use pack_spec::steps::Plan;

pub use crate::errors::UtilError as Error;


/***** AUXILLARY *****/
/// Decides which working directory a loaded pack runs in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WorkdirChoice {
    /// Use the working directory as written in the recipe (what the container uses).
    Recipe,
    /// Run in the payload directory itself, so nothing has to be copied.
    InPlace,
    /// Use the given (absolute) directory.
    Path(PathBuf),
}





/***** LIBRARY *****/
/// A recipe, loaded together with everything it references.
#[derive(Clone, Debug)]
pub struct Pack {
    /// The directory against which the recipe's relative paths are resolved (i.e., the folder of the recipe file).
    pub context  : PathBuf,
    /// The recipe itself.
    pub recipe   : Recipe,
    /// The dependency manifest it references.
    pub manifest : Manifest,
    /// The plan built from both.
    pub plan     : Plan,
}

impl Pack {
    /// Returns the (resolved) payload directory of this pack.
    #[inline]
    pub fn payload_dir(&self) -> PathBuf { self.recipe.payload_dir(&self.context) }

    /// Returns the (resolved) path of the manifest of this pack.
    #[inline]
    pub fn manifest_path(&self) -> PathBuf { self.recipe.manifest_path(&self.context) }
}



/// Loads the recipe at the given path, its manifest and builds the plan for it.
///
/// The recipe file itself is excluded from the payload if it lives in there.
///
/// # Arguments
/// - `file`: The path to the recipe file.
/// - `workdir`: Which working directory to use for the plan.
///
/// # Returns
/// A new Pack with everything loaded.
///
/// # Errors
/// This function errors if the recipe or manifest could not be loaded, the payload does not exist or if the plan is invalid.
pub fn load_pack(file: impl AsRef<Path>, workdir: WorkdirChoice) -> Result<Pack, Error> {
    let file: &Path = file.as_ref();

    // Resolve the context first
    let file: PathBuf = match fs::canonicalize(file) {
        Ok(file) => file,
        Err(err) => { return Err(Error::RecipeFileCanonicalizeError{ path: file.into(), err }); }
    };
    let context: PathBuf = match file.parent() {
        Some(parent) => parent.into(),
        None         => PathBuf::from("/"),
    };
    debug!("Loading recipe '{}' (context: '{}')", file.display(), context.display());

    // Load the recipe
    let mut recipe: Recipe = Recipe::from_path(&file).map_err(|err| Error::RecipeError{ err })?;

    // Resolve the payload, and make sure the recipe isn't part of it
    let payload: PathBuf = recipe.payload_dir(&context);
    let payload: PathBuf = match fs::canonicalize(&payload) {
        Ok(payload) if payload.is_dir() => payload,
        _                               => { return Err(Error::MissingPayload{ path: payload }); }
    };
    if payload == context {
        if let Some(name) = file.file_name() {
            let name: String = name.to_string_lossy().to_string();
            if !recipe.exclude.contains(&name) { recipe.exclude.push(name); }
        }
    }

    // Apply the working directory
    match workdir {
        WorkdirChoice::Recipe     => {},
        WorkdirChoice::InPlace    => { recipe.workdir = payload; },
        WorkdirChoice::Path(path) => { recipe.workdir = path; },
    }

    // Load the manifest
    let manifest_path: PathBuf = recipe.manifest_path(&context);
    let manifest: Manifest = match Manifest::from_path(&manifest_path) {
        Ok(manifest) => manifest,
        Err(err)     => { return Err(Error::ManifestError{ path: manifest_path, err }); }
    };
    debug!("Manifest '{}' lists {} package(s)", manifest_path.display(), manifest.len());

    // Build the plan
    let plan: Plan = Plan::from_recipe(&recipe, &manifest, &context).map_err(|err| Error::PlanError{ err })?;
    Ok(Pack {
        context,
        recipe,
        manifest,
        plan,
    })
}



/// Checks that the batch script of the given pack actually exists in its payload.
///
/// # Errors
/// This function errors if the script is not a file in the payload directory.
pub fn check_script(pack: &Pack) -> Result<(), Error> {
    let script: PathBuf = pack.payload_dir().join(&pack.recipe.script);
    if !script.is_file() { return Err(Error::MissingScript{ path: script }); }
    Ok(())
}





/***** TESTS *****/
#[cfg(test)]
pub(crate) mod tests {
    use pack_spec::recipe::BUILD_DIR;
    use pack_spec::steps::Step;

    use super::*;

    /// Writes a minimal pack to the given directory.
    pub(crate) fn write_pack(dir: &Path, recipe: &str) {
        fs::write(dir.join("recipe.yml"), recipe).unwrap();
        fs::write(dir.join("requirements.txt"), "numpy==1.24.0\n").unwrap();
        fs::write(dir.join("rcpsp_pack.py"), "print('hello')\n").unwrap();
    }

    #[test]
    fn load_excludes_recipe_from_payload() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\n");

        let pack = load_pack(dir.path().join("recipe.yml"), WorkdirChoice::Recipe).unwrap();
        assert_eq!(pack.manifest.len(), 1);
        assert_eq!(pack.plan.workdir(), Some(Path::new("/app")));
        let copy = pack.plan.steps().iter().find(|s| matches!(s, Step::Copy{ .. })).unwrap();
        match copy {
            Step::Copy{ exclude, .. } => {
                assert!(exclude.iter().any(|e| e == "recipe.yml"));
                assert!(exclude.iter().any(|e| e == BUILD_DIR));
            },
            _ => unreachable!(),
        }
        check_script(&pack).unwrap();
    }

    #[test]
    fn workdir_choices() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\n");

        let pack = load_pack(dir.path().join("recipe.yml"), WorkdirChoice::InPlace).unwrap();
        assert_eq!(pack.plan.workdir(), Some(fs::canonicalize(dir.path()).unwrap().as_path()));

        let pack = load_pack(dir.path().join("recipe.yml"), WorkdirChoice::Path("/tmp/elsewhere".into())).unwrap();
        assert_eq!(pack.plan.workdir(), Some(Path::new("/tmp/elsewhere")));
    }

    #[test]
    fn missing_pieces_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "name: test\nscript: solve.py\n");
        let pack = load_pack(dir.path().join("recipe.yml"), WorkdirChoice::Recipe).unwrap();
        assert!(matches!(check_script(&pack), Err(Error::MissingScript{ .. })));

        fs::write(dir.path().join("recipe.yml"), "name: test\npayload: src\n").unwrap();
        assert!(matches!(load_pack(dir.path().join("recipe.yml"), WorkdirChoice::Recipe), Err(Error::MissingPayload{ .. })));

        fs::write(dir.path().join("recipe.yml"), "name: test\nmanifest: deps.txt\n").unwrap();
        assert!(matches!(load_pack(dir.path().join("recipe.yml"), WorkdirChoice::Recipe), Err(Error::ManifestError{ .. })));

        assert!(matches!(load_pack(dir.path().join("nope.yml"), WorkdirChoice::Recipe), Err(Error::RecipeFileCanonicalizeError{ .. })));
    }
}
