//  RECIPE.rs
//    by Lut99
//
//  Created:
//    13 Mar 2023, 13:21:09
//  Last edited:
//    21 Mar 2023, 16:30:52
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the recipe file (`recipe.yml`) that describes how a batch
//!   script is packaged and run, and its in-container counterpart
//!   (`packlet.yml`).
//

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::steps::{FailurePolicy, Invocation, Plan, PlanError, Step};


/***** CONSTANTS *****/
/// The base image used when the recipe doesn't specify one.
pub const DEFAULT_BASE: &str = "python:3.9-slim";
/// The working directory in the image when the recipe doesn't specify one.
pub const DEFAULT_WORKDIR: &str = "/app";
/// The manifest file (relative to the recipe) when the recipe doesn't specify one.
pub const DEFAULT_MANIFEST: &str = "requirements.txt";
/// The batch script when the recipe doesn't specify one.
pub const DEFAULT_SCRIPT: &str = "rcpsp_pack.py";
/// The interpreter with which the script is run when the recipe doesn't specify one.
pub const DEFAULT_INTERPRETER: &str = "python";

/// The cloud storage client that is installed in every pack, whatever the manifest says.
pub const CLOUD_STORAGE_CLIENT: &str = "google-cloud-storage";
/// The environment variable that forces the interpreter to write its output unbuffered.
pub const UNBUFFERED_VAR: &str = "PYTHONUNBUFFERED";
/// The name of the build directory created next to the recipe. Never part of the payload.
pub const BUILD_DIR: &str = ".pack-build";
/// The path of the local recipe within the image.
pub const LOCAL_RECIPE_PATH: &str = "/packlet.yml";

/// The placeholder in marker texts that is replaced with the script name.
pub const SCRIPT_PLACEHOLDER: &str = "{script}";



/***** SERDE DEFAULTS *****/
fn default_base() -> String { DEFAULT_BASE.into() }
fn default_workdir() -> PathBuf { DEFAULT_WORKDIR.into() }
fn default_manifest() -> PathBuf { DEFAULT_MANIFEST.into() }
fn default_payload() -> PathBuf { ".".into() }
fn default_script() -> String { DEFAULT_SCRIPT.into() }
fn default_interpreter() -> String { DEFAULT_INTERPRETER.into() }
fn default_true() -> bool { true }
fn default_start_marker() -> String { "Starting RCPSP batch job...".into() }
fn default_finished_marker() -> String { format!("Finished running {}", SCRIPT_PLACEHOLDER) }
fn default_done_marker() -> String { "Batch job complete.".into() }





/***** ERRORS *****/
/// Collects errors relating to the (local) recipe files.
#[derive(Debug)]
pub enum RecipeError {
    /// Could not open the target file
    FileReadError{ path: PathBuf, err: std::io::Error },
    /// Could not parse the target file
    ParseError{ err: serde_yaml::Error },

    /// Could not create the target file
    FileCreateError{ path: PathBuf, err: std::io::Error },
    /// Could not write to the given writer
    FileWriteError{ err: serde_yaml::Error },
}

impl Display for RecipeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use RecipeError::*;
        match self {
            FileReadError{ path, err } => write!(f, "Could not open & read recipe file '{}': {}", path.display(), err),
            ParseError{ err }          => write!(f, "Could not parse recipe YAML: {}", err),

            FileCreateError{ path, err } => write!(f, "Could not create recipe file '{}': {}", path.display(), err),
            FileWriteError{ err }        => write!(f, "Could not serialize & write recipe file: {}", err),
        }
    }
}

impl Error for RecipeError {}





/***** AUXILLARY *****/
/// Defines the texts printed around the batch script.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Markers {
    /// Printed right before the script is started.
    #[serde(default = "default_start_marker")]
    pub start    : String,
    /// Printed once the script returns. Any `{script}` is replaced with the script name.
    #[serde(default = "default_finished_marker")]
    pub finished : String,
    /// Printed as the very last line.
    #[serde(default = "default_done_marker")]
    pub done     : String,
}

impl Markers {
    /// Returns the completion marker for the given script.
    #[inline]
    pub fn finished_for(&self, script: &str) -> String { self.finished.replace(SCRIPT_PLACEHOLDER, script) }
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            start    : default_start_marker(),
            finished : default_finished_marker(),
            done     : default_done_marker(),
        }
    }
}





/***** LIBRARY *****/
/// Specifies the contents of a recipe YAML file, i.e., the file the user writes.
///
/// Relative paths in the recipe are resolved against the directory the recipe lives in (the _context_).
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// The name of the pack. Also used as the default image name.
    pub name        : String,
    /// A short description of the pack.
    pub description : Option<String>,
    /// The tag to give the image. Defaults to `<name>:latest`.
    pub tag         : Option<String>,

    /// The base image to build on.
    #[serde(default = "default_base")]
    pub base      : String,
    /// The working directory (execution root) in the image.
    #[serde(default = "default_workdir")]
    pub workdir   : PathBuf,
    /// The dependency manifest (a pip requirements file).
    #[serde(default = "default_manifest")]
    pub manifest  : PathBuf,
    /// Any additional packages to install next to the cloud storage client.
    #[serde(default)]
    pub auxiliary : Vec<String>,

    /// The directory with the payload to copy into the working directory.
    #[serde(default = "default_payload")]
    pub payload     : PathBuf,
    /// Top-level entries of the payload that are not copied.
    #[serde(default)]
    pub exclude     : Vec<String>,
    /// Any additional environment variables to set before the script runs.
    #[serde(default)]
    pub environment : BTreeMap<String, String>,

    /// The batch script to run, relative to the working directory.
    #[serde(default = "default_script")]
    pub script      : String,
    /// The interpreter that runs the script.
    #[serde(default = "default_interpreter")]
    pub interpreter : String,
    /// Whether to force the interpreter's output to be unbuffered.
    #[serde(default = "default_true")]
    pub unbuffered  : bool,
    /// The texts printed around the script.
    #[serde(default)]
    pub markers     : Markers,
    /// Whether the completion markers are still printed if the script fails.
    #[serde(default)]
    pub on_failure  : FailurePolicy,
}

impl Recipe {
    /// Constructor for a Recipe with the given name and everything else defaulted.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name        : name.into(),
            description : None,
            tag         : None,

            base      : default_base(),
            workdir   : default_workdir(),
            manifest  : default_manifest(),
            auxiliary : vec![],

            payload     : default_payload(),
            exclude     : vec![],
            environment : BTreeMap::new(),

            script      : default_script(),
            interpreter : default_interpreter(),
            unbuffered  : true,
            markers     : Markers::default(),
            on_failure  : FailurePolicy::default(),
        }
    }



    /// Returns a Recipe by constructing it from the file at the given path.
    ///
    /// # Arguments
    /// - `path`: The path to the recipe file.
    ///
    /// # Errors
    /// This function errors if the file could not be read or is not a valid recipe.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecipeError> {
        let path: &Path = path.as_ref();

        // Read the contents in one go
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err)     => { return Err(RecipeError::FileReadError{ path: path.to_path_buf(), err }); }
        };

        // Delegate the actual parsing to from_string
        Self::from_string(contents)
    }

    /// Returns a Recipe by constructing it from the given Reader with YAML text.
    pub fn from_reader<R: Read>(r: R) -> Result<Self, RecipeError> {
        serde_yaml::from_reader(r).map_err(|err| RecipeError::ParseError{ err })
    }

    /// Returns a Recipe by constructing it from the given string of YAML text.
    pub fn from_string(contents: impl AsRef<str>) -> Result<Self, RecipeError> {
        serde_yaml::from_str(contents.as_ref()).map_err(|err| RecipeError::ParseError{ err })
    }



    /// Writes the Recipe to the given location.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), RecipeError> {
        let path: &Path = path.as_ref();
        let handle = match File::create(path) {
            Ok(handle) => handle,
            Err(err)   => { return Err(RecipeError::FileCreateError{ path: path.to_path_buf(), err }); }
        };
        self.to_writer(handle)
    }

    /// Writes the Recipe to the given writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), RecipeError> {
        serde_yaml::to_writer(writer, self).map_err(|err| RecipeError::FileWriteError{ err })
    }



    /// Returns the tag of the image built from this recipe.
    #[inline]
    pub fn image_tag(&self) -> String { self.tag.clone().unwrap_or_else(|| format!("{}:latest", self.name)) }

    /// Resolves the payload directory against the given context directory.
    #[inline]
    pub fn payload_dir(&self, context: impl AsRef<Path>) -> PathBuf { context.as_ref().join(&self.payload) }

    /// Resolves the manifest path against the given context directory.
    #[inline]
    pub fn manifest_path(&self, context: impl AsRef<Path>) -> PathBuf { context.as_ref().join(&self.manifest) }

    /// Returns the invocation of the batch script as described by this recipe.
    pub fn invocation(&self) -> Invocation {
        Invocation {
            script      : self.script.clone(),
            interpreter : self.interpreter.clone(),
            markers     : self.markers.clone(),
            on_failure  : self.on_failure,
        }
    }
}



/// Specifies the contents of the recipe that lives inside the image itself, i.e., only what is needed at container start.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecipe {
    /// The name of the pack
    pub name        : String,
    /// The working directory in which the script runs
    pub workdir     : PathBuf,
    /// How to run the script
    pub invocation  : Invocation,
    /// The environment variables passed to the script, in order
    pub environment : Vec<(String, String)>,
}

impl LocalRecipe {
    /// Distills the LocalRecipe from the given (build) plan.
    ///
    /// # Arguments
    /// - `name`: The name of the pack.
    /// - `plan`: The plan to take the workdir, environment and invocation from.
    ///
    /// # Returns
    /// A new LocalRecipe instance.
    pub fn from_plan(name: impl Into<String>, plan: &Plan) -> Self {
        let mut workdir: PathBuf = DEFAULT_WORKDIR.into();
        let mut environment: Vec<(String, String)> = vec![];
        for step in plan.steps() {
            match step {
                Step::Workdir{ path }            => { workdir = path.clone(); },
                Step::Environment{ key, value }  => { environment.push((key.clone(), value.clone())); },
                _                                => {},
            }
        }

        Self {
            name       : name.into(),
            workdir,
            invocation : plan.invocation().clone(),
            environment,
        }
    }



    /// Returns the plan that is executed at container start: entering the working directory, setting the environment and running the script.
    ///
    /// # Errors
    /// This function errors if the local recipe was tampered with such that it does not form a valid plan.
    pub fn plan(&self) -> Result<Plan, PlanError> {
        let mut steps: Vec<Step> = Vec::with_capacity(2 + self.environment.len());
        steps.push(Step::Workdir{ path: self.workdir.clone() });
        for (key, value) in &self.environment {
            steps.push(Step::Environment{ key: key.clone(), value: value.clone() });
        }
        steps.push(Step::Run{ invocation: self.invocation.clone() });
        Plan::new(steps)
    }



    /// Constructor for the LocalRecipe that constructs it from the given path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecipeError> {
        let path: &Path = path.as_ref();
        let handle = match File::open(path) {
            Ok(handle) => handle,
            Err(err)   => { return Err(RecipeError::FileReadError{ path: path.to_path_buf(), err }); }
        };
        Self::from_reader(handle)
    }

    /// Constructor for the LocalRecipe that constructs it from the given reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RecipeError> {
        serde_yaml::from_reader(reader).map_err(|err| RecipeError::ParseError{ err })
    }

    /// Writes the LocalRecipe to the given location.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), RecipeError> {
        let path: &Path = path.as_ref();
        let handle = match File::create(path) {
            Ok(handle) => handle,
            Err(err)   => { return Err(RecipeError::FileCreateError{ path: path.to_path_buf(), err }); }
        };
        self.to_writer(handle)
    }

    /// Writes the LocalRecipe to the given writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), RecipeError> {
        serde_yaml::to_writer(writer, self).map_err(|err| RecipeError::FileWriteError{ err })
    }
}





/***** TESTS *****/
