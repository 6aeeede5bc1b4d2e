//  STEPS.rs
//    by Lut99
//
//  Created:
//    14 Mar 2023, 09:55:32
//  Last edited:
//    21 Mar 2023, 16:41:07
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the typed steps that make up a pack's lifecycle, the plan
//!   that orders them and the phases a pack moves through while that
//!   plan is executed.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::manifest::{normalize_name, Manifest, ManifestError, Requirement};
use crate::recipe::{Markers, Recipe, BUILD_DIR, CLOUD_STORAGE_CLIENT, UNBUFFERED_VAR};


/***** ERRORS *****/
/// Defines errors that occur when constructing a Plan.
#[derive(Debug)]
pub enum PlanError {
    /// The plan has no run step.
    MissingRun,
    /// The plan has more than one run step.
    MultipleRuns{ index: usize },
    /// A step follows the run step.
    RunNotLast{ index: usize },
    /// A workdir step is not the first step.
    WorkdirNotFirst{ index: usize },
    /// An install step follows a copy step.
    InstallAfterCopy{ index: usize },

    /// The pack name is empty or spans more than one line.
    IllegalName{ name: String },
    /// The base image is empty or contains whitespace or control characters.
    IllegalBase{ base: String },
    /// The working directory is not an absolute path.
    RelativeWorkdir{ path: PathBuf },
    /// The working directory contains control characters.
    IllegalWorkdir{ path: PathBuf },
    /// The script is empty, absolute or escapes the working directory.
    IllegalScript{ script: String },
    /// The interpreter is empty.
    EmptyInterpreter,
    /// An environment variable has a name that cannot be set.
    IllegalEnvironmentKey{ key: String },
    /// An environment variable has a value with control characters (e.g., a newline) in it.
    IllegalEnvironmentValue{ key: String, value: String },
    /// An auxiliary package is not a valid requirement.
    IllegalAuxiliary{ raw: String, err: ManifestError },
}

impl Display for PlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use PlanError::*;
        match self {
            MissingRun                 => write!(f, "Plan does not run a script"),
            MultipleRuns{ index }      => write!(f, "Step {} is a second run step; a plan runs exactly one script", index),
            RunNotLast{ index }        => write!(f, "Step {} comes after the run step; running the script must be the last step", index),
            WorkdirNotFirst{ index }   => write!(f, "Step {} sets the working directory, but only the first step may do so", index),
            InstallAfterCopy{ index }  => write!(f, "Step {} installs dependencies after the payload has been copied", index),

            IllegalName{ name }             => write!(f, "Pack name {:?} must be non-empty and cannot contain control characters", name),
            IllegalBase{ base }             => write!(f, "Base image {:?} must be a single non-empty image reference", base),
            RelativeWorkdir{ path }         => write!(f, "Working directory '{}' is not an absolute path", path.display()),
            IllegalWorkdir{ path }          => write!(f, "Working directory {:?} cannot contain control characters", path),
            IllegalScript{ script }         => write!(f, "Script '{}' must be a non-empty path relative to (and within) the working directory", script),
            EmptyInterpreter                => write!(f, "Interpreter cannot be empty"),
            IllegalEnvironmentKey{ key }    => write!(f, "'{}' is not a valid environment variable name", key),
            IllegalEnvironmentValue{ key, value } => write!(f, "Value {:?} of environment variable '{}' cannot contain control characters", value, key),
            IllegalAuxiliary{ raw, err }    => write!(f, "Auxiliary package '{}' is not a valid requirement: {}", raw, err),
        }
    }
}

impl Error for PlanError {}





/***** HELPER FUNCTIONS *****/
/// Returns whether the given string is a valid environment variable name.
fn is_valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Returns whether the given text has characters that would break it out of a single Dockerfile line.
///
/// Tabs are allowed.
#[inline]
fn has_control(text: &str) -> bool { text.chars().any(|c| c.is_control() && c != '\t') }

/// Returns whether the given script path stays within the working directory.
fn is_contained_script(script: &str) -> bool {
    if script.trim().is_empty() { return false; }
    Path::new(script).components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}





/***** AUXILLARY *****/
/// Defines what happens to the rest of the sequence when a step fails.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Nothing after the failing step is executed.
    Abort,
    /// The sequence is completed anyway and the failure is reported afterwards.
    #[default]
    Continue,
}

impl Display for FailurePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            FailurePolicy::Abort    => write!(f, "abort"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}



/// Defines how the batch script is run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// The script to run, relative to the working directory.
    pub script      : String,
    /// The interpreter to run the script with.
    pub interpreter : String,
    /// The texts to print around the script.
    pub markers     : Markers,
    /// Whether to still print the completion markers when the script fails.
    pub on_failure  : FailurePolicy,
}

impl Invocation {
    /// Returns the command line that runs the script. It never has any arguments beyond the script itself.
    #[inline]
    pub fn command_line(&self) -> Vec<String> { vec![ self.interpreter.clone(), self.script.clone() ] }
}



/// Defines where the packages of an install step come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstallOrigin {
    /// The packages are those listed in the dependency manifest at the given path.
    Manifest{ path: PathBuf },
    /// The packages are the fixed auxiliary dependencies.
    Auxiliary,
}

impl Display for InstallOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            InstallOrigin::Manifest{ path } => write!(f, "manifest '{}'", path.display()),
            InstallOrigin::Auxiliary        => write!(f, "auxiliary"),
        }
    }
}





/***** LIBRARY *****/
/// Defines a single, typed step in a pack's lifecycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Establishes the working directory as the execution root.
    Workdir{ path: PathBuf },
    /// Installs the given packages.
    Install{ origin: InstallOrigin, packages: Vec<Requirement> },
    /// Copies the payload (minus the excluded top-level entries) into the working directory.
    Copy{ source: PathBuf, exclude: Vec<String> },
    /// Sets an environment variable for the script.
    Environment{ key: String, value: String },
    /// Runs the batch script.
    Run{ invocation: Invocation },
}

impl Step {
    /// Returns what happens to the sequence if this step fails.
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            Step::Run{ invocation } => invocation.on_failure,
            _                       => FailurePolicy::Abort,
        }
    }

    /// Returns a short, human-readable name for the kind of step.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Workdir{ .. }     => "workdir",
            Step::Install{ .. }     => "install",
            Step::Copy{ .. }        => "copy",
            Step::Environment{ .. } => "environment",
            Step::Run{ .. }         => "run",
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Step::Workdir{ path }             => write!(f, "workdir {}", path.display()),
            Step::Install{ origin, packages } => write!(f, "install ({}) {}", origin, packages.iter().map(|p| p.to_string()).collect::<Vec<String>>().join(" ")),
            Step::Copy{ source, exclude }     => write!(f, "copy {}{}", source.display(), if !exclude.is_empty() { format!(" (excluding {})", exclude.join(", ")) } else { String::new() }),
            Step::Environment{ key, value }   => write!(f, "environment {}={}", key, value),
            Step::Run{ invocation }           => write!(f, "run {} (on failure: {})", invocation.command_line().join(" "), invocation.on_failure),
        }
    }
}



/// Defines the phases a pack moves through. There are no cycles; a plan only ever moves forward.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    /// The environment is being set up.
    Building,
    /// All dependencies have been installed.
    DependenciesInstalled,
    /// The payload is in the working directory.
    PayloadCopied,
    /// The script is running.
    Running,
    /// The script has returned with the given exit code.
    Exited{ code: i32 },
}

impl Phase {
    /// Returns the phase a pack is in after the given step has been executed (or, for run steps, started).
    pub fn advance(self, step: &Step) -> Phase {
        match (self, step) {
            (Phase::Exited{ code }, _) => Phase::Exited{ code },

            (_, Step::Workdir{ .. })     => Phase::Building,
            (_, Step::Install{ .. })     => Phase::DependenciesInstalled,
            (_, Step::Copy{ .. })        => Phase::PayloadCopied,
            (phase, Step::Environment{ .. }) => phase,
            (_, Step::Run{ .. })         => Phase::Running,
        }
    }

    /// Returns the final phase for the given exit code.
    #[inline]
    pub fn exit(self, code: i32) -> Phase { Phase::Exited{ code } }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Phase::Building              => write!(f, "building"),
            Phase::DependenciesInstalled => write!(f, "dependencies installed"),
            Phase::PayloadCopied         => write!(f, "payload copied"),
            Phase::Running               => write!(f, "running"),
            Phase::Exited{ code }        => write!(f, "exited ({})", code),
        }
    }
}



/// An ordered list of steps that is guaranteed to end with running exactly one script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Plan {
    /// The steps, in execution order.
    steps : Vec<Step>,
}

impl Plan {
    /// Constructor for the Plan that checks the order of the given steps.
    ///
    /// # Arguments
    /// - `steps`: The steps to execute, in order.
    ///
    /// # Errors
    /// This function errors if the steps do not end with one run step, if a workdir step is not first or if an install step follows a copy step.
    pub fn new(steps: Vec<Step>) -> Result<Self, PlanError> {
        let mut run: Option<usize> = None;
        let mut copied: bool = false;
        for (i, step) in steps.iter().enumerate() {
            if run.is_some() {
                if let Step::Run{ .. } = step { return Err(PlanError::MultipleRuns{ index: i }); }
                return Err(PlanError::RunNotLast{ index: i });
            }
            match step {
                Step::Workdir{ .. } if i > 0 => { return Err(PlanError::WorkdirNotFirst{ index: i }); },
                Step::Install{ .. } if copied => { return Err(PlanError::InstallAfterCopy{ index: i }); },
                Step::Copy{ .. }             => { copied = true; },
                Step::Run{ .. }              => { run = Some(i); },
                _                            => {},
            }
        }
        if run.is_none() { return Err(PlanError::MissingRun); }

        Ok(Self{ steps })
    }

    /// Builds the full lifecycle plan of the given recipe.
    ///
    /// The plan always installs the cloud storage client, regardless of whether the manifest already lists it.
    ///
    /// # Arguments
    /// - `recipe`: The recipe to build the plan for.
    /// - `manifest`: The dependency manifest of that recipe.
    /// - `context`: The directory against which the recipe's relative paths are resolved.
    ///
    /// # Errors
    /// This function errors if the recipe has illegal values.
    pub fn from_recipe(recipe: &Recipe, manifest: &Manifest, context: impl AsRef<Path>) -> Result<Self, PlanError> {
        let context: &Path = context.as_ref();

        // Check the recipe itself; most of it ends up in the Dockerfile, one line per value
        if recipe.name.trim().is_empty() || has_control(&recipe.name) { return Err(PlanError::IllegalName{ name: recipe.name.clone() }); }
        if recipe.base.is_empty() || recipe.base.chars().any(|c| c.is_whitespace() || c.is_control()) { return Err(PlanError::IllegalBase{ base: recipe.base.clone() }); }
        if !recipe.workdir.is_absolute() { return Err(PlanError::RelativeWorkdir{ path: recipe.workdir.clone() }); }
        if has_control(&recipe.workdir.to_string_lossy()) { return Err(PlanError::IllegalWorkdir{ path: recipe.workdir.clone() }); }
        if !is_contained_script(&recipe.script) { return Err(PlanError::IllegalScript{ script: recipe.script.clone() }); }
        if recipe.interpreter.trim().is_empty() { return Err(PlanError::EmptyInterpreter); }
        if let Some(key) = recipe.environment.keys().find(|k| !is_valid_env_key(k)) { return Err(PlanError::IllegalEnvironmentKey{ key: key.clone() }); }
        if let Some((key, value)) = recipe.environment.iter().find(|(_, v)| has_control(v)) { return Err(PlanError::IllegalEnvironmentValue{ key: key.clone(), value: value.clone() }); }
        if manifest.contains(CLOUD_STORAGE_CLIENT) { debug!("Manifest already lists '{}'; it is installed again as an auxiliary package", CLOUD_STORAGE_CLIENT); }

        let mut steps: Vec<Step> = vec![ Step::Workdir{ path: recipe.workdir.clone() } ];

        // Dependencies first
        if !manifest.is_empty() {
            steps.push(Step::Install{ origin: InstallOrigin::Manifest{ path: recipe.manifest_path(context) }, packages: manifest.requirements.clone() });
        }
        let mut auxiliary: Vec<Requirement> = vec![ Requirement::new(CLOUD_STORAGE_CLIENT, None::<String>) ];
        for (i, raw) in recipe.auxiliary.iter().enumerate() {
            let req: Requirement = Requirement::parse(i + 1, raw.trim()).map_err(|err| PlanError::IllegalAuxiliary{ raw: raw.clone(), err })?;
            if auxiliary.iter().any(|a| a.normalized_name() == req.normalized_name()) {
                if req.normalized_name() == normalize_name(CLOUD_STORAGE_CLIENT) {
                    // Allow the user to pin the client
                    auxiliary[0] = req;
                }
                continue;
            }
            auxiliary.push(req);
        }
        steps.push(Step::Install{ origin: InstallOrigin::Auxiliary, packages: auxiliary });

        // Then the payload
        let mut exclude: Vec<String> = recipe.exclude.clone();
        if !exclude.iter().any(|e| e == BUILD_DIR) { exclude.push(BUILD_DIR.into()); }
        steps.push(Step::Copy{ source: recipe.payload_dir(context), exclude });

        // The environment, with the output flag first
        if recipe.unbuffered { steps.push(Step::Environment{ key: UNBUFFERED_VAR.into(), value: "1".into() }); }
        for (key, value) in &recipe.environment {
            steps.push(Step::Environment{ key: key.clone(), value: value.clone() });
        }

        // Finally, run it
        steps.push(Step::Run{ invocation: recipe.invocation() });
        Self::new(steps)
    }



    /// Returns the steps of this plan, in order.
    #[inline]
    pub fn steps(&self) -> &[Step] { &self.steps }

    /// Returns the working directory this plan runs in, if it sets one.
    pub fn workdir(&self) -> Option<&Path> {
        match self.steps.first() {
            Some(Step::Workdir{ path }) => Some(path),
            _                           => None,
        }
    }

    /// Returns the invocation of the script this plan ends with.
    pub fn invocation(&self) -> &Invocation {
        match self.steps.last() {
            Some(Step::Run{ invocation }) => invocation,
            // Checked by the constructor
            _ => unreachable!(),
        }
    }

    /// Returns the environment variables set by this plan, in order.
    pub fn environment(&self) -> Vec<(&str, &str)> {
        self.steps.iter().filter_map(|s| match s {
            Step::Environment{ key, value } => Some((key.as_str(), value.as_str())),
            _                               => None,
        }).collect()
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "{:>2}. {}", i + 1, step)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item     = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter { self.steps.iter() }
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn run_step() -> Step { Step::Run{ invocation: Recipe::new("t").invocation() } }

    fn auxiliary_packages(plan: &Plan) -> Vec<String> {
        plan.steps().iter().find_map(|s| match s {
            Step::Install{ origin: InstallOrigin::Auxiliary, packages } => Some(packages.iter().map(|p| p.to_string()).collect()),
            _ => None,
        }).unwrap()
    }

    #[test]
    fn plan_from_recipe_has_strict_order() {
        let recipe = Recipe::new("rcpsp-pack");
        let manifest = Manifest::from_str("numpy==1.24.2\ndocplex\n").unwrap();
        let plan = Plan::from_recipe(&recipe, &manifest, "/ctx").unwrap();

        let kinds: Vec<&str> = plan.steps().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![ "workdir", "install", "install", "copy", "environment", "run" ]);
        assert_eq!(plan.workdir(), Some(Path::new("/app")));
        assert_eq!(plan.environment(), vec![ ("PYTHONUNBUFFERED", "1") ]);
        assert_eq!(plan.invocation().command_line(), vec![ "python".to_string(), "rcpsp_pack.py".to_string() ]);
        match &plan.steps()[1] {
            Step::Install{ origin: InstallOrigin::Manifest{ path }, packages } => {
                assert_eq!(path, &PathBuf::from("/ctx/requirements.txt"));
                assert_eq!(packages.len(), 2);
            },
            other => panic!("Expected manifest install, got {}", other),
        }
    }

    #[test]
    fn plan_always_installs_cloud_storage() {
        // Empty manifest: no manifest install, still the client
        let plan = Plan::from_recipe(&Recipe::new("a"), &Manifest::default(), "/ctx").unwrap();
        assert_eq!(plan.steps().iter().filter(|s| s.kind() == "install").count(), 1);
        assert_eq!(auxiliary_packages(&plan), vec![ "google-cloud-storage".to_string() ]);

        // Manifest that already lists it: still installed as auxiliary
        let manifest = Manifest::from_str("google-cloud-storage==2.8.0\n").unwrap();
        let plan = Plan::from_recipe(&Recipe::new("a"), &manifest, "/ctx").unwrap();
        assert_eq!(auxiliary_packages(&plan), vec![ "google-cloud-storage".to_string() ]);

        // Extra auxiliaries are deduplicated, a pin of the client is honoured
        let mut recipe = Recipe::new("a");
        recipe.auxiliary = vec![ "pandas".into(), "Google_Cloud_Storage>=2".into(), "PANDAS".into() ];
        let plan = Plan::from_recipe(&recipe, &Manifest::default(), "/ctx").unwrap();
        assert_eq!(auxiliary_packages(&plan), vec![ "Google_Cloud_Storage>=2".to_string(), "pandas".to_string() ]);
    }

    #[test]
    fn plan_sets_output_flag_before_run() {
        let mut recipe = Recipe::new("a");
        recipe.environment.insert("SOLVER_TIME_LIMIT".into(), "900".into());
        let plan = Plan::from_recipe(&recipe, &Manifest::default(), "/ctx").unwrap();
        assert_eq!(plan.environment(), vec![ ("PYTHONUNBUFFERED", "1"), ("SOLVER_TIME_LIMIT", "900") ]);

        recipe.unbuffered = false;
        let plan = Plan::from_recipe(&recipe, &Manifest::default(), "/ctx").unwrap();
        assert_eq!(plan.environment(), vec![ ("SOLVER_TIME_LIMIT", "900") ]);
    }

    #[test]
    fn plan_rejects_illegal_recipes() {
        let mut recipe = Recipe::new("a");
        recipe.workdir = "app".into();
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::RelativeWorkdir{ .. })));

        let mut recipe = Recipe::new("a");
        recipe.script = "../escape.py".into();
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalScript{ .. })));

        let mut recipe = Recipe::new("a");
        recipe.interpreter = " ".into();
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::EmptyInterpreter)));

        let mut recipe = Recipe::new("a");
        recipe.environment.insert("1BAD".into(), "x".into());
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalEnvironmentKey{ .. })));

        let mut recipe = Recipe::new("a");
        recipe.auxiliary = vec![ "-e .".into() ];
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalAuxiliary{ .. })));
    }

    #[test]
    fn plan_new_checks_order() {
        let copy = Step::Copy{ source: "/p".into(), exclude: vec![] };
        let install = Step::Install{ origin: InstallOrigin::Auxiliary, packages: vec![] };
        let workdir = Step::Workdir{ path: "/app".into() };

        assert!(matches!(Plan::new(vec![]), Err(PlanError::MissingRun)));
        assert!(matches!(Plan::new(vec![ run_step(), run_step() ]), Err(PlanError::MultipleRuns{ index: 1 })));
        assert!(matches!(Plan::new(vec![ run_step(), copy.clone() ]), Err(PlanError::RunNotLast{ index: 1 })));
        assert!(matches!(Plan::new(vec![ copy.clone(), workdir.clone(), run_step() ]), Err(PlanError::WorkdirNotFirst{ index: 1 })));
        assert!(matches!(Plan::new(vec![ copy.clone(), install.clone(), run_step() ]), Err(PlanError::InstallAfterCopy{ index: 1 })));
        assert!(Plan::new(vec![ workdir, install, copy, run_step() ]).is_ok());
    }

    #[test]
    fn phase_moves_forward_only() {
        let plan = Plan::from_recipe(&Recipe::new("a"), &Manifest::from_str("numpy\n").unwrap(), "/ctx").unwrap();
        let mut phase = Phase::Building;
        let mut seen: Vec<Phase> = vec![];
        for step in &plan {
            phase = phase.advance(step);
            if seen.last() != Some(&phase) { seen.push(phase); }
        }
        phase = phase.exit(2);
        seen.push(phase);
        assert_eq!(seen, vec![ Phase::Building, Phase::DependenciesInstalled, Phase::PayloadCopied, Phase::Running, Phase::Exited{ code: 2 } ]);

        // Nothing leaves the exited phase
        assert_eq!(phase.advance(&run_step()), Phase::Exited{ code: 2 });
    }

    #[test]
    fn plan_rejects_values_that_break_dockerfile_lines() {
        let mut recipe = Recipe::new("a");
        recipe.environment.insert("GREETING".into(), "hi\nRUN rm -rf /".into());
        match Plan::from_recipe(&recipe, &Manifest::default(), "/ctx") {
            Err(PlanError::IllegalEnvironmentValue{ key, .. }) => assert_eq!(key, "GREETING"),
            other => panic!("Expected IllegalEnvironmentValue, got {:?}", other),
        }

        let mut recipe = Recipe::new("a");
        recipe.environment.insert("GREETING".into(), "hi\r".into());
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalEnvironmentValue{ .. })));

        // Tabs stay on the same line
        let mut recipe = Recipe::new("a");
        recipe.environment.insert("COLUMNS".into(), "a\tb".into());
        assert!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx").is_ok());

        for base in [ "", "python:3.9-slim\nRUN id", "python:3.9-slim AS x" ] {
            let mut recipe = Recipe::new("a");
            recipe.base = base.into();
            assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalBase{ .. })), "base {:?} was accepted", base);
        }

        let recipe = Recipe::new("a\nRUN id");
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalName{ .. })));

        let mut recipe = Recipe::new("a");
        recipe.workdir = "/app\nRUN id".into();
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalWorkdir{ .. })));

        let mut recipe = Recipe::new("a");
        recipe.auxiliary = vec![ "pandas; python_version > '3'\nRUN id".into() ];
        assert!(matches!(Plan::from_recipe(&recipe, &Manifest::default(), "/ctx"), Err(PlanError::IllegalAuxiliary{ .. })));
    }

    #[test]
    fn failure_policy_per_step() {
        assert_eq!(Step::Workdir{ path: "/app".into() }.failure_policy(), FailurePolicy::Abort);
        assert_eq!(Step::Install{ origin: InstallOrigin::Auxiliary, packages: vec![] }.failure_policy(), FailurePolicy::Abort);
        assert_eq!(run_step().failure_policy(), FailurePolicy::Continue);
    }
}
