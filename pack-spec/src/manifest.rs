//  MANIFEST.rs
//    by Lut99
//
//  Created:
//    13 Mar 2023, 14:02:51
//  Last edited:
//    20 Mar 2023, 09:47:16
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the dependency manifest of a pack, i.e., the (pip-style)
//!   requirements file listing what needs to be installed before the
//!   batch script may run.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};


/***** CONSTANTS *****/
/// The version comparison operators we accept, longest first so that matching is greedy.
const OPERATORS: [ &str; 8 ] = [ "===", "==", "!=", "<=", ">=", "~=", "<", ">" ];





/***** ERRORS *****/
/// Defines errors that relate to loading a manifest file.
#[derive(Debug)]
pub enum ManifestError {
    /// Could not read the manifest file.
    FileReadError{ path: PathBuf, err: std::io::Error },

    /// The manifest contains a pip option line, which we don't support.
    UnsupportedOption{ line: usize, raw: String },
    /// A requirement has control characters (e.g., a newline) in it.
    IllegalCharacter{ line: usize, raw: String },
    /// A requirement has an illegal package name.
    IllegalName{ line: usize, raw: String },
    /// A requirement has an extras list that is never closed.
    UnterminatedExtras{ line: usize, raw: String },
    /// A requirement has a version constraint that we cannot parse.
    IllegalConstraint{ line: usize, raw: String },
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ManifestError::*;
        match self {
            FileReadError{ path, err } => write!(f, "Could not read manifest file '{}': {}", path.display(), err),

            UnsupportedOption{ line, raw }  => write!(f, "Line {}: pip options are not supported in a manifest (got '{}')", line, raw),
            IllegalCharacter{ line, raw }   => write!(f, "Line {}: {:?} contains control characters", line, raw),
            IllegalName{ line, raw }        => write!(f, "Line {}: '{}' does not start with a valid package name", line, raw),
            UnterminatedExtras{ line, raw } => write!(f, "Line {}: extras list in '{}' is not closed with ']'", line, raw),
            IllegalConstraint{ line, raw }  => write!(f, "Line {}: could not parse version constraint in '{}'", line, raw),
        }
    }
}

impl Error for ManifestError {}





/***** HELPER FUNCTIONS *****/
/// Returns whether the given string is a valid (PEP 508) package name.
fn is_valid_name(name: &str) -> bool {
    let first = match name.chars().next() { Some(c) => c, None => { return false; } };
    let last  = match name.chars().last() { Some(c) => c, None => { return false; } };
    first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Parses a single comma-separated version constraint into its normalized form (no whitespace).
///
/// # Returns
/// The normalized constraint, or `None` if it is not a valid constraint.
fn parse_constraint(raw: &str) -> Option<String> {
    let mut clauses: Vec<String> = vec![];
    for clause in raw.split(',') {
        let clause: &str = clause.trim();
        let op: &str = OPERATORS.iter().find(|op| clause.starts_with(*op))?;
        let version: &str = clause[op.len()..].trim();
        if version.is_empty() || version.chars().any(|c| c.is_whitespace() || OPERATORS.iter().any(|op| op.starts_with(c))) { return None; }
        clauses.push(format!("{}{}", op, version));
    }
    Some(clauses.join(","))
}





/***** LIBRARY *****/
/// Defines a single requirement in the manifest, i.e., a package name with an optional version constraint.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Requirement {
    /// The name of the package as written.
    pub name       : String,
    /// Any extras requested for the package (`name[extra1,extra2]`).
    pub extras     : Vec<String>,
    /// The version constraint, if any (e.g., `==1.21.0` or `>=1.0,<2.0`).
    pub constraint : Option<String>,
    /// The environment marker, if any (everything after a `;`).
    pub marker     : Option<String>,
}

impl Requirement {
    /// Constructor for a Requirement without extras or marker.
    ///
    /// # Arguments
    /// - `name`: The name of the package.
    /// - `constraint`: The version constraint, if any.
    ///
    /// # Returns
    /// A new Requirement instance.
    #[inline]
    pub fn new(name: impl Into<String>, constraint: Option<impl Into<String>>) -> Self {
        Self {
            name       : name.into(),
            extras     : vec![],
            constraint : constraint.map(|c| c.into()),
            marker     : None,
        }
    }



    /// Parses a single line of a manifest into a Requirement.
    ///
    /// # Arguments
    /// - `line`: The line number this requirement was found on (used for debugging purposes).
    /// - `raw`: The (already trimmed, comment-stripped) text of the requirement.
    ///
    /// # Errors
    /// This function errors if the requirement is not in a format we recognize.
    pub fn parse(line: usize, raw: &str) -> Result<Self, ManifestError> {
        if raw.starts_with('-') { return Err(ManifestError::UnsupportedOption{ line, raw: raw.into() }); }
        if raw.chars().any(|c| c.is_control()) { return Err(ManifestError::IllegalCharacter{ line, raw: raw.into() }); }

        // Split the environment marker off first
        let (spec, marker): (&str, Option<&str>) = match raw.find(';') {
            Some(idx) => (raw[..idx].trim(), Some(raw[idx + 1..].trim())),
            None      => (raw, None),
        };

        // Read the name
        let name_len: usize = spec.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')).unwrap_or(spec.len());
        let name: &str = &spec[..name_len];
        if !is_valid_name(name) { return Err(ManifestError::IllegalName{ line, raw: raw.into() }); }
        let mut rest: &str = spec[name_len..].trim_start();

        // Read the extras, if any
        let mut extras: Vec<String> = vec![];
        if let Some(inner) = rest.strip_prefix('[') {
            let end: usize = match inner.find(']') {
                Some(end) => end,
                None      => { return Err(ManifestError::UnterminatedExtras{ line, raw: raw.into() }); },
            };
            for extra in inner[..end].split(',') {
                let extra: &str = extra.trim();
                if !is_valid_name(extra) { return Err(ManifestError::IllegalName{ line, raw: raw.into() }); }
                extras.push(extra.into());
            }
            rest = inner[end + 1..].trim();
        }

        // The rest is the constraint
        let rest: &str = rest.trim();
        let constraint: Option<String> = if rest.is_empty() {
            None
        } else {
            match parse_constraint(rest) {
                Some(constraint) => Some(constraint),
                None             => { return Err(ManifestError::IllegalConstraint{ line, raw: raw.into() }); },
            }
        };

        Ok(Self {
            name : name.into(),
            extras,
            constraint,
            marker : marker.filter(|m| !m.is_empty()).map(|m| m.into()),
        })
    }



    /// Returns the name of the package normalized as pip would compare it (lowercase, runs of `-`, `_` and `.` collapsed to `-`).
    pub fn normalized_name(&self) -> String { normalize_name(&self.name) }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() { write!(f, "[{}]", self.extras.join(","))?; }
        if let Some(constraint) = &self.constraint { write!(f, "{}", constraint)?; }
        if let Some(marker) = &self.marker { write!(f, "; {}", marker)?; }
        Ok(())
    }
}



/// Normalizes a package name the way pip compares them.
///
/// # Arguments
/// - `name`: The name to normalize.
///
/// # Returns
/// The lowercase name with every run of `-`, `_` and `.` replaced by a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut res: String = String::with_capacity(name.len());
    let mut in_sep: bool = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == '.' {
            if !in_sep { res.push('-'); }
            in_sep = true;
        } else {
            res.push(c.to_ascii_lowercase());
            in_sep = false;
        }
    }
    res
}



/// The dependency manifest: the ordered list of requirements that are installed before the batch script runs.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Manifest {
    /// The requirements, in the order they are declared.
    pub requirements : Vec<Requirement>,
}

impl Manifest {
    /// Reads the Manifest from the given file.
    ///
    /// # Arguments
    /// - `path`: The path to the requirements file to read.
    ///
    /// # Returns
    /// A new Manifest with the requirements in the file.
    ///
    /// # Errors
    /// This function errors if we could not read the file or if any of its lines was not a valid requirement.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path: &Path = path.as_ref();
        let contents: String = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err)     => { return Err(ManifestError::FileReadError{ path: path.into(), err }); },
        };
        let manifest: Self = Self::from_str(&contents)?;
        debug!("Read {} requirement(s) from '{}'", manifest.len(), path.display());
        Ok(manifest)
    }



    /// Returns whether the manifest mentions a package with the given name (compared the way pip compares names).
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        let name: String = normalize_name(name);
        self.requirements.iter().any(|r| r.normalized_name() == name)
    }

    /// Returns the number of requirements in the manifest.
    #[inline]
    pub fn len(&self) -> usize { self.requirements.len() }

    /// Returns whether the manifest has no requirements at all.
    #[inline]
    pub fn is_empty(&self) -> bool { self.requirements.is_empty() }

    /// Returns an iterator over the requirements, in order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Requirement> { self.requirements.iter() }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements: Vec<Requirement> = vec![];
        for (i, line) in s.lines().enumerate() {
            // Strip comments & whitespace
            let line: &str = match line.find('#') {
                Some(idx) => &line[..idx],
                None      => line,
            };
            let line: &str = line.trim();
            if line.is_empty() { continue; }

            requirements.push(Requirement::parse(i + 1, line)?);
        }
        Ok(Self{ requirements })
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item     = &'a Requirement;
    type IntoIter = std::slice::Iter<'a, Requirement>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter { self.requirements.iter() }
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_keeps_order_and_skips_comments() {
        let manifest = Manifest::from_str("# solver stack\nnumpy==1.21.0\n\ndocplex>=2.23  # CP Optimizer bindings\ncplex\n").unwrap();
        let names: Vec<&str> = manifest.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![ "numpy", "docplex", "cplex" ]);
        assert_eq!(manifest.requirements[0].constraint.as_deref(), Some("==1.21.0"));
        assert_eq!(manifest.requirements[1].constraint.as_deref(), Some(">=2.23"));
        assert_eq!(manifest.requirements[2].constraint, None);
    }

    #[test]
    fn requirement_with_extras_constraint_and_marker() {
        let req = Requirement::parse(1, "google-cloud-storage[tracing] >= 2.0 , < 3 ; python_version >= '3.7'").unwrap();
        assert_eq!(req.name, "google-cloud-storage");
        assert_eq!(req.extras, vec![ "tracing".to_string() ]);
        assert_eq!(req.constraint.as_deref(), Some(">=2.0,<3"));
        assert_eq!(req.marker.as_deref(), Some("python_version >= '3.7'"));
        assert_eq!(req.to_string(), "google-cloud-storage[tracing]>=2.0,<3; python_version >= '3.7'");
    }

    #[test]
    fn manifest_rejects_options_and_bad_lines() {
        assert!(matches!(Manifest::from_str("numpy\n-r other.txt\n"), Err(ManifestError::UnsupportedOption{ line: 2, .. })));
        assert!(matches!(Manifest::from_str("=1.0\n"), Err(ManifestError::IllegalName{ line: 1, .. })));
        assert!(matches!(Manifest::from_str("numpy[extra\n"), Err(ManifestError::UnterminatedExtras{ line: 1, .. })));
        assert!(matches!(Manifest::from_str("numpy 1.0\n"), Err(ManifestError::IllegalConstraint{ line: 1, .. })));
        assert!(matches!(Manifest::from_str("numpy==\n"), Err(ManifestError::IllegalConstraint{ line: 1, .. })));
    }

    #[test]
    fn manifest_contains_uses_normalized_names() {
        let manifest = Manifest::from_str("Google_Cloud.Storage==2.8.0\n").unwrap();
        assert!(manifest.contains("google-cloud-storage"));
        assert!(!manifest.contains("google-cloud"));
        assert_eq!(normalize_name("a__B.-c"), "a-b-c");
    }

    #[test]
    fn manifest_from_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        assert!(matches!(Manifest::from_path(&path), Err(ManifestError::FileReadError{ .. })));

        fs::write(&path, "numpy==1.24.2\n").unwrap();
        assert_eq!(Manifest::from_path(&path).unwrap().len(), 1);
    }
}
