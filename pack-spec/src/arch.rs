//  ARCH.rs
//    by Lut99
//
//  Created:
//    14 Mar 2023, 10:02:17
//  Last edited:
//    22 Mar 2023, 15:20:31
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the image platforms a pack can be built for.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::str::FromStr;


/***** ERRORS *****/
/// Defines the error that may occur when resolving an image architecture.
#[derive(Debug)]
pub enum ArchError {
    /// The given name does not describe an architecture we can build images for.
    UnknownArchitecture{ raw: String },
    /// The machine we run on has an architecture we cannot build images for.
    UnsupportedHost{ raw: &'static str },
}

impl Display for ArchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ArchError::*;
        match self {
            UnknownArchitecture{ raw } => write!(f, "Unknown architecture '{}' (expected one of {})", raw, Arch::ALL.iter().map(|a| format!("'{}'", a)).collect::<Vec<String>>().join(", ")),
            UnsupportedHost{ raw }     => write!(f, "Host architecture '{}' is not supported; give an explicit architecture instead", raw),
        }
    }
}

impl Error for ArchError {}





/***** LIBRARY *****/
/// The CPU architecture of a pack image.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Arch {
    /// 64-bit x86 (`amd64` in Docker terms).
    X86_64,
    /// 64-bit ARM (`arm64` in Docker terms).
    Aarch64,
}

impl Arch {
    /// All the architectures we know of.
    pub const ALL: [Arch; 2] = [ Arch::X86_64, Arch::Aarch64 ];

    /// Returns the architecture of the machine this binary was built for.
    ///
    /// # Errors
    /// This function errors if that is not an architecture we can build images for.
    pub fn host() -> Result<Self, ArchError> {
        match std::env::consts::ARCH {
            "x86_64"  => Ok(Arch::X86_64),
            "aarch64" => Ok(Arch::Aarch64),
            raw       => Err(ArchError::UnsupportedHost{ raw }),
        }
    }



    /// Returns the name Docker uses for this architecture.
    #[inline]
    pub fn docker_name(&self) -> &'static str {
        match self {
            Arch::X86_64  => "amd64",
            Arch::Aarch64 => "arm64",
        }
    }

    /// Returns the value for Docker's `--platform` flag (e.g., `linux/amd64`).
    #[inline]
    pub fn platform(&self) -> String { format!("linux/{}", self.docker_name()) }
}

impl Display for Arch {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Arch::X86_64  => write!(f, "x86_64"),
            Arch::Aarch64 => write!(f, "aarch64"),
        }
    }
}

impl FromStr for Arch {
    type Err = ArchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Accept both the kernel and the Docker names
        match value.to_lowercase().as_str() {
            "x86_64" | "amd64"  => Ok(Arch::X86_64),
            "aarch64" | "arm64" => Ok(Arch::Aarch64),
            _                   => Err(ArchError::UnknownArchitecture{ raw: value.into() }),
        }
    }
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_and_docker_names() {
        assert_eq!(Arch::from_str("amd64").unwrap(), Arch::X86_64);
        assert_eq!(Arch::from_str("ARM64").unwrap(), Arch::Aarch64);
        assert_eq!(Arch::X86_64.platform(), "linux/amd64");
        assert_eq!(Arch::Aarch64.platform(), "linux/arm64");
        for arch in Arch::ALL { assert_eq!(Arch::from_str(&arch.to_string()).unwrap(), arch); }
    }

    #[test]
    fn unknown_is_rejected() {
        match Arch::from_str("riscv64") {
            Err(ArchError::UnknownArchitecture{ raw }) => assert_eq!(raw, "riscv64"),
            other => panic!("Expected UnknownArchitecture, got {:?}", other),
        }
    }
}
