//  COMMON.rs
//    by Lut99
//
//  Created:
//    14 Feb 2022, 14:21:21
//  Last edited:
//    22 Mar 2023, 09:31:48
//  Auto updated?
//    Yes
//
//  Description:
//!   Contains common definitions across the runner and the executors.
//

use std::process::ExitStatus;


/***** CONSTANTS *****/
/// Added to a signal number to form the exit code of a script killed by that signal (as shells do).
pub const SIGNAL_EXIT_OFFSET: i32 = 128;





/***** ENUMS *****/
/// Defines the different ways the batch script can return.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptOutcome {
    /// The script was forcefully stopped by some external force
    Stopped{ signal: i32 },
    /// The script failed on its own
    Failed{ code: i32 },
    /// The script completed successfully
    Finished,
}

impl ScriptOutcome {
    /// Returns whether the script completed successfully.
    #[inline]
    pub fn is_success(&self) -> bool { matches!(self, ScriptOutcome::Finished) }

    /// Returns the exit code the launcher exits with for this outcome.
    #[inline]
    pub fn exit_code(&self) -> i32 {
        match self {
            ScriptOutcome::Stopped{ signal } => SIGNAL_EXIT_OFFSET + signal,
            ScriptOutcome::Failed{ code }    => *code,
            ScriptOutcome::Finished          => 0,
        }
    }
}

impl From<ExitStatus> for ScriptOutcome {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(0)    => ScriptOutcome::Finished,
            Some(code) => ScriptOutcome::Failed{ code },
            None       => {
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    if let Some(signal) = status.signal() { return ScriptOutcome::Stopped{ signal }; }
                }
                ScriptOutcome::Failed{ code: -1 }
            },
        }
    }
}





/***** TESTS *****/
