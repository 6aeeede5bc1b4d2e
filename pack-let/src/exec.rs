//  EXEC.rs
//    by Lut99
//
//  Created:
//    15 Mar 2023, 11:40:03
//  Last edited:
//    22 Mar 2023, 10:02:26
//  Auto updated?
//    Yes
//
//  Description:
//!   Runs the batch script: prints the markers around it and forwards
//!   its output line by line.
//

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::process::{Child, Command};

use pack_spec::steps::{FailurePolicy, Invocation};

use crate::common::ScriptOutcome;
use crate::errors::LetError;


/***** HELPER FUNCTIONS *****/
/// Writes a single line to the given output and flushes it immediately.
fn write_line<W: Write + ?Sized>(out: &mut W, line: &[u8]) -> Result<(), LetError> {
    out.write_all(line).map_err(|err| LetError::OutputWriteError{ err })?;
    if !line.ends_with(b"\n") { out.write_all(b"\n").map_err(|err| LetError::OutputWriteError{ err })?; }
    out.flush().map_err(|err| LetError::OutputWriteError{ err })
}





/***** LIBRARY *****/
/// Runs the script of the given invocation and forwards its stdout to the given output, line by line.
///
/// The script's stderr is inherited. The script gets no arguments and no stdin.
///
/// If forwarding fails (e.g., our own stdout is closed), the rest of the script's output is discarded and the error is logged as a warning, but the script is still waited for so its exit code survives.
///
/// # Arguments
/// - `invocation`: Describes the script to run.
/// - `workdir`: The directory to run the script in.
/// - `environment`: The environment variables to set for the script, in order.
/// - `out`: The output to forward the script's stdout to.
///
/// # Returns
/// How the script returned.
///
/// # Errors
/// This function errors if we could not launch the script or wait for it.
pub async fn run_script<W: Write + ?Sized>(invocation: &Invocation, workdir: &Path, environment: &[(String, String)], out: &mut W) -> Result<ScriptOutcome, LetError> {
    // Prepare the command
    let mut command = Command::new(&invocation.interpreter);
    command.arg(&invocation.script);
    command.current_dir(workdir);
    command.envs(environment.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::inherit());
    debug!("Running '{:?}'", command.as_std());

    // Launch it
    let mut child: Child = match command.spawn() {
        Ok(child) => child,
        Err(err)  => { return Err(LetError::ScriptLaunchError{ command: format!("{:?}", command.as_std()), err }); }
    };

    // Forward the output while it lives; only the first forwarding error is kept
    let mut forward_err: Option<LetError> = None;
    match child.stdout.take() {
        Some(stdout) => {
            let mut reader = BufReader::new(stdout);
            let mut line: Vec<u8> = Vec::with_capacity(256);
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => { break; },
                    Ok(_) => {
                        // Keep draining after a write error, so the script never blocks on a full pipe
                        if forward_err.is_some() { continue; }
                        if let Err(err) = write_line(out, &line) { forward_err = Some(err); }
                    },
                    Err(err) => {
                        if forward_err.is_none() { forward_err = Some(LetError::StdoutReadError{ err }); }
                        break;
                    },
                }
            }
        },
        None => { forward_err = Some(LetError::ClosedStdout); },
    }

    // Wait until it's done
    let status = match child.wait().await {
        Ok(status) => status,
        Err(err)   => { return Err(LetError::ScriptRunError{ err }); }
    };
    debug!("Script returned with {}", status);
    let outcome = ScriptOutcome::from(status);
    if let Some(err) = forward_err {
        warn!("{} (script output was lost from then on; script returned with exit code {})", err, outcome.exit_code());
    }
    Ok(outcome)
}



/// Runs the full sequence around the batch script: the start marker, the script itself and the completion markers.
///
/// With [`FailurePolicy::Continue`], the completion markers are always printed; with [`FailurePolicy::Abort`], only if the script succeeded. Either way, the outcome is returned untouched so the exit code can be propagated.
///
/// # Arguments
/// - `invocation`: Describes the script to run and the markers to print.
/// - `workdir`: The directory to run the script in.
/// - `environment`: The environment variables to set for the script, in order.
/// - `out`: The output to write the markers and the script's output to.
///
/// # Returns
/// How the script returned.
///
/// # Errors
/// This function errors if the script could not be run or the start marker could not be written. Failing to write the completion markers is only a warning, since the script has already returned by then.
pub async fn run_sequence<W: Write + ?Sized>(invocation: &Invocation, workdir: &Path, environment: &[(String, String)], out: &mut W) -> Result<ScriptOutcome, LetError> {
    write_line(out, invocation.markers.start.as_bytes())?;

    let outcome: ScriptOutcome = run_script(invocation, workdir, environment, out).await?;

    if outcome.is_success() || invocation.on_failure == FailurePolicy::Continue {
        if let Err(err) = write_line(out, invocation.markers.finished_for(&invocation.script).as_bytes()).and_then(|_| write_line(out, invocation.markers.done.as_bytes())) {
            warn!("Could not print completion markers: {}", err);
        }
    } else {
        warn!("Script '{}' failed with exit code {}; not printing completion markers", invocation.script, outcome.exit_code());
    }
    Ok(outcome)
}





/***** TESTS *****/
