//  MAIN.rs
//    by Lut99
//
//  Created:
//    21 Sep 2022, 14:34:28
//  Last edited:
//    23 Mar 2023, 11:12:40
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint to the CLI binary.
//

#[macro_use]
extern crate human_panic;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use console::style;
use dotenvy::dotenv;
use log::LevelFilter;

use pack_cli::{build, run, verify};
use pack_cli::errors::{BuildError, CliError};
use pack_let::runner::DEFAULT_PIP;
use pack_spec::arch::Arch;


/***** ARGUMENTS *****/
#[derive(Parser)]
#[clap(name = "rcpsp-pack", version = env!("CARGO_PKG_VERSION"), about = "Packages and runs the RCPSP batch job.")]
struct Cli {
    #[clap(short, long, action, global = true, help = "Enable debug mode")]
    debug: bool,
    #[clap(subcommand)]
    sub_command: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    #[clap(name = "build", about = "Build a pack into a container image")]
    Build {
        #[clap(name = "FILE", help = "Path to the recipe file to build")]
        file: PathBuf,
        #[clap(short, long, help = "The architecture for which to compile the image.")]
        arch: Option<Arch>,
        #[clap(short, long, help = "Path to the packlet binary to put in the image (defaults to the one next to this executable)")]
        launcher: Option<PathBuf>,
        #[clap(short, long, help = "The tag of the image (defaults to the recipe's tag, or '<name>:latest')")]
        tag: Option<String>,
        #[clap(long, action, help = "Don't delete build files")]
        keep_files: bool,
    },

    #[clap(name = "dockerfile", about = "Print the Dockerfile that would be generated for a pack")]
    Dockerfile {
        #[clap(name = "FILE", help = "Path to the recipe file")]
        file: PathBuf,
    },

    #[clap(name = "run", about = "Run a pack on this machine, exiting with the exit code of its script")]
    Run {
        #[clap(name = "FILE", help = "Path to the recipe file to run")]
        file: PathBuf,
        #[clap(short, long, help = "The working directory to copy the payload to (defaults to running in the payload directory itself)")]
        workdir: Option<PathBuf>,
        #[clap(long, action, help = "Don't install any packages")]
        skip_install: bool,
        #[clap(long, env = "PACK_PIP", default_value = DEFAULT_PIP, help = "The installer command to use")]
        pip: String,
    },

    #[clap(name = "verify", about = "Verify a pack and print its plan")]
    Verify {
        #[clap(name = "FILE", help = "Path to the recipe file to verify")]
        file: PathBuf,
    },
}





/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() -> Result<()> {
    // Parse the CLI arguments
    dotenv().ok();
    let options = Cli::parse();

    // Prepare the logger
    let mut logger = env_logger::builder();
    logger.format_module_path(false);

    if options.debug {
        logger.filter_module("pack", LevelFilter::Debug).init();
    } else {
        logger.filter_module("pack", LevelFilter::Warn).init();

        setup_panic!(Metadata {
            name: "RCPSP Pack CLI".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            authors: env!("CARGO_PKG_AUTHORS").replace(":", ", ").into(),
            homepage: env!("CARGO_PKG_HOMEPAGE").into(),
        });
    }

    // Run the subcommand given
    match run(options).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{}: {}", style("error").bold().red(), err);
            process::exit(1);
        }
    }
}

/// Runs one of the subcommand as given on the Cli.
///
/// # Arguments
/// - `options`: The struct with (parsed) Cli-options and subcommands.
///
/// # Returns
/// The code to exit with if the subcommand executed successfully (`run` passes on its script's code), or a CliError otherwise.
async fn run(options: Cli) -> Result<i32, CliError> {
    use SubCommand::*;
    match options.sub_command {
        Build { file, arch, launcher, tag, keep_files } => {
            // Determine the host architecture
            let arch: Arch = match arch {
                Some(arch) => arch,
                None       => match Arch::host() {
                    Ok(arch) => arch,
                    Err(err) => { return Err(CliError::BuildError{ err: BuildError::HostArchError{ err } }); }
                },
            };

            build::handle(arch, file, launcher, tag, keep_files).await.map_err(|err| CliError::BuildError{ err })?;
            Ok(0)
        },

        Dockerfile { file } => {
            let dockerfile: String = build::dockerfile(file).map_err(|err| CliError::BuildError{ err })?;
            print!("{}", dockerfile);
            Ok(0)
        },

        Run { file, workdir, skip_install, pip } => {
            run::handle(file, workdir, skip_install, pip).await.map_err(|err| CliError::RunError{ err })
        },

        Verify { file } => {
            verify::handle(file).map_err(|err| CliError::VerifyError{ err })?;
            Ok(0)
        },
    }
}
