//  MAIN.rs
//    by Lut99
//
//  Created:
//    20 Sep 2022, 13:53:43
//  Last edited:
//    22 Mar 2023, 11:48:30
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint to the in-container delegate executable that runs the
//!   batch script once and exits with its exit code.
//

use std::io;
use std::path::PathBuf;
use std::process;

use clap::builder::FalseyValueParser;
use clap::Parser;
use dotenvy::dotenv;
use log::{debug, LevelFilter};

use pack_let::errors::LetError;
use pack_let::runner::{LocalExecutor, Runner};
use pack_spec::recipe::{LocalRecipe, LOCAL_RECIPE_PATH};
use pack_spec::steps::Plan;


/***** ARGUMENTS *****/
#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct Opts {
    /// The local recipe that describes what to run
    #[clap(short, long, env = "PACKLET_RECIPE", default_value = LOCAL_RECIPE_PATH)]
    recipe: PathBuf,
    /// Prints debug info. From the environment, anything but an empty value, `0`, `false`, `no`, `off`, `n` or `f` turns it on.
    #[clap(short, long, action, env = "DEBUG", value_parser = FalseyValueParser::new())]
    debug: bool,
}





/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() {
    // Parse the arguments
    dotenv().ok();
    let Opts{ recipe, debug } = Opts::parse();

    // Configure logger.
    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    if debug {
        logger.filter_level(LevelFilter::Debug).init();
    } else {
        logger.filter_level(LevelFilter::Info).init();
    }
    debug!("PACKLET v{}", env!("CARGO_PKG_VERSION"));
    debug!("Initializing...");

    // Wrap actual execution, so we can always log errors.
    match run(recipe).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            log::error!("{}", err);
            process::exit(1);
        }
    }
}

/// Runs the batch script described by the local recipe at the given path.
///
/// # Arguments
/// - `path`: The path to the local recipe.
///
/// # Returns
/// The exit code of the batch script on success, or a LetError otherwise.
async fn run(path: PathBuf) -> Result<i32, LetError> {
    let local: LocalRecipe = match LocalRecipe::from_path(&path) {
        Ok(local) => local,
        Err(err)  => { return Err(LetError::LocalRecipeError{ path, err }); }
    };
    let plan: Plan = local.plan().map_err(|err| LetError::PlanError{ err })?;
    debug!("Running pack '{}':\n{}", local.name, plan);

    let mut runner = Runner::new(LocalExecutor::new());
    runner.execute(&plan, &mut io::stdout()).await
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_from_environment() {
        // Everything touching DEBUG lives in this one test, since tests share the process environment
        std::env::remove_var("DEBUG");
        assert!(!Opts::try_parse_from([ "packlet" ]).unwrap().debug);
        assert!(Opts::try_parse_from([ "packlet", "--debug" ]).unwrap().debug);

        for (value, expected) in [ ("1", true), ("true", true), ("yes", true), ("0", false), ("false", false), ("", false) ] {
            std::env::set_var("DEBUG", value);
            match Opts::try_parse_from([ "packlet" ]) {
                Ok(opts) => assert_eq!(opts.debug, expected, "DEBUG={:?}", value),
                Err(err) => panic!("DEBUG={:?} failed to parse: {}", value, err),
            }
        }
        std::env::remove_var("DEBUG");
    }
}
