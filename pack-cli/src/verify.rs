//  VERIFY.rs
//    by Lut99
// 
//  Created:
//    17 Oct 2022, 16:11:00
//  Last edited:
//    22 Mar 2023, 16:35:40
//  Auto updated?
//    Yes
// 
//  Description:
//!   Implements functions for various verification tasks.
// 

use std::path::Path;

use console::style;

pub use crate::errors::VerifyError as Error;
use crate::utils::{check_script, load_pack, Pack, WorkdirChoice};


/***** LIBRARY *****/
/// Verifies the given recipe file: loads it with its manifest, builds the plan and checks the script is there.
/// 
/// # Arguments
/// - `file`: Path to the recipe file to validate.
/// 
/// # Returns
/// The loaded pack, if it was valid.
/// 
/// # Errors
/// This function errors if we failed to verify it.
pub fn pack(file: impl AsRef<Path>) -> Result<Pack, Error> {
    let pack: Pack = load_pack(file, WorkdirChoice::Recipe).map_err(|err| Error::PackError{ err })?;
    check_script(&pack).map_err(|err| Error::PackError{ err })?;
    Ok(pack)
}

/// Verifies the given recipe file and prints its plan.
/// 
/// # Errors
/// This function errors if we failed to verify it.
pub fn handle(file: impl AsRef<Path>) -> Result<(), Error> {
    let pack: Pack = pack(file)?;
    println!("Pack {} ({} step(s)):", style(&pack.recipe.name).bold().cyan(), pack.plan.steps().len());
    println!("{}", pack.plan);
    println!("{}", style("OK").bold().green());
    Ok(())
}





/***** TESTS *****/
