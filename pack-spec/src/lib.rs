//  LIB.rs
//    by Lut99
//
//  Created:
//    13 Mar 2023, 13:18:44
//  Last edited:
//    20 Mar 2023, 11:02:19
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the recipe, manifest and step plan of a pack, i.e., the
//!   description of how a batch script is packaged and run.
//

// Declare modules
pub mod arch;
pub mod manifest;
pub mod recipe;
pub mod steps;
