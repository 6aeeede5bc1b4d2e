//  LIB.rs
//    by Lut99
// 
//  Created:
//    21 Sep 2022, 14:37:02
//  Last edited:
//    22 Mar 2023, 16:20:45
//  Auto updated?
//    Yes
// 
//  Description:
//!   The rcpsp-pack CLI library, which implements the subcommands of
//!   the `rcpsp-pack` executable.
// 

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

// Declare the modules
pub mod errors;
pub mod utils;
pub mod build_common;
pub mod build;
pub mod run;
pub mod verify;
