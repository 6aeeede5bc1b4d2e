//  LIB.rs
//    by Lut99
//
//  Created:
//    20 Sep 2022, 13:50:12
//  Last edited:
//    22 Mar 2023, 09:12:03
//  Auto updated?
//    Yes
//
//  Description:
//!   The packlet is the delegate executable inside a pack image. This
//!   library also contains the sequential step runner that executes a
//!   pack's plan, both in the image and on the local machine.
//

// Declare modules
pub mod common;
pub mod errors;
pub mod exec;
pub mod runner;
