// crates/aludel-cli/src/commands/mod.rs
//
// Command module declarations for the Aludel CLI.

pub mod check;
pub mod run;
