pub mod cli;
pub mod commands;
pub mod coverage;
pub mod fragments;
pub mod refine;
pub mod tss;
pub mod utils;
