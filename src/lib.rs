// src/lib.rs

pub mod config;
pub mod constants;
pub mod errors;
pub mod language;
pub mod orchestrator;
pub mod scripts;
pub mod tweaks;
pub mod utils;
pub mod verification;
pub mod worker;
