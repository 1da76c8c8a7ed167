//! Configuration loading and directory layout

mod config;

pub use config::*;
