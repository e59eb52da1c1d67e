//! CLI subcommands.

pub mod common;
pub mod info;
pub mod ramp;
pub mod tile;
