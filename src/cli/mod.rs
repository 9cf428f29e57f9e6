//! CLI subcommand implementations for the lanemap binary.

pub mod info_cmd;
pub mod lanelets_cmd;
pub mod output;
pub mod refs_cmd;
pub mod stoplines_cmd;
