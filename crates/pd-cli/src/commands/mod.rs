//! CLI subcommand implementations.

pub mod events;
pub mod import;
pub mod normalize;
pub mod status;
pub mod util;
