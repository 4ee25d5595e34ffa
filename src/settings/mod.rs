//! Layered settings: a TOML file picked by build profile or `--settings`,
//! then `LATCHKEY__`-prefixed environment overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
