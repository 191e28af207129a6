// declarative inputs: engine options and field schemas read from TOON files
pub mod config;
