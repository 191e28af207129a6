pub mod builder;
pub mod engine;
pub mod error;
pub mod export;
pub mod inventory;
pub mod mapping;
pub mod normalize;
pub mod tags;
pub mod types;
