pub mod config;
pub mod engine;
pub mod errors;
pub mod gates;
pub mod models;
pub mod phase;
pub mod store;
pub mod util;
