//! Infrastructure adapters: config loading, logging setup, HTTP clients,
//! SQLite store, time, randomness.
pub mod config;
pub mod logging;
pub mod random;
pub mod reqwest_http;
pub mod sqlite_store;
pub mod system_clock;
pub mod time;
