pub mod app;
pub mod domain;
pub mod feed;
pub mod hook;
pub mod infra;
pub mod ports;
