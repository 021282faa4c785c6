//! Application layer: the polling/dispatch pipeline and its supervision.
pub mod context;
pub mod dispatcher;
pub mod poller;
pub mod rate_limit;
pub mod supervisor;
