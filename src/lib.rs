//! Notify Relay: typed messages over a partitioned log, with
//! dead-lettering for anything that cannot be processed.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod log;
pub mod notify;
pub mod pipeline;
pub mod publisher;
