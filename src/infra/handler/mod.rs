//! Generic category handlers.
//!
//! Integration-specific senders live with the embedding application; these
//! cover logging and fanning one category out to several handlers.

pub mod fanout;
pub mod log;

pub use fanout::FanoutHandler;
pub use log::LogHandler;
