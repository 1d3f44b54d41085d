//! Request handler module
//!
//! Routing dispatch plus the message board handlers behind it.

pub mod error;
pub mod messages;
pub mod request;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
