//! Local File Index
//!
//! The node's catalogue of shared files. Searches consult it for local hits,
//! the transfer server resolves download requests through it, and completed
//! transfers feed new files back into it.

pub mod handlers;
pub mod service;
pub mod types;
