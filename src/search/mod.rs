//! Flooding Search Module
//!
//! Locates files across the overlay without any global index.
//!
//! ## Overview
//! A search checks the local file index, then forwards the query to every
//! directory neighbor in parallel with the hop budget (TTL) decremented. Each
//! receiving node repeats the process, skipping the neighbor it heard from.
//! Results from all branches are unioned on the way back.
//!
//! ## Termination
//! TTL strictly decreases per hop and a node that reaches zero stops
//! forwarding. Copies of a query arriving over a second path are recognized
//! by their query ID and dropped.
//!
//! ## Submodules
//! - **`engine`**: search start, query relay and fan-out.
//! - **`history`**: bounded query-ID history used for de-duplication.
//! - **`handlers`**: HTTP handlers for the Axum web server.
//! - **`types`**: query and result DTOs.

pub mod engine;
pub mod handlers;
pub mod history;
pub mod types;
