//! Peer Directory Module
//!
//! Maintains each node's bounded, partial view of the overlay and implements
//! the login/join protocol that builds the topology.
//!
//! ## Core Mechanisms
//! - **Bounded view**: at most three addresses, self included. Self is pinned; among
//!   the other entries the two most recently inserted survive.
//! - **Login**: a peer announces itself and receives the responder's whole view.
//! - **Join**: this node logs in at a target and adopts the returned view.
//!   Growing the view further (logging in at each learned address) is the caller's choice.
//! - **Sampling**: random subsets avoid always fanning out in the same order.

pub mod handlers;
pub mod service;
pub mod types;
