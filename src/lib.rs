//! Core library for the `ndt7-server` binary.
//!
//! This crate provides the building blocks of the ndt7 download subtest:
//! request validation and websocket negotiation, the per-connection
//! measurement loop with its BBR-based early stop, congestion-control
//! probing, and the TCP server shell with its CLI and configuration layers.
pub mod args;
pub mod config;
pub mod error;
pub mod ndt7;
pub mod probe;
pub mod server;
pub mod system;
