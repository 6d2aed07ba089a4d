//! # ntwk-station — camera link demo
//!
//! Streams a synthetic camera feed over an `ntwk-core` publisher, or
//! connects to one and reports the frames that arrive.
//!
//! ## Modes
//!
//! - **Publish**: advertise a port and send the test pattern at a fixed rate.
//! - **Subscribe**: dial a publisher and log frame rate and throughput.

pub mod config;
pub mod meter;
pub mod pattern;
pub mod service;
