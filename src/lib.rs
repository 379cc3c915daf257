//! Nuvo Essentia bridge
//!
//! Exposes the six zones of a Nuvo Essentia amplifier, reached through a
//! serial-to-IP gateway, as controllable devices for a home-automation host.
//!
//! This library provides:
//! - A one-exchange-per-connection TCP client for the gateway
//! - The status line codec and volume scale conversion
//! - Per-zone adapters with cached status and driver reporting
//! - An HTTP command surface with Server-Sent Events for reports

// =============================================================================
// Lints - Enforce code quality and consistency
// =============================================================================

#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod registry;
