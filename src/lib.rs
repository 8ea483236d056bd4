//! Core library for the laserdaq application.
//!
//! This library contains the acquisition control subsystem for a
//! laser-profiling sensor: the authenticated device session, trigger
//! strategies, signal-conditioning filter setup, and the streaming
//! recorder that writes range profiles to disk until cancelled. The
//! vendor device driver is abstracted behind the [`driver::ProfileSensor`]
//! trait so the whole stack can be exercised against a mock sensor.

pub mod acquisition;
pub mod config;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod response;
pub mod session;
pub mod trigger;
