//! # Padsleep Library
//!
//! Disconnect idle Bluetooth game controllers.
//!
//! This library watches the raw input of every connected wireless controller
//! and drops its Bluetooth link once no input has been seen for the idle
//! timeout. It provides:
//!
//! - [`resolver`]: joystick node to hardware address resolution
//! - [`correlator`]: joining joystick nodes with live wireless links
//! - [`supervisor`]: the per-controller idle-timeout state machine
//! - [`registry`]: the registry of supervised controllers and the discovery loop

pub mod config;
pub mod correlator;
pub mod error;
pub mod identity;
pub mod input;
pub mod registry;
pub mod resolver;
pub mod supervisor;
pub mod wireless;
