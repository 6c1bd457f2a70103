//! # FRC Driver Station Joystick Core
//!
//! Captures gamepad and keyboard input and turns it into the joystick blocks
//! a driver station sends to an FRC robot every control tick.
//!
//! Raw device state never reaches the encoder directly: every value passes
//! through the [`safety`] gate, which reports neutral input while the robot
//! is disabled or a controller is blacklisted.

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod joystick;
pub mod safety;
pub mod transport;
pub mod wire;
