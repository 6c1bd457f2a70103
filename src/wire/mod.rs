//! # Joystick Wire Format
//!
//! Per-controller joystick blocks as consumed by robot-side firmware.
//!
//! This module handles:
//! - Block layout constants and the tag identifying joystick data
//! - Deterministic encoding of gated controller state
//! - Decoding transmitted packets back into records for diagnostics
//!
//! The outer network envelope (sequence number, control and station bytes) is
//! not produced here.

pub mod protocol;
pub mod encoder;
pub mod decoder;
