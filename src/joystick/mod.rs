//! # Joystick Input
//!
//! Controller sources and the registry that owns them.
//!
//! - [`source`]: the `RawController` capability and the sampling step
//! - [`normalize`]: deadzone, button threshold and d-pad to POV conversion
//! - [`keyboard`]: the keyboard-driven virtual controller
//! - [`evdev`]: Linux gamepads and keyboards, plus hotplug scanning
//! - [`registry`]: dense controller ids, capacity and count notifications

pub mod evdev;
pub mod keyboard;
pub mod normalize;
pub mod registry;
pub mod source;
pub mod state;
