//! # Joystick Block Constants and Types
//!
//! Layout of one controller block, big-endian for multi-byte fields:
//!
//! ```text
//! size | 0x0C | axisCount | axis[0..n] | buttonCount | buttons(hi, lo) | povCount | pov[0..m](hi, lo)
//! ```
//!
//! `size` counts every byte after itself.

/// Tag identifying a joystick data block
pub const JOYSTICK_BLOCK_TAG: u8 = 0x0C;

/// Bytes in the button bitfield
pub const BUTTON_BITFIELD_SIZE: usize = 2;

/// Bytes per POV entry
pub const POV_ENTRY_SIZE: usize = 2;

/// Most POV entries a block may carry
pub const MAX_POVS: usize = 12;

/// Scale applied to positive axis values
pub const AXIS_SCALE_POSITIVE: f32 = 127.0;

/// Scale applied to negative axis values
pub const AXIS_SCALE_NEGATIVE: f32 = 128.0;

/// Block length for the given shape, size byte excluded
///
/// tag(1) + axisCount(1) + axes + buttonCount(1) + bitfield(2) + povCount(1) + povs
pub const fn block_payload_len(axis_count: usize, pov_count: usize) -> usize {
    1 + 1 + axis_count + 1 + BUTTON_BITFIELD_SIZE + 1 + pov_count * POV_ENTRY_SIZE
}

/// One joystick block as read back from a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoystickBlock {
    /// Axis bytes as signed values
    pub axes: Vec<i8>,

    /// Declared number of buttons
    pub button_count: u8,

    /// Button bitfield, bit i = button i
    pub buttons: u16,

    /// POV angles, -1 when not pressed
    pub povs: Vec<i16>,
}

impl JoystickBlock {
    /// Whether button `index` is set in the bitfield
    pub fn button(&self, index: usize) -> bool {
        index < 16 && (self.buttons >> index) & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag() {
        assert_eq!(JOYSTICK_BLOCK_TAG, 0x0C);
    }

    #[test]
    fn test_block_payload_len() {
        // 2 axes, 1 POV: the reference block carries size 10
        assert_eq!(block_payload_len(2, 1), 10);
        assert_eq!(block_payload_len(0, 0), 6);
        assert_eq!(block_payload_len(6, 1), 14);
    }

    #[test]
    fn test_block_button_lookup() {
        let block = JoystickBlock {
            axes: vec![],
            button_count: 3,
            buttons: 0b101,
            povs: vec![-1],
        };
        assert!(block.button(0));
        assert!(!block.button(1));
        assert!(block.button(2));
        assert!(!block.button(40));
    }
}
