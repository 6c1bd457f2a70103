//! # Joystick Block Encoder
//!
//! Serializes gated controller state into joystick blocks.
//!
//! The encoder holds no state: the same input always yields the same bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::protocol::*;
use crate::joystick::state::{MAX_AXES, MAX_BUTTONS};
use crate::safety::GatedController;

/// Convert a normalized axis to its transmitted byte
///
/// Positive values scale by 127 and negative values by 128, so both ends of
/// the range reach the signed byte limits. Results are rounded half away from
/// zero, clamped to `[-128, 127]`, and sent as two's complement.
///
/// # Examples
///
/// ```
/// use frc_ds_joystick::wire::encoder::axis_to_byte;
///
/// assert_eq!(axis_to_byte(1.0), 0x7F);
/// assert_eq!(axis_to_byte(-1.0), 0x80);
/// assert_eq!(axis_to_byte(0.0), 0x00);
/// ```
pub fn axis_to_byte(value: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }

    let scaled = if value < 0.0 {
        value * AXIS_SCALE_NEGATIVE
    } else {
        value * AXIS_SCALE_POSITIVE
    };

    scaled.round().clamp(-128.0, 127.0) as i8 as u8
}

/// Pack button states into the 16-bit bitfield, bit i = button i
///
/// Buttons past the sixteenth are ignored.
pub fn button_bitfield(buttons: &[bool]) -> u16 {
    buttons
        .iter()
        .take(MAX_BUTTONS)
        .enumerate()
        .filter(|&(_, &pressed)| pressed)
        .fold(0u16, |bits, (i, _)| bits | (1 << i))
}

/// Append one controller's block to `buf`
///
/// Axes past [`MAX_AXES`], buttons past [`MAX_BUTTONS`] and POVs past
/// [`MAX_POVS`] are dropped so the counts always fit the layout.
pub fn encode_block(controller: &GatedController, buf: &mut BytesMut) {
    let axes = &controller.axes[..controller.axes.len().min(MAX_AXES)];
    let button_count = controller.buttons.len().min(MAX_BUTTONS);
    let povs = &controller.povs[..controller.povs.len().min(MAX_POVS)];

    let size = block_payload_len(axes.len(), povs.len());
    buf.reserve(1 + size);

    buf.put_u8(size as u8);
    buf.put_u8(JOYSTICK_BLOCK_TAG);

    buf.put_u8(axes.len() as u8);
    for &axis in axes {
        buf.put_u8(axis_to_byte(axis));
    }

    buf.put_u8(button_count as u8);
    buf.put_u16(button_bitfield(&controller.buttons));

    buf.put_u8(povs.len() as u8);
    for &pov in povs {
        buf.put_i16(pov);
    }
}

/// Encode every controller's block, concatenated in order
///
/// No outer length prefix is added; an empty slice yields an empty packet.
///
/// # Examples
///
/// ```
/// use frc_ds_joystick::safety::GatedController;
/// use frc_ds_joystick::wire::encoder::encode_packet;
///
/// let pad = GatedController {
///     axes: vec![1.0, -1.0],
///     buttons: vec![true, false, true],
///     povs: vec![-1],
/// };
/// let packet = encode_packet(&[pad]);
/// assert_eq!(
///     &packet[..],
///     &[10, 0x0C, 0x02, 0x7F, 0x80, 0x03, 0x00, 0x05, 0x01, 0xFF, 0xFF]
/// );
/// ```
pub fn encode_packet(controllers: &[GatedController]) -> Bytes {
    let mut buf = BytesMut::new();
    for controller in controllers {
        encode_block(controller, &mut buf);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_controller() -> GatedController {
        GatedController {
            axes: vec![1.0, -1.0],
            buttons: vec![true, false, true],
            povs: vec![-1],
        }
    }

    #[test]
    fn test_axis_boundaries() {
        assert_eq!(axis_to_byte(1.0), 0x7F);
        assert_eq!(axis_to_byte(-1.0), 0x80);
        assert_eq!(axis_to_byte(0.0), 0x00);
        assert_eq!(axis_to_byte(0.999), 0x7F);
    }

    #[test]
    fn test_axis_intermediate_values() {
        assert_eq!(axis_to_byte(0.5), 64); // 63.5 rounds away from zero
        assert_eq!(axis_to_byte(-0.5), (-64i8) as u8);
        assert_eq!(axis_to_byte(0.25), 32); // 31.75
        assert_eq!(axis_to_byte(-0.05), (-6i8) as u8); // -6.4
    }

    #[test]
    fn test_axis_clamping() {
        assert_eq!(axis_to_byte(2.0), 0x7F);
        assert_eq!(axis_to_byte(-5.0), 0x80);
        assert_eq!(axis_to_byte(f32::NAN), 0x00);
        assert_eq!(axis_to_byte(f32::INFINITY), 0x00);
    }

    #[test]
    fn test_button_bitfield() {
        let mut buttons = vec![false; 16];
        buttons[0] = true;
        buttons[2] = true;
        let bits = button_bitfield(&buttons);
        assert_eq!(bits.to_be_bytes(), [0x00, 0x05]);
    }

    #[test]
    fn test_button_bitfield_high_byte() {
        let mut buttons = vec![false; 16];
        buttons[8] = true;
        buttons[15] = true;
        assert_eq!(button_bitfield(&buttons).to_be_bytes(), [0x81, 0x00]);
    }

    #[test]
    fn test_button_bitfield_ignores_extra() {
        let buttons = vec![true; 20];
        assert_eq!(button_bitfield(&buttons), 0xFFFF);
        assert_eq!(button_bitfield(&[]), 0);
    }

    #[test]
    fn test_reference_block_armed() {
        let packet = encode_packet(&[reference_controller()]);
        assert_eq!(
            &packet[..],
            &[10, 0x0C, 0x02, 0x7F, 0x80, 0x03, 0x00, 0x05, 0x01, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_reference_block_neutral() {
        let neutral = GatedController {
            axes: vec![0.0, 0.0],
            buttons: vec![false, false, false],
            povs: vec![-1],
        };
        let packet = encode_packet(&[neutral]);
        assert_eq!(
            &packet[..],
            &[10, 0x0C, 0x02, 0x00, 0x00, 0x03, 0x00, 0x00, 0x01, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_pov_angle_big_endian() {
        let pad = GatedController {
            axes: vec![],
            buttons: vec![],
            povs: vec![315],
        };
        let packet = encode_packet(&[pad]);
        // size, tag, axisCount, buttonCount, bits(2), povCount, pov(2)
        assert_eq!(&packet[..], &[8, 0x0C, 0, 0, 0, 0, 1, 0x01, 0x3B]);
    }

    #[test]
    fn test_size_byte_matches_block() {
        let pad = GatedController {
            axes: vec![0.1; 6],
            buttons: vec![true; 16],
            povs: vec![90],
        };
        let packet = encode_packet(&[pad]);
        assert_eq!(packet[0] as usize, packet.len() - 1);
    }

    #[test]
    fn test_blocks_concatenate_in_order() {
        let first = reference_controller();
        let second = GatedController {
            axes: vec![0.0],
            buttons: vec![],
            povs: vec![0],
        };
        let packet = encode_packet(&[first, second]);

        assert_eq!(packet.len(), 11 + 10);
        assert_eq!(packet[11], 9); // second block size
        assert_eq!(&packet[19..], &[0x00, 0x00]); // POV 0
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let controllers = vec![reference_controller(), reference_controller()];
        assert_eq!(encode_packet(&controllers), encode_packet(&controllers));
    }

    #[test]
    fn test_empty_packet() {
        assert!(encode_packet(&[]).is_empty());
    }

    #[test]
    fn test_oversized_controller_truncated() {
        let pad = GatedController {
            axes: vec![1.0; 9],
            buttons: vec![true; 24],
            povs: vec![-1; 20],
        };
        let packet = encode_packet(&[pad]);

        assert_eq!(packet[2] as usize, MAX_AXES);
        assert_eq!(packet[3 + MAX_AXES] as usize, MAX_BUTTONS);
        assert_eq!(packet[6 + MAX_AXES] as usize, MAX_POVS);
        assert_eq!(packet[0] as usize, packet.len() - 1);
    }
}
