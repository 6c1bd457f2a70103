//! # Joystick Block Decoder
//!
//! Reads concatenated joystick blocks back into [`JoystickBlock`] records, for
//! logging and inspecting what was actually handed to the transport.

use super::protocol::*;
use crate::error::{JoystickError, Result};

/// Decode a single block from the front of `data`
///
/// # Returns
///
/// * `Result<(JoystickBlock, usize)>` - Decoded block and the number of bytes consumed
///
/// # Errors
///
/// Returns error if:
/// - The block is shorter than its size byte claims
/// - The tag is not [`JOYSTICK_BLOCK_TAG`]
/// - The counts disagree with the size byte
pub fn decode_block(data: &[u8]) -> Result<(JoystickBlock, usize)> {
    let (&size, rest) = data
        .split_first()
        .ok_or_else(|| JoystickError::Protocol("Empty block".to_string()))?;
    let size = size as usize;

    if rest.len() < size {
        return Err(JoystickError::Protocol(format!(
            "Block too short: expected {} bytes, got {}",
            size,
            rest.len()
        )));
    }
    let body = &rest[..size];

    let mut cursor = Cursor { body, pos: 0 };

    let tag = cursor.u8()?;
    if tag != JOYSTICK_BLOCK_TAG {
        return Err(JoystickError::Protocol(format!("Invalid block tag: 0x{:02X}", tag)));
    }

    let axis_count = cursor.u8()? as usize;
    let axes = (0..axis_count)
        .map(|_| cursor.u8().map(|b| b as i8))
        .collect::<Result<Vec<_>>>()?;

    let button_count = cursor.u8()?;
    let buttons = u16::from_be_bytes([cursor.u8()?, cursor.u8()?]);

    let pov_count = cursor.u8()? as usize;
    let povs = (0..pov_count)
        .map(|_| -> Result<i16> { Ok(i16::from_be_bytes([cursor.u8()?, cursor.u8()?])) })
        .collect::<Result<Vec<_>>>()?;

    if cursor.pos != size {
        return Err(JoystickError::Protocol(format!(
            "Block size {} does not match contents ({} bytes)",
            size, cursor.pos
        )));
    }

    Ok((
        JoystickBlock {
            axes,
            button_count,
            buttons,
            povs,
        },
        1 + size,
    ))
}

/// Decode every block in a packet
///
/// # Errors
///
/// Returns the first block error encountered.
pub fn decode_blocks(packet: &[u8]) -> Result<Vec<JoystickBlock>> {
    let mut blocks = Vec::new();
    let mut offset = 0;

    while offset < packet.len() {
        let (block, consumed) = decode_block(&packet[offset..])?;
        blocks.push(block);
        offset += consumed;
    }

    Ok(blocks)
}

struct Cursor<'a> {
    body: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn u8(&mut self) -> Result<u8> {
        let byte = self.body.get(self.pos).copied().ok_or_else(|| {
            JoystickError::Protocol(format!("Block truncated at byte {}", self.pos))
        })?;
        self.pos += 1;
        Ok(byte)
    }
}
