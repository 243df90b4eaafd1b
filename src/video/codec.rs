//! BITMAPINFOHEADER codec-private record for the `V_MS/VFW/FOURCC` track.

use super::Canvas;

pub const HEADER_LEN: usize = 40;

/// 40-byte little-endian bitmap header. The height is stored negative to
/// mark top-down BGRA rows; the size field stays 0 to match the stream
/// format downstream tools already accept.
pub struct BitmapInfoHeader {
    pub width: i32,
    pub height: i32,
}

impl BitmapInfoHeader {
    pub fn for_canvas(canvas: Canvas) -> Self {
        BitmapInfoHeader {
            width: canvas.width as i32,
            height: -(canvas.height as i32),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut b = [0u8; HEADER_LEN];
        // size (0), then width, height, planes, bit count; the compression,
        // image size, resolution, and palette fields stay zero
        b[4..8].copy_from_slice(&self.width.to_le_bytes());
        b[8..12].copy_from_slice(&self.height.to_le_bytes());
        b[12..14].copy_from_slice(&1u16.to_le_bytes());
        b[14..16].copy_from_slice(&32u16.to_le_bytes());
        b
    }
}
