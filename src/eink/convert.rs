//! Conversion of raw frames into the panel's native buffer layout.
//!
//! The controller RAM of the 2.13inch panel is portrait: 122 columns by 250 rows, one bit per
//! pixel, each row padded to 16 bytes. A cleared bit is black. Landscape frames are rotated so
//! that frame pixel `(x, y)` lands on native column `y` of native row `249 - x`.

use super::error::FrameError;
use super::frame::{Frame, PixelFormat, PANEL_HEIGHT, PANEL_WIDTH};

/// Native columns (the landscape height).
pub const NATIVE_WIDTH: usize = PANEL_HEIGHT as usize;
/// Native rows (the landscape width).
pub const NATIVE_HEIGHT: usize = PANEL_WIDTH as usize;
/// Bytes per native row.
pub const LINE_BYTES: usize = NATIVE_WIDTH.div_ceil(8);
/// Size of a device buffer in bytes.
pub const DEVICE_BUFFER_LEN: usize = LINE_BYTES * NATIVE_HEIGHT;

const LUMA_THRESHOLD: u32 = 128;

/// A frame packed in the panel's native 1-bit layout.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceBuffer(Vec<u8>);

impl DeviceBuffer {
    /// A buffer filled with a single byte, as written by the panel's clear command.
    pub fn filled(fill: u8) -> Self {
        Self(vec![fill; DEVICE_BUFFER_LEN])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the native pixel at `(column, row)` is black, or `None` outside the panel.
    pub fn is_black(&self, column: usize, row: usize) -> Option<bool> {
        if column >= NATIVE_WIDTH || row >= NATIVE_HEIGHT {
            return None;
        }
        self.0
            .get(column / 8 + row * LINE_BYTES)
            .map(|byte| byte & (0x80 >> (column % 8)) == 0)
    }

    fn set_black(&mut self, column: usize, row: usize) {
        self.0[column / 8 + row * LINE_BYTES] &= !(0x80 >> (column % 8));
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let black = (0..NATIVE_HEIGHT)
            .flat_map(|row| (0..NATIVE_WIDTH).map(move |column| (column, row)))
            .filter(|&(column, row)| self.is_black(column, row) == Some(true))
            .count();
        f.debug_struct("DeviceBuffer")
            .field("len", &self.0.len())
            .field("black_pixels", &black)
            .finish()
    }
}

/// Converts a validated frame into a device buffer.
///
/// The frame must already have panel dimensions; the data length is checked here.
pub fn to_device_buffer(frame: &Frame) -> Result<DeviceBuffer, FrameError> {
    frame.check_data_length()?;

    let width = frame.width as usize;
    let mut buffer = DeviceBuffer::filled(0xFF);

    for y in 0..frame.height as usize {
        for x in 0..width {
            if is_dark(&frame.data, frame.format, width, x, y) {
                buffer.set_black(y, NATIVE_HEIGHT - x - 1);
            }
        }
    }

    Ok(buffer)
}

fn is_dark(data: &[u8], format: PixelFormat, width: usize, x: usize, y: usize) -> bool {
    let index = y * width + x;
    match format {
        PixelFormat::Rgba => {
            let p = &data[index * 4..index * 4 + 3];
            luma(p[0], p[1], p[2]) < LUMA_THRESHOLD
        }
        PixelFormat::Rgb => {
            let p = &data[index * 3..index * 3 + 3];
            luma(p[0], p[1], p[2]) < LUMA_THRESHOLD
        }
        PixelFormat::Luma => u32::from(data[index]) < LUMA_THRESHOLD,
        PixelFormat::Mono => {
            let byte = data[y * width.div_ceil(8) + x / 8];
            byte & (0x80 >> (x % 8)) == 0
        }
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u32 {
    (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000
}
