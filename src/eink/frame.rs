//! Frame model and dimension validation.

use super::error::{DimensionError, FrameError};

/// Horizontal resolution of the panel in landscape orientation.
pub const PANEL_WIDTH: u32 = 250;
/// Vertical resolution of the panel in landscape orientation.
pub const PANEL_HEIGHT: u32 = 122;

/// Pixel layout of a frame's raw data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit channels in R, G, B, A order.
    Rgba,
    /// 8-bit channels in R, G, B order.
    Rgb,
    /// One 8-bit luminance byte per pixel.
    Luma,
    /// One bit per pixel, MSB first, rows padded to a whole byte. A set bit is white.
    Mono,
}

impl PixelFormat {
    /// Wire tag of this format.
    pub const fn tag(self) -> u8 {
        match self {
            PixelFormat::Rgba => 0,
            PixelFormat::Rgb => 1,
            PixelFormat::Luma => 2,
            PixelFormat::Mono => 3,
        }
    }

    /// Parses a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, FrameError> {
        match tag {
            0 => Ok(PixelFormat::Rgba),
            1 => Ok(PixelFormat::Rgb),
            2 => Ok(PixelFormat::Luma),
            3 => Ok(PixelFormat::Mono),
            other => Err(FrameError::UnknownFormat(other)),
        }
    }

    /// Calculates the number of bytes a frame of the given size occupies.
    pub const fn buffer_size(self, width: u32, height: u32) -> usize {
        let (width, height) = (width as usize, height as usize);
        match self {
            PixelFormat::Rgba => width * height * 4,
            PixelFormat::Rgb => width * height * 3,
            PixelFormat::Luma => width * height,
            PixelFormat::Mono => width.div_ceil(8) * height,
        }
    }
}

/// An immutable snapshot of pixels pushed by a caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            format,
            width,
            height,
            data,
        }
    }

    /// Checks that the raw data length matches the declared format and size.
    pub fn check_data_length(&self) -> Result<(), FrameError> {
        let expected = self.format.buffer_size(self.width, self.height);
        if self.data.len() != expected {
            return Err(FrameError::DataLength {
                format: self.format,
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Checks a frame's declared dimensions against the panel resolution.
///
/// This has no side effects and must run before anything touches the refresh state or the
/// panel mode.
pub fn validate(width: u32, height: u32) -> Result<(), DimensionError> {
    if width != PANEL_WIDTH || height != PANEL_HEIGHT {
        return Err(DimensionError { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_panel_size() {
        assert!(validate(250, 122).is_ok());
    }

    #[test]
    fn test_validate_rejects_portrait() {
        let err = validate(122, 250).unwrap_err();
        assert_eq!(err, DimensionError { width: 122, height: 250 });
        assert!(err.to_string().contains("250x122"));
        assert!(err.to_string().contains("122x250"));
    }

    #[test]
    fn test_buffer_size() {
        assert_eq!(PixelFormat::Rgba.buffer_size(250, 122), 122_000);
        assert_eq!(PixelFormat::Rgb.buffer_size(250, 122), 91_500);
        assert_eq!(PixelFormat::Luma.buffer_size(250, 122), 30_500);
        // 250 bits round up to 32 bytes per row
        assert_eq!(PixelFormat::Mono.buffer_size(250, 122), 3_904);
    }

    #[test]
    fn test_format_tags() {
        for format in [PixelFormat::Rgba, PixelFormat::Rgb, PixelFormat::Luma, PixelFormat::Mono] {
            assert_eq!(PixelFormat::from_tag(format.tag()), Ok(format));
        }
        assert_eq!(PixelFormat::from_tag(9), Err(FrameError::UnknownFormat(9)));
    }

    #[test]
    fn test_check_data_length() {
        let frame = Frame::new(PixelFormat::Luma, 250, 122, vec![0; 30_500]);
        assert!(frame.check_data_length().is_ok());

        let short = Frame::new(PixelFormat::Rgba, 250, 122, vec![0; 100]);
        assert!(matches!(
            short.check_data_length(),
            Err(FrameError::DataLength { expected: 122_000, actual: 100, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_validate_rejects_other_sizes(width in 0u32..1024, height in 0u32..1024) {
            prop_assume!((width, height) != (PANEL_WIDTH, PANEL_HEIGHT));
            prop_assert!(validate(width, height).is_err());
        }
    }
}
