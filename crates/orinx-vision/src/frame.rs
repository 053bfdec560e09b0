//! Decoded frame and the encodings the codec understands.

use std::fmt;

/// Pixel layout of an incoming image message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageEncoding {
    /// 8-bit red, green, blue triplets.
    Rgb8,
    /// One 16-bit sample per pixel, high byte first (depth images).
    Gray16,
    /// A tag the codec has no decoder for.
    Unknown(String),
}

impl ImageEncoding {
    /// Map the `encoding` field of an image message to a decoder.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "rgb8" => Self::Rgb8,
            "16UC1" | "mono16" => Self::Gray16,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb8 => write!(f, "rgb8"),
            Self::Gray16 => write!(f, "16UC1"),
            Self::Unknown(tag) => write!(f, "{tag}"),
        }
    }
}

/// A fully decoded image, ready for display.
///
/// Frames are never mutated after the codec returns them; consumers share
/// them behind an `Arc` and replace them wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA bytes, row-major, `width * height * 4` long, no padding.
    pub pixels: Vec<u8>,
    /// Encoding the frame was decoded from.
    pub source_encoding: ImageEncoding,
}

impl DecodedFrame {
    /// RGBA value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_decoders() {
        assert_eq!(ImageEncoding::from_tag("rgb8"), ImageEncoding::Rgb8);
        assert_eq!(ImageEncoding::from_tag("16UC1"), ImageEncoding::Gray16);
        assert_eq!(ImageEncoding::from_tag("mono16"), ImageEncoding::Gray16);
        assert_eq!(
            ImageEncoding::from_tag("bgr8"),
            ImageEncoding::Unknown("bgr8".into())
        );
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() {
        let frame = DecodedFrame {
            width: 1,
            height: 1,
            pixels: vec![1, 2, 3, 255],
            source_encoding: ImageEncoding::Rgb8,
        };
        assert_eq!(frame.pixel(0, 0), Some([1, 2, 3, 255]));
        assert_eq!(frame.pixel(1, 0), None);
    }
}
