//! Raw image payload → RGBA decoding.
//!
//! [`decode`] validates the whole buffer up front and only then walks it, so a
//! short or oddly strided payload is reported as an error and never read out
//! of bounds.  [`validate`] runs the same checks on a length alone.

use thiserror::Error;
use tracing::trace;

use crate::frame::{DecodedFrame, ImageEncoding};

/// Why a payload could not be turned into a [`DecodedFrame`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported image encoding '{0}'")]
    UnsupportedEncoding(String),

    /// The payload is shorter than `stride * height`.  Also used when that
    /// product overflows, since no buffer could satisfy it.
    #[error("image payload truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// An explicit row stride is narrower than one row of pixels.
    #[error("row stride {stride} is smaller than the minimum {min}")]
    InvalidStride { stride: usize, min: usize },
}

type Expand = fn(&[u8], &mut Vec<u8>);

/// Byte geometry of a payload that is known to be decodable.
struct Layout {
    expand: Expand,
    row_bytes: usize,
    stride: usize,
    needed: usize,
}

fn layout(
    encoding: &ImageEncoding,
    available: usize,
    width: u32,
    height: u32,
    row_stride: Option<usize>,
) -> Result<Layout, DecodeError> {
    let (bpp, expand): (usize, Expand) = match encoding {
        ImageEncoding::Rgb8 => (3, expand_rgb8),
        ImageEncoding::Gray16 => (2, expand_gray16),
        ImageEncoding::Unknown(tag) => return Err(DecodeError::UnsupportedEncoding(tag.clone())),
    };

    let too_big = DecodeError::Truncated {
        needed: usize::MAX,
        available,
    };
    let row_bytes = (width as usize).checked_mul(bpp).ok_or_else(|| too_big.clone())?;
    let stride = match row_stride {
        Some(stride) if stride < row_bytes => {
            return Err(DecodeError::InvalidStride {
                stride,
                min: row_bytes,
            });
        }
        Some(stride) => stride,
        None => row_bytes,
    };
    let needed = stride.checked_mul(height as usize).ok_or(too_big)?;
    if available < needed {
        return Err(DecodeError::Truncated { needed, available });
    }
    Ok(Layout {
        expand,
        row_bytes,
        stride,
        needed,
    })
}

/// Check that a payload of `available` bytes would decode, without reading
/// it.  Fails exactly when [`decode`] would.
///
/// # Errors
///
/// The same [`DecodeError`]s as [`decode`].
pub fn validate(
    encoding: &ImageEncoding,
    available: usize,
    width: u32,
    height: u32,
    row_stride: Option<usize>,
) -> Result<(), DecodeError> {
    layout(encoding, available, width, height, row_stride).map(drop)
}

/// Decode one image payload into RGBA.
///
/// `row_stride` is the distance in bytes between the starts of consecutive
/// rows; `None` means rows are tightly packed.  Bytes past the end of a pixel
/// row are skipped.
///
/// # Errors
///
/// - [`DecodeError::UnsupportedEncoding`] – no decoder for `encoding`; the
///   payload is not inspected.
/// - [`DecodeError::InvalidStride`] – `row_stride` is smaller than one row.
/// - [`DecodeError::Truncated`] – `raw` holds fewer than `stride * height`
///   bytes.
pub fn decode(
    encoding: &ImageEncoding,
    raw: &[u8],
    width: u32,
    height: u32,
    row_stride: Option<usize>,
) -> Result<DecodedFrame, DecodeError> {
    let Layout {
        expand,
        row_bytes,
        stride,
        needed,
    } = layout(encoding, raw.len(), width, height, row_stride)?;

    let (w, h) = (width as usize, height as usize);
    let mut pixels = Vec::with_capacity(w * h * 4);
    for row in raw[..needed].chunks_exact(stride.max(1)).take(h) {
        expand(&row[..row_bytes], &mut pixels);
    }
    // Zero-width rows yield nothing from the loop above.
    pixels.resize(w * h * 4, 0);

    trace!(%encoding, width, height, stride, "decoded frame");
    Ok(DecodedFrame {
        width,
        height,
        pixels,
        source_encoding: encoding.clone(),
    })
}

fn expand_rgb8(row: &[u8], out: &mut Vec<u8>) {
    for px in row.chunks_exact(3) {
        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
}

/// Two bytes per sample, first byte high.  The display level is the sample
/// shifted down to 8 bits.
fn expand_gray16(row: &[u8], out: &mut Vec<u8>) {
    for px in row.chunks_exact(2) {
        let sample = (u16::from(px[0]) << 8) | u16::from(px[1]);
        let level = (sample >> 8) as u8;
        out.extend_from_slice(&[level, level, level, 255]);
    }
}
