//! `orinx-vision` – pure image decoding for camera topics.
//!
//! The bridge delivers `sensor_msgs/msg/Image` payloads in whatever encoding
//! the camera driver produces.  [`decode`] turns one of those payloads into a
//! tightly packed RGBA [`DecodedFrame`] that any renderer can blit directly.
//!
//! | Wire tag | [`ImageEncoding`] | Bytes per pixel |
//! |---|---|---|
//! | `rgb8` | [`ImageEncoding::Rgb8`] | 3 |
//! | `16UC1`, `mono16` | [`ImageEncoding::Gray16`] | 2 |
//! | anything else | [`ImageEncoding::Unknown`] | rejected |
//!
//! Nothing here does I/O or spawns tasks; the middleware decides when and
//! where decoding runs.

pub mod codec;
pub mod frame;

pub use codec::{DecodeError, decode, validate};
pub use frame::{DecodedFrame, ImageEncoding};
