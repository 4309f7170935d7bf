//! Image pipeline: header guards and the decode cache.
//!
//! Bytes never reach a platform decoder before the header guard has read the
//! advertised dimensions and checked them against the decompression-bomb
//! limits. Decoding itself is asynchronous: the resolver completes onto a
//! channel and the renderer drains completions at the top of each frame.

pub mod cache;
pub mod headers;

pub use cache::{
    BitmapDecoder, ImageCache, ImageCacheConfig, ImageReply, ImageResolver, ImageSource,
    ImageState,
};
pub use headers::{sniff_dimensions, ImageDimensions, ImageError, MAX_DIMENSION, MAX_PIXELS};
