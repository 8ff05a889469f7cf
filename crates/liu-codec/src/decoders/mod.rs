//! 具体解码器实现.

#[cfg(feature = "symphonia-backend")]
pub mod aac;

#[cfg(feature = "symphonia-backend")]
pub use aac::SymphoniaAacDecoder;
