//! H.264/AVC 码流解析.
//!
//! - NAL 单元分割与类型识别 (Annex B)
//! - SPS 解析 (尺寸、帧率、宽高比)

pub mod nal;
pub mod sps;

pub use nal::{AnnexBReader, NalUnit, NalUnitType, split_annex_b};
pub use sps::{Sps, parse_sps};
