//! 基本流码流解析器.

pub mod aac;
pub mod h264;
