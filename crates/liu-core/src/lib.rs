//! # liu-core
//!
//! Liu 流接收框架核心库, 提供错误类型、比特流读写、CRC 校验和时间戳工具.
//!
//! 其余 crate (liu-codec, liu-format) 都建立在这里的基础设施之上.

pub mod bitreader;
pub mod bitwriter;
pub mod crc;
pub mod error;
pub mod pixel_format;
pub mod timestamp;

// 重导出常用类型
pub use error::{LiuError, LiuResult};
pub use pixel_format::PixelFormat;
pub use timestamp::{NOPTS_VALUE, Timestamp};
