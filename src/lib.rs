//! # Liu (流)
//!
//! 纯 Rust 实现的实时 MPEG-TS 接收框架.
//!
//! 从网络按任意大小的块接收传输流, 自动识别包长并同步, 解析 PAT/PMT,
//! 重组 PES, 把 H.264 视频送入异步解压会话, 把 ADTS AAC 解码为 PCM.
//!
//! # 快速开始
//!
//! ```rust
//! use bytes::Bytes;
//! use liu::format::{DemuxHandler, StreamPacket, TransportDemuxer};
//! use liu::format::StreamInfo;
//! use liu::codec::StreamType;
//!
//! struct Printer;
//!
//! impl DemuxHandler for Printer {
//!     fn on_stream_info(&mut self, pid: u16, stream_type: StreamType, info: &StreamInfo) {
//!         println!("pid {pid:#x}: {stream_type} {info}");
//!     }
//!
//!     fn on_packet(&mut self, packet: &StreamPacket<'_>) {
//!         println!("pid {:#x}: {} 字节", packet.pid, packet.payload.len());
//!     }
//! }
//!
//! let mut demuxer = TransportDemuxer::new();
//! demuxer.feed(Bytes::from_static(&[0x47, 0x1F, 0xFF, 0x10]), &mut Printer);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `liu-core` | 错误, 时间戳, 像素格式, 位读写, CRC |
//! | `liu-codec` | H.264/AAC 解析, 访问单元组装, 解码会话 |
//! | `liu-format` | 块数据源, TS 解复用 |

pub mod config;
pub mod logging;
pub mod router;

/// 核心类型与工具
pub use liu_core as core;

/// 基本流解析与解码
pub use liu_codec as codec;

/// 传输流解复用
pub use liu_format as format;

pub use config::ClientConfig;
pub use router::{RenderSink, RouterStats, StreamRouter};

/// 获取 Liu 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
