//! # liu-format
//!
//! Liu 流接收框架的传输层: 分块字节源与 MPEG-TS 解复用.
//!
//! 输入以任意大小、任意对齐的块到达. [`ChunkSource`] 按到达顺序保存
//! 这些块, [`TransportDemuxer`] 从中切出 TS 包并重组 PES 单元.

pub mod chunk_source;
pub mod demuxer;
pub mod stream;
pub mod ts;

// 重导出常用类型
pub use chunk_source::{AvReader, ChunkSource, MAX_READ_SIZE};
pub use demuxer::{DemuxHandler, StreamPacket, TransportDemuxer};
pub use stream::StreamInfo;
pub use ts::{StreamUnit, TsContext, TsStats};
