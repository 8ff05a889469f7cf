//! # liu-codec
//!
//! Liu 流接收框架的基本流层: H.264 / AAC 码流解析, 访问单元组装,
//! 视频解压会话接口与 AAC 解码路径.
//!
//! ## 视频路径
//!
//! ```text
//! PES 负载 → Annex B 切分 → (首次) SPS/PPS → 格式描述 + 解压会话
//!                        → 剔除参数集 → 长度前缀访问单元 → 会话
//! ```
//!
//! ## 使用示例
//!
//! ```rust
//! use liu_codec::access_unit::build_access_unit;
//! use liu_codec::parsers::h264::split_annex_b;
//! use liu_core::Timestamp;
//!
//! let payload = [0, 0, 0, 1, 0x65, 0x88, 0x84];
//! let nalus = split_annex_b(&payload).unwrap();
//! let au = build_access_unit(&nalus, Timestamp(3000)).unwrap();
//! assert_eq!(&au.data[..], &[0, 0, 0, 3, 0x65, 0x88, 0x84]);
//! ```

pub mod access_unit;
pub mod assembler;
pub mod audio;
pub mod decoders;
pub mod parsers;
pub mod session;
pub mod stream_type;

// 重导出常用类型
pub use access_unit::{AccessUnit, NAL_LENGTH_SIZE, ParameterSets, build_access_unit};
pub use assembler::{AccessUnitAssembler, ParsedPayload, parse_and_classify};
pub use audio::{AacDecodePath, AudioDecoder, AudioFormat, AudioSink, DecodedAudio};
pub use session::threaded::{FrameDecoder, ThreadedSession, ThreadedSessionFactory};
pub use session::{
    DecodeContext, DecodedImage, DecompressionSession, FormatDescription, FrameCallback,
    SessionConfig, SessionFactory, VideoDecoder,
};
pub use stream_type::StreamType;
