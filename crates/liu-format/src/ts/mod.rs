//! MPEG-TS (Transport Stream) 解析.
//!
//! # 关键 PID
//! - PID 0x0000: PAT (Program Association Table)
//! - PID 0x1FFF: Null packet (填充)
//!
//! # 包大小
//! 标准包 188 字节, M2TS 在包前附加 4 字节时间码 (192), DVB-ASI 与 ATSC
//! 在包后附加 16/20 字节纠错码 (204/208). 所有变体从同步字节开始的前 188
//! 字节都是标准 TS 包.

pub mod context;
pub mod packet;
pub mod pes;
pub mod psi;

pub use context::{PacketStatus, PayloadStatus, ResyncStatus, StreamUnit, TsContext, TsStats};

/// 标准 TS 包大小
pub const TS_PACKET_SIZE: usize = 188;
/// TS 同步字节
pub const TS_SYNC_BYTE: u8 = 0x47;
/// PAT PID
pub const PID_PAT: u16 = 0x0000;
/// 空包 PID
pub const PID_NULL: u16 = 0x1FFF;
/// 支持的包大小, 检测时按此顺序优先
pub const PACKET_SIZES: [usize; 4] = [188, 192, 204, 208];
/// 最大包大小
pub const MAX_PACKET_SIZE: usize = 208;
/// 检测包大小时要求的后续同步字节数
pub const DETECT_PACKETS: usize = 4;
