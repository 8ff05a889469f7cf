//! 传输流解复用器.
//!
//! 每收到一个网络缓冲区就追加到 [`ChunkSource`], 然后驱动 [`TsContext`]
//! 处理所有完整的包, 直到数据不足. 已完成的 PES 单元在同一次调用内按完成
//! 顺序交给 [`DemuxHandler`]; 单元带有流变化标记时先上报流信息.

use bytes::Bytes;
use liu_codec::StreamType;
use liu_core::Timestamp;
use log::debug;

use crate::chunk_source::ChunkSource;
use crate::stream::StreamInfo;
use crate::ts::{PacketStatus, PayloadStatus, ResyncStatus, StreamUnit, TsContext, TsStats};

/// 输出给下游的 PES 负载
///
/// 负载借用自解复用器, 只在回调期间有效.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPacket<'a> {
    pub pid: u16,
    pub payload: &'a [u8],
    pub pts: Timestamp,
    pub dts: Timestamp,
    /// 时长 (90 kHz), 未知时为 `None`
    pub duration: Option<i64>,
    pub stream_change: bool,
}

/// 解复用事件接收者
pub trait DemuxHandler {
    /// 流信息 (新发现的流或参数变化)
    fn on_stream_info(&mut self, pid: u16, stream_type: StreamType, info: &StreamInfo);

    /// 一个完整的 PES 负载
    fn on_packet(&mut self, packet: &StreamPacket<'_>);
}

/// 传输流解复用器
#[derive(Default)]
pub struct TransportDemuxer {
    source: ChunkSource,
    context: TsContext,
}

impl TransportDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个网络缓冲区并处理所有完整的包
    ///
    /// 数据不足不是错误: 剩余字节留在缓冲中等待下一次调用.
    pub fn feed<H: DemuxHandler + ?Sized>(&mut self, chunk: Bytes, handler: &mut H) {
        self.source.append(chunk);

        loop {
            if self.context.resync(&mut self.source) == ResyncStatus::NeedMoreData {
                return;
            }
            if self.context.process_ts_packet() == PacketStatus::Desync {
                self.context.shift();
                continue;
            }

            self.drain_units(handler);

            if self.context.has_pid_payload()
                && self.context.process_ts_payload() == PayloadStatus::ProgramChange
            {
                self.start_streams(handler);
            }
            // 负载可能完成一个定长 PES 单元
            self.drain_units(handler);

            self.context.go_next();
        }
    }

    fn drain_units<H: DemuxHandler + ?Sized>(&mut self, handler: &mut H) {
        while self.context.has_pid_stream_data() {
            let Some(unit) = self.context.next_stream_unit() else {
                break;
            };
            self.emit_unit(&unit, handler);
        }
    }

    fn emit_unit<H: DemuxHandler + ?Sized>(&self, unit: &StreamUnit, handler: &mut H) {
        if unit.stream_change {
            if let Some((stream_type, info)) = self.context.stream(unit.pid) {
                handler.on_stream_info(unit.pid, stream_type, info);
            }
        }
        let payload = unit.payload();
        if payload.is_empty() {
            return;
        }
        handler.on_packet(&StreamPacket {
            pid: unit.pid,
            payload,
            pts: unit.pts,
            dts: unit.dts,
            duration: unit.duration,
            stream_change: unit.stream_change,
        });
    }

    fn start_streams<H: DemuxHandler + ?Sized>(&mut self, handler: &mut H) {
        for pid in self.context.stream_pids() {
            self.context.start_streaming(pid);
            if !self.context.has_stream_info(pid) {
                debug!("TS: pid={pid:#06X} 编码类型未知, 暂不上报");
                continue;
            }
            if let Some((stream_type, info)) = self.context.stream(pid) {
                handler.on_stream_info(pid, stream_type, info);
            }
        }
    }

    pub fn source(&self) -> &ChunkSource {
        &self.source
    }

    pub fn context(&self) -> &TsContext {
        &self.context
    }

    pub fn stats(&self) -> TsStats {
        self.context.stats()
    }
}
