//! TS 解复用状态机.
//!
//! 调用方按固定顺序驱动:
//!
//! ```text
//! loop {
//!     resync            数据不足 → 返回
//!     process_ts_packet 包头非法 → shift, 继续
//!     next_stream_unit  取走已完成的 PES 单元
//!     process_ts_payload 节目变化 → start_streaming
//!     next_stream_unit
//!     go_next
//! }
//! ```
//!
//! 状态机不持有输入数据, 每次 [`TsContext::resync`] 通过 [`AvReader`]
//! 按绝对位置读取一个包.

use std::collections::{BTreeMap, HashMap, VecDeque};

use liu_codec::StreamType;
use liu_codec::parsers::aac::find_adts_sync;
use liu_codec::parsers::h264::{AnnexBReader, NalUnitType, parse_sps};
use liu_core::{LiuResult, Timestamp};
use log::{debug, info, trace, warn};

use super::packet::{TsHeader, parse_ts_header};
use super::pes::{PesAssembler, PesUnit};
use super::psi::{Pmt, SectionAssembler, parse_pat, parse_pmt, parse_section};
use super::{
    DETECT_PACKETS, MAX_PACKET_SIZE, PACKET_SIZES, PID_NULL, PID_PAT, TS_PACKET_SIZE, TS_SYNC_BYTE,
};
use crate::chunk_source::AvReader;
use crate::stream::StreamInfo;

/// [`TsContext::resync`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncStatus {
    /// 已定位到一个完整的包
    Ready,
    /// 数据不足, 等待更多输入
    NeedMoreData,
}

/// [`TsContext::process_ts_packet`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    Ok,
    /// 包头非法, 应前移一个字节重新同步
    Desync,
}

/// [`TsContext::process_ts_payload`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStatus {
    Ok,
    /// 节目拓扑 (PAT/PMT) 发生变化
    ProgramChange,
}

/// 解复用统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsStats {
    /// 处理的 TS 包数
    pub packets: u64,
    /// 重新同步时跳过的字节数
    pub skipped_bytes: u64,
    pub continuity_errors: u64,
    pub invalid_sections: u64,
    pub invalid_pes: u64,
    /// 跳过的加扰包数
    pub scrambled: u64,
    /// 输出的 PES 单元数
    pub units: u64,
}

/// 一个已完成的 PES 单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUnit {
    pub pid: u16,
    pub pts: Timestamp,
    /// 没有 DTS 时等于 PTS
    pub dts: Timestamp,
    /// 时长 (90 kHz), 未知时为 `None`
    pub duration: Option<i64>,
    /// 探测到流信息变化
    pub stream_change: bool,
    pes: PesUnit,
}

impl StreamUnit {
    /// PES 负载 (不含包头)
    pub fn payload(&self) -> &[u8] {
        self.pes.payload()
    }

    pub fn stream_id(&self) -> u8 {
        self.pes.header.stream_id
    }
}

#[derive(Debug)]
struct Program {
    pmt_pid: u16,
    version: Option<u8>,
    pcr_pid: u16,
}

#[derive(Debug)]
struct EsStream {
    program_number: u16,
    stream_type: StreamType,
    info: StreamInfo,
    streaming: bool,
    assembler: PesAssembler,
}

impl EsStream {
    /// 从单元负载探测流参数, 参数变化时返回 `true`
    fn probe(&mut self, payload: &[u8]) -> bool {
        match self.stream_type {
            StreamType::VideoH264 => probe_h264(payload, &mut self.info),
            StreamType::AudioAacAdts => probe_adts(payload, &mut self.info),
            _ => false,
        }
    }

    fn unit_duration(&self, payload: &[u8]) -> Option<i64> {
        match self.stream_type {
            StreamType::VideoH264 => {
                let (scale, rate) = (self.info.fps_scale, self.info.fps_rate);
                (scale > 0 && rate > 0).then(|| i64::from(scale) * 90_000 / i64::from(rate))
            }
            StreamType::AudioAacAdts => adts_duration(payload),
            _ => None,
        }
    }
}

fn probe_h264(payload: &[u8], info: &mut StreamInfo) -> bool {
    let sps = AnnexBReader::new(payload)
        .map_while(Result::ok)
        .filter(|nalu| nalu.nal_type == NalUnitType::Sps)
        .find_map(|nalu| parse_sps(&nalu.rbsp()).ok());
    let Some(sps) = sps else {
        return false;
    };

    let (fps_scale, fps_rate) = sps.frame_rate().unwrap_or((0, 0));
    let probed = StreamInfo {
        width: sps.width,
        height: sps.height,
        fps_scale,
        fps_rate,
        interlaced: !sps.frame_mbs_only,
        aspect: sps.display_aspect(),
        ..info.clone()
    };
    if probed == *info {
        return false;
    }
    *info = probed;
    true
}

fn probe_adts(payload: &[u8], info: &mut StreamInfo) -> bool {
    let Some((_, header)) = find_adts_sync(payload) else {
        return false;
    };
    let probed = StreamInfo {
        sample_rate: header.sample_rate(),
        channels: header.channels(),
        bits_per_sample: 16,
        ..info.clone()
    };
    if probed == *info {
        return false;
    }
    *info = probed;
    true
}

/// 单元内全部 ADTS 帧的总时长
fn adts_duration(payload: &[u8]) -> Option<i64> {
    let (mut offset, first) = find_adts_sync(payload)?;
    let mut samples = 0i64;
    while let Some((_, header)) = find_adts_sync(&payload[offset..]).filter(|(o, _)| *o == 0) {
        samples += i64::from(header.samples());
        offset += header.frame_length;
        if offset >= payload.len() {
            break;
        }
    }
    Some(samples * 90_000 / i64::from(first.sample_rate()))
}

/// 在检测窗口中寻找连续同步字节, 返回 (起点偏移, 包大小)
fn detect_packet_size(window: &[u8]) -> Option<(usize, usize)> {
    (0..MAX_PACKET_SIZE)
        .filter(|&offset| window.get(offset) == Some(&TS_SYNC_BYTE))
        .find_map(|offset| {
            PACKET_SIZES
                .iter()
                .find(|&&size| {
                    (1..=DETECT_PACKETS)
                        .all(|k| window.get(offset + k * size) == Some(&TS_SYNC_BYTE))
                })
                .map(|&size| (offset, size))
        })
}

/// TS 解复用状态机
pub struct TsContext {
    /// 当前候选包的绝对位置
    position: u64,
    packet_size: Option<usize>,
    /// 上一个包的同步字节在预期位置
    locked: bool,
    packet: [u8; TS_PACKET_SIZE],
    header: Option<TsHeader>,
    payload_pending: bool,
    pat_version: Option<u8>,
    pat_sections: SectionAssembler,
    programs: BTreeMap<u16, Program>,
    pmt_sections: HashMap<u16, SectionAssembler>,
    streams: BTreeMap<u16, EsStream>,
    continuity: HashMap<u16, u8>,
    completed: VecDeque<StreamUnit>,
    stats: TsStats,
}

impl Default for TsContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TsContext {
    pub fn new() -> Self {
        Self {
            position: 0,
            packet_size: None,
            locked: false,
            packet: [0; TS_PACKET_SIZE],
            header: None,
            payload_pending: false,
            pat_version: None,
            pat_sections: SectionAssembler::default(),
            programs: BTreeMap::new(),
            pmt_sections: HashMap::new(),
            streams: BTreeMap::new(),
            continuity: HashMap::new(),
            completed: VecDeque::new(),
            stats: TsStats::default(),
        }
    }

    /// 当前候选包的绝对位置
    pub fn position(&self) -> u64 {
        self.position
    }

    /// 检测到的包大小
    pub fn packet_size(&self) -> Option<usize> {
        self.packet_size
    }

    pub fn stats(&self) -> TsStats {
        self.stats
    }

    /// 定位到下一个包边界
    ///
    /// 首次调用时检测包大小. 失去同步后逐字节前移, 重新锁定要求下一个包的
    /// 同步字节也在预期位置.
    pub fn resync<R: AvReader + ?Sized>(&mut self, reader: &mut R) -> ResyncStatus {
        let packet_size = match self.packet_size {
            Some(size) => size,
            None => match self.detect(reader) {
                Some(size) => size,
                None => return ResyncStatus::NeedMoreData,
            },
        };

        loop {
            let need = if self.locked {
                packet_size
            } else {
                packet_size + 1
            };
            let Some(data) = reader.read_av(self.position, need) else {
                return ResyncStatus::NeedMoreData;
            };
            if data[0] == TS_SYNC_BYTE && (self.locked || data[packet_size] == TS_SYNC_BYTE) {
                self.packet.copy_from_slice(&data[..TS_PACKET_SIZE]);
                self.locked = true;
                return ResyncStatus::Ready;
            }
            if self.locked {
                debug!("TS: 在位置 {} 失去同步", self.position);
            }
            self.locked = false;
            self.position += 1;
            self.stats.skipped_bytes += 1;
        }
    }

    fn detect<R: AvReader + ?Sized>(&mut self, reader: &mut R) -> Option<usize> {
        let window = DETECT_PACKETS * MAX_PACKET_SIZE + MAX_PACKET_SIZE;
        loop {
            let data = reader.read_av(self.position, window)?;
            match detect_packet_size(data) {
                Some((offset, size)) => {
                    info!("TS: 检测到 {size} 字节包, 起点偏移 {offset}");
                    self.position += offset as u64;
                    self.stats.skipped_bytes += offset as u64;
                    self.packet_size = Some(size);
                    self.locked = true;
                    return Some(size);
                }
                None => {
                    trace!("TS: 检测窗口内没有连续同步字节");
                    self.position += MAX_PACKET_SIZE as u64;
                    self.stats.skipped_bytes += MAX_PACKET_SIZE as u64;
                }
            }
        }
    }

    /// 前移一个字节
    pub fn shift(&mut self) {
        self.position += 1;
        self.locked = false;
        self.stats.skipped_bytes += 1;
    }

    /// 前进到下一个包
    pub fn go_next(&mut self) {
        self.position += self.packet_size.unwrap_or(TS_PACKET_SIZE) as u64;
        self.header = None;
        self.payload_pending = false;
    }

    /// 处理当前包的包头: 连续性计数, 并结束被新 PUSI 终止的 PES 单元
    ///
    /// 加扰包的负载无法解析, 连同该 PID 未完成的单元一起丢弃.
    pub fn process_ts_packet(&mut self) -> PacketStatus {
        self.header = None;
        self.payload_pending = false;

        let header = match parse_ts_header(&self.packet) {
            Ok(header) => header,
            Err(e) => {
                debug!("TS: {e}");
                return PacketStatus::Desync;
            }
        };
        self.stats.packets += 1;

        let pid = header.pid;
        if header.transport_error {
            trace!("TS: 丢弃传输错误包, pid={pid:#06X}");
            return PacketStatus::Ok;
        }
        if pid == PID_NULL || !self.is_tracked_pid(pid) {
            return PacketStatus::Ok;
        }

        if header.afc & 0x01 != 0 {
            let cc = header.continuity_counter;
            if let Some(last) = self.continuity.insert(pid, cc) {
                if !header.discontinuity {
                    if cc == last {
                        trace!("TS: 重复包, pid={pid:#06X} cc={cc}");
                        return PacketStatus::Ok;
                    }
                    if cc != (last + 1) & 0x0F {
                        warn!(
                            "TS: 连续性计数错误, pid={pid:#06X} 预期 {} 实际 {cc}",
                            (last + 1) & 0x0F
                        );
                        self.stats.continuity_errors += 1;
                        self.reset_assembly(pid);
                    }
                }
            }
        }
        if !header.has_payload() {
            return PacketStatus::Ok;
        }

        if header.unit_start {
            if let Some(stream) = self.streams.get_mut(&pid).filter(|s| s.streaming) {
                if let Some(result) = stream.assembler.finish() {
                    self.complete_unit(pid, result);
                }
            }
        }

        if header.scrambling != 0 {
            trace!("TS: 跳过加扰包, pid={pid:#06X}");
            self.stats.scrambled += 1;
            self.reset_assembly(pid);
            return PacketStatus::Ok;
        }

        self.header = Some(header);
        self.payload_pending = true;
        PacketStatus::Ok
    }

    fn is_tracked_pid(&self, pid: u16) -> bool {
        pid == PID_PAT || self.pmt_sections.contains_key(&pid) || self.streams.contains_key(&pid)
    }

    fn reset_assembly(&mut self, pid: u16) {
        if pid == PID_PAT {
            self.pat_sections.reset();
        }
        if let Some(sections) = self.pmt_sections.get_mut(&pid) {
            sections.reset();
        }
        if let Some(stream) = self.streams.get_mut(&pid) {
            stream.assembler.reset();
        }
    }

    fn complete_unit(&mut self, pid: u16, result: LiuResult<PesUnit>) {
        let pes = match result {
            Ok(pes) => pes,
            Err(e) => {
                debug!("TS: 丢弃无效 PES, pid={pid:#06X}: {e}");
                self.stats.invalid_pes += 1;
                return;
            }
        };
        let Some(stream) = self.streams.get_mut(&pid) else {
            return;
        };
        let stream_change = stream.probe(pes.payload());
        if stream_change {
            debug!("TS: pid={pid:#06X} 流信息更新: {}", stream.info);
        }
        let duration = stream.unit_duration(pes.payload());
        let pts = pes.header.pts;
        let dts = if pes.header.dts.is_valid() {
            pes.header.dts
        } else {
            pts
        };
        self.stats.units += 1;
        self.completed.push_back(StreamUnit {
            pid,
            pts,
            dts,
            duration,
            stream_change,
            pes,
        });
    }

    /// 是否有已完成的 PES 单元
    pub fn has_pid_stream_data(&self) -> bool {
        !self.completed.is_empty()
    }

    /// 按完成顺序取出一个 PES 单元
    pub fn next_stream_unit(&mut self) -> Option<StreamUnit> {
        self.completed.pop_front()
    }

    /// 当前包是否有待处理的负载
    pub fn has_pid_payload(&self) -> bool {
        self.payload_pending
    }

    /// 处理当前包的负载: PSI 表或 PES 数据
    pub fn process_ts_payload(&mut self) -> PayloadStatus {
        self.payload_pending = false;
        let Some(header) = self.header else {
            return PayloadStatus::Ok;
        };
        let packet = self.packet;
        let payload = &packet[header.payload_offset..];
        let pid = header.pid;

        if pid == PID_PAT {
            return self.process_pat(payload, header.unit_start);
        }
        if self.pmt_sections.contains_key(&pid) {
            return self.process_pmt(pid, payload, header.unit_start);
        }
        if let Some(stream) = self.streams.get_mut(&pid).filter(|s| s.streaming) {
            if let Some(result) = stream.assembler.push(payload, header.unit_start) {
                self.complete_unit(pid, result);
            }
        }
        PayloadStatus::Ok
    }

    fn process_pat(&mut self, payload: &[u8], unit_start: bool) -> PayloadStatus {
        let mut status = PayloadStatus::Ok;
        for raw in self.pat_sections.push(payload, unit_start) {
            let entries = match parse_section(&raw).and_then(|s| {
                let version = s.version;
                let current = s.current_next;
                parse_pat(&s).map(|entries| (version, current, entries))
            }) {
                Ok((_, false, _)) => continue,
                Ok((version, true, entries)) if self.pat_version != Some(version) => {
                    self.pat_version = Some(version);
                    entries
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("TS: 丢弃无效 PAT 段: {e}");
                    self.stats.invalid_sections += 1;
                    continue;
                }
            };

            info!(
                "TS: PAT 版本 {}, {} 个节目",
                self.pat_version.unwrap_or(0),
                entries.len()
            );
            let mut old = std::mem::take(&mut self.programs);
            for entry in &entries {
                let program = match old.remove(&entry.program_number) {
                    Some(program) if program.pmt_pid == entry.pmt_pid => program,
                    _ => Program {
                        pmt_pid: entry.pmt_pid,
                        version: None,
                        pcr_pid: PID_NULL,
                    },
                };
                debug!(
                    "TS: 节目 {} PMT_PID={:#06X}",
                    entry.program_number, entry.pmt_pid
                );
                self.programs.insert(entry.program_number, program);
            }

            self.pmt_sections
                .retain(|pid, _| entries.iter().any(|e| e.pmt_pid == *pid));
            for entry in &entries {
                self.pmt_sections.entry(entry.pmt_pid).or_default();
            }

            let before = self.streams.len();
            self.streams
                .retain(|_, stream| !old.contains_key(&stream.program_number));
            if self.streams.len() != before {
                info!("TS: 移除 {} 条基本流", before - self.streams.len());
                status = PayloadStatus::ProgramChange;
            }
        }
        status
    }

    fn process_pmt(&mut self, pid: u16, payload: &[u8], unit_start: bool) -> PayloadStatus {
        let Some(sections) = self.pmt_sections.get_mut(&pid) else {
            return PayloadStatus::Ok;
        };
        let mut status = PayloadStatus::Ok;
        for raw in sections.push(payload, unit_start) {
            let pmt = match parse_section(&raw).and_then(|s| {
                if s.current_next {
                    parse_pmt(&s).map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(pmt)) => pmt,
                Ok(None) => continue,
                Err(e) => {
                    debug!("TS: 丢弃无效 PMT 段: {e}");
                    self.stats.invalid_sections += 1;
                    continue;
                }
            };
            if self.apply_pmt(pid, pmt) {
                status = PayloadStatus::ProgramChange;
            }
        }
        status
    }

    /// 应用新版本 PMT, 返回拓扑是否变化
    fn apply_pmt(&mut self, pmt_pid: u16, pmt: Pmt) -> bool {
        let Some(program) = self
            .programs
            .get_mut(&pmt.program_number)
            .filter(|p| p.pmt_pid == pmt_pid)
        else {
            trace!("TS: 忽略未在 PAT 中声明的节目 {}", pmt.program_number);
            return false;
        };
        if program.version == Some(pmt.version) {
            return false;
        }
        program.version = Some(pmt.version);
        program.pcr_pid = pmt.pcr_pid;
        info!(
            "TS: 节目 {} PMT 版本 {}, {} 条基本流, PCR_PID={:#06X}",
            pmt.program_number,
            pmt.version,
            pmt.streams.len(),
            pmt.pcr_pid
        );

        let program_number = pmt.program_number;
        self.streams.retain(|pid, stream| {
            stream.program_number != program_number || pmt.streams.iter().any(|es| es.pid == *pid)
        });

        for es in &pmt.streams {
            let mut stream_type = StreamType::from_ts_stream_type(es.stream_type);
            if let Some(tag) = es.codec_descriptor {
                stream_type = stream_type.refine_with_descriptor(tag);
            }
            debug!(
                "TS: PMT stream_type={:#04X} PID={:#06X} codec={}",
                es.stream_type,
                es.pid,
                stream_type.codec_name()
            );

            match self.streams.get_mut(&es.pid) {
                Some(stream)
                    if stream.stream_type == stream_type
                        && stream.program_number == program_number =>
                {
                    stream.info.language.clone_from(&es.language);
                    stream.info.composition_id = es.composition_id;
                    stream.info.ancillary_id = es.ancillary_id;
                }
                _ => {
                    self.continuity.remove(&es.pid);
                    self.streams.insert(
                        es.pid,
                        EsStream {
                            program_number,
                            stream_type,
                            info: StreamInfo {
                                language: es.language.clone(),
                                composition_id: es.composition_id,
                                ancillary_id: es.ancillary_id,
                                ..Default::default()
                            },
                            streaming: false,
                            assembler: PesAssembler::default(),
                        },
                    );
                }
            }
        }
        true
    }

    /// 已发现的基本流 PID, 升序
    pub fn stream_pids(&self) -> Vec<u16> {
        self.streams.keys().copied().collect()
    }

    /// 开始收集该 PID 的 PES 单元, 已在收集时保持原状
    pub fn start_streaming(&mut self, pid: u16) {
        if let Some(stream) = self.streams.get_mut(&pid) {
            if !stream.streaming {
                stream.streaming = true;
                stream.assembler.reset();
            }
        }
    }

    /// 是否可以为该 PID 上报流信息 (编码类型已知)
    pub fn has_stream_info(&self, pid: u16) -> bool {
        self.streams
            .get(&pid)
            .is_some_and(|s| s.stream_type.is_known())
    }

    /// 流的编码类型与元数据
    pub fn stream(&self, pid: u16) -> Option<(StreamType, &StreamInfo)> {
        self.streams.get(&pid).map(|s| (s.stream_type, &s.info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_检测包大小() {
        for size in PACKET_SIZES {
            let mut window = vec![0u8; DETECT_PACKETS * MAX_PACKET_SIZE + MAX_PACKET_SIZE];
            for k in 0..=DETECT_PACKETS {
                window[5 + k * size] = TS_SYNC_BYTE;
            }
            assert_eq!(detect_packet_size(&window), Some((5, size)));
        }
    }

    #[test]
    fn test_检测失败() {
        let mut window = vec![0u8; DETECT_PACKETS * MAX_PACKET_SIZE + MAX_PACKET_SIZE];
        window[0] = TS_SYNC_BYTE;
        window[188] = TS_SYNC_BYTE;
        assert_eq!(detect_packet_size(&window), None);
    }

    #[test]
    fn test_adts_时长() {
        // 两个 48 kHz 帧, 每帧 16 字节
        let frame = [0xFF, 0xF1, 0x4C, 0x80, 0x02, 0x1F, 0xFC];
        let mut payload = Vec::new();
        for _ in 0..2 {
            payload.extend_from_slice(&frame);
            payload.extend_from_slice(&[0u8; 9]);
        }
        assert_eq!(adts_duration(&payload), Some(2 * 1024 * 90_000 / 48_000));
    }
}
