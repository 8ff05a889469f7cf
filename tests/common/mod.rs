//! 集成测试公共工具: 构造 TS/PSI/PES 数据与事件记录器.

#![allow(dead_code)]

use liu::codec::StreamType;
use liu::core::crc::crc32_mpeg2;
use liu::format::{DemuxHandler, StreamInfo, StreamPacket};

pub const TS_PACKET_SIZE: usize = 188;
pub const PMT_PID: u16 = 0x1000;
pub const VIDEO_PID: u16 = 0x100;
pub const AUDIO_PID: u16 = 0x101;

/// 1280x720 Baseline SPS
pub const SPS: [u8; 9] = [0x67, 0x42, 0x00, 0x1F, 0xDA, 0x01, 0x40, 0x16, 0xE4];
/// 640x480 Baseline SPS
pub const SPS_VGA: [u8; 9] = [0x67, 0x42, 0x00, 0x1E, 0xDA, 0x02, 0x80, 0xF6, 0x40];
pub const PPS: [u8; 4] = [0x68, 0xCE, 0x3C, 0x80];
pub const IDR: [u8; 4] = [0x65, 0x88, 0x84, 0x21];

/// 测试日志, 由 RUST_LOG 控制
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 记录解复用事件
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<String>,
}

impl DemuxHandler for Recorder {
    fn on_stream_info(&mut self, pid: u16, stream_type: StreamType, info: &StreamInfo) {
        self.events.push(format!("info {pid:#x} {stream_type} {info}"));
    }

    fn on_packet(&mut self, packet: &StreamPacket<'_>) {
        self.events.push(format!(
            "pkt {:#x} {} {}",
            packet.pid,
            packet.payload.len(),
            packet.pts.0
        ));
    }
}

/// 构造 TS 包 (无适配域), 剩余空间填 0xFF
pub fn ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= TS_PACKET_SIZE - 4);
    let mut pkt = vec![0xFFu8; TS_PACKET_SIZE];
    pkt[0] = 0x47;
    pkt[1] = (if pusi { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1F);
    pkt[2] = pid as u8;
    pkt[3] = 0x10 | (cc & 0x0F);
    pkt[4..4 + payload.len()].copy_from_slice(payload);
    pkt
}

pub fn null_packet(cc: u8) -> Vec<u8> {
    ts_packet(0x1FFF, false, cc, &[])
}

/// 构造一个完整 PSI 段并放入单个 TS 包
pub fn psi_packet(pid: u16, table_id: u8, extension: u16, version: u8, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut section = vec![
        0x00,
        table_id,
        0xB0 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
        (extension >> 8) as u8,
        extension as u8,
        0xC1 | ((version & 0x1F) << 1),
        0x00,
        0x00,
    ];
    section.extend_from_slice(body);
    let crc = crc32_mpeg2(&section[1..]);
    section.extend_from_slice(&crc.to_be_bytes());
    ts_packet(pid, true, 0, &section)
}

/// 节目 1 的 PAT
pub fn pat_packet() -> Vec<u8> {
    let body = [0x00, 0x01, 0xE0 | (PMT_PID >> 8) as u8, PMT_PID as u8];
    psi_packet(0x0000, 0x00, 1, 0, &body)
}

/// 节目 1 的 PMT, `streams` 为 (stream_type, pid)
pub fn pmt_packet(version: u8, cc: u8, streams: &[(u8, u16)]) -> Vec<u8> {
    let mut body = vec![0xE0 | (VIDEO_PID >> 8) as u8, VIDEO_PID as u8, 0xF0, 0x00];
    for &(stream_type, pid) in streams {
        body.extend_from_slice(&[stream_type, 0xE0 | (pid >> 8) as u8, pid as u8, 0xF0, 0x00]);
    }
    let mut pkt = psi_packet(PMT_PID, 0x02, 1, version, &body);
    pkt[3] = 0x10 | (cc & 0x0F);
    pkt
}

/// 编码 33 位 PTS
pub fn encode_pts(pts: u64) -> [u8; 5] {
    [
        0x21 | ((((pts >> 30) as u8) & 0x07) << 1),
        (pts >> 22) as u8,
        0x01 | ((((pts >> 15) as u8) & 0x7F) << 1),
        (pts >> 7) as u8,
        0x01 | (((pts as u8) & 0x7F) << 1),
    ]
}

/// 带 PTS 的定长 PES
pub fn pes(stream_id: u8, pts: u64, payload: &[u8]) -> Vec<u8> {
    let length = 3 + 5 + payload.len();
    let mut out = vec![
        0x00,
        0x00,
        0x01,
        stream_id,
        (length >> 8) as u8,
        length as u8,
        0x80,
        0x80,
        0x05,
    ];
    out.extend_from_slice(&encode_pts(pts));
    out.extend_from_slice(payload);
    out
}

/// SPS + PPS + IDR 的 Annex B 负载
pub fn keyframe_payload() -> Vec<u8> {
    keyframe_payload_with(&SPS)
}

/// 指定 SPS 的关键帧负载
pub fn keyframe_payload_with(sps: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for nalu in [sps, &PPS[..], &IDR[..]] {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nalu);
    }
    out
}

/// 只含 IDR 的负载
pub fn slice_payload() -> Vec<u8> {
    let mut out = vec![0, 0, 0, 1];
    out.extend_from_slice(&IDR);
    out
}

/// 48 kHz 立体声 AAC-LC ADTS 帧, 原始数据为零
pub fn adts_frame(raw_len: usize) -> Vec<u8> {
    let len = 7 + raw_len;
    let mut out = vec![
        0xFF,
        0xF1,
        0x4C,
        0x80 | ((len >> 11) as u8 & 0x03),
        (len >> 3) as u8,
        ((len as u8 & 0x07) << 5) | 0x1F,
        0xFC,
    ];
    out.resize(len, 0);
    out
}

/// PAT, PMT (H.264 + AAC), 一个视频 PES, 一个音频 PES, 再用空包补齐
pub fn av_stream() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(pat_packet());
    out.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID), (0x0F, AUDIO_PID)]));
    out.extend(ts_packet(VIDEO_PID, true, 0, &pes(0xE0, 3000, &keyframe_payload())));
    out.extend(ts_packet(AUDIO_PID, true, 0, &pes(0xC0, 3000, &adts_frame(9))));
    pad_with_nulls(&mut out, 6);
    out
}

/// 720p 关键帧两次, 再换成 640x480 关键帧两次
pub fn resolution_change_stream() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(pat_packet());
    out.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID)]));
    let frames = [(&SPS, 0u64), (&SPS, 3003), (&SPS_VGA, 6006), (&SPS_VGA, 9009)];
    for (cc, (sps, pts)) in frames.into_iter().enumerate() {
        let payload = pes(0xE0, pts, &keyframe_payload_with(sps));
        out.extend(ts_packet(VIDEO_PID, true, cc as u8, &payload));
    }
    pad_with_nulls(&mut out, 6);
    out
}

pub fn pad_with_nulls(out: &mut Vec<u8>, count: u8) {
    for cc in 0..count {
        out.extend(null_packet(cc));
    }
}

/// 在每个 188 字节包后追加填充, 得到 `size` 字节的包
pub fn repack(stream: &[u8], size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for packet in stream.chunks(TS_PACKET_SIZE) {
        out.extend_from_slice(packet);
        out.resize(out.len() + size - TS_PACKET_SIZE, 0x00);
    }
    out
}
