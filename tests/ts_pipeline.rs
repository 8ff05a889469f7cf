//! 传输流解复用集成测试

mod common;

use bytes::Bytes;
use common::*;
use liu::format::{ChunkSource, TransportDemuxer};

fn feed_whole(data: &[u8]) -> (TransportDemuxer, Recorder) {
    let mut demuxer = TransportDemuxer::new();
    let mut recorder = Recorder::default();
    demuxer.feed(Bytes::copy_from_slice(data), &mut recorder);
    (demuxer, recorder)
}

fn expected_av_events() -> Vec<&'static str> {
    vec![
        "info 0x100 h264 参数未知",
        "info 0x101 aac 参数未知",
        "info 0x100 h264 1280x720",
        "pkt 0x100 29 3000",
        "info 0x101 aac 48000 Hz, 2 声道",
        "pkt 0x101 16 3000",
    ]
}

// ============================================================
// 分块字节源
// ============================================================

#[test]
fn test_两块数据按两次读取还原() {
    let a: Vec<u8> = (0..100u8).collect();
    let b: Vec<u8> = (100..150u8).collect();
    let mut src = ChunkSource::new();
    src.append(Bytes::from(a.clone()));
    src.append(Bytes::from(b.clone()));

    let mut out = src.read(0, 120).unwrap().to_vec();
    out.extend_from_slice(src.read(120, 30).unwrap());
    assert_eq!(out, [a, b].concat());
    // 第一块完全位于游标之前
    assert_eq!(src.retained_chunks(), 1);
    assert_eq!(src.cursor(), (0, 20));
    assert!(src.read(120, 31).is_none());
}

#[test]
fn test_分块读取与整块读取一致() {
    let data: Vec<u8> = (0..=255u8).cycle().take(4000).collect();
    let mut src = ChunkSource::new();
    for chunk in data.chunks(37) {
        src.append(Bytes::copy_from_slice(chunk));
    }
    assert_eq!(src.read(100, 500).unwrap(), &data[100..600]);
    assert_eq!(src.read(3990, 10).unwrap(), &data[3990..4000]);
}

#[test]
fn test_数据不足时不释放() {
    let mut src = ChunkSource::new();
    src.append(Bytes::from_static(b"0123456789"));
    src.append(Bytes::from_static(b"abcdef"));
    assert!(src.read(12, 10).is_none());
    assert_eq!(src.retained_chunks(), 2);
    assert_eq!(src.absolute_offset(), 0);

    assert_eq!(src.read(12, 4).unwrap(), b"cdef");
    assert_eq!(src.retained_chunks(), 1);
    assert_eq!(src.absolute_offset(), 12);
    assert_eq!(src.buffered_len(), 4);
}

#[test]
#[should_panic(expected = "保留窗口")]
fn test_读取已释放区域时终止() {
    let mut src = ChunkSource::new();
    src.append(Bytes::from_static(b"0123456789"));
    src.append(Bytes::from_static(b"abcdef"));
    let _ = src.read(11, 2);
    let _ = src.read(5, 2);
}

#[test]
fn test_解复用后只保留当前窗口() {
    let stream = av_stream();
    let mut demuxer = TransportDemuxer::new();
    let mut recorder = Recorder::default();
    for packet in stream.chunks(TS_PACKET_SIZE) {
        demuxer.feed(Bytes::copy_from_slice(packet), &mut recorder);
    }
    assert_eq!(demuxer.source().total_appended(), stream.len() as u64);
    assert!(demuxer.source().buffered_len() <= TS_PACKET_SIZE as u64);
}

// ============================================================
// 解复用
// ============================================================

#[test]
fn test_音视频流完整事件序列() {
    let (demuxer, recorder) = feed_whole(&av_stream());
    assert_eq!(recorder.events, expected_av_events());
    assert_eq!(demuxer.context().packet_size(), Some(188));
    assert_eq!(demuxer.stats().units, 2);
    assert_eq!(demuxer.stats().skipped_bytes, 0);
    assert_eq!(demuxer.stats().continuity_errors, 0);
}

#[test]
fn test_逐字节输入与整块输入事件相同() {
    let stream = av_stream();
    let (_, whole) = feed_whole(&stream);

    let mut demuxer = TransportDemuxer::new();
    let mut bytewise = Recorder::default();
    for i in 0..stream.len() {
        demuxer.feed(Bytes::copy_from_slice(&stream[i..i + 1]), &mut bytewise);
    }
    assert_eq!(bytewise.events, whole.events);

    let mut demuxer = TransportDemuxer::new();
    let mut uneven = Recorder::default();
    for chunk in stream.chunks(333) {
        demuxer.feed(Bytes::copy_from_slice(chunk), &mut uneven);
    }
    assert_eq!(uneven.events, whole.events);
}

#[test]
fn test_流参数不变时不重复上报() {
    let mut stream = Vec::new();
    stream.extend(pat_packet());
    stream.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID)]));
    stream.extend(ts_packet(VIDEO_PID, true, 0, &pes(0xE0, 0, &keyframe_payload())));
    stream.extend(ts_packet(VIDEO_PID, true, 1, &pes(0xE0, 3003, &keyframe_payload())));
    pad_with_nulls(&mut stream, 6);

    let (_, recorder) = feed_whole(&stream);
    assert_eq!(
        recorder.events,
        vec![
            "info 0x100 h264 参数未知",
            "info 0x100 h264 1280x720",
            "pkt 0x100 29 0",
            "pkt 0x100 29 3003",
        ]
    );
}

#[test]
fn test_分辨率变化时只上报一次() {
    let (_, recorder) = feed_whole(&resolution_change_stream());
    assert_eq!(
        recorder.events,
        vec![
            "info 0x100 h264 参数未知",
            "info 0x100 h264 1280x720",
            "pkt 0x100 29 0",
            "pkt 0x100 29 3003",
            "info 0x100 h264 640x480",
            "pkt 0x100 29 6006",
            "pkt 0x100 29 9009",
        ]
    );
}

#[test]
fn test_pmt_新版本移除音频流() {
    let mut stream = Vec::new();
    stream.extend(pat_packet());
    stream.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID), (0x0F, AUDIO_PID)]));
    stream.extend(ts_packet(VIDEO_PID, true, 0, &pes(0xE0, 0, &keyframe_payload())));
    stream.extend(ts_packet(AUDIO_PID, true, 0, &pes(0xC0, 0, &adts_frame(9))));
    // 版本 1 只保留视频
    stream.extend(pmt_packet(1, 1, &[(0x1B, VIDEO_PID)]));
    stream.extend(ts_packet(VIDEO_PID, true, 1, &pes(0xE0, 3003, &keyframe_payload())));
    stream.extend(ts_packet(AUDIO_PID, true, 1, &pes(0xC0, 3003, &adts_frame(9))));
    pad_with_nulls(&mut stream, 6);

    let (demuxer, recorder) = feed_whole(&stream);
    assert_eq!(
        recorder.events,
        vec![
            "info 0x100 h264 参数未知",
            "info 0x101 aac 参数未知",
            "info 0x100 h264 1280x720",
            "pkt 0x100 29 0",
            "info 0x101 aac 48000 Hz, 2 声道",
            "pkt 0x101 16 0",
            // 新版本 PMT 重新上报保留的流
            "info 0x100 h264 1280x720",
            "pkt 0x100 29 3003",
        ]
    );
    assert_eq!(demuxer.context().stream_pids(), vec![VIDEO_PID]);
}

#[test]
fn test_相同版本_pmt_不重新上报() {
    let mut stream = Vec::new();
    stream.extend(pat_packet());
    stream.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID)]));
    stream.extend(pmt_packet(0, 1, &[(0x1B, VIDEO_PID)]));
    pad_with_nulls(&mut stream, 6);
    let (_, recorder) = feed_whole(&stream);
    assert_eq!(recorder.events, vec!["info 0x100 h264 参数未知"]);
}

#[test]
fn test_加扰包被跳过() {
    let mut scrambled = ts_packet(VIDEO_PID, true, 0, &pes(0xE0, 0, &keyframe_payload()));
    scrambled[3] |= 0x80;

    let mut stream = Vec::new();
    stream.extend(pat_packet());
    stream.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID)]));
    stream.extend(scrambled);
    stream.extend(ts_packet(VIDEO_PID, true, 1, &pes(0xE0, 3003, &keyframe_payload())));
    pad_with_nulls(&mut stream, 6);

    let (demuxer, recorder) = feed_whole(&stream);
    assert_eq!(demuxer.stats().scrambled, 1);
    assert_eq!(demuxer.stats().continuity_errors, 0);
    assert_eq!(
        recorder.events,
        vec![
            "info 0x100 h264 参数未知",
            "info 0x100 h264 1280x720",
            "pkt 0x100 29 3003",
        ]
    );
}

#[test]
fn test_m2ts_192_字节包() {
    let stream = repack(&av_stream(), 192);
    let (demuxer, recorder) = feed_whole(&stream);
    assert_eq!(demuxer.context().packet_size(), Some(192));
    assert_eq!(recorder.events, expected_av_events());
}

#[test]
fn test_204_字节包() {
    let stream = repack(&av_stream(), 204);
    let (demuxer, recorder) = feed_whole(&stream);
    assert_eq!(demuxer.context().packet_size(), Some(204));
    assert_eq!(recorder.events, expected_av_events());
}

#[test]
fn test_中途失步后重新同步() {
    init_logger();
    let mut stream = Vec::new();
    stream.extend(pat_packet());
    stream.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID)]));
    pad_with_nulls(&mut stream, 4);
    // 插入 7 字节垃圾
    stream.extend_from_slice(&[0x00; 7]);
    stream.extend(ts_packet(VIDEO_PID, true, 0, &pes(0xE0, 0, &keyframe_payload())));
    pad_with_nulls(&mut stream, 4);

    let (demuxer, recorder) = feed_whole(&stream);
    assert_eq!(demuxer.stats().skipped_bytes, 7);
    assert_eq!(recorder.events.last().map(String::as_str), Some("pkt 0x100 29 0"));
}

#[test]
fn test_连续性错误丢弃未完成单元() {
    init_logger();
    let payload = keyframe_payload();
    // 不定长 PES, 靠下一个 PUSI 结束
    let mut unbounded = pes(0xE0, 0, &payload);
    unbounded[4] = 0;
    unbounded[5] = 0;

    let mut stream = Vec::new();
    stream.extend(pat_packet());
    stream.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID)]));
    stream.extend(ts_packet(VIDEO_PID, true, 0, &unbounded));
    // cc 跳变, 上一单元被丢弃
    stream.extend(ts_packet(VIDEO_PID, true, 5, &pes(0xE0, 6006, &payload)));
    pad_with_nulls(&mut stream, 6);

    let (demuxer, recorder) = feed_whole(&stream);
    assert_eq!(demuxer.stats().continuity_errors, 1);
    assert_eq!(
        recorder.events,
        vec![
            "info 0x100 h264 参数未知",
            "info 0x100 h264 1280x720",
            "pkt 0x100 29 6006",
        ]
    );
}

#[test]
fn test_未知类型的流不上报() {
    let mut stream = Vec::new();
    stream.extend(pat_packet());
    stream.extend(pmt_packet(0, 0, &[(0x1B, VIDEO_PID), (0x99, 0x102)]));
    pad_with_nulls(&mut stream, 6);
    let (demuxer, recorder) = feed_whole(&stream);
    assert_eq!(recorder.events, vec!["info 0x100 h264 参数未知"]);
    assert_eq!(demuxer.context().stream_pids(), vec![0x100, 0x102]);
}
