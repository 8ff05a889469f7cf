//! 基本流路由.
//!
//! 接收解复用器的流信息与 PES 负载事件: 记录每个 PID 的元数据, 选出主视频
//! (H.264) 与主音频 (AAC) 流, 把视频负载交给访问单元组装器, 音频负载交给
//! AAC 解码路径. 解码结果通过 [`RenderSink`] 输出.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use liu_codec::{
    AacDecodePath, AccessUnitAssembler, AudioDecoder, AudioFormat, AudioSink, DecodeContext,
    DecodedImage, FrameCallback, SessionConfig, SessionFactory, StreamType,
};
use liu_core::{LiuResult, Timestamp};
use liu_format::{DemuxHandler, StreamInfo, StreamPacket};
use log::{debug, info, warn};

/// 对外输出的事件
///
/// 图像回调可能来自解码线程, 实现需要自行同步.
pub trait RenderSink: Send + Sync {
    /// 视频尺寸变化, 每次 (宽, 高) 变化只通知一次
    fn geometry_change(&self, width: u32, height: u32);

    /// 解码完成的图像
    ///
    /// `timestamp`/`duration` 来自解码器, `pts` 是提交时该访问单元的 PTS.
    fn image(&self, image: &DecodedImage, timestamp: Timestamp, duration: Option<i64>, pts: Timestamp);

    /// 音频格式, 解码器初始化成功后通知一次
    fn audio_format(&self, format: AudioFormat, pts: Timestamp);

    /// 交错的 16 位 PCM 采样
    fn audio_samples(&self, samples: &[i16], pts: Timestamp);
}

struct AudioOut<'a>(&'a dyn RenderSink);

impl AudioSink for AudioOut<'_> {
    fn audio_format(&self, format: AudioFormat, pts: Timestamp) {
        self.0.audio_format(format, pts);
    }

    fn audio_samples(&self, samples: &[i16], pts: Timestamp) {
        self.0.audio_samples(samples, pts);
    }
}

/// 路由统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub video_payloads: u64,
    /// 解码器创建之前被丢弃的视频负载
    pub dropped_video: u64,
    pub audio_payloads: u64,
}

/// 基本流路由器
pub struct StreamRouter {
    sink: Arc<dyn RenderSink>,
    assembler: AccessUnitAssembler,
    audio: AacDecodePath<Box<dyn AudioDecoder>>,
    streams: BTreeMap<u16, (StreamType, StreamInfo)>,
    video_pid: Option<u16>,
    audio_pid: Option<u16>,
    width: u32,
    height: u32,
    /// 最近一次通知的尺寸
    geometry: Option<(u32, u32)>,
    stats: RouterStats,
}

impl StreamRouter {
    pub fn new(
        sink: Arc<dyn RenderSink>,
        factory: Box<dyn SessionFactory>,
        audio_decoder: Box<dyn AudioDecoder>,
        config: SessionConfig,
    ) -> Self {
        let image_sink = sink.clone();
        let callback: FrameCallback = Arc::new(
            move |context: DecodeContext, result: LiuResult<DecodedImage>| match result {
                Ok(image) => image_sink.image(&image, image.timestamp, image.duration, context.pts),
                Err(e) => warn!("视频解码失败 (pts={}): {e}", context.pts),
            },
        );

        Self {
            sink,
            assembler: AccessUnitAssembler::new(factory, config, callback),
            audio: AacDecodePath::new(audio_decoder),
            streams: BTreeMap::new(),
            video_pid: None,
            audio_pid: None,
            width: 0,
            height: 0,
            geometry: None,
            stats: RouterStats::default(),
        }
    }

    pub fn video_pid(&self) -> Option<u16> {
        self.video_pid
    }

    pub fn audio_pid(&self) -> Option<u16> {
        self.audio_pid
    }

    /// 当前记录的视频尺寸
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn stream(&self, pid: u16) -> Option<&(StreamType, StreamInfo)> {
        self.streams.get(&pid)
    }

    pub fn assembler(&self) -> &AccessUnitAssembler {
        &self.assembler
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// 按顺序关闭视频解码器
    pub fn shutdown(&mut self) {
        self.assembler.shutdown();
    }

    fn handle_video(&mut self, packet: &StreamPacket<'_>) {
        self.stats.video_payloads += 1;
        if !self.assembler.has_session() {
            if self.width == 0 || self.height == 0 {
                self.stats.dropped_video += 1;
                return;
            }
            if let Err(e) =
                self.assembler
                    .bootstrap_from_payload(packet.payload, self.width, self.height)
            {
                debug!("视频解码器尚未创建: {e}");
                self.stats.dropped_video += 1;
                return;
            }
            info!(
                "pid={:#06X} 视频解码器就绪: {}x{}",
                packet.pid, self.width, self.height
            );
        }
        self.assembler.decode_payload(packet.payload, packet.pts);
    }
}

impl DemuxHandler for StreamRouter {
    fn on_stream_info(&mut self, pid: u16, stream_type: StreamType, info: &StreamInfo) {
        info!("{}", describe_stream(pid, stream_type, info));
        self.streams.insert(pid, (stream_type, info.clone()));

        match stream_type {
            StreamType::VideoH264 => {
                self.width = info.width;
                self.height = info.height;
                self.video_pid = Some(pid);
                let dims = (info.width, info.height);
                if info.has_dimensions() && self.geometry != Some(dims) {
                    self.geometry = Some(dims);
                    self.sink.geometry_change(dims.0, dims.1);
                }
            }
            StreamType::AudioAacAdts => self.audio_pid = Some(pid),
            other => debug!("忽略流 pid={pid:#06X} codec={other}"),
        }
    }

    fn on_packet(&mut self, packet: &StreamPacket<'_>) {
        if Some(packet.pid) == self.video_pid {
            self.handle_video(packet);
        } else if Some(packet.pid) == self.audio_pid {
            self.stats.audio_payloads += 1;
            self.audio
                .decode(packet.payload, packet.pts, &AudioOut(self.sink.as_ref()));
        }
    }
}

/// 流信息的多行描述
pub fn describe_stream(pid: u16, stream_type: StreamType, info: &StreamInfo) -> String {
    let mut out = format!("流信息 pid={pid:#06X}");
    let language = if info.language.is_empty() {
        "-"
    } else {
        info.language.as_str()
    };
    let _ = write!(out, "\n  codec: {}", stream_type.codec_name());
    let _ = write!(out, "\n  language: {language}");
    let _ = write!(out, "\n  identifier: {:#010X}", info.stream_identifier());
    let _ = write!(out, "\n  fps: {}/{}", info.fps_rate, info.fps_scale);
    let _ = write!(out, "\n  interlaced: {}", info.interlaced);
    let _ = write!(out, "\n  size: {}x{}", info.width, info.height);
    let _ = write!(out, "\n  aspect: {:.3}", info.aspect);
    let _ = write!(out, "\n  channels: {}", info.channels);
    let _ = write!(out, "\n  sample_rate: {}", info.sample_rate);
    let _ = write!(out, "\n  block_align: {}", info.block_align);
    let _ = write!(out, "\n  bit_rate: {}", info.bit_rate);
    let _ = write!(out, "\n  bits_per_sample: {}", info.bits_per_sample);
    out
}
