//! 接收工具的输出端与检查用解码器.

use std::sync::Mutex;

use bytes::Bytes;
use liu::RenderSink;
use liu_codec::{
    AccessUnit, AudioFormat, DecodeContext, DecodedImage, FormatDescription, FrameDecoder,
    SessionConfig,
};
use liu_core::{LiuResult, Timestamp};
use log::{debug, info};

/// 只记录帧信息, 不生成像素数据的解码器
///
/// 用于没有硬件解码后端的环境下检查码流: 每个访问单元输出一帧,
/// 尺寸与帧时长取自 SPS.
pub struct InspectDecoder;

impl FrameDecoder for InspectDecoder {
    fn decode(
        &mut self,
        format: &FormatDescription,
        config: &SessionConfig,
        unit: &AccessUnit,
        context: DecodeContext,
    ) -> LiuResult<Vec<(DecodeContext, DecodedImage)>> {
        let (width, height) = format.dimensions();
        let image = DecodedImage {
            width,
            height,
            pixel_format: config.pixel_format,
            data: Bytes::new(),
            timestamp: unit.pts,
            duration: format.frame_duration(),
        };
        Ok(vec![(context, image)])
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkCounters {
    pub images: u64,
    pub audio_frames: u64,
    pub audio_samples: u64,
}

/// 把输出事件写入日志
#[derive(Default)]
pub struct LoggingSink {
    counters: Mutex<SinkCounters>,
}

impl LoggingSink {
    pub fn counters(&self) -> SinkCounters {
        self.counters.lock().map(|c| *c).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut SinkCounters)) {
        if let Ok(mut counters) = self.counters.lock() {
            f(&mut counters);
        }
    }
}

impl RenderSink for LoggingSink {
    fn geometry_change(&self, width: u32, height: u32) {
        info!("视频尺寸: {width}x{height}");
    }

    fn image(&self, image: &DecodedImage, timestamp: Timestamp, duration: Option<i64>, pts: Timestamp) {
        self.update(|c| c.images += 1);
        debug!(
            "图像 {}x{} {} ts={timestamp} dur={duration:?} pts={pts}",
            image.width, image.height, image.pixel_format
        );
    }

    fn audio_format(&self, format: AudioFormat, pts: Timestamp) {
        info!(
            "音频格式: {} Hz, {} 声道 (pts={pts})",
            format.sample_rate, format.channels
        );
    }

    fn audio_samples(&self, samples: &[i16], pts: Timestamp) {
        self.update(|c| {
            c.audio_frames += 1;
            c.audio_samples += samples.len() as u64;
        });
        debug!("音频 {} 个采样 pts={pts}", samples.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_日志输出端计数() {
        let sink = LoggingSink::default();
        sink.audio_samples(&[0; 2048], Timestamp(0));
        sink.audio_samples(&[0; 1024], Timestamp(1920));
        let image = DecodedImage {
            width: 16,
            height: 16,
            pixel_format: Default::default(),
            data: Bytes::new(),
            timestamp: Timestamp(0),
            duration: Some(3003),
        };
        sink.image(&image, image.timestamp, image.duration, Timestamp(0));
        assert_eq!(
            sink.counters(),
            SinkCounters {
                images: 1,
                audio_frames: 2,
                audio_samples: 3072,
            }
        );
    }
}
