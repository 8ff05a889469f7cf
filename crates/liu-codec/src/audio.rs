//! AAC 解码路径.
//!
//! 解码器在收到第一个音频负载时初始化, 成功后上报一次采样率与声道数.
//! 之后每个负载循环解码, 直到字节耗尽, 每个输出块带上该负载的 PTS.

use liu_core::{LiuResult, Timestamp};
use log::{debug, warn};

/// 音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u32,
}

/// 一次解码调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAudio<'a> {
    /// 本次消耗的输入字节数, 为 0 表示需要更多数据
    pub consumed: usize,
    /// 交错的 16 位 PCM 采样, 可能为空
    pub samples: &'a [i16],
}

/// 增量式 AAC 解码器
pub trait AudioDecoder: Send {
    /// 用首个负载初始化, 返回流的音频格式
    fn init(&mut self, data: &[u8]) -> LiuResult<AudioFormat>;

    /// 从 `data` 开头解码, 每次调用可以消耗任意字节数
    fn decode(&mut self, data: &[u8]) -> LiuResult<DecodedAudio<'_>>;
}

impl<D: AudioDecoder + ?Sized> AudioDecoder for Box<D> {
    fn init(&mut self, data: &[u8]) -> LiuResult<AudioFormat> {
        (**self).init(data)
    }

    fn decode(&mut self, data: &[u8]) -> LiuResult<DecodedAudio<'_>> {
        (**self).decode(data)
    }
}

/// 音频输出
pub trait AudioSink {
    fn audio_format(&self, format: AudioFormat, pts: Timestamp);
    fn audio_samples(&self, samples: &[i16], pts: Timestamp);
}

/// AAC 解码路径
pub struct AacDecodePath<D> {
    decoder: D,
    format: Option<AudioFormat>,
}

impl<D: AudioDecoder> AacDecodePath<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            format: None,
        }
    }

    /// 初始化成功后的音频格式
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// 解码一个音频负载
    ///
    /// 初始化失败时丢弃本负载, 下一个负载重试. 解码错误丢弃负载剩余部分.
    pub fn decode(&mut self, data: &[u8], pts: Timestamp, sink: &dyn AudioSink) {
        if self.format.is_none() {
            match self.decoder.init(data) {
                Ok(format) => {
                    debug!(
                        "AAC 解码器初始化: {} Hz, {} 声道",
                        format.sample_rate, format.channels
                    );
                    self.format = Some(format);
                    sink.audio_format(format, pts);
                }
                Err(e) => {
                    warn!("AAC 解码器初始化失败: {e}");
                    return;
                }
            }
        }

        let mut remaining = data;
        while !remaining.is_empty() {
            let decoded = match self.decoder.decode(remaining) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("AAC 解码失败, 丢弃剩余 {} 字节: {e}", remaining.len());
                    return;
                }
            };
            if decoded.consumed == 0 {
                break;
            }
            if !decoded.samples.is_empty() {
                sink.audio_samples(decoded.samples, pts);
            }
            remaining = &remaining[decoded.consumed.min(remaining.len())..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liu_core::LiuError;
    use std::cell::RefCell;

    /// 每帧 4 字节, 首字节为 0xFF 时报错, 不足 4 字节时需要更多数据
    struct FixedFrameDecoder {
        init_failures: u32,
        pcm: Vec<i16>,
    }

    impl AudioDecoder for FixedFrameDecoder {
        fn init(&mut self, _data: &[u8]) -> LiuResult<AudioFormat> {
            if self.init_failures > 0 {
                self.init_failures -= 1;
                return Err(LiuError::InvalidData("缺少 ADTS 帧头".into()));
            }
            Ok(AudioFormat {
                sample_rate: 48000,
                channels: 2,
            })
        }

        fn decode(&mut self, data: &[u8]) -> LiuResult<DecodedAudio<'_>> {
            if data[0] == 0xFF {
                return Err(LiuError::Codec("坏帧".into()));
            }
            if data.len() < 4 {
                return Ok(DecodedAudio {
                    consumed: 0,
                    samples: &[],
                });
            }
            self.pcm = vec![i16::from(data[0]); 2];
            Ok(DecodedAudio {
                consumed: 4,
                samples: &self.pcm,
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: RefCell<Vec<String>>,
    }

    impl AudioSink for RecordingSink {
        fn audio_format(&self, format: AudioFormat, pts: Timestamp) {
            self.events.borrow_mut().push(format!(
                "format {} {} {}",
                format.sample_rate, format.channels, pts.0
            ));
        }

        fn audio_samples(&self, samples: &[i16], pts: Timestamp) {
            self.events
                .borrow_mut()
                .push(format!("samples {} {} {}", samples[0], samples.len() * 2, pts.0));
        }
    }

    fn decoder(init_failures: u32) -> FixedFrameDecoder {
        FixedFrameDecoder {
            init_failures,
            pcm: Vec::new(),
        }
    }

    #[test]
    fn test_首个负载初始化并逐帧输出() {
        let sink = RecordingSink::default();
        let mut path = AacDecodePath::new(decoder(0));
        path.decode(&[1, 0, 0, 0, 2, 0, 0, 0], Timestamp(900), &sink);
        path.decode(&[3, 0, 0, 0], Timestamp(2820), &sink);
        assert_eq!(
            *sink.events.borrow(),
            vec![
                "format 48000 2 900",
                "samples 1 4 900",
                "samples 2 4 900",
                "samples 3 4 2820",
            ]
        );
    }

    #[test]
    fn test_初始化失败时下个负载重试() {
        let sink = RecordingSink::default();
        let mut path = AacDecodePath::new(decoder(1));
        path.decode(&[1, 0, 0, 0], Timestamp(0), &sink);
        assert!(path.format().is_none());
        assert!(sink.events.borrow().is_empty());

        path.decode(&[1, 0, 0, 0], Timestamp(1920), &sink);
        assert_eq!(path.format().map(|f| f.sample_rate), Some(48000));
        assert_eq!(sink.events.borrow()[0], "format 48000 2 1920");
    }

    #[test]
    fn test_解码错误丢弃负载剩余部分() {
        let sink = RecordingSink::default();
        let mut path = AacDecodePath::new(decoder(0));
        path.decode(&[1, 0, 0, 0, 0xFF, 0, 0, 0, 2, 0, 0, 0], Timestamp(5), &sink);
        assert_eq!(sink.events.borrow().len(), 2);
    }

    #[test]
    fn test_消耗零字节时停止() {
        let sink = RecordingSink::default();
        let mut path = AacDecodePath::new(decoder(0));
        path.decode(&[1, 0, 0, 0, 2, 0], Timestamp(5), &sink);
        assert_eq!(
            *sink.events.borrow(),
            vec!["format 48000 2 5", "samples 1 4 5"]
        );
    }
}
