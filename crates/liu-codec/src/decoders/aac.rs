//! 基于 symphonia 的 ADTS AAC 解码器.
//!
//! 每次调用只解码位于输入开头的一个 ADTS 帧. 帧前的垃圾字节被跳过并计入
//! 消耗字节数, 不完整的帧返回消耗 0 字节.

use liu_core::{LiuError, LiuResult};
use symphonia_codec_aac::AacDecoder as SymAacDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CODEC_TYPE_AAC, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::formats::Packet as SymPacket;

use crate::audio::{AudioDecoder, AudioFormat, DecodedAudio};
use crate::parsers::aac::{find_adts_sync, parse_adts_header};

/// ADTS AAC 解码器
#[derive(Default)]
pub struct SymphoniaAacDecoder {
    decoder: Option<SymAacDecoder>,
    samples: Option<SampleBuffer<i16>>,
    frames: u64,
}

impl SymphoniaAacDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已解码的 ADTS 帧数
    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }
}

impl AudioDecoder for SymphoniaAacDecoder {
    fn init(&mut self, data: &[u8]) -> LiuResult<AudioFormat> {
        let (_, header) = find_adts_sync(data)
            .ok_or_else(|| LiuError::InvalidData("负载中没有 ADTS 帧头".into()))?;

        let mut params = SymCodecParameters::new();
        params
            .for_codec(CODEC_TYPE_AAC)
            .with_sample_rate(header.sample_rate())
            .with_extra_data(header.audio_specific_config().into_boxed_slice());

        let decoder = SymAacDecoder::try_new(&params, &SymDecoderOptions::default())
            .map_err(|e| LiuError::Codec(format!("symphonia aac init failed: {e}")))?;
        self.decoder = Some(decoder);
        self.samples = None;

        Ok(AudioFormat {
            sample_rate: header.sample_rate(),
            channels: header.channels(),
        })
    }

    fn decode(&mut self, data: &[u8]) -> LiuResult<DecodedAudio<'_>> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| LiuError::Codec("AAC 解码器未初始化".into()))?;

        let header = match parse_adts_header(data) {
            Ok(header) => header,
            Err(LiuError::NeedMoreData) => {
                return Ok(DecodedAudio {
                    consumed: 0,
                    samples: &[],
                });
            }
            Err(_) => {
                // 跳到下一个同步字
                let (offset, _) = find_adts_sync(data)
                    .ok_or_else(|| LiuError::InvalidData("找不到 ADTS 同步字".into()))?;
                return Ok(DecodedAudio {
                    consumed: offset,
                    samples: &[],
                });
            }
        };
        if data.len() < header.frame_length {
            return Ok(DecodedAudio {
                consumed: 0,
                samples: &[],
            });
        }

        let raw = &data[header.header_len()..header.frame_length];
        let packet = SymPacket::new_from_slice(0, self.frames * 1024, 1024, raw);
        let decoded = decoder
            .decode(&packet)
            .map_err(|e| LiuError::Codec(format!("symphonia aac decode failed: {e}")))?;

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let needed = capacity * spec.channels.count() as u64;
        if self
            .samples
            .as_ref()
            .is_some_and(|buf| (buf.capacity() as u64) < needed)
        {
            self.samples = None;
        }
        let buffer = self
            .samples
            .get_or_insert_with(|| SampleBuffer::<i16>::new(capacity, spec));
        buffer.copy_interleaved_ref(decoded);
        self.frames += 1;

        Ok(DecodedAudio {
            consumed: header.frame_length,
            samples: buffer.samples(),
        })
    }
}
