//! 传输流基本流类型.
//!
//! PMT 中的 `stream_type` 字节只能粗略确定编码, 私有流 (0x06)
//! 还需要结合 ES 描述符才能识别 AC-3、DVB 字幕等.

use std::fmt;

/// 基本流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamType {
    /// 未知或不支持的类型
    #[default]
    Unknown,
    /// MPEG-1 视频
    VideoMpeg1,
    /// MPEG-2 视频
    VideoMpeg2,
    /// MPEG-4 Part 2 视频
    VideoMpeg4,
    /// H.264 / AVC
    VideoH264,
    /// H.265 / HEVC
    VideoHevc,
    /// SMPTE VC-1
    VideoVc1,
    /// MPEG-1 音频
    AudioMpeg1,
    /// MPEG-2 音频
    AudioMpeg2,
    /// ADTS 封装的 AAC
    AudioAacAdts,
    /// LATM 封装的 AAC
    AudioAacLatm,
    /// AC-3
    AudioAc3,
    /// E-AC-3
    AudioEac3,
    /// DTS
    AudioDts,
    /// 蓝光 LPCM
    AudioLpcm,
    /// DVB 字幕
    DvbSubtitle,
    /// 图文电视
    DvbTeletext,
    /// 未识别的私有数据流
    PrivateData,
}

impl StreamType {
    /// 从 PMT 的 `stream_type` 字节映射
    pub fn from_ts_stream_type(stream_type: u8) -> Self {
        match stream_type {
            0x01 => Self::VideoMpeg1,
            0x02 => Self::VideoMpeg2,
            0x03 => Self::AudioMpeg1,
            0x04 => Self::AudioMpeg2,
            0x06 => Self::PrivateData,
            0x0F => Self::AudioAacAdts,
            0x10 => Self::VideoMpeg4,
            0x11 => Self::AudioAacLatm,
            0x1B => Self::VideoH264,
            0x24 => Self::VideoHevc,
            0x80 => Self::AudioLpcm,
            0x81 => Self::AudioAc3,
            0x82 | 0x85 | 0x8A => Self::AudioDts,
            0x87 => Self::AudioEac3,
            0xEA => Self::VideoVc1,
            _ => Self::Unknown,
        }
    }

    /// 根据 ES 描述符细化私有流类型
    ///
    /// 仅对 `PrivateData` 生效, 其他类型原样返回.
    pub fn refine_with_descriptor(self, descriptor_tag: u8) -> Self {
        if self != Self::PrivateData {
            return self;
        }
        match descriptor_tag {
            0x56 => Self::DvbTeletext,
            0x59 => Self::DvbSubtitle,
            0x6A => Self::AudioAc3,
            0x7A => Self::AudioEac3,
            0x7B => Self::AudioDts,
            _ => self,
        }
    }

    /// 编解码器短名称
    pub const fn codec_name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::VideoMpeg1 => "mpeg1video",
            Self::VideoMpeg2 => "mpeg2video",
            Self::VideoMpeg4 => "mpeg4",
            Self::VideoH264 => "h264",
            Self::VideoHevc => "hevc",
            Self::VideoVc1 => "vc1",
            Self::AudioMpeg1 => "mp1",
            Self::AudioMpeg2 => "mp2",
            Self::AudioAacAdts => "aac",
            Self::AudioAacLatm => "aac_latm",
            Self::AudioAc3 => "ac3",
            Self::AudioEac3 => "eac3",
            Self::AudioDts => "dts",
            Self::AudioLpcm => "lpcm",
            Self::DvbSubtitle => "dvbsub",
            Self::DvbTeletext => "teletext",
            Self::PrivateData => "data",
        }
    }

    /// 是否应当建立 PES 重组
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codec_name())
    }
}
