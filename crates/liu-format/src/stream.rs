//! 基本流信息.
//!
//! 每个被 PMT 声明的 PID 对应一份 [`StreamInfo`]. PMT 描述符提供语言与
//! 字幕页号, 码流探测补充图像尺寸、帧率与音频参数.

use std::fmt;

/// 基本流元数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    /// ISO 639 语言代码, 未声明时为空
    pub language: String,
    /// 字幕/图文电视的组合页号
    pub composition_id: u16,
    /// 字幕的辅助页号
    pub ancillary_id: u16,
    /// 帧率 = fps_rate / fps_scale
    pub fps_scale: u32,
    pub fps_rate: u32,
    pub interlaced: bool,
    pub width: u32,
    pub height: u32,
    /// 显示宽高比, 0 表示未知
    pub aspect: f32,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub block_align: u32,
    pub bit_rate: u32,
}

impl StreamInfo {
    /// 把组合页号与辅助页号按字节交换后合成一个 32 位标识
    ///
    /// 辅助页号的高字节与低字节都落在最高字节上 (按位或), 与已部署的
    /// 客户端打印的标识保持一致.
    pub fn stream_identifier(&self) -> u32 {
        let composition = u32::from(self.composition_id);
        let ancillary = u32::from(self.ancillary_id);
        ((composition & 0xFF00) >> 8)
            | ((composition & 0x00FF) << 8)
            | ((ancillary & 0xFF00) << 16)
            | ((ancillary & 0x00FF) << 24)
    }

    /// 图像尺寸是否已知
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// 帧率 (帧/秒), 未知时返回 `None`
    pub fn frame_rate(&self) -> Option<f64> {
        (self.fps_scale > 0 && self.fps_rate > 0)
            .then(|| f64::from(self.fps_rate) / f64::from(self.fps_scale))
    }
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.language.is_empty() {
            write!(f, "[{}] ", self.language)?;
        }
        if self.has_dimensions() {
            write!(f, "{}x{}", self.width, self.height)?;
            if let Some(fps) = self.frame_rate() {
                write!(f, " @ {fps:.3} fps")?;
            }
            if self.interlaced {
                f.write_str(" (隔行)")?;
            }
        } else if self.sample_rate > 0 {
            write!(f, "{} Hz, {} 声道", self.sample_rate, self.channels)?;
        } else {
            f.write_str("参数未知")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_流标识字节交换() {
        let info = StreamInfo {
            composition_id: 0x1234,
            ancillary_id: 0x5678,
            ..Default::default()
        };
        // 0x56 | 0x78 同在最高字节
        assert_eq!(info.stream_identifier(), 0x7E00_3412);

        let info = StreamInfo {
            composition_id: 0x0001,
            ancillary_id: 0x0002,
            ..Default::default()
        };
        assert_eq!(info.stream_identifier(), 0x0200_0100);
    }

    #[test]
    fn test_显示() {
        let video = StreamInfo {
            width: 1280,
            height: 720,
            fps_scale: 1001,
            fps_rate: 30000,
            ..Default::default()
        };
        assert_eq!(video.to_string(), "1280x720 @ 29.970 fps");

        let audio = StreamInfo {
            language: "eng".into(),
            sample_rate: 48000,
            channels: 2,
            ..Default::default()
        };
        assert_eq!(audio.to_string(), "[eng] 48000 Hz, 2 声道");
        assert_eq!(StreamInfo::default().to_string(), "参数未知");
    }
}
