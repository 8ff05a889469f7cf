//! 解码输出像素格式.
//!
//! 解码会话按这里指定的目标格式输出图像. 默认是打包 4:2:2 (`2vuy`),
//! 即 Cb Y0 Cr Y1 排列的 UYVY.

use std::fmt;
use std::str::FromStr;

use crate::LiuError;

/// 解码输出像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 打包 YUV 4:2:2, 字节序 U Y0 V Y1 (四字符码 `2vuy`)
    #[default]
    Uyvy422,
    /// 打包 YUV 4:2:2, 字节序 Y0 U Y1 V (四字符码 `yuvs`)
    Yuyv422,
    /// NV12: Y 平面 + UV 交错, 4:2:0 (四字符码 `420v`)
    Nv12,
    /// BGRA 各 8 位, 打包
    Bgra,
}

impl PixelFormat {
    /// 四字符码
    pub const fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Uyvy422 => *b"2vuy",
            Self::Yuyv422 => *b"yuvs",
            Self::Nv12 => *b"420v",
            Self::Bgra => *b"BGRA",
        }
    }

    /// 整帧字节数
    ///
    /// 4:2:2 打包格式要求宽度为偶数, 奇数宽度按向上取整计算.
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            Self::Uyvy422 | Self::Yuyv422 => w.div_ceil(2) * 4 * h,
            Self::Nv12 => w * h + w.div_ceil(2) * 2 * h.div_ceil(2),
            Self::Bgra => w * h * 4,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uyvy422 => "uyvy422",
            Self::Yuyv422 => "yuyv422",
            Self::Nv12 => "nv12",
            Self::Bgra => "bgra",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PixelFormat {
    type Err = LiuError;

    /// 接受名称或四字符码, 大小写不敏感
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uyvy422" | "2vuy" => Ok(Self::Uyvy422),
            "yuyv422" | "yuvs" => Ok(Self::Yuyv422),
            "nv12" | "420v" => Ok(Self::Nv12),
            "bgra" => Ok(Self::Bgra),
            other => Err(LiuError::InvalidArgument(format!("未知像素格式: {other}"))),
        }
    }
}
