//! 接收端配置.
//!
//! 配置可以从 JSON 文件加载, 缺省字段取默认值. 命令行参数在加载之后覆盖.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use liu_codec::SessionConfig;
use liu_core::PixelFormat;
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// 默认端口
pub const DEFAULT_PORT: u16 = 5198;
/// 默认单次读取缓冲区大小
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// 单次 socket 读取的最大字节数
    pub read_buffer_size: usize,
    /// 解码输出像素格式
    #[serde(with = "pixel_format_serde")]
    pub pixel_format: PixelFormat,
    /// 实时解码提示
    pub real_time: bool,
    /// 0=info, 1=debug, 2+=trace
    pub verbosity: u8,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER,
            pixel_format: PixelFormat::default(),
            real_time: true,
            verbosity: 0,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("解析配置文件失败, path={}", path.display()))
    }

    /// 检查必填字段
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("必须指定服务器地址");
        }
        if self.port == 0 {
            bail!("端口不能为 0");
        }
        if self.read_buffer_size == 0 {
            bail!("读取缓冲区大小不能为 0");
        }
        Ok(())
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            pixel_format: self.pixel_format,
            real_time: self.real_time,
        }
    }
}

/// 像素格式按名称或 FourCC 字符串序列化
mod pixel_format_serde {
    use liu_core::PixelFormat;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(format: &PixelFormat, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(format)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PixelFormat, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(D::Error::custom)
    }
}
