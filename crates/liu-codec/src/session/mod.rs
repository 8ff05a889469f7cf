//! 视频解码会话接口.
//!
//! 解码会话接收长度前缀格式的访问单元, 在自己的线程上异步解码, 通过回调
//! 交付图像. 回调可能乱序到达, 所以每次提交都附带 [`DecodeContext`],
//! 回调从这里取回提交时的时间戳, 不读取任何共享的"当前时间戳".
//!
//! 关闭顺序: 输出延迟帧 → 等待异步帧 → 使会话失效 → 释放会话 → 释放格式描述.

pub mod threaded;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use liu_core::{LiuError, LiuResult, PixelFormat, Timestamp};
use log::{debug, warn};

use crate::access_unit::{AccessUnit, NAL_LENGTH_SIZE, ParameterSets};
use crate::parsers::h264::{Sps, parse_sps};

/// 由 SPS/PPS 构造的视频格式描述
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescription {
    sps: Bytes,
    pps: Bytes,
    width: u32,
    height: u32,
    nal_length_size: usize,
    parsed_sps: Sps,
}

impl FormatDescription {
    /// 从参数集和已知图像尺寸创建
    ///
    /// 参数集会被复制, 格式描述的生命周期与源负载无关.
    pub fn from_parameter_sets(
        sets: &ParameterSets<'_>,
        width: u32,
        height: u32,
    ) -> LiuResult<Self> {
        if width == 0 || height == 0 {
            return Err(LiuError::Session(format!(
                "格式描述需要有效尺寸, 实际 {width}x{height}"
            )));
        }
        let parsed_sps = parse_sps(&sets.sps.rbsp())
            .map_err(|e| LiuError::Session(format!("无法从 SPS 创建格式描述: {e}")))?;
        if sets.pps.len() < 2 {
            return Err(LiuError::Session("PPS 数据太短".into()));
        }

        Ok(Self {
            sps: Bytes::copy_from_slice(sets.sps.data),
            pps: Bytes::copy_from_slice(sets.pps.data),
            width,
            height,
            nal_length_size: NAL_LENGTH_SIZE,
            parsed_sps,
        })
    }

    pub fn sps(&self) -> &Bytes {
        &self.sps
    }

    pub fn pps(&self) -> &Bytes {
        &self.pps
    }

    /// 创建时记录的图像尺寸 (来自流信息)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn nal_length_size(&self) -> usize {
        self.nal_length_size
    }

    pub fn parsed_sps(&self) -> &Sps {
        &self.parsed_sps
    }

    /// 单帧时长 (90 kHz), SPS 没有 timing_info 时未知
    pub fn frame_duration(&self) -> Option<i64> {
        let (scale, rate) = self.parsed_sps.frame_rate()?;
        Some(i64::from(scale) * 90_000 / i64::from(rate))
    }

    /// 构造 AVCDecoderConfigurationRecord (avcC)
    pub fn avc_decoder_config(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(11 + self.sps.len() + self.pps.len());
        out.push(1); // configurationVersion
        out.push(self.sps.get(1).copied().unwrap_or(0)); // profile_idc
        out.push(self.sps.get(2).copied().unwrap_or(0)); // profile_compatibility
        out.push(self.sps.get(3).copied().unwrap_or(0)); // level_idc
        out.push(0xFC | (self.nal_length_size as u8 - 1));
        out.push(0xE1); // 一个 SPS
        out.extend_from_slice(&(self.sps.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.sps);
        out.push(1); // 一个 PPS
        out.extend_from_slice(&(self.pps.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.pps);
        out
    }
}

/// 解码会话配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// 目标像素格式
    pub pixel_format: PixelFormat,
    /// 实时解码提示
    pub real_time: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Uyvy422,
            real_time: true,
        }
    }
}

/// 单次提交的上下文, 随回调原样返回
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    /// 来源 PES 的显示时间戳
    pub pts: Timestamp,
    /// 提交序号, 从 0 递增
    pub sequence: u64,
}

/// 解码输出图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// 像素数据, 按 `pixel_format` 排列; 不输出像素的会话为空
    pub data: Bytes,
    /// 解码器给出的显示时间戳
    pub timestamp: Timestamp,
    /// 解码器给出的帧时长 (90 kHz)
    pub duration: Option<i64>,
}

/// 解码完成回调, 可能在任意线程上被调用
pub type FrameCallback = Arc<dyn Fn(DecodeContext, LiuResult<DecodedImage>) + Send + Sync>;

/// 异步解压会话
pub trait DecompressionSession: Send {
    /// 异步提交一个访问单元
    fn decode(&mut self, unit: AccessUnit, context: DecodeContext) -> LiuResult<()>;

    /// 要求输出所有被延迟 (重排序) 的帧
    fn finish_delayed_frames(&mut self) -> LiuResult<()>;

    /// 阻塞直到所有已提交的帧都已回调
    fn wait_for_async_frames(&mut self) -> LiuResult<()>;

    /// 使会话失效, 之后不再产生回调
    fn invalidate(&mut self);
}

/// 解压会话工厂
pub trait SessionFactory: Send {
    fn create_session(
        &self,
        format: Arc<FormatDescription>,
        config: &SessionConfig,
        callback: FrameCallback,
    ) -> LiuResult<Box<dyn DecompressionSession>>;
}

/// 已创建的视频解码器: 格式描述 + 会话
///
/// 销毁时按固定顺序排空并释放资源.
pub struct VideoDecoder {
    session: Option<Box<dyn DecompressionSession>>,
    format: Option<Arc<FormatDescription>>,
    next_sequence: u64,
}

impl VideoDecoder {
    pub fn new(format: Arc<FormatDescription>, session: Box<dyn DecompressionSession>) -> Self {
        Self {
            session: Some(session),
            format: Some(format),
            next_sequence: 0,
        }
    }

    pub fn format(&self) -> Option<&FormatDescription> {
        self.format.as_deref()
    }

    /// 已提交的访问单元数
    pub fn submitted(&self) -> u64 {
        self.next_sequence
    }

    /// 提交访问单元, 时间戳随上下文带入回调
    pub fn submit(&mut self, unit: AccessUnit) -> LiuResult<DecodeContext> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| LiuError::Session("解码会话已关闭".into()))?;
        let context = DecodeContext {
            pts: unit.pts,
            sequence: self.next_sequence,
        };
        session.decode(unit, context)?;
        self.next_sequence += 1;
        Ok(context)
    }

    /// 按顺序关闭: 延迟帧 → 异步帧 → 失效 → 释放会话 → 释放格式描述
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.finish_delayed_frames() {
                warn!("输出延迟帧失败: {e}");
            }
            if let Err(e) = session.wait_for_async_frames() {
                warn!("等待异步帧失败: {e}");
            }
            session.invalidate();
            drop(session);
            debug!("解码会话已释放, 共提交 {} 个访问单元", self.next_sequence);
        }
        self.format = None;
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for VideoDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoDecoder")
            .field("open", &self.session.is_some())
            .field("format", &self.format)
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}
