//! H.264 访问单元组装与解码器引导.
//!
//! 视频 PES 负载先按 Annex B 切分为 NAL 单元. 解码器尚未创建时, 用负载中
//! 最后出现的 SPS/PPS 和流信息给出的尺寸创建格式描述与解码会话; 之后每个
//! 负载剔除参数集, 组装成长度前缀格式提交.

use std::sync::Arc;

use liu_core::{LiuError, LiuResult, Timestamp};
use log::{debug, warn};

use crate::access_unit::{ParameterSets, build_access_unit};
use crate::parsers::h264::{AnnexBReader, NalUnit};
use crate::session::{
    DecodeContext, FormatDescription, FrameCallback, SessionConfig, SessionFactory, VideoDecoder,
};

/// 一次 Annex B 切分的结果
///
/// 遇到格式错误时保留错误之前已切出的 NAL 单元, 负载剩余部分丢弃.
#[derive(Debug)]
pub struct ParsedPayload<'a> {
    pub nalus: Vec<NalUnit<'a>>,
    pub error: Option<LiuError>,
}

/// 切分负载并识别每个 NAL 单元的类型
pub fn parse_and_classify(payload: &[u8]) -> ParsedPayload<'_> {
    let mut nalus = Vec::new();
    let mut error = None;
    for item in AnnexBReader::new(payload) {
        match item {
            Ok(nalu) => nalus.push(nalu),
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }
    ParsedPayload { nalus, error }
}

/// 访问单元组装器, 持有 (至多一个) 视频解码器
pub struct AccessUnitAssembler {
    factory: Box<dyn SessionFactory>,
    config: SessionConfig,
    callback: FrameCallback,
    decoder: Option<VideoDecoder>,
}

impl AccessUnitAssembler {
    pub fn new(
        factory: Box<dyn SessionFactory>,
        config: SessionConfig,
        callback: FrameCallback,
    ) -> Self {
        Self {
            factory,
            config,
            callback,
            decoder: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.decoder.is_some()
    }

    /// 当前解码器的格式描述
    pub fn format(&self) -> Option<&FormatDescription> {
        self.decoder.as_ref().and_then(|d| d.format())
    }

    /// 已提交的访问单元数
    pub fn submitted(&self) -> u64 {
        self.decoder.as_ref().map_or(0, |d| d.submitted())
    }

    /// 用 NAL 单元中的参数集创建解码器
    ///
    /// 失败时不留下任何部分状态, 下一个负载可以重试.
    pub fn bootstrap(&mut self, nalus: &[NalUnit<'_>], width: u32, height: u32) -> LiuResult<()> {
        let sets = ParameterSets::find_last(nalus)?;
        let format = Arc::new(FormatDescription::from_parameter_sets(&sets, width, height)?);
        let session = self
            .factory
            .create_session(format.clone(), &self.config, self.callback.clone())?;

        debug!(
            "视频解码器已创建: {width}x{height}, SPS {} 字节, PPS {} 字节, {}",
            format.sps().len(),
            format.pps().len(),
            self.config.pixel_format
        );
        self.decoder = Some(VideoDecoder::new(format, session));
        Ok(())
    }

    /// 从负载引导解码器
    pub fn bootstrap_from_payload(
        &mut self,
        payload: &[u8],
        width: u32,
        height: u32,
    ) -> LiuResult<()> {
        let parsed = parse_and_classify(payload);
        if let Some(e) = &parsed.error {
            debug!("引导时 NAL 切分中止: {e}");
        }
        self.bootstrap(&parsed.nalus, width, height)
    }

    /// 组装并提交一个访问单元
    ///
    /// 没有可显示的 NAL 单元时返回 `Ok(None)`.
    pub fn submit(
        &mut self,
        nalus: &[NalUnit<'_>],
        pts: Timestamp,
    ) -> LiuResult<Option<DecodeContext>> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| LiuError::Session("视频解码器尚未创建".into()))?;
        match build_access_unit(nalus, pts) {
            Some(unit) => decoder.submit(unit).map(Some),
            None => Ok(None),
        }
    }

    /// 解码一个视频负载
    ///
    /// 切分错误会被记录, 错误之前的 NAL 单元仍然提交. 提交失败只记录日志.
    pub fn decode_payload(&mut self, payload: &[u8], pts: Timestamp) -> Option<DecodeContext> {
        let parsed = parse_and_classify(payload);
        if let Some(e) = &parsed.error {
            warn!("NAL 切分失败, 丢弃负载剩余部分: {e}");
        }
        match self.submit(&parsed.nalus, pts) {
            Ok(context) => context,
            Err(e) => {
                warn!("提交访问单元失败 (pts={pts}): {e}");
                None
            }
        }
    }

    /// 按顺序关闭并释放解码器
    pub fn shutdown(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.shutdown();
        }
    }
}

impl Drop for AccessUnitAssembler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
