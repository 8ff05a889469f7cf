//! 访问单元组装.
//!
//! 一个视频 PES 负载经 Annex B 切分后, 剔除参数集, 其余 NAL 单元按原顺序
//! 拼成 `{4 字节大端长度, NAL 数据}*` 的长度前缀格式.

use bytes::{BufMut, Bytes, BytesMut};
use liu_core::{LiuError, LiuResult, Timestamp};

use crate::parsers::h264::{NalUnit, NalUnitType};

/// NAL 长度前缀字节数
pub const NAL_LENGTH_SIZE: usize = 4;

/// 长度前缀格式的访问单元
///
/// 拥有自己的数据, 可以跨线程提交给解码会话.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub data: Bytes,
    /// 来源 PES 的显示时间戳
    pub pts: Timestamp,
}

/// 把 NAL 单元组装为访问单元
///
/// SPS、SPS 扩展和 PPS 被剔除. 没有任何可显示的 NAL 单元时返回 `None`,
/// 此时不应提交给解码器.
pub fn build_access_unit(nalus: &[NalUnit<'_>], pts: Timestamp) -> Option<AccessUnit> {
    let size: usize = nalus
        .iter()
        .filter(|n| !n.nal_type.is_parameter_set())
        .map(|n| NAL_LENGTH_SIZE + n.len())
        .sum();
    if size == 0 {
        return None;
    }

    let mut buf = BytesMut::with_capacity(size);
    for nalu in nalus.iter().filter(|n| !n.nal_type.is_parameter_set()) {
        buf.put_u32(nalu.len() as u32);
        buf.put_slice(nalu.data);
    }
    debug_assert_eq!(buf.len(), size);

    Some(AccessUnit {
        data: buf.freeze(),
        pts,
    })
}

/// 一个负载中最后出现的 SPS 与 PPS
///
/// 同一负载里重复出现的参数集以后出现的为准.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSets<'a> {
    pub sps: NalUnit<'a>,
    pub pps: NalUnit<'a>,
}

impl<'a> ParameterSets<'a> {
    /// 扫描负载中的全部 NAL 单元, 缺少 SPS 或 PPS 时返回错误
    pub fn find_last(nalus: &[NalUnit<'a>]) -> LiuResult<Self> {
        let mut sps = None;
        let mut pps = None;
        for nalu in nalus {
            match nalu.nal_type {
                NalUnitType::Sps => sps = Some(*nalu),
                NalUnitType::Pps => pps = Some(*nalu),
                _ => {}
            }
        }

        match (sps, pps) {
            (Some(sps), Some(pps)) => Ok(Self { sps, pps }),
            (None, _) => Err(LiuError::InvalidData("H.264: 负载中没有 SPS".into())),
            (_, None) => Err(LiuError::InvalidData("H.264: 负载中没有 PPS".into())),
        }
    }
}
