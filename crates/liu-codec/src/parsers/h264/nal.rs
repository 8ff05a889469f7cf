//! H.264 NAL (Network Abstraction Layer) 单元解析.
//!
//! # Annex B 格式
//!
//! PES 负载中的 NAL 单元以起始码分隔:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 解析结果 [`NalUnit`] 只借用源负载, 生命周期不会超过负载本身.
//! 需要跨线程交给解码会话时, 先组装成拥有所有权的访问单元.

use liu_core::{LiuError, LiuResult};

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A
    SliceDpa,
    /// 数据分区 B
    SliceDpb,
    /// 数据分区 C
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    EndOfSequence,
    EndOfStream,
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 未知类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            _ => Self::Unknown(type_id),
        }
    }

    /// 类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为参数集 (SPS / SPS 扩展 / PPS)
    ///
    /// 参数集在创建解码会话时带外传递, 不进入访问单元.
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Sps | Self::SpsExtension | Self::Pps)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 借用源负载的 NAL 单元视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc (参考重要性, 0-3)
    pub ref_idc: u8,
    /// 不含起始码、含头部字节的原始数据
    pub data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// 从 NAL 数据 (含头部字节) 解析
    pub fn parse(data: &'a [u8]) -> LiuResult<Self> {
        let Some(&header) = data.first() else {
            return Err(LiuError::InvalidData("H.264: NAL 单元数据为空".into()));
        };

        if header & 0x80 != 0 {
            return Err(LiuError::InvalidData(format!(
                "H.264: forbidden_zero_bit 非法, header=0x{header:02X}"
            )));
        }

        Ok(Self {
            nal_type: NalUnitType::from_type_id(header & 0x1F),
            ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    /// 字节长度 (含头部)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 去掉头部字节和防竞争字节后的 RBSP
    pub fn rbsp(&self) -> Vec<u8> {
        remove_emulation_prevention(&self.data[1..])
    }
}

/// Annex B 字节流的 NAL 单元迭代器
///
/// 每次产出一个 NAL 单元. 首个起始码之前出现非零字节, 或者 NAL
/// 头部非法时产出一次错误, 之后迭代结束, 剩余数据不再解析.
pub struct AnnexBReader<'a> {
    data: &'a [u8],
    pos: usize,
    started: bool,
    done: bool,
}

impl<'a> AnnexBReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            started: false,
            done: false,
        }
    }

    fn fail(&mut self, err: LiuError) -> Option<LiuResult<NalUnit<'a>>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for AnnexBReader<'a> {
    type Item = LiuResult<NalUnit<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if !self.started {
            self.started = true;
            match find_start_code(self.data, 0) {
                Some(sc) if self.data[..sc].iter().all(|&b| b == 0) => self.pos = sc + 3,
                Some(sc) => {
                    return self.fail(LiuError::InvalidData(format!(
                        "H.264: 起始码之前有 {sc} 字节无法识别的数据"
                    )));
                }
                None if self.data.iter().all(|&b| b == 0) => {
                    self.done = true;
                    return None;
                }
                None => {
                    return self.fail(LiuError::InvalidData(
                        "H.264: 负载中找不到 Annex B 起始码".into(),
                    ));
                }
            }
        }

        loop {
            let start = self.pos;
            if start >= self.data.len() {
                self.done = true;
                return None;
            }

            let (end, next_pos) = match find_start_code(self.data, start) {
                Some(sc) => (sc, sc + 3),
                None => (self.data.len(), self.data.len()),
            };
            self.pos = next_pos;

            // 去除尾部的 0 字节 (trailing_zero_8bits 与 4 字节起始码的前导 0)
            let mut nal_end = end;
            while nal_end > start && self.data[nal_end - 1] == 0x00 {
                nal_end -= 1;
            }
            if nal_end == start {
                continue;
            }

            return match NalUnit::parse(&self.data[start..nal_end]) {
                Ok(nalu) => Some(Ok(nalu)),
                Err(e) => self.fail(e),
            };
        }
    }
}

/// 把 Annex B 字节流完整切分为 NAL 单元, 遇到非法分帧即返回错误
pub fn split_annex_b(data: &[u8]) -> LiuResult<Vec<NalUnit<'_>>> {
    AnnexBReader::new(data).collect()
}

/// 查找 `from` 之后第一个 `00 00 01` 的位置
fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < 3 {
        return None;
    }
    (from..data.len() - 2).find(|&i| data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x01)
}

/// 移除防竞争字节 (0x00 0x00 0x03 → 0x00 0x00)
fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0usize;

    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0x00 { zeros + 1 } else { 0 };
        rbsp.push(byte);
    }

    rbsp
}
