//! PSI 段的重组与 PAT/PMT 解析.
//!
//! 一个段可以跨越多个 TS 包, 也可以在同一个包里接续下一个段.
//! `pointer_field` 只出现在带 PUSI 的包中, 指出新段的起点.

use liu_core::crc::crc32_mpeg2;
use liu_core::{LiuError, LiuResult};
use log::trace;

/// PAT table_id
pub const TABLE_ID_PAT: u8 = 0x00;
/// PMT table_id
pub const TABLE_ID_PMT: u8 = 0x02;

/// 段的最大长度 (含 3 字节段头)
const MAX_SECTION_SIZE: usize = 1024;

/// PSI 段重组器
#[derive(Debug, Default)]
pub struct SectionAssembler {
    buf: Vec<u8>,
    active: bool,
}

impl SectionAssembler {
    /// 丢弃未完成的段
    pub fn reset(&mut self) {
        self.buf.clear();
        self.active = false;
    }

    /// 输入一个 TS 包的负载, 返回其中完成的段
    pub fn push(&mut self, payload: &[u8], unit_start: bool) -> Vec<Vec<u8>> {
        let mut sections = Vec::new();
        if unit_start {
            let Some((&pointer, rest)) = payload.split_first() else {
                self.reset();
                return sections;
            };
            let pointer = usize::from(pointer);
            if pointer > rest.len() {
                trace!("PSI: pointer_field 越界, 丢弃");
                self.reset();
                return sections;
            }
            if self.active {
                self.buf.extend_from_slice(&rest[..pointer]);
                self.drain_sections(&mut sections);
            }
            self.buf.clear();
            self.buf.extend_from_slice(&rest[pointer..]);
            self.active = true;
        } else if self.active {
            self.buf.extend_from_slice(payload);
        } else {
            return sections;
        }
        self.drain_sections(&mut sections);
        sections
    }

    fn drain_sections(&mut self, out: &mut Vec<Vec<u8>>) {
        loop {
            // 0xFF 为填充
            if self.buf.first().is_none_or(|&b| b == 0xFF) {
                self.reset();
                return;
            }
            if self.buf.len() < 3 {
                return;
            }
            let total = 3 + section_length(&self.buf);
            if total > MAX_SECTION_SIZE {
                self.reset();
                return;
            }
            if self.buf.len() < total {
                return;
            }
            out.push(self.buf.drain(..total).collect());
        }
    }
}

fn section_length(data: &[u8]) -> usize {
    (usize::from(data[1] & 0x0F) << 8) | usize::from(data[2])
}

/// 长格式 PSI 段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiSection {
    pub table_id: u8,
    /// PAT 中为 transport_stream_id, PMT 中为 program_number
    pub table_id_extension: u16,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    /// 段头之后、CRC 之前的数据
    pub body: Vec<u8>,
}

/// 解析并校验一个完整的长格式段
pub fn parse_section(data: &[u8]) -> LiuResult<PsiSection> {
    if data.len() < 12 {
        return Err(LiuError::InvalidData(format!(
            "PSI: 段太短, len={}",
            data.len()
        )));
    }
    if data[1] & 0x80 == 0 {
        return Err(LiuError::InvalidData(
            "PSI: section_syntax_indicator 为 0".into(),
        ));
    }
    let total = 3 + section_length(data);
    if total != data.len() {
        return Err(LiuError::InvalidData(format!(
            "PSI: 段长度不符, 声明 {total}, 实际 {}",
            data.len()
        )));
    }
    if crc32_mpeg2(data) != 0 {
        return Err(LiuError::InvalidData(format!(
            "PSI: CRC 校验失败, table_id={:#04X}",
            data[0]
        )));
    }

    Ok(PsiSection {
        table_id: data[0],
        table_id_extension: u16::from_be_bytes([data[3], data[4]]),
        version: (data[5] >> 1) & 0x1F,
        current_next: data[5] & 0x01 != 0,
        section_number: data[6],
        last_section_number: data[7],
        body: data[8..total - 4].to_vec(),
    })
}

/// PAT 条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// 解析 PAT, 跳过 program_number 为 0 的网络 PID
pub fn parse_pat(section: &PsiSection) -> LiuResult<Vec<PatEntry>> {
    if section.table_id != TABLE_ID_PAT {
        return Err(LiuError::InvalidData(format!(
            "PAT: table_id 非法 {:#04X}",
            section.table_id
        )));
    }
    Ok(section
        .body
        .chunks_exact(4)
        .map(|e| PatEntry {
            program_number: u16::from_be_bytes([e[0], e[1]]),
            pmt_pid: (u16::from(e[2] & 0x1F) << 8) | u16::from(e[3]),
        })
        .filter(|e| e.program_number != 0)
        .collect())
}

/// PMT 中的一条基本流
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PmtStream {
    pub stream_type: u8,
    pub pid: u16,
    pub language: String,
    pub composition_id: u16,
    pub ancillary_id: u16,
    /// 能确定私有流编码的描述符标签 (0x56/0x59/0x6A/0x7A/0x7B)
    pub codec_descriptor: Option<u8>,
}

/// 解析后的 PMT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_number: u16,
    pub version: u8,
    pub pcr_pid: u16,
    pub streams: Vec<PmtStream>,
}

/// 解析 PMT
pub fn parse_pmt(section: &PsiSection) -> LiuResult<Pmt> {
    if section.table_id != TABLE_ID_PMT {
        return Err(LiuError::InvalidData(format!(
            "PMT: table_id 非法 {:#04X}",
            section.table_id
        )));
    }
    let body = &section.body;
    if body.len() < 4 {
        return Err(LiuError::InvalidData("PMT: 段体太短".into()));
    }
    let pcr_pid = (u16::from(body[0] & 0x1F) << 8) | u16::from(body[1]);
    let program_info_len = (usize::from(body[2] & 0x0F) << 8) | usize::from(body[3]);
    let mut pos = 4 + program_info_len;
    if pos > body.len() {
        return Err(LiuError::InvalidData(
            "PMT: program_info_length 越界".into(),
        ));
    }

    let mut streams = Vec::new();
    while pos + 5 <= body.len() {
        let es_info_len = (usize::from(body[pos + 3] & 0x0F) << 8) | usize::from(body[pos + 4]);
        let descriptors_end = pos + 5 + es_info_len;
        if descriptors_end > body.len() {
            return Err(LiuError::InvalidData(
                "PMT: ES_info_length 越界".into(),
            ));
        }
        let mut stream = PmtStream {
            stream_type: body[pos],
            pid: (u16::from(body[pos + 1] & 0x1F) << 8) | u16::from(body[pos + 2]),
            ..Default::default()
        };
        parse_descriptors(&body[pos + 5..descriptors_end], &mut stream);
        streams.push(stream);
        pos = descriptors_end;
    }

    Ok(Pmt {
        program_number: section.table_id_extension,
        version: section.version,
        pcr_pid,
        streams,
    })
}

fn parse_descriptors(mut data: &[u8], stream: &mut PmtStream) {
    while data.len() >= 2 {
        let tag = data[0];
        let len = usize::from(data[1]);
        let Some(body) = data.get(2..2 + len) else {
            trace!("PMT: 描述符越界, tag={tag:#04X}");
            return;
        };
        match tag {
            // ISO_639_language_descriptor
            0x0A if len >= 3 => stream.language = language_code(&body[..3]),
            // teletext_descriptor: 语言(3) 类型(5)+杂志号(3) 页号(8)
            0x56 => {
                stream.codec_descriptor = Some(tag);
                if len >= 5 {
                    stream.language = language_code(&body[..3]);
                    stream.composition_id = (u16::from(body[3] & 0x07) << 8) | u16::from(body[4]);
                    stream.ancillary_id = u16::from(body[3] >> 3);
                }
            }
            // subtitling_descriptor: 语言(3) 类型(1) 组合页(2) 辅助页(2)
            0x59 => {
                stream.codec_descriptor = Some(tag);
                if len >= 8 {
                    stream.language = language_code(&body[..3]);
                    stream.composition_id = u16::from_be_bytes([body[4], body[5]]);
                    stream.ancillary_id = u16::from_be_bytes([body[6], body[7]]);
                }
            }
            0x6A | 0x7A | 0x7B => stream.codec_descriptor = Some(tag),
            _ => {}
        }
        data = &data[2 + len..];
    }
}

fn language_code(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii_alphanumeric())
        .map(|&b| char::from(b))
        .collect()
}
