//! PES 包头解析与 PES 单元重组.

use liu_core::{LiuError, LiuResult, Timestamp};

/// PES 包头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    pub stream_id: u8,
    /// PES_packet_length, 0 表示不定长 (常见于视频)
    pub packet_length: usize,
    pub pts: Timestamp,
    pub dts: Timestamp,
    /// 包头总长度, 负载从这里开始
    pub header_len: usize,
}

/// 解析 PES 包头, 提取 PTS/DTS
pub fn parse_pes_header(data: &[u8]) -> LiuResult<PesHeader> {
    if data.len() < 6 {
        return Err(LiuError::NeedMoreData);
    }
    if data[..3] != [0x00, 0x00, 0x01] {
        return Err(LiuError::InvalidData("PES: 起始码不匹配".into()));
    }
    let stream_id = data[3];
    let packet_length = usize::from(u16::from_be_bytes([data[4], data[5]]));
    let mut header = PesHeader {
        stream_id,
        packet_length,
        pts: Timestamp::NONE,
        dts: Timestamp::NONE,
        header_len: 6,
    };

    // padding_stream / private_stream_2 等没有可选包头
    if matches!(stream_id, 0xBC | 0xBE | 0xBF | 0xF0 | 0xF1 | 0xF2 | 0xF8 | 0xFF) {
        return Ok(header);
    }
    if data.len() < 9 {
        return Err(LiuError::NeedMoreData);
    }
    if data[6] & 0xC0 != 0x80 {
        return Err(LiuError::InvalidData("PES: 可选包头标记位非法".into()));
    }

    let pts_dts_flags = (data[7] >> 6) & 0x03;
    header.header_len = 9 + usize::from(data[8]);
    if header.header_len > data.len() {
        return Err(LiuError::InvalidData(format!(
            "PES: 包头长度 {} 超出数据 {}",
            header.header_len,
            data.len()
        )));
    }

    if pts_dts_flags & 0x02 != 0 {
        let pts = data
            .get(9..14)
            .ok_or_else(|| LiuError::InvalidData("PES: PTS 不完整".into()))?;
        header.pts = Timestamp(parse_timestamp(pts));
    }
    if pts_dts_flags == 0x03 {
        let dts = data
            .get(14..19)
            .ok_or_else(|| LiuError::InvalidData("PES: DTS 不完整".into()))?;
        header.dts = Timestamp(parse_timestamp(dts));
    }

    Ok(header)
}

/// 从 5 字节中提取 33-bit 时间戳
fn parse_timestamp(data: &[u8]) -> i64 {
    let b0 = i64::from(data[0]);
    let b1 = i64::from(data[1]);
    let b2 = i64::from(data[2]);
    let b3 = i64::from(data[3]);
    let b4 = i64::from(data[4]);

    (((b0 >> 1) & 0x07) << 30) | (b1 << 22) | ((b2 >> 1) << 15) | (b3 << 7) | (b4 >> 1)
}

/// 一个完整的 PES 单元 (含包头)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesUnit {
    pub header: PesHeader,
    pub data: Vec<u8>,
}

impl PesUnit {
    /// 包头之后的负载
    pub fn payload(&self) -> &[u8] {
        &self.data[self.header.header_len.min(self.data.len())..]
    }
}

/// PES 单元重组器
///
/// 单元在下一个 PUSI 到来时完成; 声明了 PES_packet_length 的单元在
/// 数据收齐时立即完成.
#[derive(Debug, Default)]
pub struct PesAssembler {
    buf: Vec<u8>,
    active: bool,
}

impl PesAssembler {
    /// 丢弃未完成的单元, 等待下一个 PUSI
    pub fn reset(&mut self) {
        self.buf.clear();
        self.active = false;
    }

    /// 结束当前单元
    ///
    /// 起始码或包头无效的单元被丢弃并返回错误.
    pub fn finish(&mut self) -> Option<LiuResult<PesUnit>> {
        if !self.active {
            return None;
        }
        self.active = false;
        let data = std::mem::take(&mut self.buf);
        Some(parse_pes_header(&data).map(|header| PesUnit { header, data }))
    }

    /// 追加一个 TS 包的负载, 带 PUSI 时开始新单元
    ///
    /// 调用方应先用 [`finish`](Self::finish) 取走上一个单元. 达到声明长度时
    /// 返回完成的单元.
    pub fn push(&mut self, payload: &[u8], unit_start: bool) -> Option<LiuResult<PesUnit>> {
        if unit_start {
            self.buf.clear();
            self.active = true;
        } else if !self.active {
            return None;
        }
        self.buf.extend_from_slice(payload);

        let expected = self.expected_len()?;
        if self.buf.len() < expected {
            return None;
        }
        // 超出声明长度的部分是填充
        self.buf.truncate(expected);
        self.finish()
    }

    fn expected_len(&self) -> Option<usize> {
        if self.buf.len() < 6 {
            return None;
        }
        match usize::from(u16::from_be_bytes([self.buf[4], self.buf[5]])) {
            0 => None,
            len => Some(6 + len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造 PES, `packet_length` 为 0 时不定长
    fn build_pes(pts: Option<u64>, data: &[u8], bounded: bool) -> Vec<u8> {
        let mut pes = vec![0x00, 0x00, 0x01, 0xE0];
        let header_ext_len = if pts.is_some() { 5 } else { 0 };
        let pes_length = if bounded {
            3 + header_ext_len + data.len()
        } else {
            0
        };
        pes.push((pes_length >> 8) as u8);
        pes.push(pes_length as u8);
        pes.push(0x80);
        pes.push(if pts.is_some() { 0x80 } else { 0x00 });
        pes.push(header_ext_len as u8);
        if let Some(pts_val) = pts {
            pes.push(0x21 | ((((pts_val >> 30) as u8) & 0x07) << 1));
            pes.push((pts_val >> 22) as u8);
            pes.push(0x01 | ((((pts_val >> 15) as u8) & 0x7F) << 1));
            pes.push((pts_val >> 7) as u8);
            pes.push(0x01 | (((pts_val as u8) & 0x7F) << 1));
        }
        pes.extend_from_slice(data);
        pes
    }

    #[test]
    fn test_解析_pts() {
        let pes = build_pes(Some(0x1_2345_6789), b"xyz", true);
        let header = parse_pes_header(&pes).unwrap();
        assert_eq!(header.pts, Timestamp(0x1_2345_6789));
        assert_eq!(header.dts, Timestamp::NONE);
        assert_eq!(header.header_len, 14);
        assert_eq!(header.packet_length, 11);
    }

    #[test]
    fn test_无_pts() {
        let header = parse_pes_header(&build_pes(None, b"ab", true)).unwrap();
        assert!(!header.pts.is_valid());
        assert_eq!(header.header_len, 9);
    }

    #[test]
    fn test_定长单元收齐即完成() {
        let pes = build_pes(Some(90000), &[7u8; 300], true);
        let mut asm = PesAssembler::default();
        assert!(asm.push(&pes[..184], true).is_none());
        let mut tail = pes[184..].to_vec();
        tail.extend_from_slice(&[0xFF; 20]);
        let unit = asm.push(&tail, false).unwrap().unwrap();
        assert_eq!(unit.header.pts, Timestamp(90000));
        assert_eq!(unit.payload(), &[7u8; 300][..]);
        // 单元已交出, 不会被再次结束
        assert!(asm.finish().is_none());
    }

    #[test]
    fn test_不定长单元等待下一个_pusi() {
        let pes = build_pes(Some(3000), &[1, 2, 3, 4], false);
        let mut asm = PesAssembler::default();
        assert!(asm.push(&pes, true).is_none());
        assert!(asm.push(&[5, 6], false).is_none());
        let unit = asm.finish().unwrap().unwrap();
        assert_eq!(unit.payload(), &[1, 2, 3, 4, 5, 6]);
        assert!(asm.finish().is_none());
    }

    #[test]
    fn test_无效起始码() {
        let mut asm = PesAssembler::default();
        assert!(asm.push(&[0x00, 0x00, 0x02, 0xE0, 0x00, 0x00, 0x80], true).is_none());
        assert!(asm.finish().unwrap().is_err());
        // 未开始的单元忽略续包
        assert!(asm.push(&[1, 2, 3], false).is_none());
        assert!(asm.finish().is_none());
    }
}
