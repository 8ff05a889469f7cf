//! TS 包头与适配域.
//!
//! ```text
//! sync(8) TEI(1) PUSI(1) priority(1) PID(13)
//! scrambling(2) AFC(2) CC(4)
//! [adaptation_field_length(8) discontinuity(1) ...]
//! ```

use liu_core::{LiuError, LiuResult};

use super::{TS_PACKET_SIZE, TS_SYNC_BYTE};

/// 解析后的 TS 包头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub pid: u16,
    /// transport_error_indicator
    pub transport_error: bool,
    /// payload_unit_start_indicator
    pub unit_start: bool,
    /// transport_scrambling_control, 非零表示负载已加扰
    pub scrambling: u8,
    /// adaptation_field_control
    pub afc: u8,
    pub continuity_counter: u8,
    /// 适配域中的 discontinuity_indicator
    pub discontinuity: bool,
    /// 负载在包内的起始偏移
    pub payload_offset: usize,
}

impl TsHeader {
    pub fn has_payload(&self) -> bool {
        self.afc & 0x01 != 0 && self.payload_offset < TS_PACKET_SIZE
    }
}

/// 解析 188 字节 TS 包的包头与适配域
pub fn parse_ts_header(pkt: &[u8]) -> LiuResult<TsHeader> {
    if pkt.len() < TS_PACKET_SIZE {
        return Err(LiuError::NeedMoreData);
    }
    if pkt[0] != TS_SYNC_BYTE {
        return Err(LiuError::InvalidData(format!(
            "TS: 同步字节不匹配, 实际 {:#04X}",
            pkt[0]
        )));
    }

    let pid = (u16::from(pkt[1] & 0x1F) << 8) | u16::from(pkt[2]);
    let afc = (pkt[3] >> 4) & 0x03;
    let mut header = TsHeader {
        pid,
        transport_error: pkt[1] & 0x80 != 0,
        unit_start: pkt[1] & 0x40 != 0,
        scrambling: pkt[3] >> 6,
        afc,
        continuity_counter: pkt[3] & 0x0F,
        discontinuity: false,
        payload_offset: 4,
    };

    if afc & 0x02 != 0 {
        let af_len = usize::from(pkt[4]);
        if af_len > TS_PACKET_SIZE - 5 {
            return Err(LiuError::InvalidData(format!(
                "TS: 适配域长度非法, pid={pid:#06X} len={af_len}"
            )));
        }
        if af_len > 0 {
            header.discontinuity = pkt[5] & 0x80 != 0;
        }
        header.payload_offset = 5 + af_len;
    }

    Ok(header)
}
