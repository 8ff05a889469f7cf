//! ADTS (Audio Data Transport Stream) 帧头解析.
//!
//! # 帧头结构 (7 字节, 带 CRC 时 9 字节)
//! ```text
//! syncword(12) id(1) layer(2) protection_absent(1)
//! profile(2) sf_index(4) private(1) channel_cfg(3)
//! original(1) home(1) copyright_id(1) copyright_start(1)
//! frame_length(13) buffer_fullness(11) raw_blocks(2)
//! ```

use liu_core::bitreader::BitReader;
use liu_core::bitwriter::BitWriter;
use liu_core::{LiuError, LiuResult};

/// 采样率索引表
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// 每个原始数据块的采样数
pub const SAMPLES_PER_FRAME: u32 = 1024;

/// ADTS 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// profile (0=Main, 1=LC, 2=SSR, 3=LTP), 对象类型 = profile + 1
    pub profile: u8,
    pub sampling_frequency_index: u8,
    /// 声道配置 (0 表示由 PCE 指定)
    pub channel_configuration: u8,
    /// 整帧长度 (含帧头)
    pub frame_length: usize,
    pub protection_absent: bool,
    /// 帧内原始数据块数量
    pub raw_blocks: u8,
}

impl AdtsHeader {
    /// 帧头长度
    pub fn header_len(&self) -> usize {
        if self.protection_absent { 7 } else { 9 }
    }

    pub fn sample_rate(&self) -> u32 {
        AAC_SAMPLE_RATES[self.sampling_frequency_index as usize]
    }

    /// 声道数, 配置 7 表示 7.1, 配置 0 按立体声处理
    pub fn channels(&self) -> u32 {
        match self.channel_configuration {
            0 => 2,
            7 => 8,
            c => u32::from(c),
        }
    }

    /// 本帧采样数
    pub fn samples(&self) -> u32 {
        SAMPLES_PER_FRAME * (u32::from(self.raw_blocks) + 1)
    }

    /// 由本帧长度估算的码率 (bit/s)
    pub fn bit_rate(&self) -> u32 {
        let bits = self.frame_length as u64 * 8 * u64::from(self.sample_rate());
        (bits / u64::from(self.samples())) as u32
    }

    /// 构造 AudioSpecificConfig (2 字节)
    pub fn audio_specific_config(&self) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(u32::from(self.profile) + 1, 5);
        bw.write_bits(u32::from(self.sampling_frequency_index), 4);
        bw.write_bits(u32::from(self.channel_configuration), 4);
        bw.write_bits(0, 3); // frameLength / dependsOnCoreCoder / extensionFlag
        bw.finish()
    }
}

/// 解析位于 `data` 开头的 ADTS 帧头
pub fn parse_adts_header(data: &[u8]) -> LiuResult<AdtsHeader> {
    if data.len() < 7 {
        return Err(LiuError::NeedMoreData);
    }

    let mut br = BitReader::new(data);
    if br.read_bits(12)? != 0xFFF {
        return Err(LiuError::InvalidData("ADTS: 同步字不匹配".into()));
    }
    br.skip_bits(1)?; // id
    if br.read_bits(2)? != 0 {
        return Err(LiuError::InvalidData("ADTS: layer 必须为 0".into()));
    }
    let protection_absent = br.read_flag()?;
    let profile = br.read_bits(2)? as u8;
    let sampling_frequency_index = br.read_bits(4)? as u8;
    br.skip_bits(1)?; // private_bit
    let channel_configuration = br.read_bits(3)? as u8;
    br.skip_bits(4)?; // original/copy, home, copyright id bit/start
    let frame_length = br.read_bits(13)? as usize;
    br.skip_bits(11)?; // adts_buffer_fullness
    let raw_blocks = br.read_bits(2)? as u8;

    if sampling_frequency_index as usize >= AAC_SAMPLE_RATES.len() {
        return Err(LiuError::InvalidData(format!(
            "ADTS: 采样率索引非法, index={sampling_frequency_index}"
        )));
    }

    let header = AdtsHeader {
        profile,
        sampling_frequency_index,
        channel_configuration,
        frame_length,
        protection_absent,
        raw_blocks,
    };
    if frame_length < header.header_len() {
        return Err(LiuError::InvalidData(format!(
            "ADTS: 帧长度小于帧头, frame_length={frame_length}"
        )));
    }
    Ok(header)
}

/// 查找第一个能解析出合法帧头的位置
pub fn find_adts_sync(data: &[u8]) -> Option<(usize, AdtsHeader)> {
    (0..data.len().saturating_sub(1))
        .filter(|&i| data[i] == 0xFF && data[i + 1] & 0xF6 == 0xF0)
        .find_map(|i| parse_adts_header(&data[i..]).ok().map(|h| (i, h)))
}
