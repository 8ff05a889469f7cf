//! 比特流写入器.
//!
//! 与 [`BitReader`](crate::bitreader::BitReader) 对应, 大端位序写入.
//! 用于拼装 AudioSpecificConfig 这类短小的位域结构.

/// 比特流写入器
///
/// # 示例
/// ```
/// use liu_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(2, 5);
/// bw.write_bits(4, 4);
/// bw.write_bits(2, 4);
/// assert_eq!(bw.finish(), vec![0x12, 0x10]);
/// ```
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    /// 正在填充的字节
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 写入 N 个位 (最多 32 位), 写入值的低 N 位
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={n} 超过 32 位");
        for shift in (0..n).rev() {
            self.push_bit((value >> shift) & 1 != 0);
        }
    }

    pub fn write_flag(&mut self, flag: bool) {
        self.push_bit(flag);
    }

    /// 写入无符号 Exp-Golomb 码 `ue(v)`
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        for _ in 1..len {
            self.push_bit(false);
        }
        for shift in (0..len).rev() {
            self.push_bit((code >> shift) & 1 != 0);
        }
    }

    /// 写入有符号 Exp-Golomb 码 `se(v)`
    pub fn write_se(&mut self, value: i32) {
        let code = if value > 0 {
            (value as u32) * 2 - 1
        } else {
            value.unsigned_abs() * 2
        };
        self.write_ue(code);
    }

    /// 写入 rbsp_trailing_bits (一个 1 后补零到字节边界)
    pub fn write_trailing_bits(&mut self) {
        self.push_bit(true);
        while self.bit_count != 0 {
            self.push_bit(false);
        }
    }

    /// 结束写入, 不足一字节的部分低位补零
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.data.push(self.current_byte << pad);
        }
        self.data
    }

    fn push_bit(&mut self, bit: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(bit);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }
}
