//! 90 kHz 传输流时间戳.
//!
//! PES 头中的 PTS/DTS 是 33 位计数, 时钟为 90 kHz, 到达 2^33 后回绕.

use std::fmt;

/// 表示"未定义"的时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// MPEG 系统时钟频率
pub const MPEG_CLOCK_HZ: i64 = 90_000;

/// 33 位时间戳的回绕周期
pub const PTS_WRAP: i64 = 1 << 33;

/// 90 kHz 时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// 未定义的时间戳
    pub const NONE: Self = Self(NOPTS_VALUE);

    pub const fn is_valid(&self) -> bool {
        self.0 != NOPTS_VALUE
    }

    /// 转换为秒, 无效时间戳返回 `f64::NAN`
    pub fn to_seconds(&self) -> f64 {
        if !self.is_valid() {
            return f64::NAN;
        }
        self.0 as f64 / MPEG_CLOCK_HZ as f64
    }

    /// 从当前时间戳到 `later` 的间隔 (90 kHz 单位), 处理 33 位回绕
    pub fn delta_to(&self, later: Timestamp) -> Option<i64> {
        if !self.is_valid() || !later.is_valid() {
            return None;
        }
        Some((later.0 - self.0).rem_euclid(PTS_WRAP))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{} ({:.3}s)", self.0, self.to_seconds())
        } else {
            write!(f, "NOPTS")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_转换为秒() {
        assert_eq!(Timestamp(90_000).to_seconds(), 1.0);
        assert!(Timestamp::NONE.to_seconds().is_nan());
    }

    #[test]
    fn test_回绕间隔() {
        let before = Timestamp(PTS_WRAP - 1_500);
        let after = Timestamp(1_500);
        assert_eq!(before.delta_to(after), Some(3_000));
        assert_eq!(Timestamp(0).delta_to(Timestamp::NONE), None);
    }

    #[test]
    fn test_显示格式() {
        assert_eq!(Timestamp(45_000).to_string(), "45000 (0.500s)");
        assert_eq!(Timestamp::default().to_string(), "NOPTS");
    }
}
