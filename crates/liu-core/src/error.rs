//! 统一错误类型定义.
//!
//! 所有 Liu crate 共用的错误类型, 支持跨模块传播.
//!
//! 调用契约被破坏 (如回退读取已释放的数据) 属于程序错误, 直接断言失败,
//! 不经过这里.

use thiserror::Error;

/// Liu 框架统一错误类型
#[derive(Debug, Error)]
pub enum LiuError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// 传输流格式错误
    #[error("格式错误: {0}")]
    Format(String),

    /// 解码会话错误 (格式描述或会话创建失败)
    #[error("解码会话错误: {0}")]
    Session(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Liu 框架统一 Result 类型
pub type LiuResult<T> = Result<T, LiuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_错误信息格式() {
        let err = LiuError::InvalidData("NALU 禁止位被置位".into());
        assert_eq!(err.to_string(), "无效数据: NALU 禁止位被置位");
        assert_eq!(LiuError::NeedMoreData.to_string(), "数据不足, 需要更多输入");
    }

    #[test]
    fn test_io_错误转换() {
        fn open() -> LiuResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))?
        }
        assert!(matches!(open(), Err(LiuError::Io(_))));
    }
}
