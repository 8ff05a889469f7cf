//! 分块字节源.
//!
//! 网络读到的缓冲区按到达顺序原样追加, 不合并也不修改. 解复用器按绝对
//! 字节位置读取固定长度的窗口, 数据被复制进一块复用的暂存区. 跨越多个块的
//! 读取依次复制各块, 整体积压数据从不被复制.
//!
//! 一次成功的读取之后, 完全位于读取起点之前的块被释放, 新的首块记录块内
//! 偏移. 这是唯一的回收路径: 读取不足时什么都不释放.

use std::collections::VecDeque;

use bytes::Bytes;
use log::trace;

/// 单次读取的最大字节数
pub const MAX_READ_SIZE: usize = 131_072 + 1;

/// 按绝对位置读取的字节源
pub trait AvReader {
    /// 读取 `position` 处的 `n` 个字节, 数据不足时返回 `None`
    fn read_av(&mut self, position: u64, n: usize) -> Option<&[u8]>;
}

/// 分块字节源
#[derive(Debug)]
pub struct ChunkSource {
    chunks: VecDeque<Bytes>,
    /// 首块内的偏移, 只有首块可以非零
    front_offset: usize,
    /// 首块 `front_offset` 处的绝对位置
    base: u64,
    total_appended: u64,
    scratch: Vec<u8>,
}

impl Default for ChunkSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkSource {
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            front_offset: 0,
            base: 0,
            total_appended: 0,
            scratch: Vec::with_capacity(MAX_READ_SIZE),
        }
    }

    /// 在末尾追加一个块
    pub fn append(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.total_appended += chunk.len() as u64;
        self.chunks.push_back(chunk);
    }

    /// 读取绝对位置 `position` 处的 `n` 个字节
    ///
    /// # Panics
    ///
    /// `position` 位于已释放的区域, 或 `n` 超过 [`MAX_READ_SIZE`].
    pub fn read(&mut self, position: u64, n: usize) -> Option<&[u8]> {
        assert!(
            n <= MAX_READ_SIZE,
            "读取长度 {n} 超过暂存区容量 {MAX_READ_SIZE}"
        );
        assert!(
            position >= self.base,
            "读取位置 {position} 位于保留窗口 {} 之前",
            self.base
        );
        if position + n as u64 > self.total_appended {
            return None;
        }

        self.release_before(position);

        self.scratch.clear();
        let mut offset = self.front_offset;
        for chunk in &self.chunks {
            let missing = n - self.scratch.len();
            if missing == 0 {
                break;
            }
            let take = missing.min(chunk.len() - offset);
            self.scratch.extend_from_slice(&chunk[offset..offset + take]);
            offset = 0;
        }
        debug_assert_eq!(self.scratch.len(), n);
        Some(&self.scratch[..n])
    }

    /// 释放 `position` 之前的全部数据, 调用方保证 `position` 不超过已追加总量
    fn release_before(&mut self, position: u64) {
        let mut skip = position - self.base;
        while let Some(front) = self.chunks.front() {
            let available = (front.len() - self.front_offset) as u64;
            if skip < available {
                break;
            }
            skip -= available;
            self.base += available;
            self.front_offset = 0;
            self.chunks.pop_front();
            trace!("释放一个块, 剩余 {} 个", self.chunks.len());
        }
        self.front_offset += skip as usize;
        self.base += skip;
    }

    /// 尚未释放的字节数
    pub fn buffered_len(&self) -> u64 {
        self.total_appended - self.base
    }

    /// 保留的块数
    pub fn retained_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// 逻辑游标 (块索引, 块内偏移), 块索引总是 0
    pub fn cursor(&self) -> (usize, usize) {
        (0, self.front_offset)
    }

    /// 保留窗口起点的绝对位置
    pub fn absolute_offset(&self) -> u64 {
        self.base
    }

    /// 累计追加的字节数
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }
}

impl AvReader for ChunkSource {
    fn read_av(&mut self, position: u64, n: usize) -> Option<&[u8]> {
        self.read(position, n)
    }
}
