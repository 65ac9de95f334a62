//! 落盘策略：以 [`BufferSink`] trait 抽象“本地内存拷贝”与“跨地址空间拷出”两条路径。
//!
//! # 设计背景（Why）
//! - 原始系统在每个写入点按标志位分支选择 memcpy 或 copyout 原语；此处按规格的
//!   重设计建议，将差异收束为构造期注入的策略对象，写入器对落盘方式保持无感；
//! - 容量在构造时声明且不可增长，使“空间耗尽”成为唯一且可预期的失败模式。
//!
//! # 契约说明（What）
//! - `write_at` 为幂等的随机写：同一偏移允许重写（压缩终结时回填条目头依赖该性质）；
//! - 实现必须拒绝任何越过 `capacity()` 的写入，返回 `buffer.invalid_range`；
//! - 写入器保证传入偏移单调受控，实现无需自行维护游标。

use alloc::vec;

use bytes::{Bytes, BytesMut};

use crate::Result;
use crate::error::{CinderError, codes};

/// 写入器的落盘出口：单一 `write_at` 方法 + 容量上报。
pub trait BufferSink: Send {
    /// 将 `bytes` 写到区域内偏移 `offset` 处；越界必须整体拒绝，不得部分写入。
    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()>;

    /// 区域总容量（字节），构造后恒定。
    fn capacity(&self) -> usize;
}

/// 直接内存落盘：`bytes::BytesMut` 承载的本地缓冲。
///
/// # 行为概览（How）
/// - 随机写落在已初始化长度之外时，先以零字节补齐空洞再拷贝，保证任意时刻
///   `written()` 都是确定性内容；
/// - `into_bytes` 冻结已写前缀为只读 [`Bytes`]，供消费方零拷贝传递。
#[derive(Debug)]
pub struct MemorySink {
    buf: BytesMut,
    capacity: usize,
}

impl MemorySink {
    /// 创建容量固定的内存落盘区域。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// 当前已写前缀（含补零空洞）。
    pub fn written(&self) -> &[u8] {
        &self.buf
    }

    /// 冻结为只读字节序列。
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl BufferSink for MemorySink {
    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or_else(|| CinderError::new(codes::BUFFER_INVALID_RANGE, "write offset overflow"))?;
        if end > self.capacity {
            return Err(CinderError::new(
                codes::BUFFER_INVALID_RANGE,
                "write beyond sink capacity",
            ));
        }
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// 跨地址空间拷出落盘：包装调用方提供的拷贝原语。
///
/// # 使用方式（How）
/// - 宿主环境将自己的 copyout 原语封装为 `FnMut(usize, &[u8]) -> Result<()>` 注入；
/// - 本类型只做容量围栏与偏移溢出检查，具体搬运语义（目标地址换算、权限校验）
///   完全由闭包承担。
pub struct CopyOutSink<F>
where
    F: FnMut(usize, &[u8]) -> Result<()> + Send,
{
    copy_out: F,
    capacity: usize,
}

impl<F> CopyOutSink<F>
where
    F: FnMut(usize, &[u8]) -> Result<()> + Send,
{
    /// 以目标区域容量与拷出原语构造。
    pub fn new(capacity: usize, copy_out: F) -> Self {
        Self { copy_out, capacity }
    }
}

impl<F> BufferSink for CopyOutSink<F>
where
    F: FnMut(usize, &[u8]) -> Result<()> + Send,
{
    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or_else(|| CinderError::new(codes::BUFFER_INVALID_RANGE, "write offset overflow"))?;
        if end > self.capacity {
            return Err(CinderError::new(
                codes::BUFFER_INVALID_RANGE,
                "copy-out beyond target capacity",
            ));
        }
        (self.copy_out)(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<F> core::fmt::Debug for CopyOutSink<F>
where
    F: FnMut(usize, &[u8]) -> Result<()> + Send,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CopyOutSink")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// 预先零化一段区域，供写入器在预留时固定对齐填充内容。
pub(crate) fn zero_fill<S: BufferSink>(sink: &mut S, offset: usize, len: usize) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    let zeros = vec![0u8; len];
    sink.write_at(offset, &zeros)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_zero_fills_holes() {
        let mut sink = MemorySink::with_capacity(32);
        sink.write_at(8, &[0xAB; 4]).expect("容量内写入");
        assert_eq!(&sink.written()[..8], &[0u8; 8]);
        assert_eq!(&sink.written()[8..12], &[0xAB; 4]);
    }

    #[test]
    fn memory_sink_rejects_overrun() {
        let mut sink = MemorySink::with_capacity(8);
        let err = sink.write_at(4, &[0u8; 8]).expect_err("越界必须拒绝");
        assert_eq!(err.code(), codes::BUFFER_INVALID_RANGE);
        assert!(sink.written().len() <= 8, "失败不得产生部分写入");
    }

    #[test]
    fn memory_sink_allows_rewrite_at_same_offset() {
        let mut sink = MemorySink::with_capacity(16);
        sink.write_at(0, &[1u8; 8]).expect("首次写入");
        sink.write_at(0, &[2u8; 8]).expect("同偏移重写");
        assert_eq!(&sink.written()[..8], &[2u8; 8]);
    }
}
