//! 流式压缩引擎契约：核心 crate 只消费接口，具体 zlib 实现位于 `cinder-deflate`。
//!
//! # 设计背景（Why）
//! - 压缩窗口的状态机（见 [`crate::writer`]）需要与具体压缩库解耦，既便于在
//!   受限环境替换实现，也让核心保持零压缩依赖；
//! - 规格明确要求三种 flush 语义互不混淆：继续缓冲、立即冲刷但流未结束、
//!   冲刷并永久终止流。三者直接映射到底层压缩器自己的 flush 枚举。

use alloc::vec::Vec;

use crate::Result;

/// 压缩 flush 策略，三种模式绝不混用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// 后续还有数据：允许引擎内部缓冲，本次可以不产出任何字节。
    Buffer,
    /// 立即冲刷内部缓冲，使已压缩数据可独立解码，但流保持打开。
    Sync,
    /// 冲刷并终止流：写出终结标记，此后引擎不得再接收输入。
    Finish,
}

/// 流式压缩引擎的不透明契约。
///
/// # 契约说明（What）
/// - `compress` 消费全部 `input`，将产出字节**追加**到 `output`；引擎内部缓冲导致
///   零产出是合法结果，调用方不得视为错误；
/// - `total_in` / `total_out` 为流级累计计数，终结时用于向调用方回填
///   未压缩/已压缩字节总量；
/// - 实现必须 `Send`，对象以 `Box<dyn CompressionEngine>` 注入写入器。
pub trait CompressionEngine: Send {
    /// 压缩一段输入，产出追加写入 `output`。
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>, flush: FlushMode) -> Result<()>;

    /// 流级累计：已消费的未压缩字节数。
    fn total_in(&self) -> u64;

    /// 流级累计：已产出的压缩字节数。
    fn total_out(&self) -> u64;
}

/// 压缩终结后回填给调用方的总量统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionTotals {
    /// 进入压缩引擎的未压缩字节总数。
    pub uncompressed_bytes: u64,
    /// 引擎产出的压缩字节总数（即包装条目的负载长度）。
    pub compressed_bytes: u64,
}
