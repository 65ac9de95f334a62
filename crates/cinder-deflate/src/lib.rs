#![warn(missing_docs)]

//! `cinder-deflate` 以 zlib（deflate）落地 `cinder-core` 的流式压缩契约。
//!
//! # 模块定位（Why）
//! - 核心 crate 只定义 [`CompressionEngine`] 接口，不绑定任何压缩库；本 crate
//!   是默认实现，为压缩窗口提供 zlib 流与解码侧的配套 `inflate`；
//! - 三种 flush 策略各自映射到 `flate2::FlushCompress` 的对应档位，保持
//!   “继续缓冲 / 同步冲刷 / 终结流”的语义差异不被抹平。
//!
//! # 契约说明（What）
//! - [`ZlibEngine`] 产出带 zlib 头与校验尾的标准流，`Finish` 之后引擎不可复用；
//! - [`inflate`] 是消费方的配套解码入口：输入必须是完整（已 Finish）的 zlib 流，
//!   损坏输入返回 `compress.engine` 错误而非 panic。

use cinder_core::error::{CinderError, codes};
use cinder_core::{CompressionEngine, FlushMode, Result};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// 单轮压缩调用为产出预留的输出块大小。
const OUTPUT_CHUNK: usize = 4096;

/// zlib 流式压缩引擎。
///
/// # 行为概览（How）
/// - 内部持有一条 `flate2::Compress` 流（zlib 封装、默认压缩级别）；
/// - `compress` 循环喂入直到输入耗尽：每轮为输出追加一个固定块，按
///   `total_in`/`total_out` 差值截断，避免引擎多报；
/// - `Finish` 档位持续驱动到 `Status::StreamEnd`，保证校验尾完整写出。
pub struct ZlibEngine {
    inner: Compress,
}

impl ZlibEngine {
    /// 以默认压缩级别创建 zlib 引擎。
    pub fn new() -> Self {
        Self::with_level(Compression::default())
    }

    /// 指定压缩级别创建引擎；崩溃路径常用低级别换取确定性耗时。
    pub fn with_level(level: Compression) -> Self {
        Self {
            inner: Compress::new(level, true),
        }
    }
}

impl Default for ZlibEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionEngine for ZlibEngine {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>, flush: FlushMode) -> Result<()> {
        let flush = match flush {
            FlushMode::Buffer => FlushCompress::None,
            FlushMode::Sync => FlushCompress::Sync,
            FlushMode::Finish => FlushCompress::Finish,
        };
        let mut rest = input;
        loop {
            let old_len = output.len();
            output.resize(old_len + OUTPUT_CHUNK, 0);
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .compress(rest, &mut output[old_len..], flush)
                .map_err(|err| {
                    CinderError::new(codes::COMPRESS_ENGINE, "deflate stream error").with_cause(err)
                })?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            let produced = (self.inner.total_out() - before_out) as usize;
            output.truncate(old_len + produced);
            rest = &rest[consumed..];
            match status {
                Status::StreamEnd => break,
                // Ok/BufError：只要输入耗尽且本轮未填满输出块，引擎已无可冲刷内容。
                _ => {
                    if rest.is_empty() && produced < OUTPUT_CHUNK {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn total_in(&self) -> u64 {
        self.inner.total_in()
    }

    fn total_out(&self) -> u64 {
        self.inner.total_out()
    }
}

/// 解码一条完整 zlib 流，返回原始字节。
///
/// # 契约说明（What）
/// - 输入应当来自某个压缩包装条目的负载（引擎侧已 `Finish`）；
/// - 流提前结束、校验失败等一律映射为 `compress.engine` 错误；
/// - 解码侧对声明长度零信任：输出按需增长，不预设上限。
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut stream = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).max(64));
    let mut rest = data;
    loop {
        out.reserve(OUTPUT_CHUNK);
        let before_in = stream.total_in();
        let status = stream
            .decompress_vec(rest, &mut out, FlushDecompress::Sync)
            .map_err(|err| {
                CinderError::new(codes::COMPRESS_ENGINE, "inflate stream error").with_cause(err)
            })?;
        let consumed = (stream.total_in() - before_in) as usize;
        rest = &rest[consumed..];
        match status {
            Status::StreamEnd => return Ok(out),
            // BufError 且输出已满：扩容后继续驱动同一份输入。
            Status::BufError if out.len() == out.capacity() => {}
            _ => {
                if rest.is_empty() {
                    // 输入耗尽但未见流终结标记：截断流或从未 Finish 的流。
                    return Err(CinderError::new(
                        codes::COMPRESS_ENGINE,
                        "zlib stream truncated before stream end",
                    ));
                }
            }
        }
    }
}
