#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! `cinder-core` 提供自描述二进制快照缓冲的核心实现：条目编码、安全迭代与追加写入。
//!
//! # 模块定位（Why）
//! - 崩溃转储、诊断负载等场景需要一种**自描述**的二进制容器：生产方在固定容量区域内
//!   追加 (type, flags, size, payload) 条目，消费方（往往处于另一信任域）通过只进迭代器
//!   还原同样的序列；
//! - 生产路径经常运行在内存紧张甚至 panic 上下文中，因此所有分配失败必须表现为可恢复的
//!   返回值，而非阻塞或崩溃。
//!
//! # 设计概要（How）
//! - `item` 模块定义 16 字节定长条目头与标志位，并在解码时一次性归一化为 [`ItemKind`]
//!   标签变体，避免各消费方对同一 flags 字段做分散的临场解释；
//! - `iter` 模块实现失败即收敛（fail closed）的游标：任何越界长度都表现为“序列结束”，
//!   绝不读出声明范围之外的字节；
//! - `writer` 模块实现单写者的追加式写入器，通过 [`BufferSink`] 策略注入本地拷贝或
//!   跨地址空间拷出两种落盘方式；
//! - `compress` 模块定义流式压缩引擎契约（三种互不混淆的 flush 语义），具体 zlib 实现
//!   由 `cinder-deflate` 提供，核心 crate 不依赖压缩库。
//!
//! # 契约说明（What）
//! - 所有写入侧操作返回 [`CinderError`]，错误码遵循 `<域>.<语义>` 约定（见 [`error::codes`]）；
//! - 同一写入器内条目顺序严格等于追加顺序；压缩窗口提交的字节在下一个窗口打开前已经
//!   落入后备缓冲；
//! - 缺少终止哨兵的缓冲不视为损坏：调用方可能中途放弃构建，消费方只会看到更短的前缀。
//!
//! # 风险提示（Trade-offs）
//! - 条目头采用宿主字节序，跨字节序归档需要消费方自行转换；本 crate 不承诺与任何
//!   既有崩溃转储格式逐字节兼容，约束的是“16 字节头 + 8 字节对齐”这一形状契约。

extern crate alloc;

pub mod compress;
pub mod error;
pub mod item;
pub mod iter;
pub mod sink;
pub mod writer;

pub use crate::compress::{CompressionEngine, CompressionTotals, FlushMode};
pub use crate::error::{CinderError, codes};
pub use crate::item::{ItemFlags, ItemHeader, ItemKind};
pub use crate::iter::{Item, ItemIter};
pub use crate::sink::{BufferSink, CopyOutSink, MemorySink};
pub use crate::writer::{Reservation, SnapshotWriter, WriterStats};

/// crate 统一的结果别名，默认错误类型为 [`CinderError`]。
pub type Result<T, E = CinderError> = core::result::Result<T, E>;
