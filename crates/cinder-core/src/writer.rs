//! 追加写入器：固定容量区域内的单写者条目构建，含压缩窗口状态机。
//!
//! # 模块定位（Why）
//! - 快照生产方（崩溃处理、诊断转储）需要在一块预先圈定的区域内顺序追加条目，
//!   空间耗尽必须是可恢复的返回值——调用路径包括 panic 处理器，没有重试的余地；
//! - 落盘方式（本地拷贝 / 跨地址空间拷出）在构造期经 [`BufferSink`] 注入，
//!   写入逻辑不在调用点分支。
//!
//! # 行为概览（How）
//! - `reserve` 预留 `头 + 负载` 并保证下一条目 8 字节对齐，条目头即刻写入，
//!   负载经 [`Reservation`] 回填；`push` 将两步合一；
//! - 压缩初始化后，负载字节只能经窗口协议（`open_window` → `write_compressed` →
//!   `close_window`）流经引擎，直接追加会被 `compress.invalid_state` 拒绝，
//!   直到 `finalize_compression` 终结压缩流；
//! - 较早窗口收口时提交的字节在后备缓冲中先于后续窗口持久，中途出错只丢最近
//!   未提交的窗口。
//!
//! # 并发契约（What）
//! - 写入器在构建期间被单一线程独占（全程 `&mut self`），不设内部锁；
//!   并发写同一写入器属调用方契约违例，框架不防御。

use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;
use core::mem;

use crate::Result;
use crate::compress::{CompressionEngine, CompressionTotals, FlushMode};
use crate::error::{CinderError, codes};
use crate::item::{
    ITEM_HEADER_LEN, ITEM_TYPE_BUFFER_END, ITEM_TYPE_COMPRESSED, ITEM_TYPE_UINT32_DESC,
    ITEM_TYPE_UINT64_DESC, ItemFlags, SCALAR_DESC_NAME_LEN, SCALAR_DESC_PAYLOAD_LEN,
    encode_header, item_span,
};
use crate::sink::{BufferSink, zero_fill};

/// 一次成功预留的负载区间凭据，经 [`SnapshotWriter::fill`] 回填字节。
#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    payload_offset: usize,
    len: usize,
}

impl Reservation {
    /// 可回填的负载字节数。
    pub fn len(&self) -> usize {
        self.len
    }

    /// 预留区间是否为空（零长负载条目）。
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// 写入器状态快照，供监控与测试断言。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    /// 已追加的条目数（含压缩包装条目与哨兵）。
    pub items: u64,
    /// 已占用字节数。
    pub used: usize,
    /// 区域总容量。
    pub capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowState {
    Idle,
    WindowOpen,
    Finalized,
}

struct CompressionStage {
    engine: Box<dyn CompressionEngine>,
    state: WindowState,
    flags: ItemFlags,
    item_offset: usize,
    payload_len: usize,
    scratch: Vec<u8>,
}

/// 固定容量区域上的追加式快照写入器。
pub struct SnapshotWriter<S: BufferSink> {
    sink: S,
    capacity: usize,
    used: usize,
    item_count: u64,
    compression: Option<CompressionStage>,
}

impl<S: BufferSink> core::fmt::Debug for SnapshotWriter<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnapshotWriter")
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("item_count", &self.item_count)
            .finish_non_exhaustive()
    }
}

impl<S: BufferSink> SnapshotWriter<S> {
    /// 以落盘策略构造写入器；零容量区域返回 `buffer.invalid_range`。
    pub fn new(sink: S) -> Result<Self> {
        let capacity = sink.capacity();
        if capacity == 0 {
            return Err(CinderError::new(
                codes::BUFFER_INVALID_RANGE,
                "sink reports zero capacity",
            ));
        }
        Ok(Self {
            sink,
            capacity,
            used: 0,
            item_count: 0,
            compression: None,
        })
    }

    /// 预留一个 `item_type` 条目的空间并写入条目头，返回负载回填凭据。
    ///
    /// # 契约说明（What）
    /// - 预留量为 `16 + size` 向上对齐到 8 字节，保证后续条目头对齐；
    /// - 空间不足返回 `buffer.out_of_space`，写入器已占用长度保持不变，
    ///   先前条目完整可迭代；
    /// - 对齐填充与未回填的负载在预留时即被零化，区域内容始终确定。
    pub fn reserve(&mut self, item_type: u32, size: usize) -> Result<Reservation> {
        self.ensure_direct_mode()?;
        let payload_offset = self.append_item(item_type, ItemFlags::NONE, size)?;
        Ok(Reservation {
            payload_offset,
            len: size,
        })
    }

    /// 预留数组条目：负载 = 16 字节元素元数据 + `elem_size * count` 字节元素区。
    ///
    /// 元数据（元素类型、元素大小、元素个数）在预留时写入；返回的凭据只覆盖
    /// 元素区，调用方按元素偏移回填。
    pub fn reserve_array(
        &mut self,
        elem_type: u32,
        elem_size: u32,
        count: u64,
    ) -> Result<Reservation> {
        self.ensure_direct_mode()?;
        let elems_len = (elem_size as u64)
            .checked_mul(count)
            .and_then(|len| usize::try_from(len).ok())
            .ok_or_else(|| {
                CinderError::new(codes::BUFFER_OUT_OF_SPACE, "array payload size overflow")
            })?;
        let total = elems_len.checked_add(16).ok_or_else(|| {
            CinderError::new(codes::BUFFER_OUT_OF_SPACE, "array payload size overflow")
        })?;
        let payload_offset = self.append_item(elem_type, ItemFlags::ARRAY, total)?;
        let mut meta = [0u8; 16];
        meta[0..4].copy_from_slice(&elem_type.to_ne_bytes());
        meta[4..8].copy_from_slice(&elem_size.to_ne_bytes());
        meta[8..16].copy_from_slice(&count.to_ne_bytes());
        self.sink.write_at(payload_offset, &meta)?;
        Ok(Reservation {
            payload_offset: payload_offset + 16,
            len: elems_len,
        })
    }

    /// 向预留区间回填负载字节；`at + bytes.len()` 超出预留长度返回
    /// `buffer.invalid_range`。
    pub fn fill(&mut self, reservation: &Reservation, at: usize, bytes: &[u8]) -> Result<()> {
        let end = at.checked_add(bytes.len()).ok_or_else(|| {
            CinderError::new(codes::BUFFER_INVALID_RANGE, "fill offset overflow")
        })?;
        if end > reservation.len {
            return Err(CinderError::new(
                codes::BUFFER_INVALID_RANGE,
                "fill beyond reserved span",
            ));
        }
        self.sink.write_at(reservation.payload_offset + at, bytes)
    }

    /// 预留并一次性拷入负载。拷贝路径由落盘策略决定，调用方无需分支。
    pub fn push(&mut self, item_type: u32, payload: &[u8]) -> Result<()> {
        self.push_with_flags(item_type, ItemFlags::NONE, payload)
    }

    /// 追加带描述名的 32 位标量；重跑迭代器并匹配描述名即可取回该值。
    ///
    /// 描述名超过 31 字节时按字节截断（字段为 32 字节 NUL 填充定长）。
    pub fn add_uint32_with_description(&mut self, name: &str, value: u32) -> Result<()> {
        let mut payload = [0u8; SCALAR_DESC_PAYLOAD_LEN];
        write_desc_name(&mut payload, name);
        payload[SCALAR_DESC_NAME_LEN..SCALAR_DESC_NAME_LEN + 4]
            .copy_from_slice(&value.to_ne_bytes());
        self.push_with_flags(ITEM_TYPE_UINT32_DESC, ItemFlags::NONE, &payload)
    }

    /// 追加带描述名的 64 位标量，契约同 [`add_uint32_with_description`]。
    ///
    /// [`add_uint32_with_description`]: Self::add_uint32_with_description
    pub fn add_uint64_with_description(&mut self, name: &str, value: u64) -> Result<()> {
        let mut payload = [0u8; SCALAR_DESC_PAYLOAD_LEN];
        write_desc_name(&mut payload, name);
        payload[SCALAR_DESC_NAME_LEN..].copy_from_slice(&value.to_ne_bytes());
        self.push_with_flags(ITEM_TYPE_UINT64_DESC, ItemFlags::NONE, &payload)
    }

    /// 追加容器开始标记：`marker_type` 属消费方命名空间，`container_type` 与
    /// `identifier` 供消费方把后续条目归组，直到匹配的结束标记或 EOF。
    pub fn begin_container(
        &mut self,
        marker_type: u32,
        container_type: u32,
        identifier: u64,
    ) -> Result<()> {
        let mut payload = [0u8; 16];
        payload[0..4].copy_from_slice(&container_type.to_ne_bytes());
        payload[8..16].copy_from_slice(&identifier.to_ne_bytes());
        self.push_with_flags(marker_type, ItemFlags::CONTAINER_BEGIN, &payload)
    }

    /// 追加容器结束标记。
    pub fn end_container(&mut self, marker_type: u32, identifier: u64) -> Result<()> {
        let payload = identifier.to_ne_bytes();
        self.push_with_flags(marker_type, ItemFlags::CONTAINER_END, &payload)
    }

    /// 追加终止哨兵。
    ///
    /// 本方法不跟踪“已终止”状态：重复调用会产出两个哨兵，迭代器停在第一个。
    /// 这是对原始格式许可行为的保留——侦测它需要额外状态，而该状态只服务于
    /// 调用方自伤型缺陷。
    pub fn write_buffer_end(&mut self) -> Result<()> {
        self.push_with_flags(ITEM_TYPE_BUFFER_END, ItemFlags::NONE, &[])
    }

    /// 初始化压缩流：预留压缩包装条目头并进入窗口协议。
    ///
    /// # 契约说明（What）
    /// - 必须先于任何窗口操作调用，重复初始化返回 `compress.invalid_state`；
    /// - `compression_type` 记入包装条目 flags 的 bits 8..16，
    ///   解码方据此决定是否解压（见 [`crate::item::COMPRESSION_TYPE_ZLIB`]）；
    /// - 初始化之后、终结之前，普通追加入口一律拒绝——负载字节只能流经窗口。
    pub fn init_compression(
        &mut self,
        engine: Box<dyn CompressionEngine>,
        compression_type: u32,
    ) -> Result<()> {
        if self.compression.is_some() {
            return Err(CinderError::new(
                codes::COMPRESS_INVALID_STATE,
                "compression already initialized",
            ));
        }
        let end = self.used.checked_add(ITEM_HEADER_LEN).filter(|end| *end <= self.capacity);
        let Some(end) = end else {
            return Err(CinderError::new(
                codes::BUFFER_OUT_OF_SPACE,
                "no room for compressed wrapper header",
            ));
        };
        let flags = ItemFlags::NONE.with_compression_type(compression_type);
        let header = encode_header(ITEM_TYPE_COMPRESSED, flags, 0);
        self.sink.write_at(self.used, &header)?;
        self.compression = Some(CompressionStage {
            engine,
            state: WindowState::Idle,
            flags,
            item_offset: self.used,
            payload_len: 0,
            scratch: Vec::new(),
        });
        self.item_count += 1;
        self.used = end;
        Ok(())
    }

    /// 打开压缩窗口（`Idle → WindowOpen`），标记本轮逻辑提交点的起点。
    pub fn open_window(&mut self) -> Result<()> {
        let stage = self.stage_mut()?;
        match stage.state {
            WindowState::Idle => {
                stage.state = WindowState::WindowOpen;
                Ok(())
            }
            WindowState::WindowOpen => Err(CinderError::new(
                codes::COMPRESS_INVALID_STATE,
                "compression window already open",
            )),
            WindowState::Finalized => Err(CinderError::new(
                codes::COMPRESS_INVALID_STATE,
                "compression stream already finalized",
            )),
        }
    }

    /// 将负载字节推入当前窗口；引擎允许内部缓冲（本次可能零产出）。
    pub fn write_compressed(&mut self, bytes: &[u8]) -> Result<()> {
        let capacity = self.capacity;
        let Some(stage) = self.compression.as_mut() else {
            return Err(compression_not_initialized());
        };
        if stage.state != WindowState::WindowOpen {
            return Err(CinderError::new(
                codes::COMPRESS_INVALID_STATE,
                "no open compression window",
            ));
        }
        compress_into(&mut self.sink, capacity, stage, bytes, FlushMode::Buffer)
    }

    /// 收口当前窗口（`WindowOpen → Idle`）：同步冲刷引擎缓冲并把压缩字节
    /// 提交进后备缓冲。零产出是合法结果（小输入可能仍滞留引擎内部）。
    pub fn close_window(&mut self) -> Result<()> {
        let capacity = self.capacity;
        let Some(stage) = self.compression.as_mut() else {
            return Err(compression_not_initialized());
        };
        if stage.state != WindowState::WindowOpen {
            return Err(CinderError::new(
                codes::COMPRESS_INVALID_STATE,
                "no open compression window to close",
            ));
        }
        compress_into(&mut self.sink, capacity, stage, &[], FlushMode::Sync)?;
        stage.state = WindowState::Idle;
        Ok(())
    }

    /// 终结压缩流：以 Finish 语义冲刷、回填包装条目的最终长度并返回总量统计。
    ///
    /// 仍有窗口打开时先隐式收口而非报错——崩溃路径不能因调用方时序缺陷
    /// 丢失诊断数据。终结后窗口操作一律拒绝，普通追加恢复可用。
    pub fn finalize_compression(&mut self) -> Result<CompressionTotals> {
        let capacity = self.capacity;
        let Some(stage) = self.compression.as_mut() else {
            return Err(compression_not_initialized());
        };
        if stage.state == WindowState::Finalized {
            return Err(CinderError::new(
                codes::COMPRESS_INVALID_STATE,
                "compression stream already finalized",
            ));
        }
        compress_into(&mut self.sink, capacity, stage, &[], FlushMode::Finish)?;
        let header = encode_header(ITEM_TYPE_COMPRESSED, stage.flags, stage.payload_len as u64);
        self.sink.write_at(stage.item_offset, &header)?;
        stage.state = WindowState::Finalized;
        let totals = CompressionTotals {
            uncompressed_bytes: stage.engine.total_in(),
            compressed_bytes: stage.engine.total_out(),
        };
        let item_offset = stage.item_offset;
        let payload_len = stage.payload_len;
        let end = item_offset + ITEM_HEADER_LEN + payload_len;
        let aligned_end = item_span(payload_len as u64)
            .and_then(|span| usize::try_from(span).ok())
            .and_then(|span| item_offset.checked_add(span))
            .unwrap_or(self.capacity);
        if aligned_end <= self.capacity {
            zero_fill(&mut self.sink, end, aligned_end - end)?;
            self.used = aligned_end;
        } else {
            // 尾部填充放不下：允许最后一个条目不带填充收尾，迭代器容忍该截断。
            zero_fill(&mut self.sink, end, self.capacity - end)?;
            self.used = self.capacity;
        }
        Ok(totals)
    }

    /// 压缩流是否已初始化且尚未终结。
    pub fn compression_active(&self) -> bool {
        matches!(
            &self.compression,
            Some(stage) if stage.state != WindowState::Finalized
        )
    }

    /// 已占用字节数（压缩期间含包装条目头与已提交的压缩字节）。
    pub fn used(&self) -> usize {
        match &self.compression {
            Some(stage) if stage.state != WindowState::Finalized => {
                stage.item_offset + ITEM_HEADER_LEN + stage.payload_len
            }
            _ => self.used,
        }
    }

    /// 剩余可用字节数。
    pub fn remaining(&self) -> usize {
        self.capacity - self.used()
    }

    /// 状态快照。
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            items: self.item_count,
            used: self.used(),
            capacity: self.capacity,
        }
    }

    /// 借出落盘策略的只读引用（例如对 [`MemorySink`] 的已写前缀开迭代器）。
    ///
    /// [`MemorySink`]: crate::sink::MemorySink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 消耗写入器并交出落盘策略，供消费方接管成品缓冲。
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn push_with_flags(&mut self, item_type: u32, flags: ItemFlags, payload: &[u8]) -> Result<()> {
        self.ensure_direct_mode()?;
        let payload_offset = self.append_item(item_type, flags, payload.len())?;
        if payload.is_empty() {
            return Ok(());
        }
        self.sink.write_at(payload_offset, payload)
    }

    /// 预留 `头 + 对齐负载` 跨度并写入条目头，返回负载起始偏移。
    fn append_item(&mut self, item_type: u32, flags: ItemFlags, payload_len: usize) -> Result<usize> {
        let span = item_span(payload_len as u64)
            .and_then(|span| usize::try_from(span).ok())
            .ok_or_else(|| {
                CinderError::new(codes::BUFFER_OUT_OF_SPACE, "item span overflow")
            })?;
        let end = self.used.checked_add(span).filter(|end| *end <= self.capacity);
        let Some(end) = end else {
            return Err(CinderError::new(
                codes::BUFFER_OUT_OF_SPACE,
                format!(
                    "item needs {span} bytes, {} left of {}",
                    self.capacity - self.used,
                    self.capacity
                ),
            ));
        };
        let header = encode_header(item_type, flags, payload_len as u64);
        self.sink.write_at(self.used, &header)?;
        zero_fill(&mut self.sink, self.used + ITEM_HEADER_LEN, span - ITEM_HEADER_LEN)?;
        let payload_offset = self.used + ITEM_HEADER_LEN;
        self.used = end;
        self.item_count += 1;
        Ok(payload_offset)
    }

    fn ensure_direct_mode(&self) -> Result<()> {
        if self.compression_active() {
            return Err(CinderError::new(
                codes::COMPRESS_INVALID_STATE,
                "payload writes must go through the compression window",
            ));
        }
        Ok(())
    }

    fn stage_mut(&mut self) -> Result<&mut CompressionStage> {
        self.compression
            .as_mut()
            .ok_or_else(compression_not_initialized)
    }
}

fn compression_not_initialized() -> CinderError {
    CinderError::new(
        codes::COMPRESS_INVALID_STATE,
        "compression not initialized",
    )
}

/// 驱动引擎压缩一段输入并把产出提交到后备缓冲。
///
/// 容量检查先于落盘：超出 `maxoffset` 上限返回 `buffer.out_of_space`，
/// 先前窗口已提交的字节保持持久。引擎在失败路径上可能已消费输入——
/// 调用方此时整体放弃构建，总量统计不再回读。
fn compress_into<S: BufferSink>(
    sink: &mut S,
    capacity: usize,
    stage: &mut CompressionStage,
    input: &[u8],
    flush: FlushMode,
) -> Result<()> {
    let mut produced = mem::take(&mut stage.scratch);
    produced.clear();
    if let Err(err) = stage.engine.compress(input, &mut produced, flush) {
        stage.scratch = produced;
        return Err(err);
    }
    if produced.is_empty() {
        stage.scratch = produced;
        return Ok(());
    }
    let offset = stage.item_offset + ITEM_HEADER_LEN + stage.payload_len;
    let fits = offset
        .checked_add(produced.len())
        .is_some_and(|end| end <= capacity);
    if !fits {
        stage.scratch = produced;
        return Err(CinderError::new(
            codes::BUFFER_OUT_OF_SPACE,
            "compressed output exceeds buffer capacity",
        ));
    }
    let write = sink.write_at(offset, &produced);
    match write {
        Ok(()) => {
            stage.payload_len += produced.len();
            produced.clear();
            stage.scratch = produced;
            Ok(())
        }
        Err(err) => {
            stage.scratch = produced;
            Err(err)
        }
    }
}

/// 将描述名按 31 字节截断写入 32 字节 NUL 填充字段。
fn write_desc_name(payload: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    let take = bytes.len().min(SCALAR_DESC_NAME_LEN - 1);
    payload[..take].copy_from_slice(&bytes[..take]);
}
