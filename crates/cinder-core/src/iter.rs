//! 安全迭代器：对不可信自描述缓冲的失败即收敛（fail closed）游标。
//!
//! # 设计背景（Why）
//! - 快照缓冲经常跨信任域消费（例如用户态解析内核侧产出的崩溃数据），声明长度不可信；
//! - 规格要求：损坏或截断的缓冲必须退化为“看到更少的条目”，而非越界读或硬错误，
//!   因为生产侧最常见的失败模式就是“构建途中空间耗尽”。
//!
//! # 行为概览（How）
//! - 每步先校验剩余字节足够一个条目头，再校验声明负载不越过切片末尾，任一失败即
//!   永久收敛为 `None`；
//! - 迭代顺序严格等于物理追加顺序；遇到终止哨兵后产出该条目一次，随后终止，
//!   不理会区域内剩余物理字节；
//! - `ItemIter` 实现 `Clone`，克隆即从当前位置重新开启一条独立游标。

use crate::item::{
    ITEM_HEADER_LEN, ITEM_TYPE_BUFFER_END, ItemFlags, ItemHeader, ItemKind, decode_header,
    item_span,
};

/// 迭代器产出的单个条目，负载借用底层缓冲，零拷贝。
#[derive(Debug, Clone, Copy)]
pub struct Item<'a> {
    header: ItemHeader,
    payload: &'a [u8],
    kind: ItemKind<'a>,
}

impl<'a> Item<'a> {
    /// 条目类型标签。
    pub fn item_type(&self) -> u32 {
        self.header.item_type
    }

    /// 标志位域。
    pub fn flags(&self) -> ItemFlags {
        self.header.flags
    }

    /// 负载字节长度（等于头中声明的 `size`）。
    pub fn size(&self) -> u64 {
        self.header.size
    }

    /// 完整负载切片；数组条目包含前置的 16 字节元素元数据。
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// 归一化标签变体。
    pub fn kind(&self) -> ItemKind<'a> {
        self.kind
    }

    /// 若为容器开始标记，返回容器类型；否则 `None`。不推进任何游标。
    pub fn container_type(&self) -> Option<u32> {
        match self.kind {
            ItemKind::ContainerBegin { container_type, .. } => Some(container_type),
            _ => None,
        }
    }

    /// 若为容器标记（开始或结束），返回 64 位标识符；否则 `None`。
    pub fn container_id(&self) -> Option<u64> {
        match self.kind {
            ItemKind::ContainerBegin { identifier, .. } | ItemKind::ContainerEnd { identifier } => {
                Some(identifier)
            }
            _ => None,
        }
    }

    /// 若为数组条目，返回跳过元数据后的元素字节区；否则 `None`。
    pub fn array_elements(&self) -> Option<&'a [u8]> {
        match self.kind {
            ItemKind::Array { .. } => self.payload.get(16..),
            _ => None,
        }
    }
}

/// 有限、可重启、零拷贝的条目序列游标。
#[derive(Debug, Clone)]
pub struct ItemIter<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> ItemIter<'a> {
    /// 在 `buf` 的前 `len` 字节（与切片长度取小）上开启迭代。
    pub fn begin(buf: &'a [u8], len: usize) -> Self {
        Self::new(&buf[..len.min(buf.len())])
    }

    /// 在整个切片上开启迭代。
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            done: false,
        }
    }

    /// 从当前位置线性扫描首个匹配类型的条目；不回绕。
    pub fn find_type(&mut self, item_type: u32) -> Option<Item<'a>> {
        self.find(|item| item.item_type() == item_type)
    }

    /// 解析 `pos` 处的条目；任何越界迹象返回 `None`。
    fn parse_at(&self, pos: usize) -> Option<(Item<'a>, usize)> {
        let rest = self.buf.get(pos..)?;
        let header = decode_header(rest).ok()?;
        let size = usize::try_from(header.size).ok()?;
        let payload_end = ITEM_HEADER_LEN.checked_add(size)?;
        let payload = rest.get(ITEM_HEADER_LEN..payload_end)?;
        let kind = ItemKind::decode(&header, payload);
        // 跨度按 8 字节对齐推进；末尾条目缺少填充字节属合法截断，由下一步收敛。
        let advance = item_span(header.size)
            .and_then(|span| usize::try_from(span).ok())
            .unwrap_or(usize::MAX);
        Some((
            Item {
                header,
                payload,
                kind,
            },
            advance,
        ))
    }
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = Item<'a>;

    fn next(&mut self) -> Option<Item<'a>> {
        if self.done {
            return None;
        }
        match self.parse_at(self.pos) {
            Some((item, advance)) => {
                if item.item_type() == ITEM_TYPE_BUFFER_END {
                    self.done = true;
                }
                self.pos = self.pos.saturating_add(advance);
                Some(item)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
