//! 条目编码：16 字节定长条目头、标志位与一次性归一化的 [`ItemKind`] 标签变体。
//!
//! # 线格式（What）
//! - 每个条目由定长头与紧随其后的负载组成：`type: u32 | flags: u32 | size: u64`，
//!   共 16 字节，宿主字节序，头内无填充；
//! - 负载内部不做填充，但**下一个**条目头对齐到 8 字节边界；
//! - `type` 属消费方命名空间，框架仅保留 [`ITEM_TYPE_BUFFER_END`] 作为终止哨兵，
//!   以及少量描述类/压缩包装类型值。
//!
//! # 设计要点（How）
//! - 编解码均为纯函数：`decode_header` 对畸形输入返回错误而非 panic；
//! - flags 的多态含义（数组、容器标记）由 [`ItemKind::decode`] 一次性解出，
//!   消费方拿到标签变体后无需再做位运算。

use crate::error::{CinderError, codes};

/// 条目头长度（字节）。
pub const ITEM_HEADER_LEN: usize = 16;
/// 条目边界对齐粒度（字节）。
pub const ITEM_ALIGN: u64 = 8;

/// 终止哨兵类型值：迭代器看到该条目后立即停止，忽略区域内剩余物理字节。
pub const ITEM_TYPE_BUFFER_END: u32 = u32::MAX;
/// 带描述名的 32 位标量条目；负载为 32 字节 NUL 填充名 + 8 字节值槽。
pub const ITEM_TYPE_UINT32_DESC: u32 = 0x2;
/// 带描述名的 64 位标量条目；负载布局同上，值槽存放完整 u64。
pub const ITEM_TYPE_UINT64_DESC: u32 = 0x3;
/// 压缩包装条目：负载是压缩引擎输出的原始字节流，flags 高位记录压缩类型标签。
pub const ITEM_TYPE_COMPRESSED: u32 = 0x10;

/// 描述类标量条目中描述名字段的定长（字节，含 NUL 填充）。
pub const SCALAR_DESC_NAME_LEN: usize = 32;
/// 描述类标量条目的负载总长：32 字节名 + 8 字节值槽。
pub const SCALAR_DESC_PAYLOAD_LEN: usize = SCALAR_DESC_NAME_LEN + 8;

/// 压缩类型标签：未压缩。
pub const COMPRESSION_TYPE_NONE: u32 = 0;
/// 压缩类型标签：zlib deflate 流。
pub const COMPRESSION_TYPE_ZLIB: u32 = 1;

/// 条目标志位集合。
///
/// # 设计动机（Why）
/// - 原始格式将“这是数组”“这是容器标记”等多态语义打包进同一个 u32 位域，
///   由各消费方临场重释；此处将位域收束为一个带常量与谓词的轻量 newtype，
///   解码只发生在 [`ItemKind::decode`] 一处。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags(u32);

impl ItemFlags {
    /// 空标志位。
    pub const NONE: Self = Self(0);
    /// 数组条目：负载前 16 字节为元素元数据（元素类型、元素大小、元素个数）。
    pub const ARRAY: Self = Self(1 << 0);
    /// 容器开始标记：负载为 `container_type: u32 | _pad: u32 | identifier: u64`。
    pub const CONTAINER_BEGIN: Self = Self(1 << 1);
    /// 容器结束标记：负载为 `identifier: u64`。
    pub const CONTAINER_END: Self = Self(1 << 2);

    /// 压缩类型标签占用的位偏移（bits 8..16）。
    const COMPRESSION_SHIFT: u32 = 8;

    /// 从原始位域构造。
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// 返回原始位域。
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// 判断是否包含给定标志。
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// 合并标志位。
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// 将压缩类型标签编入 bits 8..16。
    pub const fn with_compression_type(self, compression_type: u32) -> Self {
        Self(self.0 | ((compression_type & 0xff) << Self::COMPRESSION_SHIFT))
    }

    /// 取出压缩类型标签。
    pub const fn compression_type(self) -> u32 {
        (self.0 >> Self::COMPRESSION_SHIFT) & 0xff
    }
}

/// 解码后的条目头。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHeader {
    /// 条目类型标签，语义由消费方定义。
    pub item_type: u32,
    /// 标志位域。
    pub flags: ItemFlags,
    /// 负载字节长度（不含条目头，不含对齐填充）。
    pub size: u64,
}

/// 将条目头编码为 16 字节定长记录（宿主字节序）。
pub fn encode_header(item_type: u32, flags: ItemFlags, size: u64) -> [u8; ITEM_HEADER_LEN] {
    let mut out = [0u8; ITEM_HEADER_LEN];
    out[0..4].copy_from_slice(&item_type.to_ne_bytes());
    out[4..8].copy_from_slice(&flags.bits().to_ne_bytes());
    out[8..16].copy_from_slice(&size.to_ne_bytes());
    out
}

/// 从字节切片解码条目头；输入不足 16 字节时返回 `item.malformed`，绝不 panic。
pub fn decode_header(bytes: &[u8]) -> Result<ItemHeader, CinderError> {
    if bytes.len() < ITEM_HEADER_LEN {
        return Err(CinderError::new(
            codes::ITEM_MALFORMED,
            "item header requires 16 bytes",
        ));
    }
    let item_type = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let flags = ItemFlags::from_bits(u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]));
    let size = u64::from_ne_bytes([
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ]);
    Ok(ItemHeader {
        item_type,
        flags,
        size,
    })
}

/// 将负载长度向上取整到 8 字节边界；溢出返回 `None`。
pub const fn padded_len(size: u64) -> Option<u64> {
    match size.checked_add(ITEM_ALIGN - 1) {
        Some(bumped) => Some(bumped & !(ITEM_ALIGN - 1)),
        None => None,
    }
}

/// 计算一个条目占据的完整跨度（头 + 对齐后的负载）；溢出返回 `None`。
pub const fn item_span(size: u64) -> Option<u64> {
    match padded_len(size) {
        Some(padded) => padded.checked_add(ITEM_HEADER_LEN as u64),
        None => None,
    }
}

/// 条目的归一化标签变体：flags 的多态语义在此一次性解出。
///
/// # 契约说明（What）
/// - 元数据负载不满足对应布局（长度不足、描述名非 UTF-8）时回落为 [`ItemKind::Raw`]，
///   与迭代器的失败即收敛策略一致：宁可少识别语义，也不读出范围之外或报错中断；
/// - 未知 `type` 值一律归入 `Raw`，框架不占用消费方命名空间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind<'a> {
    /// 普通不透明负载。
    Raw,
    /// 数组条目；负载前 16 字节为下述元数据，元素字节紧随其后。
    Array {
        /// 元素类型标签。
        elem_type: u32,
        /// 单个元素的字节大小。
        elem_size: u32,
        /// 元素个数。
        count: u64,
    },
    /// 容器开始标记，之后的条目逻辑上归属该容器，直到匹配的结束标记或 EOF。
    ContainerBegin {
        /// 容器类型标签。
        container_type: u32,
        /// 64 位容器标识符。
        identifier: u64,
    },
    /// 容器结束标记。
    ContainerEnd {
        /// 与开始标记配对的标识符。
        identifier: u64,
    },
    /// 带描述名的 32 位标量。
    Uint32Desc {
        /// NUL 截断后的描述名。
        name: &'a str,
        /// 标量值。
        value: u32,
    },
    /// 带描述名的 64 位标量。
    Uint64Desc {
        /// NUL 截断后的描述名。
        name: &'a str,
        /// 标量值。
        value: u64,
    },
    /// 终止哨兵。
    BufferEnd,
}

impl<'a> ItemKind<'a> {
    /// 根据条目头与负载解出标签变体。
    pub fn decode(header: &ItemHeader, payload: &'a [u8]) -> Self {
        if header.item_type == ITEM_TYPE_BUFFER_END {
            return ItemKind::BufferEnd;
        }
        if header.flags.contains(ItemFlags::CONTAINER_BEGIN) {
            if payload.len() >= 16 {
                return ItemKind::ContainerBegin {
                    container_type: read_u32(payload, 0),
                    identifier: read_u64(payload, 8),
                };
            }
            return ItemKind::Raw;
        }
        if header.flags.contains(ItemFlags::CONTAINER_END) {
            if payload.len() >= 8 {
                return ItemKind::ContainerEnd {
                    identifier: read_u64(payload, 0),
                };
            }
            return ItemKind::Raw;
        }
        if header.flags.contains(ItemFlags::ARRAY) {
            if payload.len() >= 16 {
                return ItemKind::Array {
                    elem_type: read_u32(payload, 0),
                    elem_size: read_u32(payload, 4),
                    count: read_u64(payload, 8),
                };
            }
            return ItemKind::Raw;
        }
        match header.item_type {
            ITEM_TYPE_UINT32_DESC if payload.len() == SCALAR_DESC_PAYLOAD_LEN => {
                match decode_desc_name(&payload[..SCALAR_DESC_NAME_LEN]) {
                    Some(name) => ItemKind::Uint32Desc {
                        name,
                        value: read_u32(payload, SCALAR_DESC_NAME_LEN),
                    },
                    None => ItemKind::Raw,
                }
            }
            ITEM_TYPE_UINT64_DESC if payload.len() == SCALAR_DESC_PAYLOAD_LEN => {
                match decode_desc_name(&payload[..SCALAR_DESC_NAME_LEN]) {
                    Some(name) => ItemKind::Uint64Desc {
                        name,
                        value: read_u64(payload, SCALAR_DESC_NAME_LEN),
                    },
                    None => ItemKind::Raw,
                }
            }
            _ => ItemKind::Raw,
        }
    }
}

/// 解出 NUL 填充的描述名；非 UTF-8 时返回 `None`。
fn decode_desc_name(field: &[u8]) -> Option<&str> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    core::str::from_utf8(&field[..end]).ok()
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_ne_bytes([
        bytes[at],
        bytes[at + 1],
        bytes[at + 2],
        bytes[at + 3],
        bytes[at + 4],
        bytes[at + 5],
        bytes[at + 6],
        bytes[at + 7],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_preserves_fields() {
        let flags = ItemFlags::ARRAY.union(ItemFlags::from_bits(0x40));
        let encoded = encode_header(0xBEEF, flags, 48);
        let decoded = decode_header(&encoded).expect("定长输入必可解码");
        assert_eq!(decoded.item_type, 0xBEEF);
        assert_eq!(decoded.flags, flags);
        assert_eq!(decoded.size, 48);
    }

    #[test]
    fn short_input_is_malformed_not_panic() {
        let err = decode_header(&[0u8; 15]).expect_err("15 字节必须报畸形");
        assert_eq!(err.code(), codes::ITEM_MALFORMED);
    }

    #[test]
    fn zero_size_payload_is_valid() {
        let encoded = encode_header(7, ItemFlags::NONE, 0);
        let decoded = decode_header(&encoded).expect("零长负载合法");
        assert_eq!(decoded.size, 0);
        assert_eq!(item_span(0), Some(ITEM_HEADER_LEN as u64));
    }

    #[test]
    fn padding_rounds_to_eight() {
        assert_eq!(padded_len(0), Some(0));
        assert_eq!(padded_len(1), Some(8));
        assert_eq!(padded_len(8), Some(8));
        assert_eq!(padded_len(9), Some(16));
        assert_eq!(padded_len(u64::MAX), None);
        assert_eq!(item_span(u64::MAX - 16), None);
    }

    #[test]
    fn compression_tag_occupies_high_bits() {
        let flags = ItemFlags::NONE.with_compression_type(COMPRESSION_TYPE_ZLIB);
        assert_eq!(flags.compression_type(), COMPRESSION_TYPE_ZLIB);
        assert!(!flags.contains(ItemFlags::ARRAY));
    }

    #[test]
    fn malformed_metadata_falls_back_to_raw() {
        let header = ItemHeader {
            item_type: 9,
            flags: ItemFlags::CONTAINER_BEGIN,
            size: 4,
        };
        // 容器标记要求 16 字节负载，这里只有 4 字节。
        assert_eq!(ItemKind::decode(&header, &[0u8; 4]), ItemKind::Raw);
    }
}
