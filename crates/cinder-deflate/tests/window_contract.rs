//! `window_contract` 集成测试：压缩窗口状态机与 zlib 引擎在真实写入路径下的契约。
//!
//! # 测试目标（Why）
//! - 验证规格场景：10 KiB 零字节经 开窗 → 推入 → 收口 → 终结 后，包装条目负载
//!   解压还原原文，且未压缩总量恰为 10240；
//! - 穷举状态机违例（重复初始化、重复开窗、未开窗写入、终结后续用），确认一律
//!   以 `compress.invalid_state` 拒绝且不破坏既有缓冲；
//! - 验证增量提交语义：较早窗口收口的字节在后续窗口打开前已持久。

use cinder_core::error::codes;
use cinder_core::item::{COMPRESSION_TYPE_ZLIB, ITEM_TYPE_COMPRESSED};
use cinder_core::{ItemIter, MemorySink, SnapshotWriter};
use cinder_deflate::{ZlibEngine, inflate};

fn writer(capacity: usize) -> SnapshotWriter<MemorySink> {
    SnapshotWriter::new(MemorySink::with_capacity(capacity)).expect("构造写入器")
}

/// 规格场景：10 KiB 零字节的单窗口往返。
#[test]
fn ten_kib_of_zeros_roundtrips() {
    let zeros = vec![0u8; 10 * 1024];
    let mut w = writer(64 * 1024);

    w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
        .expect("初始化压缩");
    w.open_window().expect("开窗");
    w.write_compressed(&zeros).expect("推入 10 KiB");
    w.close_window().expect("收口");
    let totals = w.finalize_compression().expect("终结");

    assert_eq!(totals.uncompressed_bytes, 10_240);
    assert!(totals.compressed_bytes > 0);
    assert!(totals.compressed_bytes < 10_240, "全零输入必然显著压缩");

    let sink = w.into_sink();
    let item = ItemIter::new(sink.written()).next().expect("包装条目");
    assert_eq!(item.item_type(), ITEM_TYPE_COMPRESSED);
    assert_eq!(item.flags().compression_type(), COMPRESSION_TYPE_ZLIB);
    assert_eq!(item.size(), totals.compressed_bytes);
    assert_eq!(inflate(item.payload()).expect("解压成功"), zeros);
}

/// 多窗口增量提交：两个窗口推入的字节在解压后按序拼接。
#[test]
fn two_windows_concatenate_in_order() {
    let mut w = writer(32 * 1024);
    w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
        .expect("初始化压缩");

    w.open_window().expect("第一窗");
    w.write_compressed(b"first window bytes; ").expect("第一窗推入");
    w.close_window().expect("第一窗收口");
    let committed_after_first = w.used();

    w.open_window().expect("第二窗");
    // 第一窗收口提交的字节此刻已持久：打开第二窗不会回退 used。
    assert!(w.used() >= committed_after_first);
    w.write_compressed(b"second window bytes").expect("第二窗推入");
    w.close_window().expect("第二窗收口");
    w.finalize_compression().expect("终结");

    let sink = w.into_sink();
    let item = ItemIter::new(sink.written()).next().expect("包装条目");
    assert_eq!(
        inflate(item.payload()).expect("解压成功"),
        b"first window bytes; second window bytes"
    );
}

/// 空窗口（开后即收）合法：引擎零产出不是错误。
#[test]
fn empty_window_is_not_an_error() {
    let mut w = writer(4096);
    w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
        .expect("初始化压缩");
    w.open_window().expect("开窗");
    w.close_window().expect("零输入收口");
    let totals = w.finalize_compression().expect("终结");
    assert_eq!(totals.uncompressed_bytes, 0);
}

/// 终结隐式收口仍打开的窗口，而非报错——崩溃路径不因时序缺陷丢数据。
#[test]
fn finalize_implicitly_closes_open_window() {
    let payload = vec![7u8; 2048];
    let mut w = writer(16 * 1024);
    w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
        .expect("初始化压缩");
    w.open_window().expect("开窗");
    w.write_compressed(&payload).expect("推入");
    // 故意不 close_window。
    let totals = w.finalize_compression().expect("隐式收口后终结");
    assert_eq!(totals.uncompressed_bytes, 2048);

    let sink = w.into_sink();
    let item = ItemIter::new(sink.written()).next().expect("包装条目");
    assert_eq!(inflate(item.payload()).expect("解压成功"), payload);
}

/// 状态机违例矩阵：一律 `compress.invalid_state`。
#[test]
fn state_machine_violations_are_rejected() {
    let mut w = writer(8 * 1024);

    // 未初始化即操作窗口。
    assert_eq!(
        w.open_window().expect_err("未初始化").code(),
        codes::COMPRESS_INVALID_STATE
    );
    assert_eq!(
        w.write_compressed(b"x").expect_err("未初始化").code(),
        codes::COMPRESS_INVALID_STATE
    );

    w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
        .expect("初始化压缩");

    // 重复初始化。
    assert_eq!(
        w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
            .expect_err("重复初始化")
            .code(),
        codes::COMPRESS_INVALID_STATE
    );

    // 未开窗写入 / 收口。
    assert_eq!(
        w.write_compressed(b"x").expect_err("未开窗").code(),
        codes::COMPRESS_INVALID_STATE
    );
    assert_eq!(
        w.close_window().expect_err("未开窗").code(),
        codes::COMPRESS_INVALID_STATE
    );

    // 压缩激活期间普通追加被拒绝。
    assert_eq!(
        w.push(1, b"direct").expect_err("直写被拒").code(),
        codes::COMPRESS_INVALID_STATE
    );

    // 重复开窗。
    w.open_window().expect("开窗");
    assert_eq!(
        w.open_window().expect_err("重复开窗").code(),
        codes::COMPRESS_INVALID_STATE
    );
    w.close_window().expect("收口");

    w.finalize_compression().expect("终结");

    // 终结后窗口操作一律拒绝。
    assert_eq!(
        w.open_window().expect_err("终结后开窗").code(),
        codes::COMPRESS_INVALID_STATE
    );
    assert_eq!(
        w.finalize_compression().expect_err("重复终结").code(),
        codes::COMPRESS_INVALID_STATE
    );
}

/// 终结之后普通追加恢复可用：压缩包装条目之后可以继续追加明文条目与哨兵。
#[test]
fn plain_items_resume_after_finalize() {
    let mut w = writer(16 * 1024);
    w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
        .expect("初始化压缩");
    w.open_window().expect("开窗");
    w.write_compressed(b"compressed span").expect("推入");
    w.close_window().expect("收口");
    w.finalize_compression().expect("终结");

    w.push(0x42, b"plaintext trailer").expect("终结后明文追加");
    w.write_buffer_end().expect("哨兵");

    let sink = w.into_sink();
    let items: Vec<_> = ItemIter::new(sink.written()).collect();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].item_type(), ITEM_TYPE_COMPRESSED);
    assert_eq!(items[1].payload(), b"plaintext trailer");
}

/// 压缩产出受区域容量约束：超限返回 `buffer.out_of_space`，已提交字节保持完好。
#[test]
fn compressed_output_respects_capacity_ceiling() {
    // 区域小到放不下随机数据的压缩产出。
    let mut w = writer(96);
    w.init_compression(Box::new(ZlibEngine::new()), COMPRESSION_TYPE_ZLIB)
        .expect("初始化压缩");
    w.open_window().expect("开窗");

    // 不可压缩的伪随机字节，确保产出超过剩余 80 字节。
    let noise: Vec<u8> = (0..4096u32)
        .map(|i| (i.wrapping_mul(2654435761) >> 24) as u8)
        .collect();
    let mut failed = false;
    for chunk in noise.chunks(512) {
        if let Err(err) = w.write_compressed(chunk) {
            assert_eq!(err.code(), codes::BUFFER_OUT_OF_SPACE);
            failed = true;
            break;
        }
    }
    if !failed {
        let err = w.close_window().expect_err("收口冲刷必然超限");
        assert_eq!(err.code(), codes::BUFFER_OUT_OF_SPACE);
    }
    assert!(w.used() <= 96, "失败后占用不得越过容量");
}
