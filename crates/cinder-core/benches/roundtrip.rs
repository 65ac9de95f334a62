//! 追加/迭代往返基准：衡量条目头编码与边界检查在热路径上的开销。

use cinder_core::{ItemIter, MemorySink, SnapshotWriter};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_push_then_iterate(c: &mut Criterion) {
    let payload = [0x5Au8; 48];

    c.bench_function("push_1024_items", |b| {
        b.iter(|| {
            let mut writer =
                SnapshotWriter::new(MemorySink::with_capacity(128 * 1024)).expect("容量充足");
            for i in 0..1024u32 {
                writer.push(0x1000 + i, black_box(&payload)).expect("容量内追加");
            }
            writer.write_buffer_end().expect("哨兵");
            black_box(writer.into_sink())
        });
    });

    let mut writer = SnapshotWriter::new(MemorySink::with_capacity(128 * 1024)).expect("容量充足");
    for i in 0..1024u32 {
        writer.push(0x1000 + i, &payload).expect("容量内追加");
    }
    writer.write_buffer_end().expect("哨兵");
    let sink = writer.into_sink();

    c.bench_function("iterate_1024_items", |b| {
        b.iter(|| {
            let count = ItemIter::new(black_box(sink.written())).count();
            assert_eq!(count, 1025);
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_push_then_iterate);
criterion_main!(benches);
