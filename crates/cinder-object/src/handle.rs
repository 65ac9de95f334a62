//! 引用计数句柄：包装一个快照写入器与其节流槽位，最后一个持有者析构即销毁。

use std::sync::{Arc, Weak};

use cinder_core::Result;
use cinder_core::sink::BufferSink;
use cinder_core::writer::SnapshotWriter;
use spin::Mutex;

use crate::throttle::{ObjectThrottle, ResourceClass, ThrottleSlot};

/// 被节流的快照对象本体：描述符 + 资源类 + 槽位凭据。
///
/// 槽位由对象独占持有，对象析构时随 [`ThrottleSlot`] 的 `Drop` 恰好归还一次，
/// 不存在显式 release 入口可供误用。写入器置于自旋锁之后：压缩引擎状态不可
/// 跨线程共享裸引用，而句柄允许多持有方并发访问。
struct SnapshotObject<S: BufferSink> {
    writer: Mutex<SnapshotWriter<S>>,
    class: ResourceClass,
    _slot: ThrottleSlot,
}

/// 快照对象的强引用句柄。
///
/// # 设计背景（Why）
/// - 原始系统以手写原子加减管理对象生命周期，复活（从零递增）是其需要人工
///   守规的 use-after-free 隐患；此处以 `Arc` 承载计数：构造即为 1，克隆即
///   引用，降到零时对象连同描述符、槽位一并销毁，且没有任何裸指针出口，
///   复活在类型层面不可表达；
/// - 并发释放安全：多个持有方可在不同线程同时丢弃句柄。
#[derive(Debug)]
pub struct ObjectHandle<S: BufferSink> {
    inner: Arc<SnapshotObject<S>>,
}

impl<S: BufferSink> ObjectHandle<S> {
    /// 经节流器创建对象：先占槽位，后装配包装，失败路径不泄漏槽位。
    ///
    /// 上限已满时返回 `object.throttle_exhausted`——预期内状况，调用方按
    /// “本次快照生成跳过”处理即可。
    pub fn create(
        throttle: &Arc<ObjectThrottle>,
        writer: SnapshotWriter<S>,
        class: ResourceClass,
    ) -> Result<Self> {
        let slot = throttle.try_acquire(class)?;
        Ok(Self {
            inner: Arc::new(SnapshotObject {
                writer: Mutex::new(writer),
                class,
                _slot: slot,
            }),
        })
    }

    /// 对象所属的资源类。
    pub fn class(&self) -> ResourceClass {
        self.inner.class
    }

    /// 在写入器上执行一段访问（例如对成品缓冲开迭代器或补写收尾条目）。
    ///
    /// 闭包持锁执行，调用方应保持访问短小，不在其中做阻塞操作。
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut SnapshotWriter<S>) -> R) -> R {
        let mut guard = self.inner.writer.lock();
        f(&mut guard)
    }

    /// 当前强引用计数，供监控与测试断言。
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// 派生弱观测点：不延长生命周期，对象销毁后升级失败。
    pub fn downgrade(&self) -> WeakObjectHandle<S> {
        WeakObjectHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<S: BufferSink> Clone for ObjectHandle<S> {
    /// 克隆即增加一次引用；与释放侧共同维持“降到零恰好销毁一次”。
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// 快照对象的弱观测点。
#[derive(Debug)]
pub struct WeakObjectHandle<S: BufferSink> {
    inner: Weak<SnapshotObject<S>>,
}

impl<S: BufferSink> WeakObjectHandle<S> {
    /// 尝试升级为强句柄；对象已销毁时返回 `None`，绝不复活。
    pub fn upgrade(&self) -> Option<ObjectHandle<S>> {
        self.inner.upgrade().map(|inner| ObjectHandle { inner })
    }
}

impl<S: BufferSink> core::fmt::Debug for SnapshotObject<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnapshotObject")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}
