//! 固定上限的资源准入节流：原子槽位计数 + RAII 归还。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cinder_core::Result;
use cinder_core::error::{CinderError, codes};
use spin::Mutex;

/// 轻量快照对象类的默认并发在途上限。
pub const DEFAULT_OBJECT_CEILING: usize = 15;

/// 对象所属的资源类标签，随槽位记账，供监控与释放簿记使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceClass(pub u32);

impl ResourceClass {
    /// 轻量快照对象（对应受 15 路上限约束的资源类）。
    pub const LIGHTWEIGHT: Self = Self(1);
}

/// 节流状态快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleStats {
    /// 当前在途槽位数。
    pub live: usize,
    /// 槽位上限。
    pub ceiling: usize,
}

/// 固定上限的准入节流器。
///
/// # 设计背景（Why）
/// - 上限语义是准入控制：第 `ceiling + 1` 个并发获取必须失败，而释放一个槽位
///   恰好放行一个后续获取；
/// - 获取方包括 panic 邻近的诊断路径，因此只提供非阻塞入口——失败即返回
///   `object.throttle_exhausted`，不挂起、不退避。
///
/// # 实现策略（How）
/// - `live` 为原子计数，获取用 `fetch_update` 完成“读-判-增”的无锁原子化；
/// - 槽位以 [`ThrottleSlot`] RAII 凭据交付，`Drop` 时归还，杜绝重复释放。
#[derive(Debug)]
pub struct ObjectThrottle {
    live: AtomicUsize,
    ceiling: usize,
}

impl ObjectThrottle {
    /// 以指定上限构造独立节流器，便于测试与多租户注入。
    pub fn new(ceiling: usize) -> Arc<Self> {
        Arc::new(Self {
            live: AtomicUsize::new(0),
            ceiling,
        })
    }

    /// 非阻塞获取一个槽位；达到上限返回 `object.throttle_exhausted`。
    pub fn try_acquire(self: &Arc<Self>, class: ResourceClass) -> Result<ThrottleSlot> {
        let claimed = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                if live >= self.ceiling {
                    None
                } else {
                    Some(live + 1)
                }
            });
        match claimed {
            Ok(_) => Ok(ThrottleSlot {
                throttle: Arc::clone(self),
                class,
            }),
            Err(_) => Err(CinderError::new(
                codes::OBJECT_THROTTLE_EXHAUSTED,
                "object ceiling reached, creation skipped",
            )),
        }
    }

    /// 当前状态快照。
    pub fn stats(&self) -> ThrottleStats {
        ThrottleStats {
            live: self.live.load(Ordering::Acquire),
            ceiling: self.ceiling,
        }
    }

    /// 进程级单例（轻量快照类，上限 [`DEFAULT_OBJECT_CEILING`]），首次调用时构造。
    pub fn global() -> Arc<Self> {
        let mut slot = GLOBAL.lock();
        slot.get_or_insert_with(|| Self::new(DEFAULT_OBJECT_CEILING))
            .clone()
    }

    /// 丢弃进程级单例，供测试隔离使用；已发出的槽位凭据仍持有旧实例，照常归还。
    pub fn reset_global_for_tests() {
        *GLOBAL.lock() = None;
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

static GLOBAL: Mutex<Option<Arc<ObjectThrottle>>> = Mutex::new(None);

/// 一个已获取槽位的 RAII 凭据，`Drop` 时归还。
#[derive(Debug)]
pub struct ThrottleSlot {
    throttle: Arc<ObjectThrottle>,
    class: ResourceClass,
}

impl ThrottleSlot {
    /// 槽位所属的资源类。
    pub fn class(&self) -> ResourceClass {
        self.class
    }
}

impl Drop for ThrottleSlot {
    fn drop(&mut self) {
        self.throttle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_tied_to_slot_drop() {
        let throttle = ObjectThrottle::new(2);
        let first = throttle.try_acquire(ResourceClass::LIGHTWEIGHT).expect("一号槽位");
        assert_eq!(throttle.stats().live, 1);
        drop(first);
        assert_eq!(throttle.stats().live, 0);
    }

    #[test]
    fn global_is_constructed_on_first_use() {
        ObjectThrottle::reset_global_for_tests();
        let a = ObjectThrottle::global();
        let b = ObjectThrottle::global();
        assert!(Arc::ptr_eq(&a, &b), "两次取用应命中同一实例");
        assert_eq!(a.stats().ceiling, DEFAULT_OBJECT_CEILING);
        ObjectThrottle::reset_global_for_tests();
    }
}
