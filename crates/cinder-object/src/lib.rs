#![warn(missing_docs)]

//! `cinder-object` 为快照描述符提供引用计数句柄与固定上限的资源准入节流。
//!
//! # 模块定位（Why）
//! - 轻量快照对象是一类稀缺资源：同时在途的实例数必须被硬上限约束
//!   （准入控制策略，而非单纯的计数簿记），超限的创建请求是预期内状况，
//!   调用方直接跳过本次生成即可；
//! - 对象可能被多个持有方并发释放，引用计数必须原子；而“计数为零后复活”
//!   属 use-after-free 级缺陷，本 crate 通过所有权结构使其不可表达。
//!
//! # 设计概要（How）
//! - `throttle` 模块实现 [`ObjectThrottle`]：原子槽位计数 + RAII 槽位凭据，
//!   进程级单例遵循“首次使用构造、测试显式重置”的规则；
//! - `handle` 模块实现 [`ObjectHandle`]：`Arc` 承载引用计数，克隆即引用，
//!   最后一个句柄析构时销毁描述符并归还槽位，弱引用仅供失效观测。

pub mod handle;
pub mod throttle;

pub use crate::handle::{ObjectHandle, WeakObjectHandle};
pub use crate::throttle::{
    DEFAULT_OBJECT_CEILING, ObjectThrottle, ResourceClass, ThrottleSlot, ThrottleStats,
};
