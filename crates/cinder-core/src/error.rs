//! 错误域定义：稳定错误码 + 可链式附加根因的 [`CinderError`]。

use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::error::Error;
use core::fmt;

/// `CinderError` 是 crate 内所有可观察错误的最终形态。
///
/// # 设计背景（Why）
/// - 写入器、压缩窗口与对象节流在不同层次产生的故障需要合流为统一的错误码，
///   以便调用方按码值实施兜底策略（提前收尾、跳过本次生成等）；
/// - 崩溃诊断路径必须兼容 `no_std + alloc`，因此不依赖 `std::error::Error`，
///   而是实现 `core::error::Error`。
///
/// # 契约说明（What）
/// - `code`：`'static` 稳定字符串，遵循 `<域>.<语义>` 约定（见 [`codes`]）；
/// - `message`：面向排障人员的自然语言描述，不包含敏感信息；
/// - `cause`：可选底层原因（例如压缩引擎的原始错误），通过 `source()` 暴露。
///
/// # 设计取舍（Trade-offs）
/// - 采用 `Cow<'static, str>` 保存消息，静态场景零分配，动态场景牺牲一次堆分配
///   换取排障信息的完整性。
#[derive(Debug)]
pub struct CinderError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Box<dyn Error + Send + Sync>>,
}

impl CinderError {
    /// 构造携带稳定错误码与描述的错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新错误，供压缩引擎等实现层封装原始故障。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 返回人类可读描述。
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CinderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CinderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

/// 框架内置的错误码常量集合，确保日志与调用方分支具有稳定识别符。
///
/// # 契约说明（What）
/// - **使用前提**：错误码必须封装进 [`CinderError`] 传播，调用方仅凭 `code()` 分派
///   兜底逻辑，不解析 message 文本；
/// - **恢复语义**：`buffer.out_of_space` 与 `object.throttle_exhausted` 是预期内的
///   可恢复状况（容量见底、配额用尽），不应作为故障上报；`compress.invalid_state`
///   表示调用方时序缺陷，调试构建可借此定位，发布构建保证不破坏既有缓冲内容。
pub mod codes {
    /// 分配请求超出缓冲剩余容量；调用方应停止追加并收尾既有数据。
    pub const BUFFER_OUT_OF_SPACE: &str = "buffer.out_of_space";
    /// 写入器初始化收到非法区域（容量为零或区间颠倒）。
    pub const BUFFER_INVALID_RANGE: &str = "buffer.invalid_range";
    /// 条目头字节不足或声明长度非法，仅由纯解码函数返回；迭代器对此收敛为序列结束。
    pub const ITEM_MALFORMED: &str = "item.malformed";
    /// 压缩窗口时序违例：重复打开、未打开即写入、终结后继续使用等。
    pub const COMPRESS_INVALID_STATE: &str = "compress.invalid_state";
    /// 底层压缩引擎故障（zlib 状态机报错等），附带原始原因。
    pub const COMPRESS_ENGINE: &str = "compress.engine";
    /// 资源类配额已满，本次对象创建被拒绝；属预期内状况，调用方直接跳过即可。
    pub const OBJECT_THROTTLE_EXHAUSTED: &str = "object.throttle_exhausted";
}
