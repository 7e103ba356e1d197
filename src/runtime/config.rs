//! ### English
//! Creation-time configuration of a callback queue.
//!
//! ### 中文
//! 回调队列的创建期配置。

/// ### English
/// Default number of entries dispatched per drain pass before the pass yields back to the loop.
///
/// ### 中文
/// 每次 drain 在让出事件循环前默认最多派发的条目数。
pub const DEFAULT_DRAIN_BATCH_LIMIT: usize = 1000;

/// ### English
/// What the owner thread does with entries still queued when the primitive is aborted.
///
/// ### 中文
/// 原语被 abort 时，owner 线程如何处理仍在队列中的条目。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbortPolicy {
    /// ### English
    /// Entries queued before the abort are still dispatched; abort only stops admission.
    ///
    /// ### 中文
    /// abort 之前入队的条目仍会派发；abort 只停止接纳新条目。
    #[default]
    Drain,
    /// ### English
    /// Entries queued before the abort are dropped on the owner thread without being dispatched.
    ///
    /// ### 中文
    /// abort 之前入队的条目在 owner 线程上直接 drop，不再派发。
    Discard,
}

/// ### English
/// Parameters accepted by the "New" factory.
///
/// ### 中文
/// "New" 工厂接受的参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQueueConfig {
    /// ### English
    /// Diagnostic name used in log fields; never affects behavior.
    ///
    /// ### 中文
    /// 诊断用名称（用于日志字段）；不影响行为。
    pub resource_name: String,
    /// ### English
    /// Hard cap on pending entries (`0` = unbounded).
    ///
    /// ### 中文
    /// 待处理条目的硬上限（`0` = 无界）。
    pub max_queue_size: usize,
    /// ### English
    /// Number of registered threads at creation, counting the creator (must be >= 1).
    ///
    /// ### 中文
    /// 创建时已登记的线程数（包含创建者，必须 >= 1）。
    pub initial_thread_count: usize,
    pub abort_policy: AbortPolicy,
    /// ### English
    /// Entries dispatched per drain pass before yielding (`0` = no limit).
    ///
    /// ### 中文
    /// 每次 drain 在让出前派发的条目数（`0` = 不限制）。
    pub drain_batch_limit: usize,
    /// ### English
    /// Whether the primitive keeps `OwnerLoop::run` alive.
    ///
    /// ### 中文
    /// 该原语是否让 `OwnerLoop::run` 保持存活。
    pub referenced: bool,
}

impl Default for CallbackQueueConfig {
    fn default() -> Self {
        Self {
            resource_name: String::from("tsfn"),
            max_queue_size: 0,
            initial_thread_count: 1,
            abort_policy: AbortPolicy::Drain,
            drain_batch_limit: DEFAULT_DRAIN_BATCH_LIMIT,
            referenced: true,
        }
    }
}

impl CallbackQueueConfig {
    #[inline]
    pub(crate) fn is_bounded(&self) -> bool {
        self.max_queue_size > 0
    }
}
