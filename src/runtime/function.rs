//! ### English
//! Producer-facing handle of a callback queue.
//!
//! ### 中文
//! 回调队列面向生产者的句柄。

use std::sync::Arc;

use super::builder::Builder;
use super::entry::{Entry, Transform};
use super::owner_loop::{LoopHandle, SourceId};
use super::shared::{Lifecycle, ReleaseMode, Shared};
use super::status::{CallError, LifecycleError};

/// ### English
/// Thread-safe handle that lets any registered thread request invocation of the designated
/// callback on the owner thread.
///
/// - `T`: per-item data carried from the producer to the owner thread.
/// - `C`: context, readable from every thread and handed to transforms and the finalizer.
/// - `A`: argument type of the designated callback.
///
/// Cloning the handle does not register a thread; use [`Self::acquire`] / [`Self::release`].
/// After receiving `Closing`, a thread should stop using the handle; further calls keep
/// returning `Closing`.
///
/// ### 中文
/// 线程安全句柄：任何已登记线程都可借此请求在 owner 线程上调用指定回调。
///
/// - `T`：从生产者携带到 owner 线程的每条目数据。
/// - `C`：上下文，所有线程可读，并会传给转换函数与 finalizer。
/// - `A`：指定回调的参数类型。
///
/// 克隆句柄不会登记线程；请使用 [`Self::acquire`] / [`Self::release`]。
/// 收到 `Closing` 后线程应停止使用该句柄；之后的调用会持续返回 `Closing`。
pub struct ThreadsafeFunction<T, C = (), A = T> {
    shared: Arc<Shared<T, C, A>>,
}

impl<T, C, A> Clone for ThreadsafeFunction<T, C, A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, C, A> ThreadsafeFunction<T, C, A>
where
    T: Send + 'static,
    C: Send + Sync + 'static,
    A: 'static,
{
    /// ### English
    /// Starts building a callback queue named `resource_name` (diagnostic only).
    ///
    /// ### 中文
    /// 开始构建名为 `resource_name`（仅用于诊断）的回调队列。
    pub fn builder(resource_name: impl Into<String>) -> Builder<T, C, A> {
        Builder::new(resource_name)
    }
}

impl<T, C, A> ThreadsafeFunction<T, C, A> {
    pub(crate) fn from_shared(shared: Arc<Shared<T, C, A>>) -> Self {
        Self { shared }
    }

    /// ### English
    /// Registers one more thread. Fails with `Closing` once the queue is closing.
    ///
    /// ### 中文
    /// 登记一个新线程；队列关闭后返回 `Closing`。
    pub fn acquire(&self) -> Result<(), LifecycleError> {
        self.shared.acquire()
    }

    /// ### English
    /// Deregisters the calling thread. The release that brings the count to zero starts closing.
    /// The caller must not use the handle afterwards.
    ///
    /// ### 中文
    /// 注销调用线程；使计数归零的那次 release 会开始关闭。调用方之后不应再使用该句柄。
    pub fn release(&self) -> Result<(), LifecycleError> {
        self.shared.release()
    }

    /// ### English
    /// Closes the queue immediately, even with threads still registered, and gives up the
    /// caller's slot. Fails if already aborted or already finalized.
    ///
    /// ### 中文
    /// 立即关闭队列（即使仍有已登记线程），并放弃调用方的名额。若已 abort 或已 finalize 则失败。
    pub fn abort(&self) -> Result<(), LifecycleError> {
        self.shared.abort()
    }

    pub fn release_with(&self, mode: ReleaseMode) -> Result<(), LifecycleError> {
        match mode {
            ReleaseMode::Release => self.release(),
            ReleaseMode::Abort => self.abort(),
        }
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.shared.is_aborted()
    }

    /// ### English
    /// Queues a call of the designated callback with no arguments, waiting while a bounded queue
    /// is full.
    ///
    /// ### 中文
    /// 排队一次无参数的指定回调调用；有界队列已满时等待。
    pub fn blocking_call(&self) -> Result<(), CallError<()>> {
        self.shared.enqueue((), true, |()| Entry::Bare)
    }

    /// ### English
    /// Queues a call of the designated callback with no arguments; `Full` if a bounded queue is
    /// at capacity.
    ///
    /// ### 中文
    /// 排队一次无参数的指定回调调用；有界队列已满时返回 `Full`。
    pub fn non_blocking_call(&self) -> Result<(), CallError<()>> {
        self.shared.enqueue((), false, |()| Entry::Bare)
    }

    /// ### English
    /// Queues `data`; on the owner thread `transform` receives the designated callback, the data and
    /// the context. Waits while a bounded queue is full. On error the data is handed back.
    ///
    /// ### 中文
    /// 排队 `data`；在 owner 线程上 `transform` 会收到指定回调、数据与上下文。
    /// 有界队列已满时等待。出错时数据会被交还。
    pub fn blocking_call_with(
        &self,
        data: T,
        transform: Transform<T, C, A>,
    ) -> Result<(), CallError<T>> {
        self.shared
            .enqueue(data, true, |data| Entry::Item { data, transform })
    }

    /// ### English
    /// Non-blocking variant of [`Self::blocking_call_with`]; `Full` if a bounded queue is at
    /// capacity.
    ///
    /// ### 中文
    /// [`Self::blocking_call_with`] 的非阻塞版本；有界队列已满时返回 `Full`。
    pub fn non_blocking_call_with(
        &self,
        data: T,
        transform: Transform<T, C, A>,
    ) -> Result<(), CallError<T>> {
        self.shared
            .enqueue(data, false, |data| Entry::Item { data, transform })
    }

    #[inline]
    pub fn context(&self) -> &C {
        self.shared.context()
    }

    pub fn thread_count(&self) -> usize {
        self.shared.thread_count()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    pub fn is_closing(&self) -> bool {
        self.lifecycle().is_closing()
    }

    /// ### English
    /// Number of entries waiting for the owner thread.
    ///
    /// ### 中文
    /// 等待 owner 线程处理的条目数。
    pub fn pending_len(&self) -> usize {
        self.shared.pending_len()
    }

    pub fn resource_name(&self) -> &str {
        self.shared.resource_name()
    }

    pub fn max_queue_size(&self) -> usize {
        self.shared.max_queue_size()
    }

    #[inline]
    pub(crate) fn source(&self) -> SourceId {
        self.shared.source()
    }

    /// ### English
    /// Handle of the owner loop this queue drains on.
    ///
    /// ### 中文
    /// 该队列所在 owner 循环的句柄。
    #[inline]
    pub fn loop_handle(&self) -> &LoopHandle {
        self.shared.loop_handle()
    }
}

impl<T, C, A> std::fmt::Debug for ThreadsafeFunction<T, C, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadsafeFunction")
            .field("resource_name", &self.resource_name())
            .field("lifecycle", &self.lifecycle())
            .field("thread_count", &self.thread_count())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
