//! ### English
//! Shared state of one callback queue: FIFO entries, thread count, lifecycle and the condvar that
//! parks blocking producers. Everything mutable sits behind a single mutex; user callbacks never
//! run while it is held.
//!
//! ### 中文
//! 单个回调队列的共享状态：FIFO 条目、线程计数、生命周期，以及用于挂起阻塞生产者的条件变量。
//! 所有可变状态都由同一把互斥锁保护；持锁期间从不执行用户回调。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use super::config::{AbortPolicy, CallbackQueueConfig};
use super::entry::Entry;
use super::owner_loop::{LoopHandle, SourceId};
use super::status::{CallError, LifecycleError};

/// ### English
/// Lifecycle of a callback queue. `Active` is initial; `Destroyed` is terminal.
///
/// ### 中文
/// 回调队列的生命周期。`Active` 为初始状态；`Destroyed` 为终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Active,
    /// ### English
    /// No new acquire/call is admitted; queued entries still drain.
    ///
    /// ### 中文
    /// 不再接纳新的 acquire/call；已排队条目仍会 drain。
    Closing,
    /// ### English
    /// The owner thread is running the finalizer.
    ///
    /// ### 中文
    /// owner 线程正在执行 finalizer。
    Finalizing,
    Destroyed,
}

impl Lifecycle {
    #[inline]
    pub fn is_closing(self) -> bool {
        self != Lifecycle::Active
    }

    #[inline]
    fn is_retired(self) -> bool {
        matches!(self, Lifecycle::Finalizing | Lifecycle::Destroyed)
    }
}

/// ### English
/// How a registered thread gives up its slot.
///
/// ### 中文
/// 已登记线程放弃其名额的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// ### English
    /// Graceful: the queue closes when the last slot is released.
    ///
    /// ### 中文
    /// 优雅释放：最后一个名额释放时队列关闭。
    #[default]
    Release,
    /// ### English
    /// Immediate: the queue closes now, regardless of the remaining slots.
    ///
    /// ### 中文
    /// 立即关闭：无论剩余名额多少，队列立刻关闭。
    Abort,
}

struct QueueState<T, C, A> {
    entries: VecDeque<Entry<T, C, A>>,
    thread_count: usize,
    lifecycle: Lifecycle,
    /// ### English
    /// A drain signal is in flight (or a drain pass is running); producers skip re-signalling.
    ///
    /// ### 中文
    /// 已有 drain 信号在途（或 drain 正在运行）；生产者无需重复发信号。
    dispatch_pending: bool,
}

/// ### English
/// Next unit of work handed to the owner-thread drain.
///
/// ### 中文
/// 交给 owner 线程 drain 的下一步工作。
pub(crate) enum DrainStep<T, C, A> {
    Dispatch(Entry<T, C, A>),
    /// ### English
    /// Entries dropped by `AbortPolicy::Discard`; dropped by the caller outside the lock.
    ///
    /// ### 中文
    /// 被 `AbortPolicy::Discard` 丢弃的条目；由调用方在锁外 drop。
    Discard(VecDeque<Entry<T, C, A>>),
    Finalize,
    Idle,
}

pub(crate) struct Shared<T, C, A> {
    state: Mutex<QueueState<T, C, A>>,
    /// ### English
    /// Signalled when a full bounded queue gains space, and broadcast on closing.
    ///
    /// ### 中文
    /// 有界队列由满变为有空位时通知；关闭时广播。
    space: Condvar,
    aborted: AtomicBool,
    max_queue_size: usize,
    abort_policy: AbortPolicy,
    resource_name: String,
    context: C,
    owner: ThreadId,
    source: SourceId,
    loop_handle: LoopHandle,
}

impl<T, C, A> Shared<T, C, A> {
    pub(crate) fn new(
        config: &CallbackQueueConfig,
        context: C,
        source: SourceId,
        loop_handle: LoopHandle,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                thread_count: config.initial_thread_count,
                lifecycle: Lifecycle::Active,
                dispatch_pending: false,
            }),
            space: Condvar::new(),
            aborted: AtomicBool::new(false),
            max_queue_size: if config.is_bounded() {
                config.max_queue_size
            } else {
                0
            },
            abort_policy: config.abort_policy,
            resource_name: config.resource_name.clone(),
            context,
            owner: loop_handle.owner(),
            source,
            loop_handle,
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, QueueState<T, C, A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn acquire(&self) -> Result<(), LifecycleError> {
        let mut state = self.lock();
        if state.lifecycle.is_closing() {
            return Err(LifecycleError::Closing);
        }
        state.thread_count += 1;
        Ok(())
    }

    pub(crate) fn release(&self) -> Result<(), LifecycleError> {
        let mut state = self.lock();
        if state.thread_count == 0 {
            return Err(LifecycleError::NotRegistered);
        }
        state.thread_count -= 1;
        if state.thread_count == 0 && state.lifecycle == Lifecycle::Active {
            tracing::debug!(resource = %self.resource_name, "last thread released; closing");
            self.begin_closing(&mut state);
        }
        Ok(())
    }

    pub(crate) fn abort(&self) -> Result<(), LifecycleError> {
        let mut state = self.lock();
        if state.lifecycle.is_retired() {
            return Err(LifecycleError::AlreadyClosed);
        }
        if self.aborted.swap(true, Ordering::AcqRel) {
            return Err(LifecycleError::AlreadyAborted);
        }
        state.thread_count = state.thread_count.saturating_sub(1);
        tracing::debug!(
            resource = %self.resource_name,
            threads = state.thread_count,
            pending = state.entries.len(),
            "callback queue aborted"
        );
        if state.lifecycle == Lifecycle::Active {
            self.begin_closing(&mut state);
        } else {
            self.signal_owner(&mut state);
        }
        Ok(())
    }

    /// ### English
    /// Active -> Closing. Wakes every blocked producer and makes sure a drain pass will observe
    /// the transition. Caller holds the lock.
    ///
    /// ### 中文
    /// Active -> Closing。唤醒所有阻塞的生产者，并确保会有一次 drain 观察到该状态转换。
    /// 调用方需持有锁。
    fn begin_closing(&self, state: &mut QueueState<T, C, A>) {
        state.lifecycle = Lifecycle::Closing;
        self.space.notify_all();
        self.signal_owner(state);
    }

    fn signal_owner(&self, state: &mut QueueState<T, C, A>) {
        if state.dispatch_pending {
            return;
        }
        if self.loop_handle.schedule(self.source) {
            state.dispatch_pending = true;
        } else {
            tracing::warn!(resource = %self.resource_name, "owner loop is gone; drain not scheduled");
        }
    }

    /// ### English
    /// Enqueues one entry built from `payload` once it is admitted; a rejected payload is handed
    /// back inside the error. With `blocking`, waits on a full bounded queue until space frees up or the
    /// queue starts closing (closing wins).
    ///
    /// ### 中文
    /// 在准入后由 `payload` 构建并入队一个条目；被拒绝的 payload 会通过错误交还。`blocking` 时，若有界队列已满则等待，直到出现空位或队列开始关闭（关闭优先）。
    pub(crate) fn enqueue<P>(
        &self,
        payload: P,
        blocking: bool,
        into_entry: impl FnOnce(P) -> Entry<T, C, A>,
    ) -> Result<(), CallError<P>> {
        let mut state = self.lock();
        loop {
            if state.lifecycle.is_closing() {
                return Err(CallError::Closing(payload));
            }
            if self.max_queue_size == 0 || state.entries.len() < self.max_queue_size {
                break;
            }
            if !blocking {
                return Err(CallError::Full(payload));
            }
            if thread::current().id() == self.owner {
                return Err(CallError::WouldDeadlock(payload));
            }
            if self.loop_handle.is_closed() {
                return Err(CallError::Failed(payload));
            }
            state = self
                .space
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if self.loop_handle.is_closed() || state.entries.try_reserve(1).is_err() {
            return Err(CallError::Failed(payload));
        }
        if !state.dispatch_pending {
            if !self.loop_handle.schedule(self.source) {
                return Err(CallError::Failed(payload));
            }
            state.dispatch_pending = true;
        }
        state.entries.push_back(into_entry(payload));
        tracing::trace!(resource = %self.resource_name, pending = state.entries.len(), "entry queued");
        Ok(())
    }

    /// ### English
    /// Pops the next unit of work for the drain pass. Owner thread only.
    ///
    /// Returns `Finalize` exactly once: the transition Closing -> Finalizing happens here, under
    /// the lock, when the queue is observed empty.
    ///
    /// ### 中文
    /// 为 drain 取出下一步工作。仅限 owner 线程。
    ///
    /// `Finalize` 恰好返回一次：Closing -> Finalizing 的转换在此处、持锁且观察到队列为空时发生。
    pub(crate) fn next_step(&self) -> DrainStep<T, C, A> {
        let mut state = self.lock();
        if state.lifecycle.is_retired() {
            return DrainStep::Idle;
        }

        if self.abort_policy == AbortPolicy::Discard
            && self.aborted.load(Ordering::Acquire)
            && !state.entries.is_empty()
        {
            return DrainStep::Discard(std::mem::take(&mut state.entries));
        }

        if let Some(entry) = state.entries.pop_front() {
            if self.max_queue_size > 0 {
                // Every pop frees a slot; a waiter woken earlier may not have re-locked yet.
                if state.entries.len() + 1 == self.max_queue_size {
                    self.space.notify_all();
                } else {
                    self.space.notify_one();
                }
            }
            return DrainStep::Dispatch(entry);
        }

        state.dispatch_pending = false;
        if state.lifecycle == Lifecycle::Closing {
            state.lifecycle = Lifecycle::Finalizing;
            return DrainStep::Finalize;
        }
        DrainStep::Idle
    }

    /// ### English
    /// Ends a drain pass early (batch limit hit) and re-signals the owner loop for the rest.
    ///
    /// ### 中文
    /// 提前结束一次 drain（达到批量上限），并为剩余条目重新向 owner 循环发信号。
    pub(crate) fn yield_pass(&self) {
        let mut state = self.lock();
        if !self.loop_handle.schedule(self.source) {
            state.dispatch_pending = false;
        }
    }

    /// ### English
    /// Wakes every producer parked on a full queue. Called when the owner side goes away, so a
    /// waiter can observe the closed loop.
    ///
    /// ### 中文
    /// 唤醒所有因队列已满而挂起的生产者。owner 侧被释放时调用，使等待者能观察到循环已关闭。
    pub(crate) fn wake_blocked(&self) {
        let _state = self.lock();
        self.space.notify_all();
    }

    pub(crate) fn mark_destroyed(&self) {
        let mut state = self.lock();
        state.lifecycle = Lifecycle::Destroyed;
        state.entries.clear();
    }

    #[inline]
    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.lock().thread_count
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lock().lifecycle
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock().entries.len()
    }

    #[inline]
    pub(crate) fn context(&self) -> &C {
        &self.context
    }

    #[inline]
    pub(crate) fn resource_name(&self) -> &str {
        &self.resource_name
    }

    #[inline]
    pub(crate) fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    #[inline]
    pub(crate) fn source(&self) -> SourceId {
        self.source
    }

    #[inline]
    pub(crate) fn loop_handle(&self) -> &LoopHandle {
        &self.loop_handle
    }
}
