//! ### English
//! Owner-thread event loop: the only place user callbacks run.
//!
//! Producers signal work through a `LoopHandle` (a channel message plus a coalesced unpark); the
//! owner thread turns the loop, draining each signalled callback queue in arrival order, and parks
//! when idle.
//!
//! ### 中文
//! Owner 线程事件循环：用户回调唯一的执行位置。
//!
//! 生产者通过 `LoopHandle` 发出工作信号（channel 消息 + 合并后的 unpark）；owner 线程驱动循环，
//! 按到达顺序 drain 每个收到信号的回调队列，空闲时 park。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel as channel;

use super::function::ThreadsafeFunction;

/// ### English
/// Identifier of one callback queue registered with an owner loop.
///
/// ### 中文
/// 注册到 owner 循环的单个回调队列的标识符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SourceId(u64);

impl SourceId {
    #[inline]
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// ### English
/// Messages sent from producer threads to the owner loop.
///
/// ### 中文
/// 生产者线程发送给 owner 循环的消息。
enum LoopMessage {
    /// ### English
    /// Drains one callback queue.
    ///
    /// ### 中文
    /// drain 一个回调队列。
    Drain(SourceId),
}

/// ### English
/// Result of one drain pass.
///
/// ### 中文
/// 单次 drain 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainOutcome {
    /// ### English
    /// Queue empty; waits for the next signal.
    ///
    /// ### 中文
    /// 队列为空；等待下一次信号。
    Idle,
    /// ### English
    /// Batch limit hit; the source already re-signalled itself.
    ///
    /// ### 中文
    /// 达到批量上限；该 source 已重新给自己发信号。
    Yielded,
    /// ### English
    /// Finalizer ran; the source must be unregistered.
    ///
    /// ### 中文
    /// finalizer 已执行；需要注销该 source。
    Retired,
}

/// ### English
/// Owner-thread half of a callback queue, driven by the loop.
///
/// ### 中文
/// 回调队列在 owner 线程一侧的部分，由循环驱动。
pub(crate) trait DrainSource {
    fn drain(&mut self) -> DrainOutcome;
}

/// ### English
/// Coalesced "wake pending" flag plus the thread to unpark.
///
/// ### 中文
/// 合并的 “wake pending” 标记，以及需要 unpark 的线程。
struct LoopWaker {
    thread: thread::Thread,
    pending: AtomicBool,
}

impl LoopWaker {
    #[inline]
    fn wake(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.thread.unpark();
        }
    }

    #[inline]
    fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

struct LoopShared {
    sender: channel::Sender<LoopMessage>,
    waker: LoopWaker,
    /// ### English
    /// Set when the owner loop is dropped; later schedules fail fast.
    ///
    /// ### 中文
    /// owner 循环被 drop 时置位；之后的调度会快速失败。
    closed: AtomicBool,
}

/// ### English
/// Thread-safe handle used by producers to schedule drains on the owner thread.
///
/// ### 中文
/// 生产者用于在 owner 线程调度 drain 的线程安全句柄。
#[derive(Clone)]
pub struct LoopHandle {
    inner: Arc<LoopShared>,
}

impl LoopHandle {
    /// ### English
    /// Queues a drain of `source` and wakes the owner thread. Returns `false` if the loop is gone.
    ///
    /// ### 中文
    /// 为 `source` 排队一次 drain 并唤醒 owner 线程；若循环已不存在则返回 `false`。
    pub(crate) fn schedule(&self, source: SourceId) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.inner.sender.send(LoopMessage::Drain(source)).is_err() {
            return false;
        }
        self.inner.waker.wake();
        true
    }

    /// ### English
    /// Returns whether the owner loop has been dropped.
    ///
    /// ### 中文
    /// 返回 owner 循环是否已被 drop。
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// ### English
    /// Returns the owner thread's id.
    ///
    /// ### 中文
    /// 返回 owner 线程的 id。
    #[inline]
    pub fn owner(&self) -> ThreadId {
        self.inner.waker.thread.id()
    }

    #[inline]
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner()
    }

    #[inline]
    pub(crate) fn same_loop(&self, other: &LoopHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

struct Registration {
    source: Rc<RefCell<dyn DrainSource>>,
    referenced: bool,
}

/// ### English
/// Event loop bound to the thread that created it (the owner thread).
///
/// It is `!Send`: callback queues are created through `&OwnerLoop`, which pins their
/// designated callback and finalizer to this thread.
///
/// ### 中文
/// 绑定到创建它的线程（owner 线程）的事件循环。
///
/// 该类型为 `!Send`：回调队列通过 `&OwnerLoop` 创建，从而把其指定回调与 finalizer 固定在本线程。
pub struct OwnerLoop {
    receiver: channel::Receiver<LoopMessage>,
    handle: LoopHandle,
    sources: RefCell<HashMap<SourceId, Registration>>,
    /// ### English
    /// Drain requests that arrived while the same source was already draining (reentrant turn).
    ///
    /// ### 中文
    /// 同一 source 正在 drain 时到达的请求（重入的循环轮次）。
    deferred: RefCell<Vec<SourceId>>,
    /// ### English
    /// Nesting depth of drain passes; deferred requests are retried only at depth 0.
    ///
    /// ### 中文
    /// drain 的嵌套深度；延迟的请求只在深度为 0 时重试。
    depth: Cell<usize>,
    next_source: Cell<u64>,
}

impl OwnerLoop {
    /// ### English
    /// Creates a loop owned by the calling thread.
    ///
    /// ### 中文
    /// 创建由调用线程持有的循环。
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        let handle = LoopHandle {
            inner: Arc::new(LoopShared {
                sender,
                waker: LoopWaker {
                    thread: thread::current(),
                    pending: AtomicBool::new(false),
                },
                closed: AtomicBool::new(false),
            }),
        };
        tracing::debug!(owner = ?handle.owner(), "owner loop created");
        Self {
            receiver,
            handle,
            sources: RefCell::new(HashMap::new()),
            deferred: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            next_source: Cell::new(1),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// ### English
    /// Returns whether any referenced callback queue is still registered.
    ///
    /// ### 中文
    /// 返回是否仍有被引用（referenced）的回调队列处于注册状态。
    pub fn is_alive(&self) -> bool {
        self.sources.borrow().values().any(|r| r.referenced)
    }

    /// ### English
    /// Number of registered (not yet finalized) callback queues.
    ///
    /// ### 中文
    /// 已注册（尚未 finalize）的回调队列数量。
    pub fn source_count(&self) -> usize {
        self.sources.borrow().len()
    }

    /// ### English
    /// Processes every drain signal received so far without blocking.
    /// Returns the number of drain passes executed.
    ///
    /// ### 中文
    /// 非阻塞地处理目前已收到的所有 drain 信号。
    /// 返回执行的 drain 次数。
    pub fn run_pending(&self) -> usize {
        let mut passes = 0usize;
        let budget = self.receiver.len();
        for _ in 0..budget {
            let Ok(LoopMessage::Drain(id)) = self.receiver.try_recv() else {
                break;
            };
            if self.drain_source(id) {
                passes += 1;
            }
        }

        if self.depth.get() > 0 {
            return passes;
        }
        loop {
            let deferred = std::mem::take(&mut *self.deferred.borrow_mut());
            if deferred.is_empty() {
                break;
            }
            for id in deferred {
                if self.drain_source(id) {
                    passes += 1;
                }
            }
        }
        passes
    }

    /// ### English
    /// Turns the loop until no referenced callback queue is left, parking while idle.
    ///
    /// ### 中文
    /// 持续驱动循环直到没有被引用的回调队列，空闲时 park。
    pub fn run(&self) {
        loop {
            self.run_pending();
            if !self.is_alive() {
                return;
            }
            if self.handle.inner.waker.take_pending() {
                continue;
            }
            thread::park();
        }
    }

    /// ### English
    /// Like [`Self::run`], bounded by `timeout`. Returns `true` if the loop went idle in time.
    ///
    /// ### 中文
    /// 与 [`Self::run`] 相同，但受 `timeout` 限制；若在超时前进入空闲则返回 `true`。
    pub fn run_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if !self.is_alive() {
                return true;
            }
            if self.handle.inner.waker.take_pending() {
                continue;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::park_timeout(deadline - now);
        }
    }

    /// ### English
    /// Lets `function` keep [`Self::run`] alive (the default).
    ///
    /// ### 中文
    /// 让 `function` 保持 [`Self::run`] 存活（默认行为）。
    pub fn ref_function<T, C, A>(&self, function: &ThreadsafeFunction<T, C, A>) -> bool {
        self.set_referenced(function, true)
    }

    /// ### English
    /// Stops `function` from keeping [`Self::run`] alive. It still drains while the loop turns.
    ///
    /// ### 中文
    /// 不再让 `function` 保持 [`Self::run`] 存活；循环运行时它仍会被 drain。
    pub fn unref_function<T, C, A>(&self, function: &ThreadsafeFunction<T, C, A>) -> bool {
        self.set_referenced(function, false)
    }

    fn set_referenced<T, C, A>(&self, function: &ThreadsafeFunction<T, C, A>, referenced: bool) -> bool {
        if !self.handle.same_loop(function.loop_handle()) {
            return false;
        }
        match self.sources.borrow_mut().get_mut(&function.source()) {
            Some(registration) => {
                registration.referenced = referenced;
                true
            }
            None => false,
        }
    }

    pub(crate) fn allocate_source(&self) -> SourceId {
        let raw = self.next_source.get();
        self.next_source.set(raw + 1);
        SourceId::new(raw)
    }

    pub(crate) fn register(
        &self,
        id: SourceId,
        source: Rc<RefCell<dyn DrainSource>>,
        referenced: bool,
    ) {
        self.sources
            .borrow_mut()
            .insert(id, Registration { source, referenced });
    }

    /// ### English
    /// Runs one drain pass for `id`. Returns `false` if the source is unknown or already draining.
    ///
    /// ### 中文
    /// 对 `id` 执行一次 drain；若 source 不存在或正在 drain 则返回 `false`。
    fn drain_source(&self, id: SourceId) -> bool {
        let source = self
            .sources
            .borrow()
            .get(&id)
            .map(|registration| Rc::clone(&registration.source));
        let Some(source) = source else {
            return false;
        };

        let Ok(mut guard) = source.try_borrow_mut() else {
            self.deferred.borrow_mut().push(id);
            return false;
        };
        self.depth.set(self.depth.get() + 1);
        let outcome = guard.drain();
        self.depth.set(self.depth.get() - 1);
        drop(guard);

        if outcome == DrainOutcome::Retired {
            self.sources.borrow_mut().remove(&id);
        }
        true
    }
}

impl Default for OwnerLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OwnerLoop {
    /// ### English
    /// Closes the loop. Callback queues still registered are dropped without being finalized.
    ///
    /// ### 中文
    /// 关闭循环。仍处于注册状态的回调队列会被直接 drop，不执行 finalize。
    fn drop(&mut self) {
        self.handle.inner.closed.store(true, Ordering::Release);
        let leftover = self.sources.get_mut().len();
        if leftover > 0 {
            tracing::debug!(leftover, "owner loop dropped with live callback queues");
        }
    }
}
