//! ### English
//! Factory for callback queues ("New").
//!
//! ### 中文
//! 回调队列的工厂（"New"）。

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use super::config::{AbortPolicy, CallbackQueueConfig};
use super::dispatch::OwnerSide;
use super::entry::{DesignatedCallback, Finalizer};
use super::function::ThreadsafeFunction;
use super::owner_loop::{DrainSource, OwnerLoop};
use super::shared::Shared;
use super::status::CreateError;

/// ### English
/// Collects the creation parameters of one callback queue.
///
/// The designated callback and the finalizer are owner-thread values: they are moved into the
/// `OwnerLoop` passed to [`Self::build`] and never cross to another thread.
///
/// ### 中文
/// 收集单个回调队列的创建参数。
///
/// 指定回调与 finalizer 属于 owner 线程：它们会被移入传给 [`Self::build`] 的 `OwnerLoop`，
/// 不会跨越到其它线程。
pub struct Builder<T, C = (), A = T> {
    config: CallbackQueueConfig,
    callback: Option<Box<DesignatedCallback<A>>>,
    finalizer: Option<Finalizer<C>>,
    _data: PhantomData<fn(T)>,
}

impl<T, C, A> Builder<T, C, A>
where
    T: Send + 'static,
    C: Send + Sync + 'static,
    A: 'static,
{
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            config: CallbackQueueConfig {
                resource_name: resource_name.into(),
                ..CallbackQueueConfig::default()
            },
            callback: None,
            finalizer: None,
            _data: PhantomData,
        }
    }

    /// ### English
    /// Replaces every numeric/policy setting at once (the resource name is kept from `config`).
    ///
    /// ### 中文
    /// 一次性替换所有数值/策略配置（资源名取自 `config`）。
    pub fn config(mut self, config: CallbackQueueConfig) -> Self {
        self.config = config;
        self
    }

    /// ### English
    /// Sets the designated callback. Without one, bare calls are no-ops and transforms receive
    /// `None`.
    ///
    /// ### 中文
    /// 设置指定回调。未设置时，无数据调用为空操作，转换函数收到 `None`。
    pub fn callback(mut self, callback: impl FnMut(Vec<A>) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.config.max_queue_size = max_queue_size;
        self
    }

    pub fn initial_thread_count(mut self, initial_thread_count: usize) -> Self {
        self.config.initial_thread_count = initial_thread_count;
        self
    }

    pub fn abort_policy(mut self, abort_policy: AbortPolicy) -> Self {
        self.config.abort_policy = abort_policy;
        self
    }

    pub fn drain_batch_limit(mut self, drain_batch_limit: usize) -> Self {
        self.config.drain_batch_limit = drain_batch_limit;
        self
    }

    pub fn referenced(mut self, referenced: bool) -> Self {
        self.config.referenced = referenced;
        self
    }

    /// ### English
    /// Sets the finalizer, run once on the owner thread after the queue is retired. It receives
    /// the context; finalize data is whatever the closure captures.
    ///
    /// ### 中文
    /// 设置 finalizer：队列退役后在 owner 线程上执行一次。它接收上下文；finalize 数据即闭包捕获的内容。
    pub fn finalizer(mut self, finalizer: impl FnOnce(&C) + 'static) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// ### English
    /// Creates the callback queue on `owner`. Must be called on the owner thread (guaranteed by
    /// `OwnerLoop` being `!Send`).
    ///
    /// The creating thread counts as one of the `initial_thread_count` registered threads.
    ///
    /// ### 中文
    /// 在 `owner` 上创建回调队列。必须在 owner 线程调用（`OwnerLoop` 为 `!Send`，由类型保证）。
    ///
    /// 创建线程计入 `initial_thread_count` 个已登记线程之一。
    pub fn build(
        self,
        owner: &OwnerLoop,
        context: C,
    ) -> Result<ThreadsafeFunction<T, C, A>, CreateError> {
        if self.config.initial_thread_count == 0 {
            return Err(CreateError::InvalidThreadCount);
        }

        let source = owner.allocate_source();
        let shared = Arc::new(Shared::new(&self.config, context, source, owner.handle()));
        let owner_side: Rc<RefCell<dyn DrainSource>> = Rc::new(RefCell::new(OwnerSide::new(
            Arc::clone(&shared),
            self.callback,
            self.finalizer,
            self.config.drain_batch_limit,
        )));
        owner.register(source, owner_side, self.config.referenced);

        tracing::debug!(
            resource = %self.config.resource_name,
            max_queue_size = self.config.max_queue_size,
            threads = self.config.initial_thread_count,
            abort_policy = ?self.config.abort_policy,
            "callback queue created"
        );
        Ok(ThreadsafeFunction::from_shared(shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn zero_initial_threads_is_rejected() {
        let owner = OwnerLoop::new();
        let result = ThreadsafeFunction::<u32>::builder("zero")
            .initial_thread_count(0)
            .build(&owner, ());
        assert_eq!(result.unwrap_err(), CreateError::InvalidThreadCount);
        assert_eq!(owner.source_count(), 0);
    }

    #[test]
    fn build_registers_with_the_owner_loop() {
        let owner = OwnerLoop::new();
        let function = ThreadsafeFunction::<u32, &'static str>::builder("registered")
            .max_queue_size(4)
            .initial_thread_count(2)
            .build(&owner, "ctx")
            .unwrap();

        assert_eq!(owner.source_count(), 1);
        assert!(owner.is_alive());
        assert_eq!(function.resource_name(), "registered");
        assert_eq!(function.max_queue_size(), 4);
        assert_eq!(function.thread_count(), 2);
        assert_eq!(*function.context(), "ctx");
    }

    #[test]
    fn unreferenced_queue_does_not_keep_the_loop_alive() {
        let owner = OwnerLoop::new();
        let finalized = Rc::new(Cell::new(false));
        let flag = finalized.clone();
        let function = ThreadsafeFunction::<u32>::builder("unref")
            .referenced(false)
            .finalizer(move |_| flag.set(true))
            .build(&owner, ())
            .unwrap();

        assert_eq!(owner.source_count(), 1);
        assert!(!owner.is_alive());
        assert!(owner.ref_function(&function));
        assert!(owner.is_alive());

        function.release().unwrap();
        owner.run();
        assert!(finalized.get());
        assert!(!owner.ref_function(&function));
    }
}
