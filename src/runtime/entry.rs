//! ### English
//! Queue entries and the callback types they are dispatched through.
//!
//! ### 中文
//! 队列条目以及派发时使用的回调类型。

/// ### English
/// The designated callback, invoked on the owner thread with a list of marshalled arguments.
/// It never leaves the owner thread, so it does not need to be `Send`.
///
/// ### 中文
/// 指定回调：在 owner 线程上以一组已封送的参数调用。
/// 它不会离开 owner 线程，因此不要求 `Send`。
pub type DesignatedCallback<A> = dyn FnMut(Vec<A>) + 'static;

/// ### English
/// Per-item transform: turns one entry's data into a call to the designated callback.
///
/// The transform owns `data` and is responsible for its cleanup. The callback argument is `None`
/// when the primitive was created without a designated callback.
///
/// ### 中文
/// 每条目的转换函数：把条目数据转换为一次对指定回调的调用。
///
/// 转换函数拥有 `data`，并负责其清理。若原语创建时没有指定回调，则回调参数为 `None`。
pub type Transform<T, C, A> = for<'a> fn(Option<&'a mut DesignatedCallback<A>>, T, &'a C);

/// ### English
/// Finalizer run exactly once on the owner thread after the primitive is retired.
/// Finalize data is whatever the closure captured.
///
/// ### 中文
/// 原语退役后在 owner 线程上恰好执行一次的 finalizer。
/// finalize 数据即闭包捕获的内容。
pub type Finalizer<C> = Box<dyn FnOnce(&C) + 'static>;

/// ### English
/// One queued unit of work.
///
/// ### 中文
/// 一个排队的工作单元。
pub(crate) enum Entry<T, C, A> {
    /// ### English
    /// No data, no transform: the designated callback is invoked with no arguments.
    ///
    /// ### 中文
    /// 无数据、无转换：以空参数调用指定回调。
    Bare,
    Item {
        data: T,
        transform: Transform<T, C, A>,
    },
}

impl<T, C, A> Entry<T, C, A> {
    /// ### English
    /// Dispatches this entry. Owner thread only.
    ///
    /// ### 中文
    /// 派发该条目。仅限 owner 线程。
    pub(crate) fn dispatch(self, callback: Option<&mut DesignatedCallback<A>>, context: &C) {
        match self {
            Entry::Bare => {
                if let Some(callback) = callback {
                    callback(Vec::new());
                }
            }
            Entry::Item { data, transform } => transform(callback, data, context),
        }
    }
}
