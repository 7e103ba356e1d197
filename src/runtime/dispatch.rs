//! ### English
//! Owner-thread half of a callback queue: drains entries into the designated callback and runs
//! the finalizer once the queue is retired.
//!
//! ### 中文
//! 回调队列在 owner 线程一侧的部分：把条目 drain 到指定回调，并在队列退役后执行 finalizer。

use std::sync::Arc;

use super::entry::{DesignatedCallback, Finalizer};
use super::owner_loop::{DrainOutcome, DrainSource};
use super::shared::{DrainStep, Shared};

pub(crate) struct OwnerSide<T, C, A> {
    shared: Arc<Shared<T, C, A>>,
    callback: Option<Box<DesignatedCallback<A>>>,
    finalizer: Option<Finalizer<C>>,
    /// ### English
    /// Entries dispatched per pass before yielding (`0` = no limit).
    ///
    /// ### 中文
    /// 每次 drain 在让出前派发的条目数（`0` = 不限制）。
    batch_limit: usize,
}

impl<T, C, A> OwnerSide<T, C, A> {
    pub(crate) fn new(
        shared: Arc<Shared<T, C, A>>,
        callback: Option<Box<DesignatedCallback<A>>>,
        finalizer: Option<Finalizer<C>>,
        batch_limit: usize,
    ) -> Self {
        Self {
            shared,
            callback,
            finalizer,
            batch_limit,
        }
    }

    /// ### English
    /// Terminal step: finalizer first, then owner-side resources, then the `Destroyed` mark.
    ///
    /// ### 中文
    /// 终止步骤：先执行 finalizer，再释放 owner 侧资源，最后标记 `Destroyed`。
    fn finalize(&mut self) {
        tracing::debug!(resource = %self.shared.resource_name(), "finalizing callback queue");
        if let Some(finalizer) = self.finalizer.take() {
            finalizer(self.shared.context());
        }
        self.callback = None;
        self.shared.mark_destroyed();
        tracing::debug!(resource = %self.shared.resource_name(), "callback queue destroyed");
    }
}

impl<T, C, A> Drop for OwnerSide<T, C, A> {
    fn drop(&mut self) {
        self.shared.wake_blocked();
    }
}

impl<T, C, A> DrainSource for OwnerSide<T, C, A> {
    fn drain(&mut self) -> DrainOutcome {
        let mut dispatched = 0usize;
        loop {
            match self.shared.next_step() {
                DrainStep::Dispatch(entry) => {
                    entry.dispatch(self.callback.as_deref_mut(), self.shared.context());
                    dispatched += 1;
                    if self.batch_limit != 0 && dispatched >= self.batch_limit {
                        tracing::trace!(
                            resource = %self.shared.resource_name(),
                            dispatched,
                            "drain batch limit reached; yielding"
                        );
                        self.shared.yield_pass();
                        return DrainOutcome::Yielded;
                    }
                }
                DrainStep::Discard(entries) => {
                    tracing::debug!(
                        resource = %self.shared.resource_name(),
                        discarded = entries.len(),
                        "dropping entries queued before abort"
                    );
                    drop(entries);
                }
                DrainStep::Finalize => {
                    self.finalize();
                    return DrainOutcome::Retired;
                }
                DrainStep::Idle => {
                    tracing::trace!(resource = %self.shared.resource_name(), dispatched, "drain pass idle");
                    return DrainOutcome::Idle;
                }
            }
        }
    }
}
