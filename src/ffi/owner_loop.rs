//! ### English
//! C ABI bindings for the owner loop (create/run/destroy).
//!
//! ### 中文
//! owner 循环相关的 C ABI 绑定（create/run/destroy）。

use std::time::Duration;

use super::TsfnQueueLoop;
use crate::runtime::OwnerLoop;

#[unsafe(no_mangle)]
/// ### English
/// Creates an owner loop bound to the calling thread.
///
/// ### 中文
/// 创建绑定到调用线程的 owner 循环。
pub extern "C" fn tsfn_queue_loop_create() -> *mut TsfnQueueLoop {
    Box::into_raw(Box::new(TsfnQueueLoop {
        owner: OwnerLoop::new(),
    }))
}

#[unsafe(no_mangle)]
/// ### English
/// Destroys a loop created by `tsfn_queue_loop_create`.
///
/// Queues that were not finalized yet are dropped without running their finalizer, and their
/// `TsfnQueue` handles are leaked; `tsfn_queue_call` on them returns `ERROR`.
///
/// ### 中文
/// 销毁由 `tsfn_queue_loop_create` 创建的循环。
///
/// 尚未 finalize 的队列会被直接 drop 而不执行 finalizer，其 `TsfnQueue` 句柄会泄漏；之后对它们调用 `tsfn_queue_call` 返回 `ERROR`。
pub unsafe extern "C" fn tsfn_queue_loop_destroy(event_loop: *mut TsfnQueueLoop) {
    if event_loop.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(event_loop));
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Runs the loop until no referenced queue is left.
///
/// ### 中文
/// 运行循环，直到没有被引用的队列。
pub unsafe extern "C" fn tsfn_queue_loop_run(event_loop: *mut TsfnQueueLoop) {
    if event_loop.is_null() {
        return;
    }

    unsafe { (*event_loop).owner.run() };
}

#[unsafe(no_mangle)]
/// ### English
/// Like `tsfn_queue_loop_run`, but returns after `timeout_ms` at the latest.
/// Returns `true` if the loop went idle in time.
///
/// ### 中文
/// 与 `tsfn_queue_loop_run` 相同，但最迟在 `timeout_ms` 后返回。
/// 若在超时前进入空闲则返回 `true`。
pub unsafe extern "C" fn tsfn_queue_loop_run_timeout(
    event_loop: *mut TsfnQueueLoop,
    timeout_ms: u64,
) -> bool {
    if event_loop.is_null() {
        return false;
    }

    unsafe { (*event_loop).owner.run_timeout(Duration::from_millis(timeout_ms)) }
}

#[unsafe(no_mangle)]
/// ### English
/// Processes pending drain signals without blocking (embedder-driven loop).
/// Returns the number of drain passes executed.
///
/// ### 中文
/// 非阻塞地处理待处理的 drain 信号（由宿主驱动循环）。
/// 返回执行的 drain 次数。
pub unsafe extern "C" fn tsfn_queue_loop_run_pending(event_loop: *mut TsfnQueueLoop) -> u32 {
    if event_loop.is_null() {
        return 0;
    }

    let passes = unsafe { (*event_loop).owner.run_pending() };
    u32::try_from(passes).unwrap_or(u32::MAX)
}
