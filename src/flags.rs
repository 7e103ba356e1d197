//! ### English
//! Bitflags controlling optional callback queue behaviors.
//!
//! These are passed through the C ABI as a `u32` bitmask.
//!
//! ### 中文
//! 控制回调队列可选行为的位标志（bitflags）。
//!
//! 通过 C ABI 以 `u32` 位掩码传入。
use crate::runtime::{AbortPolicy, CallbackQueueConfig};

/// ### English
/// On abort, drop entries still queued instead of dispatching them.
///
/// Dropped entries reach their `call_js` with a NULL target so `data` can be freed; the designated
/// callback is not invoked for them.
///
/// ### 中文
/// abort 时丢弃仍在队列中的条目，而不是继续派发。
///
/// 被丢弃的条目会以 NULL target 调用其 `call_js`，以便释放 `data`；不会为它们调用指定回调。
pub const TSFN_QUEUE_FLAG_DISCARD_ON_ABORT: u32 = 1 << 0;

/// ### English
/// Create the queue unreferenced: it does not keep `tsfn_queue_loop_run` alive.
///
/// ### 中文
/// 以 unref 状态创建队列：它不会让 `tsfn_queue_loop_run` 保持运行。
pub const TSFN_QUEUE_FLAG_UNREF: u32 = 1 << 1;

/// ### English
/// `tsfn_queue_release` mode: graceful release of the calling thread's slot.
///
/// ### 中文
/// `tsfn_queue_release` 模式：优雅释放调用线程的名额。
pub const TSFN_QUEUE_RELEASE_MODE_RELEASE: u32 = 0;

/// ### English
/// `tsfn_queue_release` mode: abort the queue while giving up the slot.
///
/// ### 中文
/// `tsfn_queue_release` 模式：放弃名额的同时 abort 队列。
pub const TSFN_QUEUE_RELEASE_MODE_ABORT: u32 = 1;

/// ### English
/// Applies `flags` on top of `config`. Unknown bits are ignored.
///
/// ### 中文
/// 在 `config` 之上应用 `flags`；未知位会被忽略。
pub(crate) fn apply(config: &mut CallbackQueueConfig, flags: u32) {
    if flags & TSFN_QUEUE_FLAG_DISCARD_ON_ABORT != 0 {
        config.abort_policy = AbortPolicy::Discard;
    }
    if flags & TSFN_QUEUE_FLAG_UNREF != 0 {
        config.referenced = false;
    }
}
