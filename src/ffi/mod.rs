//! ### English
//! C ABI surface for `tsfn_queue`.
//!
//! All exported symbols are `extern "C"` functions; structs are `#[repr(C)]` and opaque to the
//! embedder. Strings passed in must be NUL-terminated UTF-8 (C string); they will be validated as
//! UTF-8 and will be truncated at the first NUL byte.
//!
//! Thread rules:
//! - `TsfnQueueLoop` and every `tsfn_queue_loop_*` / `tsfn_queue_create` / `tsfn_queue_ref` call
//!   belong to the thread that created the loop (the owner thread).
//! - `TsfnQueue` may be used from any thread through `acquire` / `release` / `abort` / `call`.
//!
//! ### 中文
//! `tsfn_queue` 的 C ABI 接口层。
//!
//! 所有导出符号均为 `extern "C"` 函数；结构体使用 `#[repr(C)]` 且对宿主不透明。
//! 传入的字符串必须是以 NUL 结尾的 UTF-8（C 字符串）；Rust 会校验 UTF-8，且在遇到第一个 NUL 字节处截断。
//!
//! 线程规则：
//! - `TsfnQueueLoop` 以及所有 `tsfn_queue_loop_*` / `tsfn_queue_create` / `tsfn_queue_ref` 调用
//!   都属于创建该循环的线程（owner 线程）。
//! - `TsfnQueue` 可以在任意线程通过 `acquire` / `release` / `abort` / `call` 使用。
mod abi;
mod owner_loop;
mod queue;

use std::ffi::{CStr, c_char, c_void};
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use crate::runtime::{DesignatedCallback, OwnerLoop, ThreadsafeFunction};

/// ### English
/// C ABI version for `tsfn_queue`.
///
/// ### 中文
/// `tsfn_queue` 的 C ABI 版本号。
const TSFN_QUEUE_ABI_VERSION: u32 = 1;

/// ### English
/// Raw embedder pointer carried across threads. The queue never dereferences it.
///
/// ### 中文
/// 跨线程携带的宿主原始指针；队列从不解引用它。
#[repr(transparent)]
#[derive(Clone, Copy)]
pub(crate) struct RawPtr(*mut c_void);

// SAFETY: the pointer is opaque to the queue and only handed back to embedder callbacks; the
// embedder owns its thread-safety contract.
unsafe impl Send for RawPtr {}
unsafe impl Sync for RawPtr {}

/// ### English
/// Designated callback supplied by the embedder; receives `argc` opaque arguments.
///
/// ### 中文
/// 宿主提供的指定回调；接收 `argc` 个不透明参数。
pub type TsfnQueueCallback =
    unsafe extern "C" fn(callback_data: *mut c_void, argv: *const *mut c_void, argc: usize);

/// ### English
/// Per-item transform, run on the owner thread. It owns `data` and must clean it up; it may call
/// `tsfn_queue_target_call(target, ...)` to invoke the designated callback.
///
/// `target` is NULL when the item is discarded without being dispatched (see
/// `TSFN_QUEUE_FLAG_DISCARD_ON_ABORT`); the transform should then only free `data`.
///
/// ### 中文
/// 每条目的转换函数，在 owner 线程上执行。它拥有 `data` 并负责清理；可调用
/// `tsfn_queue_target_call(target, ...)` 来调用指定回调。
///
/// 条目未经派发即被丢弃时（见 `TSFN_QUEUE_FLAG_DISCARD_ON_ABORT`），`target` 为 NULL；
/// 此时转换函数只需释放 `data`。
pub type TsfnQueueCallJs =
    unsafe extern "C" fn(target: *mut TsfnQueueTarget, context: *mut c_void, data: *mut c_void);

/// ### English
/// Finalizer, run once on the owner thread after the queue is retired.
///
/// ### 中文
/// finalizer：队列退役后在 owner 线程上执行一次。
pub type TsfnQueueFinalize = unsafe extern "C" fn(finalize_data: *mut c_void, context: *mut c_void);

/// ### English
/// One queued C call.
///
/// ### 中文
/// 一条排队的 C 调用。
pub(crate) struct FfiItem {
    data: RawPtr,
    call_js: TsfnQueueCallJs,
    context: RawPtr,
}

impl FfiItem {
    /// ### English
    /// Hands the item back without running `call_js` (rejected calls stay owned by the caller).
    ///
    /// ### 中文
    /// 不执行 `call_js` 直接交还条目（被拒绝的调用仍归调用方所有）。
    fn reject(self) {
        std::mem::forget(self);
    }
}

impl Drop for FfiItem {
    /// ### English
    /// An item dropped before dispatch (discarded on abort) still reaches `call_js`, with a NULL
    /// target, so the embedder can free `data`.
    ///
    /// ### 中文
    /// 派发前被 drop 的条目（abort 时被丢弃）仍会以 NULL target 调用 `call_js`，便于宿主释放 `data`。
    fn drop(&mut self) {
        unsafe { (self.call_js)(std::ptr::null_mut(), self.context.0, self.data.0) };
    }
}

pub(crate) struct FfiContext {
    context: RawPtr,
}

pub(crate) type FfiFunction = ThreadsafeFunction<FfiItem, FfiContext, RawPtr>;

#[repr(C)]
/// ### English
/// Opaque owner loop handle. Owner thread only.
///
/// ### 中文
/// 不透明 owner 循环句柄；仅限 owner 线程。
pub struct TsfnQueueLoop {
    owner: OwnerLoop,
}

#[repr(C)]
/// ### English
/// Opaque callback queue handle (thread-safe for the embedder to use via pointers).
///
/// Freed by the owner loop right after the finalizer returns; do not use it after receiving
/// `CLOSING`.
///
/// ### 中文
/// 不透明回调队列句柄（宿主可通过指针线程安全使用）。
///
/// 在 finalizer 返回后由 owner 循环释放；收到 `CLOSING` 后不要再使用。
pub struct TsfnQueue {
    function: FfiFunction,
}

#[repr(C)]
/// ### English
/// Designated-callback target handed to `TsfnQueueCallJs`; valid only for the duration of that call.
///
/// ### 中文
/// 传给 `TsfnQueueCallJs` 的指定回调目标；仅在该次调用期间有效。
pub struct TsfnQueueTarget {
    callback: Option<NonNull<DesignatedCallback<RawPtr>>>,
}

/// ### English
/// Transform used for every C item: exposes the designated callback as a `TsfnQueueTarget` and
/// forwards to the embedder's `call_js`.
///
/// ### 中文
/// 所有 C 条目使用的转换函数：把指定回调包装为 `TsfnQueueTarget`，并转发给宿主的 `call_js`。
fn dispatch_item(
    callback: Option<&mut DesignatedCallback<RawPtr>>,
    item: FfiItem,
    context: &FfiContext,
) {
    let item = ManuallyDrop::new(item);
    let mut target = TsfnQueueTarget {
        callback: callback.map(NonNull::from),
    };
    unsafe { (item.call_js)(&mut target, context.context.0, item.data.0) };
}

/// ### English
/// Converts an optional NUL-terminated UTF-8 C string into a `String`.
///
/// Returns `None` for NULL pointers, invalid UTF-8, or empty strings.
///
/// # Safety
/// `ptr` must be valid and point to a NUL-terminated string for the duration of the call.
///
/// ### 中文
/// 将可选的 NUL 结尾 UTF-8 C 字符串转换为 `String`。
///
/// 对 NULL 指针、UTF-8 非法或空字符串返回 `None`。
///
/// # Safety
/// `ptr` 在本次调用期间必须有效，并指向以 NUL 结尾的字符串。
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    let value = unsafe { CStr::from_ptr(ptr) }.to_str().ok()?;
    if value.is_empty() {
        return None;
    }

    Some(value.to_owned())
}

#[cfg(test)]
mod tests;
