//! ### English
//! C ABI bindings for callback queue lifecycle and calls.
//!
//! ### 中文
//! 回调队列生命周期与调用的 C ABI 绑定。

use std::cell::Cell;
use std::ffi::{c_char, c_void};
use std::rc::Rc;

use super::{
    FfiContext, FfiFunction, FfiItem, RawPtr, TsfnQueue, TsfnQueueCallJs, TsfnQueueCallback,
    TsfnQueueFinalize, TsfnQueueLoop, TsfnQueueTarget,
};
use crate::flags;
use crate::runtime::{CallStatus, CallbackQueueConfig, LifecycleError, ReleaseMode, status_of};

fn lifecycle_status(result: Result<(), LifecycleError>) -> CallStatus {
    match result {
        Ok(()) => CallStatus::Ok,
        Err(err) => err.status(),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Creates a callback queue on `event_loop`. Owner thread only.
///
/// - `callback` may be NULL: bare calls then do nothing and `tsfn_queue_target_call` returns `false`.
/// - `resource_name` is an optional NUL-terminated UTF-8 string used for diagnostics only.
/// - `max_queue_size = 0` means unbounded.
/// - `initial_thread_count` must be at least 1 (it counts the calling thread).
/// - `flags` is a bitmask of `TSFN_QUEUE_FLAG_*`.
/// - `finalize_cb(finalize_data, context)` runs once on the owner thread after the queue is
///   retired; the returned handle is freed right after it returns.
///
/// Returns NULL on invalid arguments.
///
/// ### 中文
/// 在 `event_loop` 上创建回调队列；仅限 owner 线程。
///
/// - `callback` 可为 NULL：此时无数据调用不做任何事，`tsfn_queue_target_call` 返回 `false`。
/// - `resource_name` 为可选的 NUL 结尾 UTF-8 字符串，仅用于诊断。
/// - `max_queue_size = 0` 表示无界。
/// - `initial_thread_count` 至少为 1（包含调用线程）。
/// - `flags` 为 `TSFN_QUEUE_FLAG_*` 位掩码。
/// - `finalize_cb(finalize_data, context)` 在队列退役后于 owner 线程执行一次；其返回后句柄随即被释放。
///
/// 参数非法时返回 NULL。
pub unsafe extern "C" fn tsfn_queue_create(
    event_loop: *mut TsfnQueueLoop,
    callback: Option<TsfnQueueCallback>,
    callback_data: *mut c_void,
    resource_name: *const c_char,
    max_queue_size: usize,
    initial_thread_count: usize,
    queue_flags: u32,
    finalize_data: *mut c_void,
    finalize_cb: Option<TsfnQueueFinalize>,
    context: *mut c_void,
) -> *mut TsfnQueue {
    if event_loop.is_null() {
        return std::ptr::null_mut();
    }
    let owner = unsafe { &(*event_loop).owner };

    let mut config = CallbackQueueConfig {
        max_queue_size,
        initial_thread_count,
        ..CallbackQueueConfig::default()
    };
    if let Some(name) = unsafe { super::cstr_to_string(resource_name) } {
        config.resource_name = name;
    }
    flags::apply(&mut config, queue_flags);

    let handle_slot: Rc<Cell<*mut TsfnQueue>> = Rc::new(Cell::new(std::ptr::null_mut()));
    let slot = Rc::clone(&handle_slot);
    let finalize_data = RawPtr(finalize_data);

    let mut builder = FfiFunction::builder(config.resource_name.clone())
        .config(config)
        .finalizer(move |context: &FfiContext| {
            if let Some(finalize_cb) = finalize_cb {
                unsafe { finalize_cb(finalize_data.0, context.context.0) };
            }
            let handle = slot.replace(std::ptr::null_mut());
            if !handle.is_null() {
                unsafe { drop(Box::from_raw(handle)) };
            }
        });
    if let Some(callback) = callback {
        let callback_data = RawPtr(callback_data);
        builder = builder.callback(move |args: Vec<RawPtr>| unsafe {
            callback(callback_data.0, args.as_ptr().cast::<*mut c_void>(), args.len())
        });
    }

    let Ok(function) = builder.build(
        owner,
        FfiContext {
            context: RawPtr(context),
        },
    ) else {
        return std::ptr::null_mut();
    };

    let handle = Box::into_raw(Box::new(TsfnQueue { function }));
    handle_slot.set(handle);
    handle
}

#[unsafe(no_mangle)]
/// ### English
/// Returns the `context` pointer given at creation. Any thread.
///
/// ### 中文
/// 返回创建时传入的 `context` 指针；任意线程可用。
pub unsafe extern "C" fn tsfn_queue_get_context(queue: *mut TsfnQueue) -> *mut c_void {
    if queue.is_null() {
        return std::ptr::null_mut();
    }

    unsafe { (*queue).function.context().context.0 }
}

#[unsafe(no_mangle)]
/// ### English
/// Queues one call. Any registered thread.
///
/// With `call_js = NULL` the designated callback is invoked with no arguments and `data` is
/// ignored. Otherwise `call_js(target, context, data)` runs on the owner thread and owns `data`.
///
/// `blocking = true` waits while a bounded queue is full; `false` returns `FULL` instead.
/// On any status other than `OK`, `data` stays owned by the caller.
///
/// ### 中文
/// 排队一次调用；任意已登记线程可用。
///
/// `call_js = NULL` 时以空参数调用指定回调，`data` 被忽略；否则 `call_js(target, context, data)`
/// 在 owner 线程上执行并拥有 `data`。
///
/// `blocking = true` 时若有界队列已满则等待；`false` 时改为返回 `FULL`。
/// 返回值不是 `OK` 时，`data` 仍归调用方所有。
pub unsafe extern "C" fn tsfn_queue_call(
    queue: *mut TsfnQueue,
    data: *mut c_void,
    call_js: Option<TsfnQueueCallJs>,
    blocking: bool,
) -> CallStatus {
    if queue.is_null() {
        return CallStatus::Error;
    }

    let function = unsafe { &(*queue).function };
    match call_js {
        None if blocking => status_of(&function.blocking_call()),
        None => status_of(&function.non_blocking_call()),
        Some(call_js) => {
            let item = FfiItem {
                data: RawPtr(data),
                call_js,
                context: function.context().context,
            };
            let result = if blocking {
                function.blocking_call_with(item, super::dispatch_item)
            } else {
                function.non_blocking_call_with(item, super::dispatch_item)
            };
            let status = status_of(&result);
            if let Err(err) = result {
                err.into_inner().reject();
            }
            status
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Registers one more thread. Returns `CLOSING` once the queue is closing.
///
/// ### 中文
/// 登记一个新线程；队列关闭后返回 `CLOSING`。
pub unsafe extern "C" fn tsfn_queue_acquire(queue: *mut TsfnQueue) -> CallStatus {
    if queue.is_null() {
        return CallStatus::Error;
    }

    lifecycle_status(unsafe { (*queue).function.acquire() })
}

#[unsafe(no_mangle)]
/// ### English
/// Gives up the calling thread's slot. `mode` is `TSFN_QUEUE_RELEASE_MODE_RELEASE` or
/// `TSFN_QUEUE_RELEASE_MODE_ABORT`; any other value returns `ERROR`.
///
/// The handle must not be used by this thread afterwards.
///
/// ### 中文
/// 放弃调用线程的名额。`mode` 为 `TSFN_QUEUE_RELEASE_MODE_RELEASE` 或
/// `TSFN_QUEUE_RELEASE_MODE_ABORT`；其它值返回 `ERROR`。
///
/// 此后该线程不应再使用该句柄。
pub unsafe extern "C" fn tsfn_queue_release(queue: *mut TsfnQueue, mode: u32) -> CallStatus {
    if queue.is_null() {
        return CallStatus::Error;
    }

    let mode = match mode {
        flags::TSFN_QUEUE_RELEASE_MODE_RELEASE => ReleaseMode::Release,
        flags::TSFN_QUEUE_RELEASE_MODE_ABORT => ReleaseMode::Abort,
        _ => return CallStatus::Error,
    };
    lifecycle_status(unsafe { (*queue).function.release_with(mode) })
}

#[unsafe(no_mangle)]
/// ### English
/// Aborts the queue: every later call and acquire observes `CLOSING`.
///
/// ### 中文
/// abort 队列：之后的所有调用与 acquire 都会得到 `CLOSING`。
pub unsafe extern "C" fn tsfn_queue_abort(queue: *mut TsfnQueue) -> CallStatus {
    if queue.is_null() {
        return CallStatus::Error;
    }

    lifecycle_status(unsafe { (*queue).function.abort() })
}

#[unsafe(no_mangle)]
/// ### English
/// Returns whether the queue was aborted. Any thread.
///
/// ### 中文
/// 返回队列是否已被 abort；任意线程可用。
pub unsafe extern "C" fn tsfn_queue_is_aborted(queue: *mut TsfnQueue) -> bool {
    if queue.is_null() {
        return false;
    }

    unsafe { (*queue).function.is_aborted() }
}

#[unsafe(no_mangle)]
/// ### English
/// Lets `queue` keep `tsfn_queue_loop_run` alive. Owner thread only.
///
/// ### 中文
/// 让 `queue` 保持 `tsfn_queue_loop_run` 运行；仅限 owner 线程。
pub unsafe extern "C" fn tsfn_queue_ref(event_loop: *mut TsfnQueueLoop, queue: *mut TsfnQueue) -> bool {
    if event_loop.is_null() || queue.is_null() {
        return false;
    }

    unsafe { (*event_loop).owner.ref_function(&(*queue).function) }
}

#[unsafe(no_mangle)]
/// ### English
/// Stops `queue` from keeping `tsfn_queue_loop_run` alive. Owner thread only.
///
/// ### 中文
/// 不再让 `queue` 保持 `tsfn_queue_loop_run` 运行；仅限 owner 线程。
pub unsafe extern "C" fn tsfn_queue_unref(
    event_loop: *mut TsfnQueueLoop,
    queue: *mut TsfnQueue,
) -> bool {
    if event_loop.is_null() || queue.is_null() {
        return false;
    }

    unsafe { (*event_loop).owner.unref_function(&(*queue).function) }
}

#[unsafe(no_mangle)]
/// ### English
/// Invokes the designated callback from inside a `call_js` transform.
///
/// `argv` may be NULL when `argc` is 0. Returns `false` if the queue has no designated callback.
///
/// ### 中文
/// 在 `call_js` 转换函数内部调用指定回调。
///
/// `argc` 为 0 时 `argv` 可为 NULL。若队列没有指定回调则返回 `false`。
pub unsafe extern "C" fn tsfn_queue_target_call(
    target: *mut TsfnQueueTarget,
    argv: *const *mut c_void,
    argc: usize,
) -> bool {
    if target.is_null() {
        return false;
    }
    let Some(mut callback) = (unsafe { (*target).callback }) else {
        return false;
    };

    let args = if argc == 0 || argv.is_null() {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(argv, argc) }
            .iter()
            .map(|&arg| RawPtr(arg))
            .collect()
    };
    let callback = unsafe { callback.as_mut() };
    callback(args);
    true
}
