use std::ffi::c_void;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use super::abi::*;
use super::owner_loop::*;
use super::queue::*;
use super::*;
use crate::flags::{
    TSFN_QUEUE_FLAG_DISCARD_ON_ABORT, TSFN_QUEUE_FLAG_UNREF, TSFN_QUEUE_RELEASE_MODE_ABORT,
};
use crate::runtime::CallStatus;

#[derive(Default)]
struct Recorder {
    args: Mutex<Vec<Vec<usize>>>,
    finalized: AtomicUsize,
    finalize_context: AtomicUsize,
}

unsafe extern "C" fn record_call(callback_data: *mut c_void, argv: *const *mut c_void, argc: usize) {
    let recorder = unsafe { &*(callback_data as *const Recorder) };
    let args = if argc == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(argv, argc) }
            .iter()
            .map(|&arg| arg as usize)
            .collect()
    };
    recorder.args.lock().unwrap().push(args);
}

unsafe extern "C" fn forward_boxed(target: *mut TsfnQueueTarget, _context: *mut c_void, data: *mut c_void) {
    let value = unsafe { Box::from_raw(data as *mut usize) };
    let argv = [*value as *mut c_void];
    assert!(unsafe { tsfn_queue_target_call(target, argv.as_ptr(), argv.len()) });
}

unsafe extern "C" fn record_finalize(finalize_data: *mut c_void, context: *mut c_void) {
    let recorder = unsafe { &*(finalize_data as *const Recorder) };
    recorder.finalized.fetch_add(1, Ordering::SeqCst);
    recorder.finalize_context.store(context as usize, Ordering::SeqCst);
}

fn boxed(value: usize) -> *mut c_void {
    Box::into_raw(Box::new(value)).cast()
}

unsafe fn create(
    event_loop: *mut TsfnQueueLoop,
    recorder: &Recorder,
    max_queue_size: usize,
    initial_thread_count: usize,
    queue_flags: u32,
) -> *mut TsfnQueue {
    let recorder = recorder as *const Recorder as *mut c_void;
    unsafe {
        tsfn_queue_create(
            event_loop,
            Some(record_call),
            recorder,
            c"ffi-test".as_ptr(),
            max_queue_size,
            initial_thread_count,
            queue_flags,
            recorder,
            Some(record_finalize),
            0x5eed as *mut c_void,
        )
    }
}

#[test]
fn abi_constants_match_the_rust_side() {
    assert_eq!(tsfn_queue_abi_version(), TSFN_QUEUE_ABI_VERSION);
    assert_eq!(tsfn_queue_flag_discard_on_abort(), 1);
    assert_eq!(tsfn_queue_flag_unref(), 2);
    assert_eq!(tsfn_queue_release_mode_abort(), 1);
}

#[test]
fn calls_from_a_producer_thread_reach_the_c_callback_then_finalize_frees_the_handle() {
    let recorder = Recorder::default();
    let event_loop = tsfn_queue_loop_create();
    let queue = unsafe { create(event_loop, &recorder, 0, 1, 0) };
    assert!(!queue.is_null());
    assert_eq!(unsafe { tsfn_queue_get_context(queue) } as usize, 0x5eed);

    assert_eq!(unsafe { tsfn_queue_acquire(queue) }, CallStatus::Ok);
    let raw = queue as usize;
    thread::spawn(move || {
        let queue = raw as *mut TsfnQueue;
        for value in 1..=3 {
            let status = unsafe { tsfn_queue_call(queue, boxed(value), Some(forward_boxed), true) };
            assert_eq!(status, CallStatus::Ok);
        }
        let status = unsafe { tsfn_queue_call(queue, std::ptr::null_mut(), None, false) };
        assert_eq!(status, CallStatus::Ok);
        assert_eq!(unsafe { tsfn_queue_release(queue, 0) }, CallStatus::Ok);
    })
    .join()
    .unwrap();

    assert_eq!(unsafe { tsfn_queue_release(queue, 0) }, CallStatus::Ok);
    unsafe { tsfn_queue_loop_run(event_loop) };

    assert_eq!(
        *recorder.args.lock().unwrap(),
        vec![vec![1], vec![2], vec![3], vec![]]
    );
    assert_eq!(recorder.finalized.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.finalize_context.load(Ordering::SeqCst), 0x5eed);
    unsafe { tsfn_queue_loop_destroy(event_loop) };
}

#[test]
fn bounded_queue_reports_full_and_abort_reports_closing() {
    let recorder = Recorder::default();
    let event_loop = tsfn_queue_loop_create();
    let queue = unsafe { create(event_loop, &recorder, 1, 1, 0) };

    let first = boxed(10);
    let second = boxed(20);
    assert_eq!(
        unsafe { tsfn_queue_call(queue, first, Some(forward_boxed), false) },
        CallStatus::Ok
    );
    assert_eq!(
        unsafe { tsfn_queue_call(queue, second, Some(forward_boxed), false) },
        CallStatus::Full
    );
    // Blocking on the owner thread with a full queue is refused.
    assert_eq!(
        unsafe { tsfn_queue_call(queue, second, Some(forward_boxed), true) },
        CallStatus::Error
    );

    assert_eq!(
        unsafe { tsfn_queue_release(queue, TSFN_QUEUE_RELEASE_MODE_ABORT) },
        CallStatus::Ok
    );
    assert!(unsafe { tsfn_queue_is_aborted(queue) });
    assert_eq!(unsafe { tsfn_queue_abort(queue) }, CallStatus::Closing);
    assert_eq!(unsafe { tsfn_queue_acquire(queue) }, CallStatus::Closing);
    assert_eq!(
        unsafe { tsfn_queue_call(queue, second, Some(forward_boxed), false) },
        CallStatus::Closing
    );
    drop(unsafe { Box::from_raw(second as *mut usize) });

    assert!(unsafe { tsfn_queue_loop_run_timeout(event_loop, 5_000) });
    assert_eq!(*recorder.args.lock().unwrap(), vec![vec![10]]);
    assert_eq!(recorder.finalized.load(Ordering::SeqCst), 1);
    unsafe { tsfn_queue_loop_destroy(event_loop) };
}

#[test]
fn unref_flag_lets_the_loop_return_while_the_queue_is_open() {
    let recorder = Recorder::default();
    let event_loop = tsfn_queue_loop_create();
    let queue = unsafe { create(event_loop, &recorder, 0, 1, TSFN_QUEUE_FLAG_UNREF) };

    assert_eq!(
        unsafe { tsfn_queue_call(queue, std::ptr::null_mut(), None, false) },
        CallStatus::Ok
    );
    unsafe { tsfn_queue_loop_run(event_loop) };
    assert_eq!(*recorder.args.lock().unwrap(), vec![Vec::<usize>::new()]);

    assert!(unsafe { tsfn_queue_ref(event_loop, queue) });
    assert!(!unsafe { tsfn_queue_loop_run_timeout(event_loop, 10) });
    assert!(unsafe { tsfn_queue_unref(event_loop, queue) });

    assert_eq!(unsafe { tsfn_queue_release(queue, 0) }, CallStatus::Ok);
    assert_eq!(unsafe { tsfn_queue_loop_run_pending(event_loop) }, 1);
    assert_eq!(recorder.finalized.load(Ordering::SeqCst), 1);
    unsafe { tsfn_queue_loop_destroy(event_loop) };
}

#[test]
fn invalid_arguments_are_rejected() {
    let event_loop = tsfn_queue_loop_create();
    let queue = unsafe {
        tsfn_queue_create(
            event_loop,
            None,
            std::ptr::null_mut(),
            std::ptr::null(),
            0,
            0,
            0,
            std::ptr::null_mut(),
            None,
            std::ptr::null_mut(),
        )
    };
    assert!(queue.is_null());

    let null_queue = std::ptr::null_mut();
    assert_eq!(
        unsafe { tsfn_queue_call(null_queue, std::ptr::null_mut(), None, false) },
        CallStatus::Error
    );
    assert_eq!(unsafe { tsfn_queue_acquire(null_queue) }, CallStatus::Error);
    assert!(!unsafe { tsfn_queue_is_aborted(null_queue) });
    assert!(!unsafe { tsfn_queue_target_call(std::ptr::null_mut(), std::ptr::null(), 0) });
    let without_loop = unsafe {
        tsfn_queue_create(
            std::ptr::null_mut(),
            None,
            std::ptr::null_mut(),
            std::ptr::null(),
            0,
            1,
            0,
            std::ptr::null_mut(),
            None,
            std::ptr::null_mut(),
        )
    };
    assert!(without_loop.is_null());
    unsafe { tsfn_queue_loop_destroy(event_loop) };
}

#[test]
fn queue_without_callback_still_runs_transforms() {
    static SEEN: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn no_target(target: *mut TsfnQueueTarget, _context: *mut c_void, data: *mut c_void) {
        assert!(!unsafe { tsfn_queue_target_call(target, std::ptr::null(), 0) });
        SEEN.store(data as usize, Ordering::SeqCst);
    }

    let event_loop = tsfn_queue_loop_create();
    let queue = unsafe {
        tsfn_queue_create(
            event_loop,
            None,
            std::ptr::null_mut(),
            std::ptr::null(),
            0,
            1,
            0,
            std::ptr::null_mut(),
            None,
            std::ptr::null_mut(),
        )
    };
    assert_eq!(
        unsafe { tsfn_queue_call(queue, 42 as *mut c_void, Some(no_target), false) },
        CallStatus::Ok
    );
    assert_eq!(unsafe { tsfn_queue_release(queue, 0) }, CallStatus::Ok);
    unsafe { tsfn_queue_loop_run(event_loop) };
    assert_eq!(SEEN.load(Ordering::SeqCst), 42);
    unsafe { tsfn_queue_loop_destroy(event_loop) };
}

#[test]
fn discarded_items_reach_call_js_without_a_target() {
    static FREED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn free_only(target: *mut TsfnQueueTarget, context: *mut c_void, data: *mut c_void) {
        assert!(target.is_null());
        assert_eq!(context as usize, 0x5eed);
        let value = unsafe { Box::from_raw(data as *mut usize) };
        FREED.fetch_add(*value, Ordering::SeqCst);
    }

    let recorder = Recorder::default();
    let event_loop = tsfn_queue_loop_create();
    let queue = unsafe { create(event_loop, &recorder, 2, 1, TSFN_QUEUE_FLAG_DISCARD_ON_ABORT) };

    for value in [1, 2] {
        assert_eq!(
            unsafe { tsfn_queue_call(queue, boxed(value), Some(free_only), false) },
            CallStatus::Ok
        );
    }
    // Rejected data stays with the caller; call_js is not run for it.
    let rejected = boxed(100);
    assert_eq!(
        unsafe { tsfn_queue_call(queue, rejected, Some(free_only), false) },
        CallStatus::Full
    );
    drop(unsafe { Box::from_raw(rejected as *mut usize) });

    assert_eq!(unsafe { tsfn_queue_abort(queue) }, CallStatus::Ok);
    assert!(unsafe { tsfn_queue_loop_run_timeout(event_loop, 5_000) });

    assert_eq!(FREED.load(Ordering::SeqCst), 3);
    assert!(recorder.args.lock().unwrap().is_empty());
    assert_eq!(recorder.finalized.load(Ordering::SeqCst), 1);
    unsafe { tsfn_queue_loop_destroy(event_loop) };
}
