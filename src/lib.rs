/// ### English
/// `tsfn_queue` crate root.
/// The Rust API lives under `runtime`; the C ABI is exposed via `ffi`.
///
/// ### 中文
/// `tsfn_queue` 的 crate 根。
/// Rust API 位于 `runtime` 模块；通过 `ffi` 导出 C ABI。
mod ffi;
pub mod flags;
pub mod runtime;

pub use runtime::{
    AbortPolicy, Builder, CallError, CallStatus, CallbackQueueConfig, CreateError, Lifecycle,
    LifecycleError, LoopHandle, OwnerLoop, ReleaseMode, ThreadsafeFunction, Transform,
};
