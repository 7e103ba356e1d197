/// ### English
/// Callback queue internals: shared state, owner-thread drain, owner loop and the public handle.
///
/// ### 中文
/// 回调队列内部模块：共享状态、owner 线程 drain、owner 循环以及对外句柄。
mod builder;
pub mod config;
mod dispatch;
mod entry;
mod function;
mod owner_loop;
mod shared;
pub mod status;

pub use builder::Builder;
pub use config::{AbortPolicy, CallbackQueueConfig, DEFAULT_DRAIN_BATCH_LIMIT};
pub use entry::{DesignatedCallback, Finalizer, Transform};
pub use function::ThreadsafeFunction;
pub use owner_loop::{LoopHandle, OwnerLoop};
pub use shared::{Lifecycle, ReleaseMode};
pub use status::{CallError, CallStatus, CreateError, LifecycleError, status_of};
