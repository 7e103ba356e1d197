//! ### English
//! Status codes and typed errors returned by the callback queue.
//!
//! ### 中文
//! 回调队列返回的状态码与类型化错误。

use thiserror::Error;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// ### English
/// Flat status code, shared by the Rust API (`status()`) and the C ABI.
///
/// ### 中文
/// 扁平状态码，Rust API（`status()`）与 C ABI 共用。
pub enum CallStatus {
    /// ### English
    /// The operation succeeded.
    ///
    /// ### 中文
    /// 操作成功。
    Ok = 0,
    /// ### English
    /// The primitive is shutting down (or already shut down); stop using it.
    ///
    /// ### 中文
    /// 原语正在关闭（或已关闭）；调用方应停止使用。
    Closing = 1,
    /// ### English
    /// A non-blocking call found the bounded queue at capacity; retry later.
    ///
    /// ### 中文
    /// 非阻塞调用发现有界队列已满；可稍后重试。
    Full = 2,
    /// ### English
    /// Resource failure unrelated to closing/full.
    ///
    /// ### 中文
    /// 与关闭/满无关的资源失败。
    Error = 3,
}

/// ### English
/// Error returned by the call paths. Every variant hands the rejected data back to the caller.
///
/// ### 中文
/// 调用路径返回的错误；每个变体都会把被拒绝的数据交还给调用方。
#[derive(Error)]
pub enum CallError<T> {
    #[error("callback queue is closing")]
    Closing(T),
    #[error("callback queue is full")]
    Full(T),
    /// ### English
    /// A blocking call was made on the owner thread while the queue was full; waiting would
    /// prevent the owner from ever draining.
    ///
    /// ### 中文
    /// 在 owner 线程上对已满队列发起阻塞调用；等待会导致 owner 永远无法 drain。
    #[error("blocking call on the owner thread would deadlock")]
    WouldDeadlock(T),
    /// ### English
    /// Allocation failure or the owner loop is gone.
    ///
    /// ### 中文
    /// 分配失败，或 owner 事件循环已不存在。
    #[error("callback queue enqueue failed")]
    Failed(T),
}

impl<T> CallError<T> {
    /// ### English
    /// Returns the data that was not enqueued.
    ///
    /// ### 中文
    /// 返回未入队的数据。
    pub fn into_inner(self) -> T {
        match self {
            Self::Closing(data)
            | Self::Full(data)
            | Self::WouldDeadlock(data)
            | Self::Failed(data) => data,
        }
    }

    /// ### English
    /// Maps the carried data, keeping the variant.
    ///
    /// ### 中文
    /// 映射携带的数据，保持变体不变。
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallError<U> {
        match self {
            Self::Closing(data) => CallError::Closing(f(data)),
            Self::Full(data) => CallError::Full(f(data)),
            Self::WouldDeadlock(data) => CallError::WouldDeadlock(f(data)),
            Self::Failed(data) => CallError::Failed(f(data)),
        }
    }

    pub fn status(&self) -> CallStatus {
        match self {
            Self::Closing(_) => CallStatus::Closing,
            Self::Full(_) => CallStatus::Full,
            Self::WouldDeadlock(_) | Self::Failed(_) => CallStatus::Error,
        }
    }

    pub fn is_closing(&self) -> bool {
        matches!(self, Self::Closing(_))
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl<T> std::fmt::Debug for CallError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closing(_) => "Closing(..)",
            Self::Full(_) => "Full(..)",
            Self::WouldDeadlock(_) => "WouldDeadlock(..)",
            Self::Failed(_) => "Failed(..)",
        };
        f.write_str(name)
    }
}

/// ### English
/// Error returned by `acquire` / `release` / `abort`.
///
/// ### 中文
/// `acquire` / `release` / `abort` 返回的错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("callback queue is closing")]
    Closing,
    /// ### English
    /// `release` with no registered thread left (double release).
    ///
    /// ### 中文
    /// 已没有登记线程时调用 `release`（重复 release）。
    #[error("no registered thread left to release")]
    NotRegistered,
    #[error("callback queue was already aborted")]
    AlreadyAborted,
    #[error("callback queue is already finalized")]
    AlreadyClosed,
}

impl LifecycleError {
    pub fn status(&self) -> CallStatus {
        match self {
            Self::Closing | Self::AlreadyAborted | Self::AlreadyClosed => CallStatus::Closing,
            Self::NotRegistered => CallStatus::Error,
        }
    }
}

/// ### English
/// Error returned when creating a callback queue.
///
/// ### 中文
/// 创建回调队列时返回的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("initial thread count must be at least 1")]
    InvalidThreadCount,
}

/// ### English
/// Collapses a call result into a flat status code.
///
/// ### 中文
/// 将调用结果折叠为扁平状态码。
pub fn status_of<T>(result: &Result<(), CallError<T>>) -> CallStatus {
    match result {
        Ok(()) => CallStatus::Ok,
        Err(err) => err.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_errors_map_to_distinct_statuses() {
        assert_eq!(CallError::Closing(1).status(), CallStatus::Closing);
        assert_eq!(CallError::Full(1).status(), CallStatus::Full);
        assert_eq!(CallError::Failed(1).status(), CallStatus::Error);
        assert_eq!(CallError::WouldDeadlock(1).status(), CallStatus::Error);
        assert_eq!(status_of::<u8>(&Ok(())), CallStatus::Ok);
    }

    #[test]
    fn rejected_data_is_handed_back() {
        let err = CallError::Full(String::from("payload"));
        assert!(err.is_full());
        assert_eq!(err.into_inner(), "payload");
    }

    #[test]
    fn status_codes_are_stable_across_the_abi() {
        assert_eq!(CallStatus::Ok as u32, 0);
        assert_eq!(CallStatus::Closing as u32, 1);
        assert_eq!(CallStatus::Full as u32, 2);
        assert_eq!(CallStatus::Error as u32, 3);
    }
}
