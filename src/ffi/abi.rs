use crate::flags;

#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version.
///
/// ### 中文
/// 返回 C ABI 版本号。
pub extern "C" fn tsfn_queue_abi_version() -> u32 {
    super::TSFN_QUEUE_ABI_VERSION
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `TSFN_QUEUE_FLAG_DISCARD_ON_ABORT`.
/// (Panama-friendly constant getter; avoids relying on C headers.)
///
/// ### 中文
/// 返回 `TSFN_QUEUE_FLAG_DISCARD_ON_ABORT`。
/// （Panama 友好的常量获取函数；避免依赖 C 头文件。）
pub extern "C" fn tsfn_queue_flag_discard_on_abort() -> u32 {
    flags::TSFN_QUEUE_FLAG_DISCARD_ON_ABORT
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `TSFN_QUEUE_FLAG_UNREF`.
///
/// ### 中文
/// 返回 `TSFN_QUEUE_FLAG_UNREF`。
pub extern "C" fn tsfn_queue_flag_unref() -> u32 {
    flags::TSFN_QUEUE_FLAG_UNREF
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `TSFN_QUEUE_RELEASE_MODE_ABORT`.
///
/// ### 中文
/// 返回 `TSFN_QUEUE_RELEASE_MODE_ABORT`。
pub extern "C" fn tsfn_queue_release_mode_abort() -> u32 {
    flags::TSFN_QUEUE_RELEASE_MODE_ABORT
}
