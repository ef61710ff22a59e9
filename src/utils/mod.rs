pub mod logging;

use std::sync::{Mutex, MutexGuard};

/// 获取锁；持锁线程 panic 后仍继续使用其中的数据
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
