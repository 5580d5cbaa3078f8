//! 跨上下文共享的文件系统实例
//!
//! [`FileSystem`] 本身不可重入。多个任务/中断上下文需要访问同一实例时，
//! 用 [`SharedFileSystem`] 包装，每次访问都在临界区内完成。

use core::cell::RefCell;

use critical_section::Mutex;

use crate::fs::{FileSystem, Volume};

/// 临界区保护的文件系统
///
/// 可放入 `static`:
/// ```ignore
/// static FS: SharedFileSystem<LittleFs<Driver, InternalFlash>> =
///     SharedFileSystem::new(FileSystem::with_volume(LittleFs::new(Driver::new())));
///
/// FS.lock(|fs| fs.begin(None))?;
/// ```
pub struct SharedFileSystem<V> {
    inner: Mutex<RefCell<FileSystem<V>>>,
}

impl<V: Volume> SharedFileSystem<V> {
    pub const fn new(fs: FileSystem<V>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(fs)),
        }
    }

    /// 在临界区内独占访问
    ///
    /// 闭包内不得再次调用 `lock` (会因重复借用而 panic)。
    pub fn lock<R>(&self, f: impl FnOnce(&mut FileSystem<V>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// 是否已挂载
    pub fn is_mounted(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_mounted())
    }

    /// 取回内部实例
    pub fn into_inner(self) -> FileSystem<V> {
        self.inner.into_inner().into_inner()
    }
}
