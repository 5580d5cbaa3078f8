//! 文件系统挂载管理
//!
//! [`FileSystem`] 持有挂载状态与绑定的 [`Volume`]，提供
//! begin/end/format/open/exists/mkdir/remove 等操作。
//! 不存在全局实例：由应用顶层构造并以引用传递给使用者。

use super::error::{FsError, LfsError};
use super::littlefs::{Metadata, Volume};
use super::path::{self, DirPrefixes, PathBuf};

/// 挂载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// 未挂载
    Unmounted,
    /// 已挂载
    Mounted,
}

/// 文件打开模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// 只读，从文件开头开始
    Read,
    /// 读写，不存在则创建，从文件末尾开始 (追加)
    Write,
}

/// 文件系统实例
pub struct FileSystem<V> {
    volume: Option<V>,
    state: MountState,
}

impl<V: Volume> Default for FileSystem<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Volume> FileSystem<V> {
    /// 创建未绑定卷的实例，`begin` 时必须提供卷
    pub const fn new() -> Self {
        Self {
            volume: None,
            state: MountState::Unmounted,
        }
    }

    /// 创建并绑定卷 (不挂载)
    pub const fn with_volume(volume: V) -> Self {
        Self {
            volume: Some(volume),
            state: MountState::Unmounted,
        }
    }

    /// 挂载文件系统
    ///
    /// - 已挂载且未提供新卷: 直接成功，不重复挂载
    /// - 已挂载且提供了新卷: 拒绝，返回 [`FsError::ConfigLocked`]
    /// - 未挂载: 提供的卷替换已保存的卷，然后挂载
    ///
    /// 挂载失败通常意味着元数据损坏，可 [`format`](Self::format) 后重试。
    pub fn begin(&mut self, volume: Option<V>) -> Result<(), FsError> {
        if self.is_mounted() {
            if volume.is_some() {
                crate::log_warn!("begin: refusing to replace volume while mounted");
                return Err(FsError::ConfigLocked);
            }
            return Ok(());
        }

        if let Some(volume) = volume {
            self.volume = Some(volume);
        }
        let volume = self.volume.as_mut().ok_or(FsError::ConfigMissing)?;

        volume.mount().map_err(|e| {
            crate::log_error!("mount failed: {} ({})", e.log_name(), e.code());
            FsError::MountFailed(e)
        })?;
        self.state = MountState::Mounted;
        crate::log_info!("filesystem mounted");
        Ok(())
    }

    /// 卸载文件系统
    ///
    /// 未挂载时为空操作。卸载成功后才切换为未挂载；失败时保持挂载并返回错误。
    pub fn end(&mut self) -> Result<(), FsError> {
        if !self.is_mounted() {
            return Ok(());
        }
        let volume = self.volume.as_mut().ok_or(FsError::ConfigMissing)?;

        volume.unmount().map_err(|e| {
            crate::log_error!("unmount failed: {} ({})", e.log_name(), e.code());
            FsError::UnmountFailed(e)
        })?;
        self.state = MountState::Unmounted;
        Ok(())
    }

    /// 格式化
    ///
    /// 已挂载时依次执行 卸载 → 格式化 → 重新挂载，成功后恢复原挂载状态。
    /// 任一步失败即中止:
    /// - 卸载失败: [`FsError::FormatFailed`]，仍为挂载状态
    /// - 格式化失败: [`FsError::FormatFailed`]，未挂载
    /// - 重新挂载失败: [`FsError::RemountFailed`]，未挂载 (不自动重试)
    pub fn format(&mut self) -> Result<(), FsError> {
        let was_mounted = self.is_mounted();
        let volume = self.volume.as_mut().ok_or(FsError::ConfigMissing)?;

        if was_mounted {
            volume.unmount().map_err(|e| {
                crate::log_error!("format: unmount failed: {} ({})", e.log_name(), e.code());
                FsError::FormatFailed(e)
            })?;
            self.state = MountState::Unmounted;
        }

        volume.format().map_err(|e| {
            crate::log_error!("format failed: {} ({})", e.log_name(), e.code());
            FsError::FormatFailed(e)
        })?;

        if was_mounted {
            volume.mount().map_err(|e| {
                crate::log_error!("format: remount failed: {} ({})", e.log_name(), e.code());
                FsError::RemountFailed(e)
            })?;
            self.state = MountState::Mounted;
        }

        crate::log_info!("filesystem formatted");
        Ok(())
    }

    /// 检查是否已挂载
    pub fn is_mounted(&self) -> bool {
        self.state == MountState::Mounted
    }

    /// 当前挂载状态
    pub fn state(&self) -> MountState {
        self.state
    }

    /// 已绑定的卷
    pub fn volume(&self) -> Option<&V> {
        self.volume.as_ref()
    }

    pub fn volume_mut(&mut self) -> Option<&mut V> {
        self.volume.as_mut()
    }

    /// 卸载并取回卷
    ///
    /// 卸载失败时卷保持绑定。
    pub fn release(&mut self) -> Result<Option<V>, FsError> {
        self.end()?;
        Ok(self.volume.take())
    }

    // ==================== 文件操作 ====================

    /// 打开文件
    pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<File<'_, V>, FsError> {
        let path = path::normalize(path)?;
        let volume = self.mounted_volume()?;

        let meta = match volume.stat(path) {
            Ok(meta) => Some(meta),
            Err(LfsError::NoEnt) if mode == OpenMode::Write => None,
            Err(e) => return Err(FsError::path_op(path, e)),
        };
        if matches!(meta, Some(m) if m.is_dir()) {
            return Err(FsError::path_op(path, LfsError::IsDir));
        }

        let position = match (mode, meta) {
            (OpenMode::Read, _) => 0,
            (OpenMode::Write, Some(meta)) => meta.size,
            (OpenMode::Write, None) => {
                // 写入 0 字节以创建空文件
                volume
                    .write(path, 0, &[])
                    .map_err(|e| FsError::path_op(path, e))?;
                0
            }
        };

        let mut name = PathBuf::new();
        name.push_str(path)
            .map_err(|_| FsError::InvalidPath(path::PathError::TooLong))?;

        Ok(File {
            fs: self,
            path: name,
            mode,
            position,
        })
    }

    /// 检查文件或目录是否存在
    ///
    /// 任何失败 (包括未挂载、路径非法、不存在) 都返回 `false`。
    pub fn exists(&mut self, path: &str) -> bool {
        self.metadata(path).is_ok()
    }

    /// 获取文件元数据
    pub fn metadata(&mut self, path: &str) -> Result<Metadata, FsError> {
        let path = path::normalize(path)?;
        self.mounted_volume()?
            .stat(path)
            .map_err(|e| FsError::path_op(path, e))
    }

    // ==================== 目录操作 ====================

    /// 创建目录 (包括所有中间目录)
    ///
    /// 任一级已存在视为成功；其他错误立即中止，并报告出错的那一级路径。
    pub fn mkdir(&mut self, path: &str) -> Result<(), FsError> {
        let prefixes = DirPrefixes::new(path)?;
        let volume = self.mounted_volume()?;

        for prefix in prefixes {
            match volume.mkdir(prefix) {
                Ok(()) | Err(LfsError::Exist) => {}
                Err(e) => {
                    crate::log_error!("mkdir {} failed: {} ({})", prefix, e.log_name(), e.code());
                    return Err(FsError::path_op(prefix, e));
                }
            }
        }
        Ok(())
    }

    /// 删除文件或目录 (目录连同其内容递归删除)
    ///
    /// 根目录不可删除，返回 [`LfsError::Inval`] 且不触碰卷。
    pub fn remove(&mut self, path: &str) -> Result<(), FsError> {
        let path = path::normalize(path)?;
        let volume = self.mounted_volume()?;
        if path::is_root(path) {
            return Err(FsError::path_op(path, LfsError::Inval));
        }
        volume.remove(path).map_err(|e| {
            crate::log_error!("remove {} failed: {} ({})", path, e.log_name(), e.code());
            FsError::path_op(path, e)
        })
    }

    /// 删除目录 (非空目录同样被删除)
    pub fn rmdir(&mut self, path: &str) -> Result<(), FsError> {
        self.remove(path)
    }

    /// 递归删除目录
    pub fn rmdir_r(&mut self, path: &str) -> Result<(), FsError> {
        self.remove(path)
    }

    /// 重命名文件/目录
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        let from = path::normalize(from)?;
        let to = path::normalize(to)?;
        self.mounted_volume()?
            .rename(from, to)
            .map_err(|e| FsError::path_op(from, e))
    }

    /// 获取可用空间 (字节)
    pub fn available_space(&mut self) -> Result<usize, FsError> {
        self.mounted_volume()?
            .available_space()
            .map_err(|e| FsError::path_op("/", e))
    }

    // ==================== 内部方法 ====================

    fn mounted_volume(&mut self) -> Result<&mut V, FsError> {
        if !self.is_mounted() {
            return Err(FsError::NotMounted);
        }
        self.volume.as_mut().ok_or(FsError::ConfigMissing)
    }
}

/// 文件句柄
///
/// 只记录路径与位置，每次读写都经由卷完成。
pub struct File<'a, V> {
    fs: &'a mut FileSystem<V>,
    path: PathBuf,
    mode: OpenMode,
    position: u32,
}

impl<V: Volume> File<'_, V> {
    /// 读取数据
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FsError> {
        let read = self
            .fs
            .mounted_volume()?
            .read(&self.path, self.position, buffer)
            .map_err(|e| FsError::path_op(&self.path, e))?;
        self.position += read as u32;
        Ok(read)
    }

    /// 写入数据
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FsError> {
        if self.mode == OpenMode::Read {
            return Err(FsError::path_op(&self.path, LfsError::BadF));
        }
        let written = self
            .fs
            .mounted_volume()?
            .write(&self.path, self.position, data)
            .map_err(|e| FsError::path_op(&self.path, e))?;
        self.position += written as u32;
        Ok(written)
    }

    /// 写入全部数据
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), FsError> {
        let mut offset = 0;
        while offset < data.len() {
            let written = self.write(&data[offset..])?;
            if written == 0 {
                return Err(FsError::path_op(&self.path, LfsError::NoSpc));
            }
            offset += written;
        }
        Ok(())
    }

    /// 移动文件指针到绝对位置
    pub fn seek(&mut self, position: u32) {
        self.position = position;
    }

    /// 获取当前位置
    pub fn position(&self) -> u32 {
        self.position
    }

    /// 获取文件大小
    pub fn size(&mut self) -> Result<u32, FsError> {
        self.fs
            .mounted_volume()?
            .stat(&self.path)
            .map(|meta| meta.size)
            .map_err(|e| FsError::path_op(&self.path, e))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }
}
