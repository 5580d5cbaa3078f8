//! LittleFS 卷
//!
//! [`Volume`] 是挂载状态机与外部文件系统库之间的接缝；
//! [`LittleFs`] 基于 littlefs2 实现，持有块设备适配器。
//!
//! littlefs2 的 `Filesystem` 借用存储，无法与存储一起长期保存，
//! 因此每个操作通过 `Filesystem::mount_and_then` 在同一块设备上重新挂接。
//! littlefs 的元数据在每次操作后都已提交，重新挂接不改变语义。
//! littlefs2 不会回调块设备的 sync，修改类操作成功后由这里刷新驱动。

use littlefs2::fs::Filesystem;
use littlefs2::io::{self, prelude::*, SeekFrom};
use littlefs2::path::Path;

use super::error::LfsError;
use super::path::PATH_MAX;
use super::storage::{FlashBlockAdapter, FlashDriver, Geometry, StorageError};

/// 文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 普通文件
    File,
    /// 目录
    Directory,
}

/// 文件元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// 文件类型
    pub file_type: FileType,
    /// 文件大小 (目录为 0)
    pub size: u32,
}

impl Metadata {
    /// 是否为文件
    pub fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }

    /// 是否为目录
    pub fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }
}

/// 外部文件系统库接口
///
/// 实现者绑定一块具体的存储 (即挂载所需的全部配置)。
/// 所有路径已由调用者校验。
pub trait Volume {
    /// 挂载
    fn mount(&mut self) -> Result<(), LfsError>;

    /// 卸载
    fn unmount(&mut self) -> Result<(), LfsError>;

    /// 格式化 (要求未挂载)
    fn format(&mut self) -> Result<(), LfsError>;

    /// 创建单级目录，已存在时返回 [`LfsError::Exist`]
    fn mkdir(&mut self, path: &str) -> Result<(), LfsError>;

    /// 删除文件或目录；目录非空时连同内容一起删除
    fn remove(&mut self, path: &str) -> Result<(), LfsError>;

    /// 重命名
    fn rename(&mut self, from: &str, to: &str) -> Result<(), LfsError>;

    /// 查询元数据
    fn stat(&mut self, path: &str) -> Result<Metadata, LfsError>;

    /// 从 `pos` 处读取文件
    fn read(&mut self, path: &str, pos: u32, buf: &mut [u8]) -> Result<usize, LfsError>;

    /// 从 `pos` 处写入文件，文件不存在时创建
    fn write(&mut self, path: &str, pos: u32, data: &[u8]) -> Result<usize, LfsError>;

    /// 剩余可用字节数
    fn available_space(&mut self) -> Result<usize, LfsError>;
}

/// 将 `&str` 转为 littlefs2 的 NUL 结尾路径后执行 `f`
fn with_path<R>(path: &str, f: impl FnOnce(&Path) -> io::Result<R>) -> io::Result<R> {
    let mut buf: heapless::Vec<u8, { PATH_MAX + 1 }> = heapless::Vec::new();
    buf.extend_from_slice(path.as_bytes())
        .map_err(|_| io::Error::FilenameTooLong)?;
    buf.push(0).map_err(|_| io::Error::FilenameTooLong)?;
    let path = Path::from_bytes_with_nul(&buf).map_err(|_| io::Error::Invalid)?;
    f(path)
}

fn storage_error(e: StorageError) -> LfsError {
    match e {
        StorageError::Corrupt => LfsError::Corrupt,
        _ => LfsError::Io,
    }
}

/// littlefs2 卷
pub struct LittleFs<D, G> {
    adapter: FlashBlockAdapter<D, G>,
}

impl<D: FlashDriver, G: Geometry> LittleFs<D, G> {
    /// 在驱动之上创建卷
    pub const fn new(driver: D) -> Self {
        Self {
            adapter: FlashBlockAdapter::new(driver),
        }
    }

    /// 使用已有适配器创建卷
    pub const fn from_adapter(adapter: FlashBlockAdapter<D, G>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &FlashBlockAdapter<D, G> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut FlashBlockAdapter<D, G> {
        &mut self.adapter
    }

    /// 取回底层驱动
    pub fn into_inner(self) -> D {
        self.adapter.into_inner()
    }

    /// 当前内容是否可挂载
    pub fn is_mountable(&mut self) -> bool {
        Filesystem::is_mountable(&mut self.adapter)
    }

    fn with_fs<R>(
        &mut self,
        f: impl FnOnce(&Filesystem<'_, FlashBlockAdapter<D, G>>) -> io::Result<R>,
    ) -> Result<R, LfsError> {
        Filesystem::mount_and_then(&mut self.adapter, f).map_err(LfsError::from)
    }

    /// 执行修改操作，成功后刷新驱动
    fn with_fs_sync<R>(
        &mut self,
        f: impl FnOnce(&Filesystem<'_, FlashBlockAdapter<D, G>>) -> io::Result<R>,
    ) -> Result<R, LfsError> {
        let result = self.with_fs(f)?;
        self.adapter.sync().map_err(storage_error)?;
        Ok(result)
    }
}

impl<D: FlashDriver, G: Geometry> Volume for LittleFs<D, G> {
    fn mount(&mut self) -> Result<(), LfsError> {
        Filesystem::mount_and_then(&mut self.adapter, |_| Ok(())).map_err(LfsError::from)
    }

    fn unmount(&mut self) -> Result<(), LfsError> {
        self.adapter.sync().map_err(storage_error)
    }

    fn format(&mut self) -> Result<(), LfsError> {
        Filesystem::format(&mut self.adapter).map_err(LfsError::from)?;
        self.adapter.sync().map_err(storage_error)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), LfsError> {
        self.with_fs_sync(|fs| with_path(path, |p| fs.create_dir(p)))
    }

    fn remove(&mut self, path: &str) -> Result<(), LfsError> {
        // remove_dir_all 会先清空子项再拒绝删除根目录
        if path == "/" {
            return Err(LfsError::Inval);
        }
        self.with_fs_sync(|fs| {
            with_path(path, |p| {
                if fs.metadata(p)?.is_dir() {
                    fs.remove_dir_all(p)
                } else {
                    fs.remove(p)
                }
            })
        })
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), LfsError> {
        self.with_fs_sync(|fs| with_path(from, |src| with_path(to, |dst| fs.rename(src, dst))))
    }

    fn stat(&mut self, path: &str) -> Result<Metadata, LfsError> {
        self.with_fs(|fs| {
            with_path(path, |p| {
                let meta = fs.metadata(p)?;
                Ok(Metadata {
                    file_type: if meta.is_dir() {
                        FileType::Directory
                    } else {
                        FileType::File
                    },
                    size: meta.len() as u32,
                })
            })
        })
    }

    fn read(&mut self, path: &str, pos: u32, buf: &mut [u8]) -> Result<usize, LfsError> {
        self.with_fs(|fs| {
            with_path(path, |p| {
                fs.open_file_and_then(p, |file| {
                    file.seek(SeekFrom::Start(pos))?;
                    file.read(buf)
                })
            })
        })
    }

    fn write(&mut self, path: &str, pos: u32, data: &[u8]) -> Result<usize, LfsError> {
        self.with_fs_sync(|fs| {
            with_path(path, |p| {
                fs.open_file_with_options_and_then(
                    |options| options.write(true).create(true),
                    p,
                    |file| {
                        file.seek(SeekFrom::Start(pos))?;
                        file.write(data)
                    },
                )
            })
        })
    }

    fn available_space(&mut self) -> Result<usize, LfsError> {
        self.with_fs(|fs| fs.available_space())
    }
}
