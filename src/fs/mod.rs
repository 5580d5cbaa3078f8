//! 文件系统模块
//!
//! 基于 littlefs2 的片上 Flash 文件系统，特性：
//! - 掉电安全的日志结构文件系统
//! - Flash 驱动到块设备的地址换算与擦除适配
//! - 显式的 挂载/卸载/格式化 状态机
//! - 递归创建目录与递归删除

pub mod error;
pub mod filesystem;
pub mod littlefs;
pub mod path;
pub mod storage;

pub use error::{FsError, LfsError};
pub use filesystem::{File, FileSystem, MountState, OpenMode};
pub use littlefs::{FileType, LittleFs, Metadata, Volume};
pub use path::{DirPrefixes, PathError};
pub use storage::{
    FlashBlockAdapter, FlashDriver, Geometry, InternalFlash, NorFlashDriver, RamFlash,
    StorageError,
};
