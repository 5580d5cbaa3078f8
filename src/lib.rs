//! FlashFS - 片上 Flash 文件系统库
//!
//! 本库提供以下核心功能:
//! - Flash 驱动到 littlefs 块设备的适配 (地址换算、擦除策略)
//! - 挂载/卸载/格式化 生命周期状态机
//! - 递归创建目录、递归删除、文件读写
//! - 临界区共享包装
//! - 条件编译日志系统

#![cfg_attr(not(test), no_std)]

pub mod fs;
pub mod sync;
pub mod util;

// ===== 重导出常用类型 =====
pub use fs::{
    File, FileSystem, FlashBlockAdapter, FlashDriver, FsError, Geometry, InternalFlash,
    LfsError, LittleFs, MountState, OpenMode, StorageError, Volume,
};
pub use sync::SharedFileSystem;

// ===== 版本信息 =====
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
