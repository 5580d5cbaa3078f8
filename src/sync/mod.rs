//! 同步模块
//!
//! - `SharedFileSystem`: 基于 critical-section 的文件系统共享包装

pub mod shared;

pub use shared::SharedFileSystem;
