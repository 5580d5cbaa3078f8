//! 文件系统错误类型

use core::fmt;

use super::path::{PathBuf, PathError, PATH_MAX};

/// littlefs 状态码
///
/// 与 littlefs 的 `LFS_ERR_*` 一一对应，未知状态码保留原始数值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfsError {
    Io,
    Corrupt,
    NoEnt,
    Exist,
    NotDir,
    IsDir,
    NotEmpty,
    BadF,
    FBig,
    Inval,
    NoSpc,
    NoMem,
    NoAttr,
    NameTooLong,
    Unknown(i32),
}

impl LfsError {
    /// 从 littlefs 原始状态码转换 (0 及正数不是错误)
    pub fn from_code(code: i32) -> Option<Self> {
        let err = match code {
            c if c >= 0 => return None,
            -5 => Self::Io,
            -84 => Self::Corrupt,
            -2 => Self::NoEnt,
            -17 => Self::Exist,
            -20 => Self::NotDir,
            -21 => Self::IsDir,
            -39 => Self::NotEmpty,
            -9 => Self::BadF,
            -27 => Self::FBig,
            -22 => Self::Inval,
            -28 => Self::NoSpc,
            -12 => Self::NoMem,
            -61 => Self::NoAttr,
            -36 => Self::NameTooLong,
            other => Self::Unknown(other),
        };
        Some(err)
    }

    /// littlefs 原始状态码
    pub fn code(&self) -> i32 {
        match self {
            Self::Io => -5,
            Self::Corrupt => -84,
            Self::NoEnt => -2,
            Self::Exist => -17,
            Self::NotDir => -20,
            Self::IsDir => -21,
            Self::NotEmpty => -39,
            Self::BadF => -9,
            Self::FBig => -27,
            Self::Inval => -22,
            Self::NoSpc => -28,
            Self::NoMem => -12,
            Self::NoAttr => -61,
            Self::NameTooLong => -36,
            Self::Unknown(code) => *code,
        }
    }

    /// 调试用名称，未知状态码返回 `None`
    pub fn name(&self) -> Option<&'static str> {
        let name = match self {
            Self::Io => "LFS_ERR_IO",
            Self::Corrupt => "LFS_ERR_CORRUPT",
            Self::NoEnt => "LFS_ERR_NOENT",
            Self::Exist => "LFS_ERR_EXIST",
            Self::NotDir => "LFS_ERR_NOTDIR",
            Self::IsDir => "LFS_ERR_ISDIR",
            Self::NotEmpty => "LFS_ERR_NOTEMPTY",
            Self::BadF => "LFS_ERR_BADF",
            Self::FBig => "LFS_ERR_FBIG",
            Self::Inval => "LFS_ERR_INVAL",
            Self::NoSpc => "LFS_ERR_NOSPC",
            Self::NoMem => "LFS_ERR_NOMEM",
            Self::NoAttr => "LFS_ERR_NOATTR",
            Self::NameTooLong => "LFS_ERR_NAMETOOLONG",
            Self::Unknown(_) => return None,
        };
        Some(name)
    }

    /// 日志用名称，未知状态码显示为 `LFS_ERR_UNKNOWN`，需要与 [`code`](Self::code) 一起输出
    pub fn log_name(&self) -> &'static str {
        self.name().unwrap_or("LFS_ERR_UNKNOWN")
    }

    /// 任意原始状态码的名称，包括成功码 `LFS_ERR_OK`
    pub fn status_name(code: i32) -> Option<&'static str> {
        match code {
            0 => Some("LFS_ERR_OK"),
            _ => Self::from_code(code).and_then(|e| e.name()),
        }
    }
}

impl fmt::Display for LfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.code()),
        }
    }
}

impl From<littlefs2::io::Error> for LfsError {
    fn from(e: littlefs2::io::Error) -> Self {
        use littlefs2::io::Error;

        match e {
            Error::Io => Self::Io,
            Error::Corruption => Self::Corrupt,
            Error::NoSuchEntry => Self::NoEnt,
            Error::EntryAlreadyExisted => Self::Exist,
            Error::PathNotDir => Self::NotDir,
            Error::PathIsDir => Self::IsDir,
            Error::DirNotEmpty => Self::NotEmpty,
            Error::BadFileDescriptor => Self::BadF,
            Error::FileTooBig => Self::FBig,
            Error::Invalid => Self::Inval,
            Error::NoSpace => Self::NoSpc,
            Error::NoMemory => Self::NoMem,
            Error::NoAttribute => Self::NoAttr,
            Error::FilenameTooLong => Self::NameTooLong,
            Error::Unknown(code) => Self::Unknown(code),
            #[allow(unreachable_patterns)]
            _ => Self::Io,
        }
    }
}

/// 文件系统错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    /// 既没有已保存的卷，也没有在调用时提供
    ConfigMissing,
    /// 已挂载时拒绝替换卷
    ConfigLocked,
    /// 文件系统未挂载
    NotMounted,
    /// 挂载失败 (通常是元数据损坏，格式化后重试)
    MountFailed(LfsError),
    /// 卸载失败，仍处于挂载状态
    UnmountFailed(LfsError),
    /// 格式化 (或其前置卸载) 失败
    FormatFailed(LfsError),
    /// 格式化成功但重新挂载失败，处于未挂载状态
    RemountFailed(LfsError),
    /// 路径格式非法
    InvalidPath(PathError),
    /// 路径操作失败
    PathOpFailed { path: PathBuf, error: LfsError },
}

impl FsError {
    pub(crate) fn path_op(path: &str, error: LfsError) -> Self {
        // 超长路径截断到 PATH_MAX 以内的字符边界
        let mut end = path.len().min(PATH_MAX);
        while !path.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = PathBuf::new();
        for c in path[..end].chars() {
            if buf.push(c).is_err() {
                break;
            }
        }
        Self::PathOpFailed { path: buf, error }
    }

    /// 底层 littlefs 状态码 (如果有)
    pub fn lfs_error(&self) -> Option<LfsError> {
        match self {
            Self::MountFailed(e)
            | Self::UnmountFailed(e)
            | Self::FormatFailed(e)
            | Self::RemountFailed(e)
            | Self::PathOpFailed { error: e, .. } => Some(*e),
            _ => None,
        }
    }
}

impl From<PathError> for FsError {
    fn from(e: PathError) -> Self {
        Self::InvalidPath(e)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMissing => write!(f, "No flash configuration bound"),
            Self::ConfigLocked => write!(f, "Configuration cannot change while mounted"),
            Self::NotMounted => write!(f, "Not mounted"),
            Self::MountFailed(e) => write!(f, "Mount failed: {}", e),
            Self::UnmountFailed(e) => write!(f, "Unmount failed: {}", e),
            Self::FormatFailed(e) => write!(f, "Format failed: {}", e),
            Self::RemountFailed(e) => write!(f, "Formatted but remount failed: {}", e),
            Self::InvalidPath(e) => write!(f, "Invalid path: {}", e),
            Self::PathOpFailed { path, error } => write!(f, "{}: {}", path.as_str(), error),
        }
    }
}
