//! 路径分解
//!
//! 将 `/` 分隔的路径分解为创建叶子前必须存在的各级目录:
//! `/a/b/c` 依次产生 `/a`、`/a/b`、`/a/b/c`。
//!
//! [`Boundaries`] 只处理字节，产出每一级前缀的结束下标；
//! [`DirPrefixes`] 在其上映射为 `&str` 前缀。两者都是惰性的，可 `rewind` 重新开始。

use core::fmt;

/// 路径分隔符
pub const SEPARATOR: u8 = b'/';

/// 路径最大长度 (不含结尾 NUL)
pub const PATH_MAX: usize = 255;

/// 固定容量路径缓冲区
pub type PathBuf = heapless::String<PATH_MAX>;

/// 路径格式错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// 空路径
    Empty,
    /// 路径过长
    TooLong,
    /// 连续分隔符产生的空段，`at` 为第二个分隔符的下标
    EmptySegment { at: usize },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty path"),
            Self::TooLong => write!(f, "path longer than {} bytes", PATH_MAX),
            Self::EmptySegment { at } => write!(f, "empty segment at byte {}", at),
        }
    }
}

/// 校验路径
///
/// 根目录 `/` 合法；允许一个结尾分隔符 (与 littlefs 一致，`/a/` 即 `/a`)；
/// 除此之外不允许出现空段。
pub fn validate(path: &str) -> Result<(), PathError> {
    let bytes = path.as_bytes();
    if bytes.is_empty() {
        return Err(PathError::Empty);
    }
    if bytes.len() > PATH_MAX {
        return Err(PathError::TooLong);
    }

    let body = if bytes[0] == SEPARATOR { 1 } else { 0 };
    let mut prev_sep = body == 1;
    for (i, &b) in bytes.iter().enumerate().skip(body) {
        let is_sep = b == SEPARATOR;
        if is_sep && prev_sep {
            return Err(PathError::EmptySegment { at: i });
        }
        prev_sep = is_sep;
    }
    Ok(())
}

/// 校验并去掉结尾分隔符 (根目录保持 `/`)
pub fn normalize(path: &str) -> Result<&str, PathError> {
    validate(path)?;
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed),
        _ => Ok(path),
    }
}

/// 是否为根目录
pub fn is_root(path: &str) -> bool {
    path == "/"
}

/// 前缀边界迭代器
///
/// 跳过开头的一个分隔符，此后每遇到一个分隔符产出其下标 (前缀不含分隔符)，
/// 最后产出整个路径的长度作为叶子。不做任何校验：连续分隔符会产出空段前缀，
/// 由调用者先用 [`validate`] 排除。
#[derive(Debug, Clone)]
pub struct Boundaries<'a> {
    bytes: &'a [u8],
    start: usize,
    cursor: usize,
    done: bool,
}

impl<'a> Boundaries<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let start = match bytes.first() {
            Some(&SEPARATOR) => 1,
            _ => 0,
        };
        Self {
            bytes,
            start,
            cursor: start,
            // 仅有根 (或空) 时没有任何需要创建的目录
            done: bytes.len() <= start,
        }
    }

    /// 回到起点
    pub fn rewind(&mut self) {
        self.cursor = self.start;
        self.done = self.bytes.len() <= self.start;
    }
}

impl Iterator for Boundaries<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        match self.bytes[self.cursor..].iter().position(|&b| b == SEPARATOR) {
            Some(pos) => {
                let end = self.cursor + pos;
                self.cursor = end + 1;
                Some(end)
            }
            None => {
                self.done = true;
                Some(self.bytes.len())
            }
        }
    }
}

/// 目录前缀迭代器
#[derive(Debug, Clone)]
pub struct DirPrefixes<'a> {
    path: &'a str,
    boundaries: Boundaries<'a>,
}

impl<'a> DirPrefixes<'a> {
    /// 校验路径并创建迭代器
    pub fn new(path: &'a str) -> Result<Self, PathError> {
        let path = normalize(path)?;
        Ok(Self {
            path,
            boundaries: Boundaries::new(path.as_bytes()),
        })
    }

    /// 回到第一个前缀
    pub fn rewind(&mut self) {
        self.boundaries.rewind();
    }
}

impl<'a> Iterator for DirPrefixes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        // 边界总是落在 ASCII 分隔符上或路径末尾，切片不会截断字符
        self.boundaries.next().map(|end| &self.path[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn prefixes(path: &str) -> Vec<&str> {
        DirPrefixes::new(path).unwrap().collect()
    }

    #[test]
    fn test_nested_prefixes() {
        assert_eq!(prefixes("/a/b/c"), ["/a", "/a/b", "/a/b/c"]);
        assert_eq!(prefixes("/config"), ["/config"]);
        assert_eq!(prefixes("logs/2024/jan"), ["logs", "logs/2024", "logs/2024/jan"]);
    }

    #[test]
    fn test_root_yields_nothing() {
        assert!(prefixes("/").is_empty());
    }

    #[test]
    fn test_rejects_empty_segments() {
        assert_eq!(validate(""), Err(PathError::Empty));
        assert_eq!(validate("/a//b"), Err(PathError::EmptySegment { at: 3 }));
        assert_eq!(validate("//a"), Err(PathError::EmptySegment { at: 1 }));
        assert_eq!(validate("/a/b//"), Err(PathError::EmptySegment { at: 5 }));
        assert!(DirPrefixes::new("/a//b").is_err());
    }

    #[test]
    fn test_trailing_separator() {
        assert_eq!(normalize("/a/b/"), Ok("/a/b"));
        assert_eq!(normalize("/a/b"), Ok("/a/b"));
        assert_eq!(normalize("/"), Ok("/"));
        assert_eq!(normalize("a/"), Ok("a"));
        assert_eq!(prefixes("/a/b/"), ["/a", "/a/b"]);
        assert!(is_root("/") && !is_root("/a"));
    }

    #[test]
    fn test_rejects_long_path() {
        let long = "a".repeat(PATH_MAX + 1);
        assert_eq!(validate(&long), Err(PathError::TooLong));
        assert!(validate(&long[..PATH_MAX]).is_ok());
    }

    #[test]
    fn test_raw_boundaries_keep_empty_segments() {
        let ends: Vec<usize> = Boundaries::new(b"/a//b").collect();
        assert_eq!(ends, [2, 3, 5]);
        assert_eq!(Boundaries::new(b"").count(), 0);
    }

    #[test]
    fn test_rewind() {
        let mut iter = DirPrefixes::new("/x/y").unwrap();
        assert_eq!(iter.next(), Some("/x"));
        assert_eq!(iter.next(), Some("/x/y"));
        assert_eq!(iter.next(), None);
        iter.rewind();
        assert_eq!(iter.next(), Some("/x"));

        let fork = iter.clone();
        assert_eq!(fork.collect::<Vec<_>>(), ["/x/y"]);
    }
}
