//! Flash 存储抽象层
//!
//! 将逻辑块 (block, offset) 映射为 Flash 物理地址，并提供 littlefs2 所需的
//! 块设备接口。
//!
//! - [`FlashDriver`]: 原始 Flash 驱动契约 (读/写/单字节写/刷新/可选整块擦除)
//! - [`Geometry`]: 编译期确定的分区几何参数
//! - [`FlashBlockAdapter`]: 按块读取/编程/擦除/同步，实现 `littlefs2::driver::Storage`
//! - [`RamFlash`]: RAM 模拟 Flash，用于主机端测试
//! - [`NorFlashDriver`]: 任意 `embedded-storage` NorFlash 驱动的桥接

use core::fmt;
use core::marker::PhantomData;

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};
use generic_array::typenum::{Unsigned, U128, U2};
use generic_array::ArrayLength;

/// 擦除后 Flash 的读出值
pub const ERASE_VALUE: u8 = 0xFF;

/// 存储操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// 地址越界
    OutOfBounds,
    /// 对齐错误
    Misaligned,
    /// 读取失败
    ReadError,
    /// 写入失败
    WriteError,
    /// 擦除失败
    EraseError,
    /// 设备超时
    Timeout,
    /// 检测到数据损坏 (坏块)
    Corrupt,
    /// 驱动不支持该操作
    Unsupported,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "Address out of bounds"),
            Self::Misaligned => write!(f, "Address alignment error"),
            Self::ReadError => write!(f, "Flash read error"),
            Self::WriteError => write!(f, "Flash write error"),
            Self::EraseError => write!(f, "Flash erase error"),
            Self::Timeout => write!(f, "Device timeout"),
            Self::Corrupt => write!(f, "Corrupted block"),
            Self::Unsupported => write!(f, "Operation not supported"),
        }
    }
}

impl From<StorageError> for littlefs2::io::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Corrupt => littlefs2::io::Error::Corruption,
            _ => littlefs2::io::Error::Io,
        }
    }
}

/// 原始 Flash 驱动契约
///
/// 所有地址均为绝对物理地址。驱动不可重入，多上下文访问需由调用者串行化。
pub trait FlashDriver {
    /// 从 `address` 读取 `buf.len()` 字节
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), StorageError>;

    /// 向 `address` 写入数据 (目标区域须已擦除)
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError>;

    /// 写入单个字节
    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), StorageError>;

    /// 等待之前的写入全部落盘
    fn flush(&mut self) -> Result<(), StorageError>;

    /// 是否提供整块擦除原语
    fn supports_bulk_erase(&self) -> bool {
        false
    }

    /// 擦除 `[address, address + len)`
    fn erase(&mut self, address: u32, len: u32) -> Result<(), StorageError> {
        let _ = (address, len);
        Err(StorageError::Unsupported)
    }
}

impl<T: FlashDriver + ?Sized> FlashDriver for &mut T {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError> {
        (**self).write(address, data)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), StorageError> {
        (**self).write_byte(address, value)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        (**self).flush()
    }

    fn supports_bulk_erase(&self) -> bool {
        (**self).supports_bulk_erase()
    }

    fn erase(&mut self, address: u32, len: u32) -> Result<(), StorageError> {
        (**self).erase(address, len)
    }
}

/// 文件系统分区几何参数
///
/// 编译期绑定，整个设备生命周期内不变。
pub trait Geometry {
    /// 分区在 Flash 中的起始物理地址
    const BASE_ADDRESS: u32;
    /// 块大小 (擦除单位)
    const BLOCK_SIZE: usize;
    /// 总块数
    const BLOCK_COUNT: usize;
    /// 最小读取单位
    const READ_SIZE: usize;
    /// 最小编程单位
    const PROG_SIZE: usize;
    /// 块周期 (磨损均衡，-1 表示禁用)
    const BLOCK_CYCLES: isize = -1;
    /// 读/写缓存大小 (字节)
    type CacheSize: ArrayLength<u8>;
    /// lookahead 缓冲区大小 (以 8 字节为单位)
    type LookaheadWords: ArrayLength<u64>;

    /// lookahead 缓冲区字节数
    fn lookahead_size() -> usize {
        Self::LookaheadWords::USIZE * 8
    }

    /// 分区总字节数
    fn total_bytes() -> usize {
        Self::BLOCK_SIZE * Self::BLOCK_COUNT
    }
}

/// 片上 Flash 的默认布局: 0xED000 起 28KB，128 字节块
pub struct InternalFlash;

impl Geometry for InternalFlash {
    const BASE_ADDRESS: u32 = 0xED000;
    const BLOCK_SIZE: usize = 128;
    const BLOCK_COUNT: usize = 7 * 4096 / 128;
    const READ_SIZE: usize = 128;
    const PROG_SIZE: usize = 128;
    type CacheSize = U128;
    type LookaheadWords = U2;
}

/// 逻辑块设备适配器
///
/// 每次操作只访问单个逻辑块，物理地址每次重新计算，不保存任何擦除状态。
pub struct FlashBlockAdapter<D, G> {
    driver: D,
    _geometry: PhantomData<G>,
}

impl<D: FlashDriver, G: Geometry> FlashBlockAdapter<D, G> {
    /// 绑定驱动与几何参数
    pub const fn new(driver: D) -> Self {
        Self {
            driver,
            _geometry: PhantomData,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// 取回底层驱动
    pub fn into_inner(self) -> D {
        self.driver
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        G::BLOCK_SIZE
    }

    /// 总块数
    pub fn block_count(&self) -> usize {
        G::BLOCK_COUNT
    }

    /// 计算 `[offset, offset + len)` 在 `block` 内的物理起始地址
    ///
    /// 区域必须完全位于块内。
    pub fn address(block: u32, offset: u32, len: usize) -> Result<u32, StorageError> {
        if block as usize >= G::BLOCK_COUNT {
            return Err(StorageError::OutOfBounds);
        }
        let end = (offset as usize)
            .checked_add(len)
            .ok_or(StorageError::OutOfBounds)?;
        if end > G::BLOCK_SIZE {
            return Err(StorageError::OutOfBounds);
        }

        let block_size = u32::try_from(G::BLOCK_SIZE).map_err(|_| StorageError::OutOfBounds)?;
        block
            .checked_mul(block_size)
            .and_then(|base| base.checked_add(offset))
            .and_then(|rel| rel.checked_add(G::BASE_ADDRESS))
            .ok_or(StorageError::OutOfBounds)
    }

    /// 读取块内区域
    pub fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let address = Self::address(block, offset, buf.len())?;
        self.driver.read(address, buf)
    }

    /// 编程块内区域
    ///
    /// 目标区域必须已处于擦除状态，否则结果由硬件决定，此处不检查。
    pub fn program(&mut self, block: u32, offset: u32, data: &[u8]) -> Result<(), StorageError> {
        let address = Self::address(block, offset, data.len())?;
        self.driver.write(address, data)
    }

    /// 擦除整块
    ///
    /// 驱动支持整块擦除时发出一次擦除命令，否则逐字节写入 [`ERASE_VALUE`]。
    pub fn erase(&mut self, block: u32) -> Result<(), StorageError> {
        let base = Self::address(block, 0, G::BLOCK_SIZE)?;

        if self.driver.supports_bulk_erase() {
            let len = u32::try_from(G::BLOCK_SIZE).map_err(|_| StorageError::OutOfBounds)?;
            return self.driver.erase(base, len);
        }

        crate::log_trace!("erase block {} byte-by-byte", block);
        for address in (base..).take(G::BLOCK_SIZE) {
            self.driver.write_byte(address, ERASE_VALUE)?;
        }
        Ok(())
    }

    /// 同步 (确保所有写入完成)
    pub fn sync(&mut self) -> Result<(), StorageError> {
        self.driver.flush()
    }

    /// 将 littlefs2 的线性偏移拆分为 (块号, 块内偏移)
    fn split(off: usize) -> Result<(u32, u32), StorageError> {
        let block = u32::try_from(off / G::BLOCK_SIZE).map_err(|_| StorageError::OutOfBounds)?;
        let offset = u32::try_from(off % G::BLOCK_SIZE).map_err(|_| StorageError::OutOfBounds)?;
        Ok((block, offset))
    }
}

impl<D: FlashDriver, G: Geometry> littlefs2::driver::Storage for FlashBlockAdapter<D, G> {
    const READ_SIZE: usize = G::READ_SIZE;
    const WRITE_SIZE: usize = G::PROG_SIZE;
    const BLOCK_SIZE: usize = G::BLOCK_SIZE;
    const BLOCK_COUNT: usize = G::BLOCK_COUNT;
    const BLOCK_CYCLES: isize = G::BLOCK_CYCLES;
    type CACHE_SIZE = G::CacheSize;
    type LOOKAHEAD_SIZE = G::LookaheadWords;

    fn read(&mut self, off: usize, buf: &mut [u8]) -> littlefs2::io::Result<usize> {
        let (block, offset) = Self::split(off)?;
        Self::read(self, block, offset, buf)?;
        Ok(buf.len())
    }

    fn write(&mut self, off: usize, data: &[u8]) -> littlefs2::io::Result<usize> {
        let (block, offset) = Self::split(off)?;
        Self::program(self, block, offset, data)?;
        Ok(data.len())
    }

    fn erase(&mut self, off: usize, len: usize) -> littlefs2::io::Result<usize> {
        let (first, offset) = Self::split(off)?;
        if offset != 0 || len % G::BLOCK_SIZE != 0 {
            return Err(StorageError::Misaligned.into());
        }
        for block in (first..).take(len / G::BLOCK_SIZE) {
            Self::erase(self, block)?;
        }
        Ok(len)
    }
}

/// RAM 模拟 Flash
///
/// 覆盖写入语义 (不模拟位只能 1→0)，用于主机端测试与模拟运行。
pub struct RamFlash<const N: usize> {
    base: u32,
    data: [u8; N],
    bulk_erase: bool,
    fault: Option<StorageError>,
    flush_fault: Option<StorageError>,
    stats: RamFlashStats,
}

/// [`RamFlash`] 操作计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RamFlashStats {
    pub reads: usize,
    pub writes: usize,
    pub byte_writes: usize,
    pub bulk_erases: usize,
    pub flushes: usize,
}

impl<const N: usize> RamFlash<N> {
    /// 创建已擦除的模拟 Flash，映射在 `base` 起的地址空间
    pub const fn new(base: u32) -> Self {
        Self {
            base,
            data: [ERASE_VALUE; N],
            bulk_erase: false,
            fault: None,
            flush_fault: None,
            stats: RamFlashStats {
                reads: 0,
                writes: 0,
                byte_writes: 0,
                bulk_erases: 0,
                flushes: 0,
            },
        }
    }

    /// 开启/关闭整块擦除能力
    pub const fn with_bulk_erase(mut self, enabled: bool) -> Self {
        self.bulk_erase = enabled;
        self
    }

    /// 下一次操作返回 `fault`
    pub fn inject_fault(&mut self, fault: StorageError) {
        self.fault = Some(fault);
    }

    /// 下一次 `flush` 返回 `fault`，读写不受影响
    pub fn inject_flush_fault(&mut self, fault: StorageError) {
        self.flush_fault = Some(fault);
    }

    /// 原始内容
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// 破坏 `[start, start + len)` (写入 0x00)
    pub fn scramble(&mut self, start: usize, len: usize) {
        let end = core::cmp::min(start.saturating_add(len), N);
        if start < end {
            self.data[start..end].fill(0x00);
        }
    }

    pub fn stats(&self) -> RamFlashStats {
        self.stats
    }

    fn check(&mut self, address: u32, len: usize) -> Result<usize, StorageError> {
        if let Some(fault) = self.fault.take() {
            return Err(fault);
        }
        let start = address
            .checked_sub(self.base)
            .ok_or(StorageError::OutOfBounds)? as usize;
        match start.checked_add(len) {
            Some(end) if end <= N => Ok(start),
            _ => Err(StorageError::OutOfBounds),
        }
    }
}

impl<const N: usize> FlashDriver for RamFlash<N> {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = self.check(address, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        self.stats.reads += 1;
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError> {
        let start = self.check(address, data.len())?;
        self.data[start..start + data.len()].copy_from_slice(data);
        self.stats.writes += 1;
        Ok(())
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), StorageError> {
        let start = self.check(address, 1)?;
        self.data[start] = value;
        self.stats.byte_writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if let Some(fault) = self.fault.take().or_else(|| self.flush_fault.take()) {
            return Err(fault);
        }
        self.stats.flushes += 1;
        Ok(())
    }

    fn supports_bulk_erase(&self) -> bool {
        self.bulk_erase
    }

    fn erase(&mut self, address: u32, len: u32) -> Result<(), StorageError> {
        if !self.bulk_erase {
            return Err(StorageError::Unsupported);
        }
        let start = self.check(address, len as usize)?;
        self.data[start..start + len as usize].fill(ERASE_VALUE);
        self.stats.bulk_erases += 1;
        Ok(())
    }
}

/// `embedded-storage` NorFlash 驱动桥接
///
/// `NorFlash` 的偏移是相对于设备起点的，这里减去 `base` 后转交。
/// 几何参数的 `PROG_SIZE` 需为驱动 `WRITE_SIZE` 的整数倍；
/// 单字节写仅在驱动 `WRITE_SIZE == 1` 时可用 (整块擦除可用时不会走到)。
pub struct NorFlashDriver<F> {
    flash: F,
    base: u32,
}

impl<F: NorFlash> NorFlashDriver<F> {
    pub const fn new(flash: F, base: u32) -> Self {
        Self { flash, base }
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    fn offset(&self, address: u32) -> Result<u32, StorageError> {
        address.checked_sub(self.base).ok_or(StorageError::OutOfBounds)
    }
}

fn nor_error<E: NorFlashError>(e: E, other: StorageError) -> StorageError {
    match e.kind() {
        NorFlashErrorKind::NotAligned => StorageError::Misaligned,
        NorFlashErrorKind::OutOfBounds => StorageError::OutOfBounds,
        _ => other,
    }
}

impl<F: NorFlash> FlashDriver for NorFlashDriver<F> {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let offset = self.offset(address)?;
        self.flash
            .read(offset, buf)
            .map_err(|e| nor_error(e, StorageError::ReadError))
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError> {
        let offset = self.offset(address)?;
        self.flash
            .write(offset, data)
            .map_err(|e| nor_error(e, StorageError::WriteError))
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), StorageError> {
        self.write(address, &[value])
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        // NorFlash 写入是阻塞完成的
        Ok(())
    }

    fn supports_bulk_erase(&self) -> bool {
        true
    }

    fn erase(&mut self, address: u32, len: u32) -> Result<(), StorageError> {
        let from = self.offset(address)?;
        let to = from.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        self.flash
            .erase(from, to)
            .map_err(|e| nor_error(e, StorageError::EraseError))
    }
}
