//! littlefs2 端到端测试 (RAM 模拟 Flash)

use flashfs::fs::{
    FileSystem, FlashBlockAdapter, FsError, Geometry, LfsError, LittleFs, MountState, OpenMode,
    RamFlash, StorageError,
};
use generic_array::typenum::{U1, U512};

const BLOCK_SIZE: usize = 512;
const BLOCK_COUNT: usize = 64;
const FLASH_SIZE: usize = BLOCK_SIZE * BLOCK_COUNT;
const BASE: u32 = 0x1000;

struct TestGeometry;

impl Geometry for TestGeometry {
    const BASE_ADDRESS: u32 = BASE;
    const BLOCK_SIZE: usize = BLOCK_SIZE;
    const BLOCK_COUNT: usize = BLOCK_COUNT;
    const READ_SIZE: usize = 16;
    const PROG_SIZE: usize = 16;
    type CacheSize = U512;
    type LookaheadWords = U1;
}

type Volume = LittleFs<RamFlash<FLASH_SIZE>, TestGeometry>;

fn erased(bulk_erase: bool) -> FileSystem<Volume> {
    let flash = RamFlash::new(BASE).with_bulk_erase(bulk_erase);
    FileSystem::with_volume(LittleFs::new(flash))
}

fn mounted() -> FileSystem<Volume> {
    let mut fs = erased(true);
    fs.format().unwrap();
    fs.begin(None).unwrap();
    fs
}

fn flash(fs: &mut FileSystem<Volume>) -> &mut RamFlash<FLASH_SIZE> {
    fs.volume_mut().unwrap().adapter_mut().driver_mut()
}

#[test]
fn fresh_device_needs_format() {
    let mut fs = erased(true);
    assert!(matches!(fs.begin(None), Err(FsError::MountFailed(_))));
    assert_eq!(fs.state(), MountState::Unmounted);

    fs.format().unwrap();
    assert!(!fs.is_mounted());
    fs.begin(None).unwrap();
    assert!(fs.is_mounted());
}

#[test]
fn mkdir_creates_every_level() {
    let mut fs = mounted();

    fs.mkdir("/a/b/c").unwrap();
    for path in ["/a", "/a/b", "/a/b/c"] {
        assert!(fs.metadata(path).unwrap().is_dir(), "{} missing", path);
    }

    // 重复创建同样成功
    fs.mkdir("/a/b/c").unwrap();
    fs.mkdir("/a/b/d").unwrap();
    assert!(fs.exists("/a/b/d"));

    assert_eq!(
        fs.mkdir("/a//c"),
        Err(FsError::InvalidPath(flashfs::fs::PathError::EmptySegment { at: 3 }))
    );
}

#[test]
fn mkdir_through_file_fails_at_that_level() {
    let mut fs = mounted();
    fs.open("/f", OpenMode::Write).unwrap().write_all(b"x").unwrap();

    match fs.mkdir("/f/g") {
        Err(FsError::PathOpFailed { path, error }) => {
            assert_eq!(path.as_str(), "/f/g");
            assert_eq!(error, LfsError::NotDir);
        }
        other => panic!("unexpected: {:?}", other.err()),
    }
}

#[test]
fn remove_populated_directory() {
    let mut fs = mounted();
    fs.mkdir("/logs/2024/jan").unwrap();
    fs.open("/logs/2024/jan/01.txt", OpenMode::Write)
        .unwrap()
        .write_all(b"boot ok")
        .unwrap();
    fs.open("/logs/readme", OpenMode::Write)
        .unwrap()
        .write_all(b"logs")
        .unwrap();

    fs.rmdir("/logs").unwrap();
    assert!(!fs.exists("/logs"));
    assert!(!fs.exists("/logs/2024/jan/01.txt"));

    let err = fs.remove("/logs").unwrap_err();
    assert_eq!(err.lfs_error(), Some(LfsError::NoEnt));
}

#[test]
fn file_write_append_read() {
    let mut fs = mounted();
    fs.mkdir("/cfg").unwrap();

    fs.open("/cfg/wifi", OpenMode::Write)
        .unwrap()
        .write_all(b"ssid=lab")
        .unwrap();
    {
        let mut file = fs.open("/cfg/wifi", OpenMode::Write).unwrap();
        assert_eq!(file.position(), 8);
        file.write_all(b";pass=123").unwrap();
        assert_eq!(file.size().unwrap(), 17);
    }

    let mut file = fs.open("/cfg/wifi", OpenMode::Read).unwrap();
    let mut buf = [0u8; 32];
    let mut total = 0;
    loop {
        let n = file.read(&mut buf[total..]).unwrap();
        if n == 0 {
            break;
        }
        total += n;
    }
    assert_eq!(&buf[..total], b"ssid=lab;pass=123");

    file.seek(5);
    let mut word = [0u8; 3];
    assert_eq!(file.read(&mut word).unwrap(), 3);
    assert_eq!(&word, b"lab");
    assert_eq!(file.write(b"no").unwrap_err().lfs_error(), Some(LfsError::BadF));
}

#[test]
fn rename_and_space() {
    let mut fs = mounted();
    let before = fs.available_space().unwrap();
    assert!(before > 0 && before <= FLASH_SIZE);

    fs.open("/old", OpenMode::Write).unwrap().write_all(&[0xA5; 64]).unwrap();
    fs.rename("/old", "/new").unwrap();
    assert!(!fs.exists("/old"));
    assert_eq!(fs.metadata("/new").unwrap().size, 64);
}

#[test]
fn end_and_begin_keep_contents() {
    let mut fs = mounted();
    fs.mkdir("/keep").unwrap();

    fs.end().unwrap();
    fs.end().unwrap();
    assert!(!fs.exists("/keep"));
    assert_eq!(fs.mkdir("/x"), Err(FsError::NotMounted));

    fs.begin(None).unwrap();
    assert!(fs.exists("/keep"));
}

#[test]
fn format_while_mounted_wipes_and_remounts() {
    let mut fs = mounted();
    fs.mkdir("/data").unwrap();

    fs.format().unwrap();
    assert!(fs.is_mounted());
    assert!(!fs.exists("/data"));
    fs.mkdir("/data").unwrap();
}

#[test]
fn corrupted_metadata_recovers_after_format() {
    let mut fs = mounted();
    fs.mkdir("/a").unwrap();
    fs.end().unwrap();

    // 超级块位于块 0 和块 1
    flash(&mut fs).scramble(0, 2 * BLOCK_SIZE);
    assert!(matches!(fs.begin(None), Err(FsError::MountFailed(_))));

    fs.format().unwrap();
    fs.begin(None).unwrap();
    assert!(!fs.exists("/a"));
}

#[test]
fn erase_strategy_follows_driver() {
    let mut bulk = erased(true);
    bulk.format().unwrap();
    let stats = flash(&mut bulk).stats();
    assert!(stats.bulk_erases > 0);
    assert_eq!(stats.byte_writes, 0);

    let mut bytewise = erased(false);
    bytewise.format().unwrap();
    let stats = flash(&mut bytewise).stats();
    assert_eq!(stats.bulk_erases, 0);
    assert_eq!(stats.byte_writes % BLOCK_SIZE, 0);
    assert!(stats.byte_writes > 0);

    bytewise.begin(None).unwrap();
    bytewise.mkdir("/b").unwrap();
    assert!(bytewise.exists("/b"));
}

#[test]
fn flash_fault_surfaces_as_io() {
    let mut fs = mounted();
    flash(&mut fs).inject_fault(StorageError::WriteError);

    let err = fs.mkdir("/z").unwrap_err();
    assert_eq!(err.lfs_error(), Some(LfsError::Io));
    assert!(fs.is_mounted());
}

#[test]
fn directory_changes_reach_the_driver() {
    let mut fs = mounted();

    let before = flash(&mut fs).stats().flushes;
    fs.mkdir("/a/b").unwrap();
    let after_mkdir = flash(&mut fs).stats().flushes;
    assert!(after_mkdir >= before + 2, "one flush per created level");

    fs.rename("/a/b", "/a/c").unwrap();
    let after_rename = flash(&mut fs).stats().flushes;
    assert!(after_rename > after_mkdir);

    fs.remove("/a").unwrap();
    assert!(flash(&mut fs).stats().flushes > after_rename);
}

#[test]
fn failed_flush_is_reported() {
    let mut fs = mounted();
    flash(&mut fs).inject_flush_fault(StorageError::Timeout);

    let err = fs.mkdir("/z").unwrap_err();
    match err {
        FsError::PathOpFailed { path, error } => {
            assert_eq!(path.as_str(), "/z");
            assert_eq!(error, LfsError::Io);
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(fs.is_mounted());

    fs.open("/f", OpenMode::Write).unwrap().write_all(b"x").unwrap();
    flash(&mut fs).inject_flush_fault(StorageError::Timeout);
    assert_eq!(fs.remove("/f").unwrap_err().lfs_error(), Some(LfsError::Io));
}

#[test]
fn root_cannot_be_removed() {
    let mut fs = mounted();
    fs.mkdir("/keep/inner").unwrap();
    fs.open("/top", OpenMode::Write).unwrap().write_all(b"t").unwrap();

    let err = fs.remove("/").unwrap_err();
    assert_eq!(err.lfs_error(), Some(LfsError::Inval));
    assert!(fs.exists("/keep/inner"));
    assert!(fs.exists("/top"));
}

#[test]
fn trailing_separator_names_the_same_entry() {
    let mut fs = mounted();
    fs.mkdir("/logs/").unwrap();

    assert!(fs.exists("/logs"));
    assert!(fs.exists("/logs/"));
    fs.remove("/logs/").unwrap();
    assert!(!fs.exists("/logs"));
}

#[test]
fn volume_built_from_adapter() {
    let adapter = FlashBlockAdapter::<_, TestGeometry>::new(RamFlash::<FLASH_SIZE>::new(BASE));
    let mut volume = LittleFs::from_adapter(adapter);
    assert_eq!(volume.adapter().block_size(), BLOCK_SIZE);
    assert_eq!(volume.adapter().block_count(), BLOCK_COUNT);
    assert!(!volume.is_mountable());

    let mut fs = FileSystem::with_volume(volume);
    fs.format().unwrap();
    assert!(fs.volume_mut().unwrap().is_mountable());
}
