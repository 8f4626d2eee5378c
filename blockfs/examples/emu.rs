use blockfs::io::FileBlockEmulatorBuilder;
use blockfs::{BlockFs, Geometry};

pub fn main() {
    let geom = Geometry::default();
    let tmp = tempfile::tempfile().unwrap();
    let dev = FileBlockEmulatorBuilder::from(tmp)
        .with_block_len(geom.block_size)
        .with_block_count(geom.meta_blocks())
        .build()
        .expect("Could not initialize disk emulator.");

    // Create a fresh file system on the device and exercise a write.
    let mut fs = BlockFs::create(dev, geom).expect("should create");
    fs.create_file("hello.txt").unwrap();
    fs.write_file("hello.txt", b"hello, blockfs").unwrap();

    let content = fs.read_file("hello.txt").unwrap();
    println!(
        "{} ({} blocks free)",
        String::from_utf8_lossy(&content),
        fs.free_blocks()
    );
}
