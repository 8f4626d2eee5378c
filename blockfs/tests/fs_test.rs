use std::sync::{Arc, Mutex};
use std::thread;

use tempfile::NamedTempFile;

use blockfs::{BlockFs, FsError, Geometry};

fn mount_fresh(tf: &NamedTempFile) -> BlockFs<blockfs::io::FileBlockEmulator> {
    BlockFs::mount(tf.path(), Geometry::default()).unwrap()
}

#[test]
fn created_files_show_up_in_the_listing() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    fs.create_file("a.txt").unwrap();
    fs.create_file("b.txt").unwrap();
    assert_eq!(fs.list_files(), vec!["a.txt", "b.txt"]);
}

#[test]
fn creating_the_same_name_twice_fails() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    fs.create_file("a.txt").unwrap();
    match fs.create_file("a.txt").unwrap_err() {
        FsError::AlreadyExists => (),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn long_names_are_rejected_without_side_effects() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    match fs.create_file("twelve.chars").unwrap_err() {
        FsError::NameTooLong => (),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(fs.list_files().is_empty());
    assert_eq!(fs.free_blocks(), 10);
}

#[test]
fn writes_round_trip_byte_exact() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    fs.create_file("a.txt").unwrap();
    fs.write_file("a.txt", b"hello").unwrap();
    assert_eq!(fs.read_file("a.txt").unwrap(), b"hello");
    assert_eq!(fs.free_blocks(), 9);

    // Content spanning several blocks round-trips too.
    let payload: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
    fs.write_file("a.txt", &payload).unwrap();
    assert_eq!(fs.read_file("a.txt").unwrap(), payload);
    assert_eq!(fs.free_blocks(), 7);
}

#[test]
fn reading_a_file_never_written_returns_empty() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    fs.create_file("a.txt").unwrap();
    assert_eq!(fs.read_file("a.txt").unwrap(), Vec::<u8>::new());
}

#[test]
fn overwrites_resize_the_block_chain() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    fs.create_file("a.txt").unwrap();
    fs.write_file("a.txt", &[7u8; 600]).unwrap();
    assert_eq!(fs.free_blocks(), 5);

    fs.write_file("a.txt", b"tiny").unwrap();
    assert_eq!(fs.free_blocks(), 9);
    assert_eq!(fs.read_file("a.txt").unwrap(), b"tiny");

    fs.write_file("a.txt", b"").unwrap();
    assert_eq!(fs.free_blocks(), 10);
    assert_eq!(fs.read_file("a.txt").unwrap(), Vec::<u8>::new());
}

#[test]
fn deleting_frees_the_whole_chain() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    fs.create_file("a.txt").unwrap();
    fs.write_file("a.txt", &[1u8; 500]).unwrap();
    assert_eq!(fs.free_blocks(), 6);

    fs.delete_file("a.txt").unwrap();
    assert_eq!(fs.free_blocks(), 10);

    match fs.read_file("a.txt").unwrap_err() {
        FsError::NotFound(_) => (),
        other => panic!("unexpected error: {:?}", other),
    }
    match fs.delete_file("a.txt").unwrap_err() {
        FsError::NotFound(_) => (),
        other => panic!("unexpected error: {:?}", other),
    }

    // The name and the blocks are reusable.
    fs.create_file("a.txt").unwrap();
    fs.write_file("a.txt", &[2u8; 1280]).unwrap();
    assert_eq!(fs.free_blocks(), 0);
}

#[test]
fn failed_writes_leave_prior_content_untouched() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    fs.create_file("big").unwrap();
    fs.create_file("small").unwrap();
    fs.write_file("big", &[9u8; 1024]).unwrap(); // 8 blocks
    fs.write_file("small", b"keep me").unwrap(); // 1 block
    assert_eq!(fs.free_blocks(), 1);

    // Needs 2 blocks, only 1 free: the check runs before the old chain is
    // released, so nothing changes.
    match fs.write_file("small", &[0u8; 200]).unwrap_err() {
        FsError::InsufficientSpace => (),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fs.read_file("small").unwrap(), b"keep me");
    assert_eq!(fs.free_blocks(), 1);
}

#[test]
fn catalog_capacity_is_enforced() {
    let tf = NamedTempFile::new().unwrap();
    let mut fs = mount_fresh(&tf);

    for name in ["a", "b", "c", "d", "e"] {
        fs.create_file(name).unwrap();
    }
    match fs.create_file("f").unwrap_err() {
        FsError::NoSpace => (),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fs.list_files().len(), 5);
}

#[test]
fn metadata_survives_a_remount() {
    let tf = NamedTempFile::new().unwrap();
    {
        let mut fs = mount_fresh(&tf);
        fs.create_file("a.txt").unwrap();
        fs.create_file("b.txt").unwrap();
        fs.write_file("a.txt", &[5u8; 200]).unwrap();
    }

    let fs = mount_fresh(&tf);
    assert_eq!(fs.list_files(), vec!["a.txt", "b.txt"]);
    assert_eq!(fs.free_blocks(), 8);

    // Block accounting is capacity only; the payload itself does not survive
    // the process, so the file reads back as `size` zero bytes.
    let content = fs.read_file("a.txt").unwrap();
    assert_eq!(content.len(), 200);
    assert!(content.iter().all(|&b| b == 0));
    assert_eq!(fs.read_file("b.txt").unwrap(), Vec::<u8>::new());
}

#[test]
fn deletes_survive_a_remount() {
    let tf = NamedTempFile::new().unwrap();
    {
        let mut fs = mount_fresh(&tf);
        fs.create_file("gone").unwrap();
        fs.write_file("gone", &[1u8; 400]).unwrap();
        fs.delete_file("gone").unwrap();
    }

    let mut fs = mount_fresh(&tf);
    assert!(fs.list_files().is_empty());
    assert_eq!(fs.free_blocks(), 10);
    match fs.read_file("gone").unwrap_err() {
        FsError::NotFound(_) => (),
        other => panic!("unexpected error: {:?}", other),
    }
    fs.create_file("gone").unwrap();
}

#[test]
fn foreign_images_fail_to_mount() {
    let tf = NamedTempFile::new().unwrap();
    let geom = Geometry::default();
    let image_bytes = geom.meta_blocks() * geom.block_size;
    std::fs::write(tf.path(), vec![0xAB; image_bytes]).unwrap();

    match BlockFs::mount(tf.path(), geom) {
        Err(FsError::InvalidImage(_)) => (),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("foreign image mounted"),
    }
}

#[test]
fn mounting_with_different_geometry_fails() {
    let tf = NamedTempFile::new().unwrap();
    {
        mount_fresh(&tf);
    }

    let resized = Geometry {
        total_blocks: 9,
        ..Geometry::default()
    };
    match BlockFs::mount(tf.path(), resized) {
        Err(FsError::InvalidImage(_)) => (),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("mismatched geometry mounted"),
    }
}

#[test]
fn concurrent_writers_to_distinct_files_all_land() {
    let tf = NamedTempFile::new().unwrap();
    let shared = Arc::new(Mutex::new(mount_fresh(&tf)));

    let names = ["a", "b", "c", "d"];
    for name in names {
        shared.lock().unwrap().create_file(name).unwrap();
    }

    let handles: Vec<_> = names
        .iter()
        .map(|&name| {
            let fs = Arc::clone(&shared);
            thread::spawn(move || {
                // 200 bytes, two blocks per file.
                let payload = name.repeat(200).into_bytes();
                fs.lock().unwrap().write_file(name, &payload).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let fs = shared.lock().unwrap();
    for name in names {
        assert_eq!(fs.read_file(name).unwrap(), name.repeat(200).into_bytes());
    }
    assert_eq!(fs.free_blocks(), 2);
}
