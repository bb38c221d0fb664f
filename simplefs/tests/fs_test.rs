use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

use simplefs::alloc::{Bitmap, State};
use simplefs::tree::Node;
use simplefs::{image, SFSError, SharedVolume, Volume};

/// Checks the invariants tying the bitmap, the allocation table and the directory tree together.
fn assert_consistent(vol: &Volume) {
    let mut expected = Bitmap::new(vol.block_count());
    for (key, record) in vol.table().live() {
        for b in record.blocks() {
            assert_eq!(expected.get(b), State::Free, "{} shares block {}", key, b);
        }
        expected.mark(record.start(), record.length(), true);
        assert_eq!(record.length(), record.content().len());

        let segments: Vec<&str> = key.split('/').collect();
        assert_eq!(
            vol.tree().lookup(&segments),
            Some(&Node::File(key.to_string())),
            "{} missing from tree",
            key
        );
    }
    assert_eq!(&expected, vol.bitmap());

    for (resolved, key) in vol.tree().files() {
        assert_eq!(resolved, key);
        assert!(vol.table().is_live(key), "{} has no live record", key);
    }
}

#[test]
fn eight_block_scenario() {
    let mut vol = Volume::new(8);

    vol.create("a", "xx").unwrap();
    let used: Vec<State> = vol.bitmap().iter().collect();
    assert_eq!(&used[..3], &[State::Used, State::Used, State::Free]);

    assert!(matches!(
        vol.create("b", "yyyyyyyyy"),
        Err(SFSError::InsufficientSpace { .. })
    ));
    assert_eq!(vol.bitmap().used_blocks(), 2);
    assert_eq!(vol.bitmap().get(0), State::Used);
    assert_eq!(vol.bitmap().get(1), State::Used);

    vol.delete("a").unwrap();
    assert_eq!(vol.bitmap().used_blocks(), 0);
    assert!(vol.read("a").is_none());
}

#[test]
fn nested_file_scenario() {
    let mut vol = Volume::default();
    vol.create("dir1/f", "v").unwrap();

    match vol.tree().root().get("dir1") {
        Some(Node::Directory(children)) => assert!(matches!(children.get("f"), Some(Node::File(_)))),
        other => panic!("expected dir1 to be a directory, found {:?}", other),
    }
    let view = vol.read("dir1/f").unwrap();
    assert_eq!((view.length, view.content), (1, &b"v"[..]));
}

#[test]
fn filling_the_volume_exactly_then_overflowing() {
    let mut vol = Volume::new(10);
    vol.create("a", "12345").unwrap();
    vol.create("b", "67890").unwrap();
    assert_eq!(vol.free_blocks(), 0);

    let before = vol.bitmap().clone();
    assert!(vol.create("c", "!").is_err());
    assert_eq!(&before, vol.bitmap());
}

#[test]
fn fragmented_space_is_not_contiguous() {
    let mut vol = Volume::new(6);
    vol.create("a", "11").unwrap();
    vol.create("b", "22").unwrap();
    vol.create("c", "33").unwrap();
    vol.delete("a").unwrap();
    vol.delete("c").unwrap();

    // Four blocks are free, but in two runs of two.
    assert_eq!(vol.free_blocks(), 4);
    assert!(matches!(
        vol.create("d", "4444"),
        Err(SFSError::InsufficientSpace { requested: 4, free: 4 })
    ));
    vol.create("d", "44").unwrap();
    assert_eq!(vol.stat("d").unwrap().start, 0);
}

#[test]
fn random_operations_preserve_invariants() {
    let mut rng = StdRng::seed_from_u64(0x5346_5342);
    let mut vol = Volume::new(64);
    let paths = ["a", "b", "d/x", "d/y", "d/e/z", "f/g"];

    for _ in 0..2000 {
        let path = paths[rng.gen_range(0..paths.len())];
        let content = vec![b'.'; rng.gen_range(0..12)];
        match rng.gen_range(0..4) {
            0 => {
                let was_live = vol.read(path).is_some();
                let before = vol.clone();
                if vol.create(path, content.clone()).is_ok() {
                    assert!(!was_live);
                    assert_eq!(vol.read(path).unwrap().content, &content[..]);
                } else {
                    assert_eq!(vol, before);
                }
            }
            1 => {
                let was_live = vol.read(path).is_some();
                assert_eq!(vol.delete(path).is_ok(), was_live);
                assert!(vol.read(path).is_none());
            }
            2 => {
                let previous = vol.read(path).map(|v| v.content.to_vec());
                match vol.write(path, content.clone()) {
                    Ok(()) => assert_eq!(vol.read(path).unwrap().content, &content[..]),
                    Err(_) => assert_eq!(vol.read(path).map(|v| v.content.to_vec()), previous),
                }
            }
            _ => {
                if rng.gen_range(0..20) == 0 {
                    vol.reset();
                }
            }
        }
        assert_consistent(&vol);
    }
}

#[test]
fn volume_survives_save_and_load() {
    let mut vol = Volume::new(256);
    vol.create("docs/readme", "read me").unwrap();
    vol.create("docs/todo", "nothing").unwrap();
    vol.create("bin", "").unwrap();
    vol.delete("docs/todo").unwrap();

    let tf = NamedTempFile::new().unwrap();
    image::save(&vol, tf.path()).unwrap();

    let mut loaded = image::load(tf.path()).unwrap();
    assert_eq!(loaded, vol);
    assert_consistent(&loaded);

    // The loaded volume keeps working.
    loaded.write("docs/readme", "changed").unwrap();
    loaded.create("docs/todo", "again").unwrap();
    assert_consistent(&loaded);
}

#[test]
fn unformatted_file_is_rejected() {
    let tf = NamedTempFile::new().unwrap();
    assert!(matches!(
        image::load(tf.path()),
        Err(SFSError::CorruptImage(_))
    ));
}

#[test]
fn shared_volume_import_replaces_state() {
    let mut source = Volume::new(32);
    source.create("x/y", "123").unwrap();

    let shared = SharedVolume::from(Volume::new(32));
    shared.import_state(source.export_state()).unwrap();
    assert_eq!(shared.read("x/y"), Some(b"123".to_vec()));
    assert_eq!(shared.stat("x/y").unwrap().length, 3);
}

#[test]
fn image_with_flattened_tree_is_rejected() {
    let mut vol = Volume::new(16);
    vol.create("a/b", "xy").unwrap();

    let mut state = vol.export_state();
    state.tree = simplefs::tree::DirectoryTree::new();
    state.tree.insert(&["a/b"], "a/b".to_string());

    let tf = NamedTempFile::new().unwrap();
    std::fs::write(tf.path(), image::encode(&state).unwrap()).unwrap();
    assert!(matches!(
        image::load(tf.path()),
        Err(SFSError::CorruptState(_))
    ));
}
