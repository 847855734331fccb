//! The generated module compiles against the runtime and behaves like the
//! directory it was built from.
//!
//! `fixtures/assets.rs` holds two stored-deflate entries (`a.txt`,
//! `sub/b.txt`) and one empty directory, laid out exactly as the generator
//! renders them.

use bundlefs::compose::GeneratorConfig;
use bundlefs::compress::{Archive, Manifest, ManifestRecord};
use bundlefs::{Composer, FileSystem, Generator, ResourceInfo};
use std::io;

include!("fixtures/assets.rs");

const MODIFIED: u64 = 1_700_000_000;

fn fixture_archive() -> Archive {
    let mut data = vec![0x01, 0x02, 0x00, 0xfd, 0xff];
    data.extend_from_slice(b"hi");
    data.extend_from_slice(&[0x01, 0x03, 0x00, 0xfc, 0xff]);
    data.extend_from_slice(b"bye");

    let record = |path: &str, offset, compressed_len, info| ManifestRecord {
        path: path.to_string(),
        offset,
        compressed_len,
        info,
    };
    Archive {
        data,
        manifest: Manifest {
            entries: vec![
                record("a.txt", 0, 7, ResourceInfo::file("a.txt", 2, 0o644, MODIFIED)),
                record("empty", 7, 0, ResourceInfo::dir("empty", 0o755, MODIFIED)),
                record("sub/b.txt", 7, 8, ResourceInfo::file("b.txt", 3, 0o644, MODIFIED)),
            ],
        },
        digest: assets::DIGEST.to_string(),
    }
}

#[test]
fn generator_renders_the_fixture() {
    let generator = Generator::new(GeneratorConfig {
        package: "assets".to_string(),
        include_docs: false,
    })
    .unwrap();
    let rendered = generator.compose(&fixture_archive()).unwrap().render().unwrap();
    assert_eq!(rendered, include_str!("fixtures/assets.rs"));
}

#[test]
fn reads_embedded_files() {
    assert_eq!(assets::RESOURCES.read("a.txt").unwrap(), b"hi");
    assert_eq!(assets::RESOURCES.read("sub/b.txt").unwrap(), b"bye");
    assert_eq!(assets::RESOURCES.read("./sub/b.txt").unwrap(), b"bye");
}

#[test]
fn lists_directories_in_name_order() {
    let names: Vec<String> = assets::RESOURCES
        .read_dir("")
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, vec!["a.txt", "empty", "sub"]);
    assert!(assets::RESOURCES.read_dir("empty").unwrap().is_empty());
}

#[test]
fn stat_reports_recorded_metadata() {
    let info = assets::RESOURCES.stat("sub/b.txt").unwrap();
    assert_eq!(info.name, "b.txt");
    assert_eq!(info.size, 3);
    assert_eq!(info.mode, 0o644);
    assert_eq!(info.modified, MODIFIED);
    assert!(!info.is_dir);

    assert!(assets::RESOURCES.stat("sub").unwrap().is_dir);
    assert!(assets::RESOURCES.stat("").unwrap().is_dir);
}

#[test]
fn missing_paths_are_not_found() {
    let err = assets::RESOURCES.stat("nope.txt").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}

#[test]
fn embedded_resources_are_read_only() {
    let err = assets::RESOURCES.create("new.txt").err().unwrap();
    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
}

#[test]
fn manifest_is_exposed() {
    let paths: Vec<&str> = assets::RESOURCES.manifest().iter().map(|e| e.path).collect();
    assert_eq!(paths, vec!["a.txt", "empty", "sub/b.txt"]);
}
