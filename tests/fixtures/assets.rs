// Code generated by bundlefs. DO NOT EDIT.

#[allow(dead_code)]
pub mod assets {
    use bundlefs::{EmbeddedFs, FileSystem, ManifestEntry, ResourceInfo, ResourceWriter};
    use std::io::{self, Read};

    pub const DIGEST: &str = "77d7c09b447a498ebd1e06c21233987067360551c55fc8791995af40fa973edf";

    const ARCHIVE: &[u8] = b"\
        \x01\x02\x00\xfd\xffhi\x01\x03\x00\xfc\xffbye";

    const MANIFEST: &[ManifestEntry<'static>] = &[
        ManifestEntry::file("a.txt", 0, 7, 2, 0o644, 1700000000),
        ManifestEntry::dir("empty", 0o755, 1700000000),
        ManifestEntry::file("sub/b.txt", 7, 8, 3, 0o644, 1700000000),
    ];

    pub struct Resources {
        fs: EmbeddedFs<'static>,
    }

    impl Resources {
        pub fn manifest(&self) -> &'static [ManifestEntry<'static>] {
            self.fs.manifest()
        }
    }

    pub static RESOURCES: Resources = Resources {
        fs: EmbeddedFs::new(ARCHIVE, MANIFEST),
    };

    impl FileSystem for Resources {
        fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
            self.fs.open(path)
        }

        fn stat(&self, path: &str) -> io::Result<ResourceInfo> {
            self.fs.stat(path)
        }

        fn read_dir(&self, path: &str) -> io::Result<Vec<ResourceInfo>> {
            self.fs.read_dir(path)
        }

        fn create(&self, path: &str) -> io::Result<Box<dyn ResourceWriter + '_>> {
            self.fs.create(path)
        }
    }
}
