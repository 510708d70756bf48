use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub is_dir: bool,
}

/// Read access to group directories.
pub trait FileSystem: Send + Sync {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<FileInfo>>;
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// [`FileSystem`] backed by the local disk.
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            out.push(FileInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_dir_sorted_with_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.service"), "b").unwrap();
        std::fs::write(dir.path().join("a.service"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let infos = RealFileSystem.read_dir(dir.path()).unwrap();
        let names: Vec<_> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a.service", "b.service", "sub"]);
        assert!(infos[2].is_dir);
        assert_eq!(RealFileSystem.read_file(&dir.path().join("a.service")).unwrap(), b"a");
    }
}
