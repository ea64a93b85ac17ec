use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Resolves a named resource to a byte stream.
pub trait ResourceLoader: Send + Sync {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Looks resources up as files below a root directory.
#[derive(Debug, Clone)]
pub struct FileResourceLoader {
    root: PathBuf,
}

impl FileResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("resource name `{name}` leaves the resource root"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceLoader for FileResourceLoader {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let path = self.resolve(name)?;
        tracing::debug!(path = %path.display(), "opening composition resource");
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_opens_files_below_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("anim.json")).unwrap();
        file.write_all(b"{}").unwrap();

        let loader = FileResourceLoader::new(dir.path());
        let mut contents = String::new();
        loader.open("anim.json").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "{}");

        let missing = loader.open("missing.json").err().map(|e| e.kind());
        assert_eq!(missing, Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn test_rejects_names_outside_root() {
        let loader = FileResourceLoader::new("/srv/anims");
        for name in ["../secret.json", "/etc/passwd"] {
            let err = loader.open(name).err().map(|e| e.kind());
            assert_eq!(err, Some(io::ErrorKind::InvalidInput), "{name}");
        }
    }
}
