//! Resource loading.
//!
//! Property files and mapper documents are fetched through a [`ResourceLoader`], so the
//! resolver never touches the filesystem directly.

use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::{Properties, parse_properties};
use crate::types::{TypeDescriptor, TypeKind};
use std::path::{Path, PathBuf};
use url::Url;

/// Loads resources by relative path or by URL.
pub trait ResourceLoader: Send + Sync {
    /// Read a resource addressed by a path relative to the loader's root.
    fn load_as_bytes(&self, resource: &str) -> SqlMapResult<Vec<u8>>;

    /// Read a resource addressed by URL.
    fn load_url_as_bytes(&self, url: &str) -> SqlMapResult<Vec<u8>>;

    fn load_as_properties(&self, resource: &str) -> SqlMapResult<Properties> {
        let bytes = self.load_as_bytes(resource)?;
        decode_properties(resource, &bytes)
    }

    fn load_url_as_properties(&self, url: &str) -> SqlMapResult<Properties> {
        let bytes = self.load_url_as_bytes(url)?;
        decode_properties(url, &bytes)
    }
}

fn decode_properties(name: &str, bytes: &[u8]) -> SqlMapResult<Properties> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| SqlMapError::resource(name, format!("not valid UTF-8: {}", e)))?;
    Ok(parse_properties(text))
}

/// Filesystem loader rooted at a directory; URLs must use the `file` scheme.
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

    fn read(name: &str, path: &Path) -> SqlMapResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| SqlMapError::resource(name, e.to_string()))
    }
}

impl Default for FileResourceLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load_as_bytes(&self, resource: &str) -> SqlMapResult<Vec<u8>> {
        let relative = resource.trim_start_matches('/');
        Self::read(resource, &self.root.join(relative))
    }

    fn load_url_as_bytes(&self, url: &str) -> SqlMapResult<Vec<u8>> {
        let parsed = Url::parse(url).map_err(|e| SqlMapError::resource(url, e.to_string()))?;
        if parsed.scheme() != "file" {
            return Err(SqlMapError::resource(
                url,
                format!("unsupported URL scheme '{}'", parsed.scheme()),
            ));
        }
        let path = parsed
            .to_file_path()
            .map_err(|_| SqlMapError::resource(url, "URL does not name a local file"))?;
        Self::read(url, &path)
    }
}

/// Virtual filesystem selection backed by [`FileResourceLoader`].
///
/// Custom implementations registered in the type catalog may be selected with the `vfsImpl`
/// setting; the configuration records the choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVfs;

impl DefaultVfs {
    pub const TYPE_NAME: &'static str = "sqlsession::io::DefaultVfs";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::Vfs)
    }
}
