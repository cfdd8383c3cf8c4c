//! Filesystem adapter for reading photo bytes.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use profile_qa_core::{ByteSource, ImageBuffer};
use tracing::{debug, warn};

/// Extensions picked up when scanning directories.
const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// Bytes read from a file that exceeds the read limit.
pub const HEADER_PREFIX: u64 = 256 * 1024;

/// Filesystem byte source.
///
/// Photo ids are file paths. Directories are scanned for raster extensions,
/// in sorted order; explicitly named files are taken as they are, since the
/// format is detected from content, not from the name.
pub struct FsByteSource {
    paths: Vec<PathBuf>,
    recursive: bool,
    read_limit: Option<u64>,
}

impl FsByteSource {
    /// Creates a source over files and directories.
    #[must_use]
    pub const fn new(paths: Vec<PathBuf>, recursive: bool) -> Self {
        Self {
            paths,
            recursive,
            read_limit: None,
        }
    }

    /// Reads only a header prefix of files larger than `bytes`.
    ///
    /// The full file size is still declared on the buffer, so oversized
    /// files fail validation without being loaded into memory.
    #[must_use]
    pub fn with_read_limit(mut self, bytes: u64) -> Self {
        self.read_limit = Some(bytes);
        self
    }

    /// Collects all candidate files from the configured paths.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in &self.paths {
            if path.is_file() {
                files.push(path.clone());
            } else if path.is_dir() {
                self.collect_from_dir(path, &mut files);
            } else {
                warn!("Path does not exist: {}", path.display());
            }
        }
        files
    }

    fn collect_from_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(e) => {
                warn!("Failed to read directory {}: {e}", dir.display());
                return;
            }
        };
        entries.sort();

        for path in entries {
            if path.is_file() {
                if is_raster_image(&path) {
                    files.push(path);
                } else {
                    debug!("Skipping non-image file {}", path.display());
                }
            } else if path.is_dir() && self.recursive {
                self.collect_from_dir(&path, files);
            }
        }
    }
}

impl ByteSource for FsByteSource {
    fn photo_ids(&self) -> Vec<String> {
        let files = self.files();
        debug!("Found {} image files", files.len());
        files
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    fn fetch(&self, photo_id: &str) -> Result<ImageBuffer> {
        read_buffer(Path::new(photo_id), self.read_limit)
    }
}

/// Checks if a path has a raster image extension.
fn is_raster_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| RASTER_EXTENSIONS.contains(&e.as_str()))
}

/// Reads a file into an [`ImageBuffer`] carrying the file size as declared length.
fn read_buffer(path: &Path, read_limit: Option<u64>) -> Result<ImageBuffer> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let size = file
        .metadata()
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let mut bytes = Vec::new();
    if read_limit.is_some_and(|limit| size > limit) {
        debug!(
            "{} is {size} bytes, reading header only",
            path.display()
        );
        file.take(HEADER_PREFIX)
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    } else {
        file.read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    Ok(ImageBuffer::new(bytes).with_declared_len(size))
}
