//! Model download and cache adapter.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use profile_qa_core::ClassifierConfig;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Name of the face detector model.
pub const BLAZEFACE: &str = "blazeface";
/// Name of the expression classifier model.
pub const EXPRESSION: &str = "expression";

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Filename in the models directory and under the download base URL.
    pub filename: &'static str,
    /// What the model does.
    pub description: &'static str,
}

/// Models the expression classifier needs.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: BLAZEFACE,
        filename: "blazeface.safetensors",
        description: "BlazeFace front-camera face detector",
    },
    ModelInfo {
        name: EXPRESSION,
        filename: "expression.safetensors",
        description: "five-class facial expression CNN",
    },
];

/// Download progress callback: `(model name, bytes so far, total bytes if known)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Returns the default models directory.
///
/// Uses `XDG_DATA_HOME/profile-qa/models` or `~/.local/share/profile-qa/models`.
#[must_use]
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("profile-qa")
        .join("models")
}

/// A directory holding model weights.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(default_models_dir())
    }
}

impl ModelStore {
    /// Store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The models directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a known model, whether or not it is installed.
    #[must_use]
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        MODELS
            .iter()
            .find(|m| m.name == name)
            .map(|m| self.dir.join(m.filename))
    }

    /// Every known model with its installation status.
    #[must_use]
    pub fn list(&self) -> Vec<(&'static ModelInfo, bool)> {
        MODELS
            .iter()
            .map(|m| (m, self.dir.join(m.filename).is_file()))
            .collect()
    }

    /// True if every known model is present.
    #[must_use]
    pub fn all_installed(&self) -> bool {
        self.list().iter().all(|(_, installed)| *installed)
    }

    /// Classifier configuration pointing at this store's files.
    #[must_use]
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            detector_path: self.path(BLAZEFACE),
            expression_path: self.path(EXPRESSION),
            ..ClassifierConfig::default()
        }
    }

    /// Downloads every missing model from `base_url`.
    ///
    /// `checksums` maps model names to expected lowercase hex SHA-256
    /// digests; models without an entry are not verified. Returns the paths
    /// that were downloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, a download
    /// fails, or a checksum does not match. A failed download leaves no
    /// partial file behind.
    pub fn fetch(
        &self,
        base_url: &str,
        checksums: &HashMap<String, String>,
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create models directory {}", self.dir.display())
        })?;

        let mut downloaded = Vec::new();
        for model in MODELS {
            let path = self.dir.join(model.filename);
            if path.is_file() {
                debug!("Model {} already installed", model.name);
                continue;
            }
            let url = format!("{}/{}", base_url.trim_end_matches('/'), model.filename);
            let expected = checksums.get(model.name).map(String::as_str);
            download(model.name, &url, &path, expected, progress)?;
            downloaded.push(path);
        }
        Ok(downloaded)
    }
}

/// Streams `url` into `dest`, hashing on the way.
fn download(
    name: &str,
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    info!("Downloading model {name} from {url}");

    let mut response =
        reqwest::blocking::get(url).with_context(|| format!("Failed to download {name}"))?;
    if !response.status().is_success() {
        bail!("Download of {name} failed with status {}", response.status());
    }
    let total = response.content_length();

    let partial = dest.with_extension("part");
    let result = (|| -> Result<String> {
        let mut out = BufWriter::new(
            File::create(&partial)
                .with_context(|| format!("Failed to create {}", partial.display()))?,
        );
        let mut hasher = Sha256::new();
        let mut chunk = vec![0u8; 64 * 1024];
        let mut written = 0u64;
        loop {
            let n = response
                .read(&mut chunk)
                .with_context(|| format!("Failed to read response for {name}"))?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
            out.write_all(&chunk[..n])
                .with_context(|| format!("Failed to write {}", partial.display()))?;
            written += n as u64;
            if let Some(cb) = progress {
                cb(name, written, total);
            }
        }
        out.flush()?;
        Ok(format!("{:x}", hasher.finalize()))
    })();

    let digest = match result {
        Ok(digest) => digest,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };

    if let Some(expected) = expected_sha256 {
        if !digest.eq_ignore_ascii_case(expected) {
            let _ = fs::remove_file(&partial);
            bail!("Checksum mismatch for {name}: expected {expected}, got {digest}");
        }
    } else {
        debug!("No checksum configured for {name}, sha256 {digest}");
    }

    fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move {name} into place at {}", dest.display()))?;
    info!("Installed {name} at {}", dest.display());
    Ok(())
}

/// Lowercase hex SHA-256 of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        assert!(default_models_dir().ends_with("profile-qa/models"));
    }

    #[test]
    fn test_model_path() {
        let store = ModelStore::new("/models");
        assert_eq!(
            store.path(BLAZEFACE),
            Some(PathBuf::from("/models/blazeface.safetensors"))
        );
        assert!(store.path("unknown").is_none());
    }

    #[test]
    fn test_list_and_installed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(!store.all_installed());

        fs::write(dir.path().join("blazeface.safetensors"), b"x").unwrap();
        let list = store.list();
        assert_eq!(list.len(), 2);
        assert!(list[0].1);
        assert!(!list[1].1);

        fs::write(dir.path().join("expression.safetensors"), b"x").unwrap();
        assert!(store.all_installed());
    }

    #[test]
    fn test_classifier_config_points_into_store() {
        let config = ModelStore::new("/m").classifier_config();
        assert_eq!(
            config.expression_path,
            Some(PathBuf::from("/m/expression.safetensors"))
        );
        assert!((config.min_face_confidence - 0.75).abs() < f32::EPSILON);
    }

    /// Serves `body` with `status` to every request until the test ends.
    fn serve(status: &'static str, body: &'static [u8]) -> String {
        use std::io::{BufRead, BufReader};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).is_ok_and(|n| n > 2) {
                    line.clear();
                }
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(body);
            }
        });
        format!("http://{addr}/weights/")
    }

    #[test]
    fn test_fetch_downloads_missing_models() {
        let base = serve("200 OK", b"weights");
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));

        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = calls.clone();
        let progress: ProgressCallback = Box::new(move |_, done, total| {
            assert!(total.is_none_or(|t| done <= t));
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let checksums = HashMap::from([(
            BLAZEFACE.to_string(),
            "7f3fb5b7f5a7a1d5cb5a1ab2a5c0fb1c3a0bd3e1f1bc4a5f0ba0fd6e8e8ab0e8".to_string(),
        )]);
        // Wrong checksum for the detector aborts before anything is installed
        let err = store.fetch(&base, &checksums, Some(&progress)).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
        assert!(!store.path(BLAZEFACE).unwrap().exists());
        assert!(!dir.path().join("models/blazeface.part").exists());

        let checksums = HashMap::from([(
            BLAZEFACE.to_string(),
            sha256_of(b"weights"),
        )]);
        let downloaded = store.fetch(&base, &checksums, Some(&progress)).unwrap();
        assert_eq!(downloaded.len(), 2);
        assert!(store.all_installed());
        assert_eq!(fs::read(store.path(EXPRESSION).unwrap()).unwrap(), b"weights");
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) >= 2);

        // Nothing left to download
        assert!(store.fetch(&base, &HashMap::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_reports_http_errors() {
        let base = serve("404 Not Found", b"");
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let err = store.fetch(&base, &HashMap::new(), None).unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(!store.all_installed());
    }

    fn sha256_of(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
