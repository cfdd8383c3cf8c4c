//! Safetensors loading and init-once model cells.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use once_cell::sync::OnceCell;
use safetensors::SafeTensors;
use tracing::{debug, info, warn};

/// A model loaded on first use, at most once.
///
/// The outcome of the first load is kept, so a missing or corrupt weights
/// file is reported on every call without touching the disk again.
pub struct LazyModel<T> {
    path: PathBuf,
    device: Device,
    build: fn(VarBuilder) -> Result<T>,
    cell: OnceCell<Result<T, String>>,
}

impl<T> LazyModel<T> {
    /// Creates a cell for the weights at `path`; nothing is read yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, device: Device, build: fn(VarBuilder) -> Result<T>) -> Self {
        Self {
            path: path.into(),
            device,
            build,
            cell: OnceCell::new(),
        }
    }

    /// Path of the weights file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the model, loading it on the first call.
    ///
    /// # Errors
    ///
    /// Returns the (cached) load error if the weights could not be read or
    /// do not fit the model.
    pub fn get(&self) -> Result<&T> {
        self.cell
            .get_or_init(|| {
                self.load().map_err(|e| {
                    warn!("Failed to load {}: {e:#}", self.path.display());
                    format!("{e:#}")
                })
            })
            .as_ref()
            .map_err(|e| anyhow!("{e}"))
    }

    /// True once the model loaded successfully.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    /// True once a load was attempted and failed.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        matches!(self.cell.get(), Some(Err(_)))
    }

    fn load(&self) -> Result<T> {
        info!("Loading model {}", self.path.display());
        let vb = load_safetensors(&self.path, &self.device)?;
        (self.build)(vb)
    }
}

/// Reads a safetensors file into a [`VarBuilder`] on `device`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid safetensors,
/// or holds a tensor of an unsupported dtype.
pub fn load_safetensors(path: impl AsRef<Path>, device: &Device) -> Result<VarBuilder<'static>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot read model weights {}", path.display()))?;
    let archive = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("Not a safetensors file: {}", path.display()))?;

    let tensors = archive
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            let dtype = candle_dtype(view.dtype())
                .with_context(|| format!("Tensor '{name}' has an unsupported dtype"))?;
            let tensor = Tensor::from_raw_buffer(view.data(), dtype, view.shape(), device)
                .with_context(|| format!("Invalid tensor '{name}'"))?;
            Ok((name, tensor))
        })
        .collect::<Result<HashMap<_, _>>>()?;

    debug!("Read {} tensors from {}", tensors.len(), path.display());
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}

fn candle_dtype(dtype: safetensors::Dtype) -> Result<DType> {
    use safetensors::Dtype as S;
    Ok(match dtype {
        S::F32 => DType::F32,
        S::F64 => DType::F64,
        S::F16 => DType::F16,
        S::BF16 => DType::BF16,
        S::I64 => DType::I64,
        S::U32 => DType::U32,
        S::U8 => DType::U8,
        other => anyhow::bail!("{other:?}"),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use safetensors::tensor::TensorView;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn weights_file() -> NamedTempFile {
        let values: Vec<f32> = vec![0.5, -1.0, 2.0, 4.0];
        let view = TensorView::new(safetensors::Dtype::F32, vec![2, 2], bytemuck::cast_slice(&values))
            .expect("tensor view");
        let bytes = safetensors::serialize(HashMap::from([("weight".to_string(), view)]), &None)
            .expect("serialize");

        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(&bytes).expect("write");
        file
    }

    #[allow(clippy::needless_pass_by_value)]
    fn build_weight(vb: VarBuilder) -> Result<Tensor> {
        Ok(vb.get((2, 2), "weight")?)
    }

    #[test]
    fn test_load_safetensors() {
        let file = weights_file();
        let vb = load_safetensors(file.path(), &Device::Cpu).expect("load");
        let weight = vb.get((2, 2), "weight").expect("weight");
        let values = weight.to_vec2::<f32>().expect("values");
        assert_eq!(values, vec![vec![0.5, -1.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn test_load_safetensors_missing_file() {
        assert!(load_safetensors("/nonexistent/model.safetensors", &Device::Cpu).is_err());
    }

    #[test]
    fn test_load_safetensors_garbage() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"not safetensors").expect("write");
        assert!(load_safetensors(file.path(), &Device::Cpu).is_err());
    }

    #[test]
    fn test_lazy_model_loads_once() {
        let file = weights_file();
        let model = LazyModel::new(file.path(), Device::Cpu, build_weight);
        assert!(!model.is_loaded());
        let first = model.get().expect("first load");
        assert_eq!(first.dims(), &[2, 2]);
        assert!(model.is_loaded());
        assert!(model.get().is_ok());
    }

    #[test]
    fn test_lazy_model_caches_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("late.safetensors");
        let model = LazyModel::new(&path, Device::Cpu, build_weight);
        assert!(model.get().is_err());
        assert!(model.has_failed());

        // Appearing later does not help; the first outcome sticks
        std::fs::copy(weights_file().path(), &path).expect("copy");
        assert!(model.get().is_err());
    }
}
