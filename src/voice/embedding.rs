//! Speaker embeddings
//!
//! Embeddings are opaque tensors produced by the tone color converter. Each one
//! carries where it came from so that source and target can never be swapped
//! silently on the way into conversion.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use candle_core::pickle::{Object, Stack};
use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

/// Where an embedding came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingProvenance {
    /// Precomputed base-speaker embedding loaded from the store
    Source { speaker_key: String },
    /// Extracted from a user-supplied reference clip
    Target { reference: PathBuf },
}

impl EmbeddingProvenance {
    pub fn is_source(&self) -> bool {
        matches!(self, EmbeddingProvenance::Source { .. })
    }

    pub fn is_target(&self) -> bool {
        matches!(self, EmbeddingProvenance::Target { .. })
    }
}

/// Speaker embedding bound to a device
#[derive(Debug, Clone)]
pub struct Embedding {
    tensor: Tensor,
    provenance: EmbeddingProvenance,
    model_version: String,
}

impl Embedding {
    pub fn source(tensor: Tensor, speaker_key: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self {
            tensor,
            provenance: EmbeddingProvenance::Source {
                speaker_key: speaker_key.into(),
            },
            model_version: model_version.into(),
        }
    }

    pub fn target(tensor: Tensor, reference: impl Into<PathBuf>, model_version: impl Into<String>) -> Self {
        Self {
            tensor,
            provenance: EmbeddingProvenance::Target {
                reference: reference.into(),
            },
            model_version: model_version.into(),
        }
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn provenance(&self) -> &EmbeddingProvenance {
        &self.provenance
    }

    pub fn device(&self) -> &Device {
        self.tensor.device()
    }

    /// Converter version the embedding belongs to
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn dims(&self) -> &[usize] {
        self.tensor.dims()
    }

    /// Whether the two embeddings can be fed to the same conversion call
    pub fn is_compatible_with(&self, other: &Embedding) -> bool {
        self.model_version == other.model_version && self.tensor.dims() == other.tensor.dims()
    }
}

/// On-disk format of the precomputed embedding store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingFormat {
    /// PyTorch pickle, as shipped with the converter checkpoints
    #[default]
    Pth,
    Safetensors,
}

impl EmbeddingFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            EmbeddingFormat::Pth => "pth",
            EmbeddingFormat::Safetensors => "safetensors",
        }
    }

    /// Path of the embedding file for an already normalized key
    pub fn file_path(&self, store_dir: &Path, normalized_key: &str) -> PathBuf {
        store_dir.join(format!("{}.{}", normalized_key, self.extension()))
    }

    /// Decode an embedding tensor from `path` onto `device`.
    ///
    /// A file holding several tensors uses the one named `se`, otherwise the first.
    pub fn read_tensor(&self, path: &Path, device: &Device) -> candle_core::Result<Tensor> {
        let mut tensors: Vec<(String, Tensor)> = match self {
            EmbeddingFormat::Pth => {
                let tensors = candle_core::pickle::read_all(path)?;
                if tensors.is_empty() {
                    vec![("se".to_string(), read_bare_pth(path)?)]
                } else {
                    tensors
                }
            }
            EmbeddingFormat::Safetensors => {
                candle_core::safetensors::load(path, &Device::Cpu)?.into_iter().collect()
            }
        };
        tensors.sort_by(|a, b| a.0.cmp(&b.0));

        let index = tensors
            .iter()
            .position(|(name, _)| name == "se")
            .unwrap_or(0);
        if tensors.is_empty() {
            candle_core::bail!("no tensor found in {}", path.display());
        }
        let (_, tensor) = tensors.swap_remove(index);
        tensor.to_device(device)
    }
}

/// Read a `.pth` archive whose pickle root is a single tensor, as written by
/// `torch.save(tensor)`. `pickle::read_all` only lists dict roots.
fn read_bare_pth(path: &Path) -> candle_core::Result<Tensor> {
    let file = BufReader::new(std::fs::File::open(path)?);
    let mut archive = zip::ZipArchive::new(file).map_err(candle_core::Error::wrap)?;

    let pkl_name = archive
        .file_names()
        .find(|name| name.ends_with("data.pkl"))
        .map(str::to_string)
        .ok_or_else(|| candle_core::Error::msg(format!("no data.pkl in {}", path.display())))?;
    let dir_name = PathBuf::from(pkl_name.trim_end_matches(".pkl"));

    let root = {
        let entry = archive.by_name(&pkl_name).map_err(candle_core::Error::wrap)?;
        let mut stack = Stack::empty();
        stack.read_loop(&mut BufReader::new(entry))?;
        stack.finalize()?
    };
    let info = match root.into_tensor_info(Object::Unicode("se".to_string()), &dir_name)? {
        Some(info) => info,
        None => candle_core::bail!("no tensor found in {}", path.display()),
    };
    if !info.layout.is_contiguous() {
        candle_core::bail!("non-contiguous embedding in {}", path.display());
    }

    let mut storage = Vec::new();
    archive
        .by_name(&info.path)
        .map_err(candle_core::Error::wrap)?
        .read_to_end(&mut storage)?;

    // start_offset is in bytes
    let start = info.layout.start_offset();
    let end = start + info.layout.shape().elem_count() * info.dtype.size_in_bytes();
    let bytes = match storage.get(start..end) {
        Some(bytes) => bytes,
        None => candle_core::bail!("truncated tensor storage {} in {}", info.path, path.display()),
    };
    Tensor::from_raw_buffer(bytes, info.dtype, info.layout.dims(), &Device::Cpu)
}
