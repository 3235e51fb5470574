//! Deterministic stand-ins for the model backends

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use candle_core::{Device, Tensor};
use tempfile::TempDir;

use sdkwork_voiceclone::engine::{
    ConverterCheckpoint, ConverterLoader, ModelRegistry, SpeakerEmbeddingExtractor,
    ToneColorConverter, TtsModel, TtsModelLoader,
};
use sdkwork_voiceclone::inference::{PipelineSettings, ScratchPolicy, SynthesisPipeline};
use sdkwork_voiceclone::voice::{
    EmbeddingFormat, EmbeddingResolver, Language, LanguageCode, SpeakerId, SpeakerTable,
};

/// Value filling every source embedding in the store
pub const SOURCE_VALUE: f32 = 1.0;
/// Value filling every extracted target embedding
pub const TARGET_VALUE: f32 = 2.0;
pub const EMBEDDING_SHAPE: (usize, usize, usize) = (1, 256, 1);

fn first_value(tensor: &Tensor) -> f32 {
    tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap()[0]
}

/// One recorded conversion call
#[derive(Debug, Clone)]
pub struct ConvertCall {
    pub source_audio: PathBuf,
    pub source_value: f32,
    pub target_value: f32,
    pub output: PathBuf,
    pub watermark: String,
}

pub struct MockConverter {
    device: Device,
    pub fail: bool,
    pub calls: Mutex<Vec<ConvertCall>>,
}

impl ToneColorConverter for MockConverter {
    fn version(&self) -> &str {
        "v2"
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn convert(
        &self,
        source_audio: &Path,
        source: &Tensor,
        target: &Tensor,
        output: &Path,
        watermark: &str,
    ) -> anyhow::Result<PathBuf> {
        self.calls.lock().unwrap().push(ConvertCall {
            source_audio: source_audio.to_path_buf(),
            source_value: first_value(source),
            target_value: first_value(target),
            output: output.to_path_buf(),
            watermark: watermark.to_string(),
        });
        if self.fail {
            anyhow::bail!("decoder produced NaN");
        }
        let base = std::fs::read(source_audio)?;
        std::fs::write(output, [b"converted:".as_slice(), base.as_slice()].concat())?;
        Ok(output.to_path_buf())
    }
}

pub struct MockConverterLoader {
    pub converter: Arc<MockConverter>,
}

impl ConverterLoader for MockConverterLoader {
    fn load(&self, _: &ConverterCheckpoint, _: &Device) -> anyhow::Result<Arc<dyn ToneColorConverter>> {
        let converter: Arc<dyn ToneColorConverter> = self.converter.clone();
        Ok(converter)
    }
}

/// One recorded synthesis call
#[derive(Debug, Clone)]
pub struct SynthesizeCall {
    pub language: LanguageCode,
    pub text: String,
    pub speaker: SpeakerId,
    pub speed: f32,
    pub output: PathBuf,
}

pub struct MockTtsModel {
    language: LanguageCode,
    speakers: SpeakerTable,
    fail: bool,
    calls: Arc<Mutex<Vec<SynthesizeCall>>>,
}

impl TtsModel for MockTtsModel {
    fn language(&self) -> LanguageCode {
        self.language
    }

    fn speakers(&self) -> &SpeakerTable {
        &self.speakers
    }

    fn synthesize(&self, text: &str, speaker: SpeakerId, speed: f32, output: &Path) -> anyhow::Result<PathBuf> {
        self.calls.lock().unwrap().push(SynthesizeCall {
            language: self.language,
            text: text.to_string(),
            speaker,
            speed,
            output: output.to_path_buf(),
        });
        if self.fail {
            anyhow::bail!("text frontend rejected input");
        }
        std::fs::write(output, text.as_bytes())?;
        Ok(output.to_path_buf())
    }
}

/// Speaker table each mock model exposes, in model order
pub fn speaker_table(language: LanguageCode) -> SpeakerTable {
    match language {
        LanguageCode::En => [("EN-US", 0), ("EN-BR", 1), ("EN_INDIA", 2), ("EN-AU", 3), ("EN-Default", 4)]
            .into_iter()
            .collect(),
        other => [(other.as_str(), 0)].into_iter().collect(),
    }
}

#[derive(Default)]
pub struct MockTtsLoader {
    pub loads: Mutex<HashMap<LanguageCode, usize>>,
    pub fail_languages: HashSet<LanguageCode>,
    pub fail_synthesis: bool,
    pub empty_speakers: bool,
    pub delay: Option<Duration>,
    pub synth_calls: Arc<Mutex<Vec<SynthesizeCall>>>,
}

impl MockTtsLoader {
    pub fn load_count(&self, language: LanguageCode) -> usize {
        self.loads.lock().unwrap().get(&language).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().unwrap().values().sum()
    }
}

impl TtsModelLoader for MockTtsLoader {
    fn load(&self, language: LanguageCode, _: &Device) -> anyhow::Result<Arc<dyn TtsModel>> {
        *self.loads.lock().unwrap().entry(language).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_languages.contains(&language) {
            anyhow::bail!("MeloTTS weights for {} not found", language);
        }
        let speakers = if self.empty_speakers {
            SpeakerTable::new()
        } else {
            speaker_table(language)
        };
        Ok(Arc::new(MockTtsModel {
            language,
            speakers,
            fail: self.fail_synthesis,
            calls: Arc::clone(&self.synth_calls),
        }))
    }
}

#[derive(Default)]
pub struct MockExtractor {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl SpeakerEmbeddingExtractor for MockExtractor {
    fn extract(&self, _: &Path, _: &dyn ToneColorConverter, cache_dir: &Path, use_vad: bool) -> anyhow::Result<Tensor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(use_vad, "extraction must run with voice activity detection");
        assert!(!cache_dir.as_os_str().is_empty());
        if self.fail {
            anyhow::bail!("no speech detected after VAD");
        }
        Ok(Tensor::full(TARGET_VALUE, EMBEDDING_SHAPE, &Device::Cpu)?)
    }
}

/// Knobs for building a [`Harness`]
#[derive(Default)]
pub struct HarnessOptions {
    pub tts: MockTtsLoader,
    pub extractor: MockExtractor,
    pub converter_fails: bool,
    pub skip_checkpoint: bool,
    pub scratch_policy: ScratchPolicy,
    pub strict_languages: bool,
    pub stage_timeout: Option<Duration>,
}

/// Temp installation plus pipeline wired to mock models
pub struct Harness {
    pub dir: TempDir,
    pub output_dir: PathBuf,
    pub store_dir: PathBuf,
    pub reference: PathBuf,
    pub converter: Arc<MockConverter>,
    pub tts: Arc<MockTtsLoader>,
    pub extractor: Arc<MockExtractor>,
    pub registry: Arc<ModelRegistry>,
    pub pipeline: SynthesisPipeline,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_dir = dir.path().join("checkpoints_v2/converter");
        let store_dir = dir.path().join("checkpoints_v2/base_speakers/ses");
        let output_dir = dir.path().join("outputs_v2");
        let reference = dir.path().join("resources/demo_speaker0.mp3");

        std::fs::create_dir_all(&checkpoint_dir).unwrap();
        std::fs::create_dir_all(&store_dir).unwrap();
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::create_dir_all(reference.parent().unwrap()).unwrap();
        std::fs::write(&reference, b"reference audio").unwrap();

        if !options.skip_checkpoint {
            std::fs::write(checkpoint_dir.join("config.json"), r#"{"_version_": "v2"}"#).unwrap();
            std::fs::write(checkpoint_dir.join("checkpoint.pth"), b"weights").unwrap();
        }

        for key in ["en-us", "en-br", "en-india", "en-au", "en-default", "es", "fr", "zh", "jp", "kr"] {
            write_source_embedding(&store_dir, key);
        }

        let converter = Arc::new(MockConverter {
            device: Device::Cpu,
            fail: options.converter_fails,
            calls: Mutex::new(Vec::new()),
        });
        let tts = Arc::new(options.tts);
        let extractor = Arc::new(options.extractor);

        let registry = Arc::new(ModelRegistry::new(
            Device::Cpu,
            Arc::new(MockConverterLoader {
                converter: Arc::clone(&converter),
            }),
            tts.clone(),
        ));
        // degraded registries are part of what is under test
        let _ = registry.load_converter(&checkpoint_dir);

        let resolver = EmbeddingResolver::new(extractor.clone(), &store_dir, EmbeddingFormat::Pth);
        let settings = PipelineSettings {
            output_dir: output_dir.clone(),
            extraction_cache_dir: dir.path().join("processed"),
            scratch_policy: options.scratch_policy,
            default_language: Language::EnglishAmerican,
            strict_languages: options.strict_languages,
            stage_timeout: options.stage_timeout,
        };
        let pipeline = SynthesisPipeline::new(Arc::clone(&registry), resolver, settings);

        Self {
            dir,
            output_dir,
            store_dir,
            reference,
            converter,
            tts,
            extractor,
            registry,
            pipeline,
        }
    }

    pub fn convert_calls(&self) -> Vec<ConvertCall> {
        self.converter.calls.lock().unwrap().clone()
    }

    pub fn synth_calls(&self) -> Vec<SynthesizeCall> {
        self.tts.synth_calls.lock().unwrap().clone()
    }

    pub fn extract_calls(&self) -> usize {
        self.extractor.calls.load(Ordering::SeqCst)
    }

    /// Total model invocations of any kind
    pub fn model_calls(&self) -> usize {
        self.tts.total_loads() + self.extract_calls() + self.synth_calls().len() + self.convert_calls().len()
    }
}

/// Store file in the layout shipped with the converter checkpoints: a bare
/// `torch.save(tensor)` archive
pub fn write_source_embedding(store_dir: &Path, key: &str) {
    let tensor = Tensor::full(SOURCE_VALUE, EMBEDDING_SHAPE, &Device::Cpu).unwrap();
    write_torch_tensor(&store_dir.join(format!("{}.pth", key)), &tensor, None);
}

/// Write an f32 tensor as a PyTorch zip archive (`archive/data.pkl` plus
/// `archive/data/0`). With `dict_key` the pickle root is `{dict_key: tensor}`,
/// otherwise the tensor itself.
pub fn write_torch_tensor(path: &Path, tensor: &Tensor, dict_key: Option<&str>) {
    let values = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let dims = tensor.dims().to_vec();
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }

    let mut pkl = vec![0x80, 0x02];
    if let Some(key) = dict_key {
        pkl.extend_from_slice(b"}(");
        pickle_unicode(&mut pkl, key);
    }
    pickle_global(&mut pkl, "torch._utils", "_rebuild_tensor_v2");
    pkl.extend_from_slice(b"((");
    pickle_unicode(&mut pkl, "storage");
    pickle_global(&mut pkl, "torch", "FloatStorage");
    pickle_unicode(&mut pkl, "0");
    pickle_unicode(&mut pkl, "cpu");
    pickle_int(&mut pkl, values.len());
    pkl.extend_from_slice(b"tQ");
    pickle_int(&mut pkl, 0);
    pickle_tuple(&mut pkl, &dims);
    pickle_tuple(&mut pkl, &strides);
    pkl.push(0x89);
    pickle_global(&mut pkl, "collections", "OrderedDict");
    pkl.extend_from_slice(b")RtR");
    if dict_key.is_some() {
        pkl.push(b'u');
    }
    pkl.push(b'.');

    let storage: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let archive = path.file_stem().unwrap().to_string_lossy().to_string();

    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    writer.start_file(format!("{}/data.pkl", archive), options).unwrap();
    writer.write_all(&pkl).unwrap();
    writer.start_file(format!("{}/data/0", archive), options).unwrap();
    writer.write_all(&storage).unwrap();
    writer.finish().unwrap();
}

fn pickle_global(out: &mut Vec<u8>, module: &str, name: &str) {
    out.push(b'c');
    out.extend_from_slice(format!("{}\n{}\n", module, name).as_bytes());
}

fn pickle_unicode(out: &mut Vec<u8>, value: &str) {
    out.push(b'X');
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn pickle_int(out: &mut Vec<u8>, value: usize) {
    out.push(b'J');
    out.extend_from_slice(&(value as i32).to_le_bytes());
}

fn pickle_tuple(out: &mut Vec<u8>, values: &[usize]) {
    out.push(b'(');
    for &value in values {
        pickle_int(out, value);
    }
    out.push(b't');
}
