use super::{GenerationParams, TextGenerator};
use crate::{
    Error, Result,
    config::{DevicePreference, ModelConfig},
};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::{
    generation::LogitsProcessor,
    models::qwen2::{Config as Qwen2Config, ModelForCausalLM},
};
use hf_hub::{Repo, RepoType, api::tokio::ApiBuilder};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Instant,
};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SINGLE_WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Local paths of everything needed to build the model.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

impl ModelFiles {
    pub async fn resolve(config: &ModelConfig) -> Result<Self> {
        match &config.local_path {
            Some(dir) => Self::from_dir(dir).await,
            None => Self::from_hub(config).await,
        }
    }

    pub async fn from_dir(dir: &Path) -> Result<Self> {
        let index_path = dir.join(WEIGHTS_INDEX_FILE);
        let weights = if tokio::fs::try_exists(&index_path).await? {
            let index = read_index(&index_path).await?;
            shard_files(&index)?
                .into_iter()
                .map(|file| dir.join(file))
                .collect()
        } else {
            vec![dir.join(SINGLE_WEIGHTS_FILE)]
        };

        Ok(Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights,
        })
    }

    async fn from_hub(config: &ModelConfig) -> Result<Self> {
        let token = config
            .hf_token
            .clone()
            .or_else(|| std::env::var("HF_TOKEN").ok());
        let api = ApiBuilder::new()
            .with_progress(false)
            .with_token(token)
            .build()?;
        let repo = api.repo(Repo::with_revision(
            config.model_id.clone(),
            RepoType::Model,
            config.revision.clone(),
        ));

        info!(
            "Fetching model {} (revision {}) from the hub",
            config.model_id, config.revision
        );

        let config_path = repo.get(CONFIG_FILE).await?;
        let tokenizer = repo.get(TOKENIZER_FILE).await?;

        // Small models ship one weights file, larger ones an index of shards.
        let listing = repo.info().await?;
        let filenames: Vec<&str> = listing
            .siblings
            .iter()
            .map(|sibling| sibling.rfilename.as_str())
            .collect();

        let weights = if has_weight_index(&filenames) {
            let index = read_index(&repo.get(WEIGHTS_INDEX_FILE).await?).await?;
            let mut weights = Vec::new();
            for file in shard_files(&index)? {
                weights.push(repo.get(&file).await?);
            }
            weights
        } else {
            debug!("No weight index in repository, using {}", SINGLE_WEIGHTS_FILE);
            vec![repo.get(SINGLE_WEIGHTS_FILE).await?]
        };

        Ok(Self {
            config: config_path,
            tokenizer,
            weights,
        })
    }
}

async fn read_index(path: &Path) -> Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn has_weight_index(filenames: &[&str]) -> bool {
    filenames.contains(&WEIGHTS_INDEX_FILE)
}

/// Unique shard file names listed in a safetensors index, in sorted order.
pub fn shard_files(index: &serde_json::Value) -> Result<Vec<String>> {
    let weight_map = index
        .get("weight_map")
        .and_then(|map| map.as_object())
        .ok_or_else(|| Error::model("Weight index has no weight_map object"))?;

    let files: BTreeSet<String> = weight_map
        .values()
        .filter_map(|file| file.as_str())
        .map(str::to_string)
        .collect();

    if files.is_empty() {
        return Err(Error::model("Weight index lists no files"));
    }
    Ok(files.into_iter().collect())
}

pub fn select_device(preference: DevicePreference) -> Result<Device> {
    match preference {
        DevicePreference::Auto => Ok(Device::cuda_if_available(0)?),
        DevicePreference::Cpu => Ok(Device::Cpu),
    }
}

/// Half precision on accelerators, full precision on CPU.
pub fn select_dtype(device: &Device) -> DType {
    if device.is_cuda() {
        DType::F16
    } else {
        DType::F32
    }
}

pub fn stop_token_ids(tokenizer: &Tokenizer, names: &[String]) -> Vec<u32> {
    names
        .iter()
        .filter_map(|name| tokenizer.token_to_id(name))
        .collect()
}

struct Engine {
    model: ModelForCausalLM,
    tokenizer: Tokenizer,
    device: Device,
    stop_tokens: Vec<u32>,
}

impl Engine {
    fn load(files: &ModelFiles, device: Device, stop_names: &[String]) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| Error::tokenizer(format!("Failed to load tokenizer: {}", e)))?;

        let model_config: Qwen2Config = serde_json::from_slice(&std::fs::read(&files.config)?)?;
        let dtype = select_dtype(&device);

        debug!(
            "Loading {} weight file(s) as {:?} on {:?}",
            files.weights.len(),
            dtype,
            device
        );

        // SAFETY: the weight files are not modified while the process runs.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, dtype, &device)? };
        let model = ModelForCausalLM::new(&model_config, vb)?;

        let stop_tokens = stop_token_ids(&tokenizer, stop_names);
        if stop_tokens.is_empty() {
            warn!("None of the stop tokens {:?} exist in the vocabulary", stop_names);
        }

        Ok(Self {
            model,
            tokenizer,
            device,
            stop_tokens,
        })
    }

    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let tokens = self.generate_tokens(prompt, params)?;

        self.tokenizer
            .decode(&tokens.ids, true)
            .map_err(|e| Error::tokenizer(format!("Failed to decode output: {}", e)))
    }

    fn generate_tokens(&mut self, prompt: &str, params: &GenerationParams) -> Result<TokenRun> {
        self.model.clear_kv_cache();

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| Error::tokenizer(format!("Failed to encode prompt: {}", e)))?;
        let mut tokens = encoding.get_ids().to_vec();
        if tokens.is_empty() {
            return Err(Error::generation("Prompt encoded to zero tokens"));
        }

        let prompt_tokens = tokens.len();
        let mut logits_processor = LogitsProcessor::from_sampling(params.seed(), params.sampling());
        let started = Instant::now();

        for index in 0..params.max_new_tokens {
            // The first pass fills the KV cache with the prompt, later passes feed one token.
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let start_pos = tokens.len().saturating_sub(context_size);
            let input = Tensor::new(&tokens[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, start_pos)?;
            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;

            let next_token = logits_processor.sample(&logits)?;
            tokens.push(next_token);

            if self.stop_tokens.contains(&next_token) {
                break;
            }
        }

        let run = TokenRun {
            ids: tokens,
            prompt_len: prompt_tokens,
        };

        debug!(
            prompt_tokens,
            generated_tokens = run.generated_len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );

        Ok(run)
    }
}

/// Prompt ids followed by the sampled ids.
#[derive(Debug)]
struct TokenRun {
    ids: Vec<u32>,
    prompt_len: usize,
}

impl TokenRun {
    fn generated_len(&self) -> usize {
        self.ids.len() - self.prompt_len
    }
}

/// Qwen2 causal LM running in-process on candle.
///
/// The forward pass mutates the KV cache, so calls are serialized and run on
/// the blocking thread pool.
pub struct CandleGenerator {
    engine: Arc<Mutex<Engine>>,
}

impl CandleGenerator {
    pub async fn load(config: &ModelConfig) -> Result<Self> {
        let files = ModelFiles::resolve(config).await?;
        let device = select_device(config.device)?;
        let stop_names = config.stop_tokens.clone();

        let started = Instant::now();
        let engine = tokio::task::spawn_blocking(move || Engine::load(&files, device, &stop_names))
            .await
            .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))??;

        info!(
            "Model {} loaded in {:.1}s",
            config.model_id,
            started.elapsed().as_secs_f32()
        );

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
        })
    }
}

#[async_trait]
impl TextGenerator for CandleGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let engine = Arc::clone(&self.engine);
        let prompt = prompt.to_owned();
        let params = params.clone();

        tokio::task::spawn_blocking(move || {
            let mut engine = engine
                .lock()
                .map_err(|_| Error::generation("Model state poisoned by an earlier panic"))?;
            engine.generate(&prompt, &params)
        })
        .await
        .map_err(|e| Error::generation(format!("Generation task failed: {}", e)))?
    }
}
