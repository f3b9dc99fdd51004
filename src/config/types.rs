use crate::llm::GenerationParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    /// Directory with `config.json`, `tokenizer.json` and safetensors weights.
    /// When set, the hub is never contacted.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub device: DevicePreference,
    #[serde(default)]
    pub hf_token: Option<String>,
    #[serde(default = "default_stop_tokens")]
    pub stop_tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePreference {
    /// First CUDA device when available, CPU otherwise.
    #[default]
    Auto,
    Cpu,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogsConfig::default(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            revision: default_revision(),
            local_path: None,
            device: DevicePreference::default(),
            hf_token: None,
            stop_tokens: default_stop_tokens(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5050
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model_id() -> String {
    "Qwen/Qwen2-1.5B".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_stop_tokens() -> Vec<String> {
    vec!["<|endoftext|>".to_string(), "<|im_end|>".to_string()]
}
