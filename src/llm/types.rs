use candle_transformers::generation::Sampling;
use serde::{Deserialize, Serialize};

/// Decoding settings applied to every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default = "default_do_sample")]
    pub do_sample: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: Option<usize>,
    /// Fixed RNG seed. `None` draws a fresh seed for every call.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            do_sample: default_do_sample(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            seed: None,
        }
    }
}

impl GenerationParams {
    pub fn sampling(&self) -> Sampling {
        if !self.do_sample || self.temperature <= 0.0 {
            return Sampling::ArgMax;
        }

        let temperature = self.temperature;
        let nucleus = self.top_p > 0.0 && self.top_p < 1.0;
        match (self.top_k, nucleus) {
            (Some(k), true) => Sampling::TopKThenTopP {
                k,
                p: self.top_p,
                temperature,
            },
            (Some(k), false) => Sampling::TopK { k, temperature },
            (None, true) => Sampling::TopP {
                p: self.top_p,
                temperature,
            },
            (None, false) => Sampling::All { temperature },
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

fn default_max_new_tokens() -> usize {
    150
}

fn default_do_sample() -> bool {
    true
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_top_k() -> Option<usize> {
    Some(50)
}
