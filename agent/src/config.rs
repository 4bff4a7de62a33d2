use anyhow::{Context, Result};

/// Runtime configuration, loaded once and passed into the pipeline at
/// construction. No module-level mutable state.
#[derive(Debug, Clone)]
pub struct Config {
    pub pplx_api_key: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub max_retries: u32,          // total invocation budget per entity
    pub confidence_threshold: f64, // below this, the report flags follow-up
    pub worker_pool: usize,        // concurrent per-holding runs
    pub deadline_secs: u64,        // overall run_all deadline (0 = disabled)
    pub dispatch_mode: String,     // "per-holding" or "portfolio"
    pub holdings_file: String,
    pub simulate_llm: bool, // canned responses, no API calls
    pub whatsapp_token: String,
    pub whatsapp_phone_id: String,
    pub whatsapp_api_url: String,
    pub whatsapp_template: String,
    pub whatsapp_language: String,
    pub whatsapp_recipient: String,
}

impl Config {
    /// Load config from a specific .env file, or the default `.env` if None.
    pub fn from_env_file(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => {
                dotenvy::from_filename(p).ok();
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::build_from_env()
    }

    #[allow(dead_code)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::build_from_env()
    }

    fn build_from_env() -> Result<Self> {
        Ok(Self {
            pplx_api_key: env("PPLX_API_KEY", ""),
            llm_model: env("LLM_MODEL", "sonar"),
            llm_temperature: env_f32("LLM_TEMPERATURE", "0.7")?,
            llm_max_tokens: env("LLM_MAX_TOKENS", "800").parse().unwrap_or(800),
            // "3" means one initial attempt plus two corrective retries
            max_retries: env("MAX_RETRIES", "3").parse::<u32>().unwrap_or(3).max(1),
            confidence_threshold: env_f64("CONFIDENCE_THRESHOLD", "0.5")?,
            worker_pool: env("WORKER_POOL", "5").parse::<usize>().unwrap_or(5).max(1),
            deadline_secs: env("DEADLINE_SECS", "0").parse().unwrap_or(0),
            dispatch_mode: env("DISPATCH_MODE", "per-holding"),
            holdings_file: env("HOLDINGS_FILE", "data/eod_holdings.json"),
            simulate_llm: env("SIMULATE_LLM", "false") == "true",
            whatsapp_token: env("WHATSAPP_TOKEN", ""),
            whatsapp_phone_id: env("WHATSAPP_PHONE_ID", ""),
            whatsapp_api_url: env("WHATSAPP_API_URL", "https://graph.facebook.com/v17.0"),
            whatsapp_template: env("WHATSAPP_TEMPLATE_NAME", ""),
            whatsapp_language: env("WHATSAPP_LANGUAGE_CODE", "en"),
            whatsapp_recipient: env("WHATSAPP_RECIPIENT", ""),
        })
    }
}

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f32(key: &str, default: &str) -> Result<f32> {
    let val = env(key, default);
    val.parse()
        .with_context(|| format!("Invalid float for {key}: {val}"))
}

fn env_f64(key: &str, default: &str) -> Result<f64> {
    let val = env(key, default);
    val.parse()
        .with_context(|| format!("Invalid float for {key}: {val}"))
}
