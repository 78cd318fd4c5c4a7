use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_BACKGROUND_COLOR: &str = "808080";

/// Secret credential passed explicitly into the outbound clients.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        ApiKey(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct BackgroundRemovalConfig {
    pub api_key: ApiKey,
    pub endpoint: String,
    /// Six-digit hex colour without the leading `#`.
    pub background_color: String,
}

/// House style the assessment is measured against.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposurePreferences {
    pub target_iso: u32,
    pub baseline_aperture: String,
    pub fixed_shutter: String,
    pub flash: bool,
    pub max_sentences: usize,
}

impl Default for ExposurePreferences {
    fn default() -> Self {
        ExposurePreferences {
            target_iso: 400,
            baseline_aperture: "f/8".to_string(),
            fixed_shutter: "1/125".to_string(),
            flash: true,
            max_sentences: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceImage {
    pub url: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReferenceImagesFile {
    references: Vec<ReferenceImage>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub openai: OpenAiConfig,
    pub background_removal: Option<BackgroundRemovalConfig>,
    pub reference_images_path: Option<PathBuf>,
    pub reference_images: Vec<ReferenceImage>,
    pub preferences: ExposurePreferences,
}

type VarLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_bool(vars: VarLookup, name: &str, default: bool) -> bool {
    vars(name)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(vars: VarLookup, name: &str, default: &str) -> String {
    vars(name).unwrap_or_else(|| default.to_string())
}

fn env_u64(vars: VarLookup, name: &str, default: u64) -> u64 {
    vars(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(vars: VarLookup, name: &str, default: u32) -> u32 {
    vars(name)
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_usize(vars: VarLookup, name: &str, default: usize) -> usize {
    vars(name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_background_color(value: String) -> String {
    let trimmed = value.trim().trim_start_matches('#').to_lowercase();
    let expanded = if trimmed.len() == 3 {
        trimmed.chars().flat_map(|c| [c, c]).collect::<String>()
    } else {
        trimmed
    };

    if expanded.len() == 6 && expanded.chars().all(|c| c.is_ascii_hexdigit()) {
        return expanded;
    }

    warn!(
        "Invalid BACKGROUND_COLOR value '{}'; defaulting to {}.",
        value, DEFAULT_BACKGROUND_COLOR
    );
    DEFAULT_BACKGROUND_COLOR.to_string()
}

fn resolve_reference_images_path(vars: VarLookup) -> Option<PathBuf> {
    if let Some(value) = vars("REFERENCE_IMAGES_PATH").filter(|v| !v.trim().is_empty()) {
        let path = PathBuf::from(value.trim());
        if path.is_absolute() {
            return Some(path);
        }
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        return Some(cwd.join(path));
    }

    let default_path = PathBuf::from("reference_images.json");
    if default_path.exists() {
        return Some(default_path);
    }
    None
}

fn is_usable_reference_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "https" || url.scheme() == "http" => true,
        Ok(url) => {
            warn!(
                "Skipping reference image with unsupported scheme '{}': {}",
                url.scheme(),
                raw
            );
            false
        }
        Err(err) => {
            warn!("Skipping invalid reference image URL '{}': {}", raw, err);
            false
        }
    }
}

fn load_reference_images_from_path(path: &Path) -> Vec<ReferenceImage> {
    if !path.exists() {
        info!("Reference image config not found at {}", path.display());
        return Vec::new();
    }

    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read reference image config at {}: {}",
                path.display(),
                err
            );
            return Vec::new();
        }
    };

    let parsed: ReferenceImagesFile = match serde_json::from_str(&raw) {
        Ok(data) => data,
        Err(err) => {
            warn!(
                "Failed to parse reference image config at {}: {}",
                path.display(),
                err
            );
            return Vec::new();
        }
    };

    parsed
        .references
        .into_iter()
        .filter_map(|entry| {
            let url = entry.url.trim().to_string();
            if url.is_empty() || !is_usable_reference_url(&url) {
                return None;
            }
            let note = entry
                .note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty());
            Some(ReferenceImage { url, note })
        })
        .collect()
}

fn load_reference_images_from_csv(value: &str) -> Vec<ReferenceImage> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty() && is_usable_reference_url(entry))
        .map(|entry| ReferenceImage {
            url: entry.to_string(),
            note: None,
        })
        .collect()
}

fn build_reference_images(path: Option<&Path>, csv: &str) -> Vec<ReferenceImage> {
    if let Some(path) = path {
        let references = load_reference_images_from_path(path);
        if !references.is_empty() {
            info!(
                "Loaded {} reference image(s) from {}",
                references.len(),
                path.display()
            );
            return references;
        }
    }

    let references = load_reference_images_from_csv(csv);
    if references.is_empty() {
        info!("No reference images configured; assessments will use the test shot only");
    } else {
        info!(
            "Using {} reference image(s) from REFERENCE_IMAGE_URLS",
            references.len()
        );
    }
    references
}

fn build_background_removal(vars: VarLookup) -> Result<Option<BackgroundRemovalConfig>> {
    if !env_bool(vars, "ENABLE_BACKGROUND_REMOVAL", false) {
        return Ok(None);
    }

    let api_key = env_string(vars, "REMOVE_BG_API_KEY", "");
    if api_key.trim().is_empty() {
        return Err(anyhow!(
            "REMOVE_BG_API_KEY is required when ENABLE_BACKGROUND_REMOVAL=true"
        ));
    }

    Ok(Some(BackgroundRemovalConfig {
        api_key: ApiKey::new(api_key.trim()),
        endpoint: env_string(
            vars,
            "REMOVE_BG_ENDPOINT",
            "https://api.remove.bg/v1.0/removebg",
        ),
        background_color: normalize_background_color(env_string(
            vars,
            "BACKGROUND_COLOR",
            DEFAULT_BACKGROUND_COLOR,
        )),
    }))
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars: VarLookup = &lookup;

        let openai_api_key = env_string(vars, "OPENAI_API_KEY", "");
        if openai_api_key.trim().is_empty() {
            return Err(anyhow!("OPENAI_API_KEY is required"));
        }

        let port = vars("PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| anyhow!("Invalid PORT value: {value}"))
            })
            .transpose()?
            .unwrap_or(10000);

        let scratch_dir = vars("SCRATCH_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(|value| PathBuf::from(value.trim()))
            .unwrap_or_else(env::temp_dir);

        let reference_images_path = resolve_reference_images_path(vars);
        let reference_images = build_reference_images(
            reference_images_path.as_deref(),
            &env_string(vars, "REFERENCE_IMAGE_URLS", ""),
        );

        let defaults = ExposurePreferences::default();
        let preferences = ExposurePreferences {
            target_iso: env_u32(vars, "TARGET_ISO", defaults.target_iso),
            baseline_aperture: env_string(vars, "BASELINE_APERTURE", &defaults.baseline_aperture),
            fixed_shutter: env_string(vars, "FIXED_SHUTTER", &defaults.fixed_shutter),
            flash: env_bool(vars, "FLASH_ENABLED", defaults.flash),
            max_sentences: env_usize(vars, "MAX_SUGGESTION_SENTENCES", defaults.max_sentences)
                .max(1),
        };

        Ok(Config {
            server: ServerConfig {
                host: env_string(vars, "HOST", "0.0.0.0"),
                port,
                max_upload_bytes: env_usize(vars, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            },
            log_level: env_string(vars, "LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string(vars, "LOG_DIR", "logs")),
            scratch_dir,
            http_timeout_secs: env_u64(vars, "HTTP_TIMEOUT_SECONDS", 60),
            openai: OpenAiConfig {
                api_key: ApiKey::new(openai_api_key.trim()),
                base_url: env_string(vars, "OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: env_string(vars, "OPENAI_MODEL", "gpt-4-turbo"),
                max_tokens: env_u32(vars, "OPENAI_MAX_TOKENS", 200).max(1),
            },
            background_removal: build_background_removal(vars)?,
            reference_images_path,
            reference_images,
            preferences,
        })
    }
}

pub const EVALUATION_PROMPT: &str = "This is a photo taken in a photo booth setup. The camera settings are: {metadata}. You are an AI exposure assistant helping a photo booth technician. {flash_sentence} Please evaluate the image based on exposure and lighting. Our usual baseline is ISO {target_iso} at {baseline_aperture}. Assume shutter speed is fixed at {fixed_shutter} and should only be changed as a last resort.";

pub const REFERENCE_PROMPT: &str = "The first {count} image(s) are reference shots showing the exposure and look we want. Compare the test shot (the last image) against them.";

pub const PREVIOUS_SETTINGS_PROMPT: &str = "The previous test shot used these settings: {previous_settings}. Take into account whether the change since then moved the exposure in the right direction.";

pub const FORMAT_PROMPT: &str = "Start your reply with a single status emoji: ✅ if the exposure is good as is, ⚠️ if a small adjustment is needed, ❌ if a large adjustment is needed. If adjustments are needed, prioritize changing the aperture (Av) first, then ISO. Change the shutter speed only as a last resort. Return a short, clear suggestion using plain language ({max_sentences} sentence(s) at most), no technical jargon or camera theory. Be concise.";
