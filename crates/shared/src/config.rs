use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_OUTPUT_NAME: &str = "Generated_Snippets.html";

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent key means every enrichment step runs its local fallback
    pub anthropic_api_key: Option<String>,
    pub model: String,
    pub staging_dir: PathBuf,
    pub output_path: PathBuf,
    pub transcript_languages: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let anthropic_api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let model = env::var("SNIPPET_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let staging_dir = match env::var("SNIPPET_STAGING_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => Self::default_staging_dir()?,
        };

        let output_path = match env::var("SNIPPET_OUTPUT") {
            Ok(path) => PathBuf::from(path),
            Err(_) => env::current_dir()
                .context("Could not determine current directory")?
                .join(DEFAULT_OUTPUT_NAME),
        };

        let transcript_languages = env::var("SNIPPET_TRANSCRIPT_LANGS")
            .map(|langs| parse_languages(&langs))
            .unwrap_or_default();

        Ok(Self {
            anthropic_api_key,
            model,
            staging_dir,
            output_path,
            transcript_languages: if transcript_languages.is_empty() {
                vec!["en".to_string()]
            } else {
                transcript_languages
            },
        })
    }

    /// `~/Downloads/temp`, falling back to the home directory
    fn default_staging_dir() -> Result<PathBuf> {
        let base = dirs::download_dir()
            .or_else(dirs::home_dir)
            .context(
                "Could not determine a Downloads directory.\n\n\
                Set SNIPPET_STAGING_DIR to a writable directory, for example in \
                ~/.config/snippet-agent/.env",
            )?;
        Ok(base.join("temp"))
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/snippet-agent/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("snippet-agent").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn parse_languages(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|lang| lang.trim().to_lowercase())
        .filter(|lang| !lang.is_empty())
        .collect()
}
