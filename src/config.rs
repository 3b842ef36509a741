use crate::error::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const API_KEY_ENV: &str = "FIELD_CAPTURE_API_KEY";
const BASE_URL_ENV: &str = "FIELD_CAPTURE_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub timeout_seconds: u64,
    /// JPEG圧縮品質 (0-100)
    pub jpeg_quality: u8,
    /// 長辺の最大ピクセル数
    pub max_image_size: u32,
    /// 読み取り系リクエストの最大試行回数
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            api_key_header: "X-API-Key".into(),
            timeout_seconds: 30,
            jpeg_quality: 70,
            max_image_size: 1600,
            retry_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CaptureError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("field-capture").join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key.clone().ok_or(CaptureError::MissingApiKey)
    }

    /// 接続先URL（末尾の / は除去）
    ///
    /// 優先順: コマンドライン指定 → 環境変数 → 設定ファイル
    pub fn get_base_url(&self, flag: Option<&str>) -> Result<String> {
        let url = match flag {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => match std::env::var(BASE_URL_ENV) {
                Ok(url) if !url.trim().is_empty() => url,
                _ => self.base_url.clone().ok_or(CaptureError::MissingBaseUrl)?,
            },
        };
        Ok(url.trim().trim_end_matches('/').to_string())
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_base_url(&mut self, url: String) -> Result<()> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CaptureError::Config(format!(
                "URLは http:// または https:// で始めてください: {}",
                url
            )));
        }
        self.base_url = Some(url);
        self.save()
    }
}
