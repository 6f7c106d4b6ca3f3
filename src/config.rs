// src/config.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::allergen::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_TEXT_LEN};

/// 目录地址环境变量（覆盖配置文件）
pub const ENV_CATALOG_URL: &str = "ALLERGEN_CATALOG_URL";
/// 目录 API Key 环境变量（覆盖配置文件）
pub const ENV_CATALOG_KEY: &str = "ALLERGEN_CATALOG_KEY";

// ============================================================================
// 过敏原目录配置
// ============================================================================

/// 过敏原目录（远程记录库）配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// 记录库地址（如 https://xyz.supabase.co）
    #[serde(default)]
    pub base_url: String,
    /// API Key
    #[serde(default)]
    pub api_key: String,
    /// 过敏原表名
    #[serde(default = "default_catalog_table")]
    pub table: String,
}

fn default_catalog_table() -> String {
    "allergens".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            table: default_catalog_table(),
        }
    }
}

impl CatalogConfig {
    /// 是否已配置记录库地址
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}

// ============================================================================
// 高亮配置
// ============================================================================

/// 过敏原高亮配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// 词条缓存有效期（秒），默认 300
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// 目录拉取超时（秒），默认 6
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// 可高亮的最大文本长度（字节）
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_max_text_len() -> usize {
    DEFAULT_MAX_TEXT_LEN
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_text_len: default_max_text_len(),
        }
    }
}

impl HighlightConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// 拉取超时，至少 1 秒
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?;
        let app_dir = config_dir.join("AllergenHighlight");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("config.json"))
    }

    /// 加载配置并应用环境变量覆盖
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from_path(&path)?;
        config.apply_env_overrides(
            std::env::var(ENV_CATALOG_URL).ok(),
            std::env::var(ENV_CATALOG_KEY).ok(),
        );
        Ok(config)
    }

    pub(crate) fn load_from_path(path: &Path) -> Result<Self> {
        tracing::info!("尝试从以下路径加载配置: {:?}", path);

        if !path.exists() {
            tracing::warn!("配置文件不存在，使用默认配置");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: HighlightConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("解析配置失败 {:?}: {}", path, e))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, base_url: Option<String>, api_key: Option<String>) {
        if let Some(url) = base_url.filter(|v| !v.trim().is_empty()) {
            tracing::info!("使用环境变量 {} 覆盖目录地址", ENV_CATALOG_URL);
            self.catalog.base_url = url.trim().to_string();
        }
        if let Some(key) = api_key.filter(|v| !v.trim().is_empty()) {
            self.catalog.api_key = key.trim().to_string();
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to_path(&path)
    }

    pub(crate) fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tracing::info!("保存配置到: {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // 原子写入：先写临时文件，再替换
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content).map_err(|e| {
            tracing::error!("写入临时文件失败: {}", e);
            e
        })?;

        if let Err(e) = std::fs::rename(&temp_path, path) {
            tracing::error!("重命名临时文件失败: {}", e);
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }
}
