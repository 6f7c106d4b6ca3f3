// 过敏原目录 HTTP 客户端
//
// 从远程记录库（PostgREST 风格接口）拉取全部过敏原类别，
// 响应体大小受限，非 2xx、编码错误、JSON 格式错误均返回 Err

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;

use crate::allergen::{AllergenCatalog, AllergenCatalogEntry};
use crate::config::CatalogConfig;

pub const REQUEST_TIMEOUT_SECS: u64 = 6;
pub const MAX_CATALOG_BYTES: usize = 2 * 1024 * 1024;
const SELECT_COLUMNS: &str = "id,name,official_terms,common_examples";

/// 基于 HTTP 的过敏原目录
#[derive(Clone)]
pub struct HttpAllergenCatalog {
    config: CatalogConfig,
    client: Client,
}

impl HttpAllergenCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        if !config.is_configured() {
            anyhow::bail!("过敏原目录地址未配置");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(3))
            .build()?;

        Ok(Self { config, client })
    }

    /// 全量查询地址，按类别 ID 升序
    pub fn query_url(&self) -> String {
        build_query_url(&self.config)
    }
}

#[async_trait]
impl AllergenCatalog for HttpAllergenCatalog {
    async fn fetch_all(&self) -> Result<Vec<AllergenCatalogEntry>> {
        let url = self.query_url();

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if !self.config.api_key.is_empty() {
            request = request
                .header("apikey", &self.config.api_key)
                .header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("过敏原目录请求失败 ({}): {}", status, truncate_for_log(&text));
        }

        let body = read_catalog_body(response).await?;
        let entries = parse_catalog(&body)?;
        tracing::debug!("过敏原目录返回 {} 个类别: {}", entries.len(), url);
        Ok(entries)
    }
}

pub(crate) fn build_query_url(config: &CatalogConfig) -> String {
    format!(
        "{}/rest/v1/{}?select={}&order=id.asc",
        config.base_url.trim().trim_end_matches('/'),
        config.table.trim(),
        SELECT_COLUMNS
    )
}

/// 解析目录 JSON，并按类别 ID 排序
pub(crate) fn parse_catalog(body: &str) -> Result<Vec<AllergenCatalogEntry>> {
    let mut entries: Vec<AllergenCatalogEntry> = serde_json::from_str(body)
        .map_err(|err| anyhow::anyhow!("过敏原目录格式不可解析: {}", err))?;
    entries.sort_by_key(|entry| entry.id);
    Ok(entries)
}

/// 读取目录响应体
///
/// 声明长度和实际累积长度都不得超过 [`MAX_CATALOG_BYTES`]
async fn read_catalog_body(response: reqwest::Response) -> Result<String> {
    let mut body = CatalogBody::new(response.content_length(), MAX_CATALOG_BYTES)?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.push(&chunk?)?;
    }
    body.into_text()
}

/// 有上限的响应体缓冲
struct CatalogBody {
    bytes: Vec<u8>,
    limit: usize,
}

impl CatalogBody {
    fn new(declared_len: Option<u64>, limit: usize) -> Result<Self> {
        let declared = declared_len.unwrap_or(0);
        if declared > limit as u64 {
            anyhow::bail!("过敏原目录声明 {} 字节，超过上限 {}", declared, limit);
        }
        Ok(Self {
            bytes: Vec::with_capacity(declared as usize),
            limit,
        })
    }

    /// 追加一块数据；超限时缓冲保持不变
    fn push(&mut self, chunk: &[u8]) -> Result<()> {
        let total = self.bytes.len().saturating_add(chunk.len());
        if total > self.limit {
            anyhow::bail!("过敏原目录超过 {} 字节上限", self.limit);
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    fn into_text(self) -> Result<String> {
        String::from_utf8(self.bytes)
            .map_err(|err| anyhow::anyhow!("过敏原目录编码不合法: {}", err))
    }
}

fn truncate_for_log(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
