// 目录测试工具 - 拉取过敏原目录并高亮标准输入的每一行
use anyhow::Result;
use std::io::BufRead;
use std::sync::Arc;

use allergen_highlight::{AllergenHighlighter, HighlightConfig, HttpAllergenCatalog, Run};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("=== 过敏原目录测试工具 ===\n");

    // 1. 加载配置
    let config = HighlightConfig::load()?;
    if !config.catalog.is_configured() {
        anyhow::bail!(
            "目录地址未配置，请设置 {} 或编辑 {:?}",
            allergen_highlight::config::ENV_CATALOG_URL,
            HighlightConfig::config_path()?
        );
    }

    // 2. 拉取目录
    let catalog = HttpAllergenCatalog::new(config.catalog.clone())?;
    println!("正在请求: {}", catalog.query_url());

    let highlighter = AllergenHighlighter::from_config(&config, Arc::new(catalog));
    let lookup = highlighter.cache().lookup().await;
    println!(
        "✓ 词条来源: {:?}, 共 {} 个词条\n",
        lookup.source,
        lookup.terms.len()
    );
    if lookup.source.is_degraded() {
        println!("⚠ 目录不可用，使用降级词表\n");
    }

    // 3. 逐行高亮
    println!("请输入配料文本（每行一条，Ctrl+D 结束）:");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let runs = highlighter.highlight(&line).await;
        println!("{}", render(&runs));
    }

    Ok(())
}

/// 过敏原片段用 [] 包围
fn render(runs: &[Run]) -> String {
    runs.iter()
        .map(|run| {
            if run.is_allergen {
                format!("[{}]", run.text)
            } else {
                run.text.clone()
            }
        })
        .collect()
}
