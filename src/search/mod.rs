//! Search module - NRT full-text primitives / 搜索模块
//!
//! 架构原则 / Architecture principles:
//! - 搜索模块只暴露原语操作：index / delete / refresh / query
//! - 流程（何时索引、何时重建、超时策略）由 manager 控制
//! - 调用方向：manager → search（单向）
//!
//! 一致性特性 / Consistency:
//! - 写入先进待刷新队列，refresh 之后才对查询可见（近实时）
//! - 查询跑在不可变快照上，永远不会看到半个写入
//! - 唯一允许做索引 I/O 的组件，主存储从不直接碰索引

pub mod engine;
pub mod schema;
pub mod tokenizer;

pub use engine::{IndexStats, SearchEngine};
pub use schema::{ArticleDocument, SearchHit, SearchOptions};

use std::sync::Arc;
use std::time::Duration;

/// Pluggable full-text index contract / 可插拔全文索引契约
///
/// 不规定打分公式，只要求：同一快照下结果确定、分数降序、
/// 同分按 article_id 升序。
pub trait FullTextIndex: Send + Sync {
    /// 暂存一次文档写入，对同一 (article, locale) 幂等
    fn index(&self, doc: ArticleDocument);
    /// 暂存一次文档删除
    fn delete_document(&self, article_id: &str, locale: &str);
    /// 让暂存写入对后续查询可见
    fn refresh(&self) -> Result<(), String>;
    /// 对最近快照做短语查询
    fn query(&self, options: &SearchOptions) -> Vec<SearchHit>;
    /// 最近一次成功 refresh 的时间戳（毫秒）
    fn last_refresh_time(&self) -> Option<i64>;
    /// 清空索引
    fn clear(&self);
}

impl FullTextIndex for SearchEngine {
    fn index(&self, doc: ArticleDocument) {
        SearchEngine::index(self, doc)
    }

    fn delete_document(&self, article_id: &str, locale: &str) {
        SearchEngine::delete_document(self, article_id, locale)
    }

    fn refresh(&self) -> Result<(), String> {
        SearchEngine::refresh(self)
    }

    fn query(&self, options: &SearchOptions) -> Vec<SearchHit> {
        SearchEngine::query(self, options)
    }

    fn last_refresh_time(&self) -> Option<i64> {
        SearchEngine::last_refresh_time(self)
    }

    fn clear(&self) {
        SearchEngine::clear(self)
    }
}

/// 后台周期 refresh，近实时可见性的兜底节拍
pub fn spawn_refresh_loop(
    index: Arc<dyn FullTextIndex>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = index.refresh() {
                tracing::warn!("Periodic index refresh failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_loop_makes_writes_visible() {
        let engine = Arc::new(SearchEngine::new());
        let handle = spawn_refresh_loop(engine.clone(), Duration::from_millis(10));

        engine.index(ArticleDocument::new("a1", "en", "Hello", "background world"));

        // 留出几个刷新周期
        tokio::time::sleep(Duration::from_millis(100)).await;

        let hits = engine.query(&SearchOptions::new("background").with_locale("en"));
        assert_eq!(hits.len(), 1);
        assert!(engine.last_refresh_time().is_some());

        handle.abort();
    }
}
