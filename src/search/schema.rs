//! Search index schema definition / 搜索索引的 Schema 定义

use serde::{Deserialize, Serialize};

/// Article document - derived projection of a content revision / 文章文档
///
/// 不是独立实体：同一 (article_id, locale) 重新索引时整体取代旧条目。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDocument {
    /// Owning article ID / 所属文章ID
    pub article_id: String,
    /// Revision locale (normalized tag) / 修订语言
    pub locale: String,
    /// Revision title / 标题
    pub title: String,
    /// Revision body (markdown source) / 正文
    pub body: String,
}

impl ArticleDocument {
    pub fn new(article_id: &str, locale: &str, title: &str, body: &str) -> Self {
        Self {
            article_id: article_id.to_string(),
            locale: locale.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    /// Document key: one entry per (article, locale) / 文档键
    pub fn doc_key(&self) -> String {
        Self::make_doc_key(&self.article_id, &self.locale)
    }

    pub fn make_doc_key(article_id: &str, locale: &str) -> String {
        format!("{}:{}", article_id, locale)
    }
}

/// Search hit / 搜索命中
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub article_id: String,
    pub locale: String,
    /// Relevance score / 相关性分数
    pub score: f32,
}

/// Search query options / 搜索查询选项
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Phrase to match / 查询短语
    pub query: String,
    /// Restrict hits to this locale (None means all) / 限定语言
    pub locale: Option<String>,
    /// Match on base language instead of the exact tag / 按基础语言匹配
    pub base_language_match: bool,
    /// Maximum number of results to return / 最大返回结果数
    pub limit: usize,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            locale: None,
            base_language_match: false,
            limit: 50,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_base_language_match(mut self, enabled: bool) -> Self {
        self.base_language_match = enabled;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}
