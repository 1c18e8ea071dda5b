//! Content manager - store + index orchestration / 内容管理器
//!
//! 写路径是"先提交、后入队"的两段式：主存储事务提交成功之后，
//! 才把文档追加进搜索索引的待刷新队列。两边没有分布式事务，
//! 接受的代价是可见性滞后（最多一个刷新周期），换来的保证是
//! 搜索永远不会出现未提交过的幻影文章。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::error::RepoError;
use crate::locale;
use crate::models::{ArticleSummary, CommentView, ResolvedArticle};
use crate::search::{ArticleDocument, FullTextIndex, SearchHit, SearchOptions};
use crate::store::PrimaryStore;

/// 管理器行为开关（从配置落下来，测试里直接构造）
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// search() 等待 refresh 的上限，超时用旧快照
    pub refresh_timeout_ms: u64,
    pub max_results: usize,
    /// 搜索是否应用语言回退链（默认精确匹配）
    pub locale_fallback: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            refresh_timeout_ms: 2000,
            max_results: 50,
            locale_fallback: false,
        }
    }
}

impl ManagerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            refresh_timeout_ms: config.search.refresh_timeout_ms,
            max_results: config.search.max_results,
            locale_fallback: config.search.locale_fallback,
        }
    }
}

/// Content manager / 内容管理器
///
/// 唯一允许同时写主存储和搜索索引的组件。
pub struct ContentManager {
    store: PrimaryStore,
    index: Arc<dyn FullTextIndex>,
    settings: ManagerSettings,
}

impl ContentManager {
    pub fn new(store: PrimaryStore, index: Arc<dyn FullTextIndex>) -> Self {
        Self::with_settings(store, index, ManagerSettings::default())
    }

    pub fn with_settings(
        store: PrimaryStore,
        index: Arc<dyn FullTextIndex>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            store,
            index,
            settings,
        }
    }

    pub fn store(&self) -> &PrimaryStore {
        &self.store
    }

    /// 发布文章：找到或创建文章，追加一条修订
    ///
    /// 返回成功即主存储已持久化；搜索可见性要等下一次 refresh。
    pub async fn publish_article(
        &self,
        url_name: &str,
        locale: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RepoError> {
        let locale = locale::normalize(locale);

        let mut tx = self.store.begin().await?;
        let article = match tx.find_article_by_url_name(url_name).await? {
            Some(article) => article,
            None => tx.create_article(url_name, &locale).await?,
        };
        tx.create_revision(
            &article.id,
            &locale,
            title,
            body,
            Utc::now().timestamp_millis(),
        )
        .await?;
        tx.commit().await?;

        // 提交成功之后才入队；提交失败时上面已经用 ? 离开，绝不产生索引写
        self.index
            .index(ArticleDocument::new(&article.id, &locale, title, body));

        Ok(article.id)
    }

    /// 按读者偏好取文章最新内容，带语言回退
    pub async fn get_latest_article(
        &self,
        url_name: &str,
        preferred_locales: &[&str],
    ) -> Result<Option<ResolvedArticle>, RepoError> {
        let article = match self.store.find_article_by_url_name(url_name).await? {
            Some(article) => article,
            None => return Ok(None),
        };

        let available = self.store.article_locales(&article.id).await?;
        let preferred: Vec<String> = preferred_locales
            .iter()
            .map(|tag| locale::normalize(tag))
            .collect();

        // available 为空意味着文章还没有任何修订，对读者视同不存在
        let resolved = match locale::resolve(&preferred, &available) {
            Some(resolved) => resolved.clone(),
            None => return Ok(None),
        };

        let revision = self.store.latest_revision(&article.id, &resolved).await?;
        Ok(revision.map(|rev| ResolvedArticle {
            title: rev.title,
            body: rev.body,
            locale: rev.locale,
        }))
    }

    /// 文章存在修订的语言集合，空集合 = 文章不存在
    pub async fn get_article_locales(&self, url_name: &str) -> Result<Vec<String>, RepoError> {
        match self.store.find_article_by_url_name(url_name).await? {
            Some(article) => self.store.article_locales(&article.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// 某语言的全部文章列表，按标题自然顺序
    pub async fn list_articles_for_locale(
        &self,
        locale: &str,
    ) -> Result<Vec<ArticleSummary>, RepoError> {
        let locale = locale::normalize(locale);
        let list = self.store.list_articles_for_locale(&locale).await?;
        Ok(list
            .into_iter()
            .map(|(url_name, title)| ArticleSummary { url_name, title })
            .collect())
    }

    /// 全文搜索，返回 (url_name, 标题) 列表
    ///
    /// refresh 等待有上限，超时降级到上一个快照：搜索宁可旧，不可不可用。
    pub async fn search(
        &self,
        query: &str,
        locale: &str,
    ) -> Result<Vec<ArticleSummary>, RepoError> {
        let locale = locale::normalize(locale);

        self.refresh_bounded().await;

        let options = SearchOptions::new(query)
            .with_locale(&locale)
            .with_limit(self.settings.max_results);
        let mut hits = self.index.query(&options);

        if hits.is_empty() && self.settings.locale_fallback {
            // 精确语言无命中时退到基础语言匹配（可配置策略）
            hits = self.index.query(
                &SearchOptions::new(query)
                    .with_locale(&locale)
                    .with_base_language_match(true)
                    .with_limit(self.settings.max_results),
            );
        }

        let mut results = Vec::new();
        for hit in hits {
            if let Some(summary) = self.resolve_hit(&hit).await? {
                results.push(summary);
            }
        }
        Ok(results)
    }

    /// 命中回查主存储；文章在索引之后被删的，静默丢弃而不是报错
    async fn resolve_hit(&self, hit: &SearchHit) -> Result<Option<ArticleSummary>, RepoError> {
        let article = match self.store.find_article_by_id(&hit.article_id).await? {
            Some(article) => article,
            None => return Ok(None),
        };
        let revision = match self.store.latest_revision(&article.id, &hit.locale).await? {
            Some(revision) => revision,
            None => return Ok(None),
        };
        Ok(Some(ArticleSummary {
            url_name: article.url_name,
            title: revision.title,
        }))
    }

    /// 有界等待一次 refresh；失败或超时只降级，不让查询失败
    async fn refresh_bounded(&self) {
        let index = Arc::clone(&self.index);
        let timeout = Duration::from_millis(self.settings.refresh_timeout_ms);

        match tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || index.refresh()))
            .await
        {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                tracing::warn!("Search index refresh failed, serving last snapshot: {}", e);
            }
            Ok(Err(e)) => {
                tracing::warn!("Search index refresh task failed: {}", e);
            }
            Err(_) => {
                tracing::warn!(
                    "Search index refresh timed out after {:?}, serving last snapshot",
                    timeout
                );
            }
        }
    }

    /// 注册账户：每个账户独立的16字节随机盐
    pub async fn create_account(&self, username: &str, password: &str) -> Result<(), RepoError> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill(&mut salt[..]);
        let hash = hash_password(password, &salt);

        let mut tx = self.store.begin().await?;
        tx.create_account(username, &hex::encode(hash), &hex::encode(salt))
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// 验证口令
    ///
    /// 返回值不区分"用户不存在"和"口令错误"；哈希比较是常数时间，
    /// 用户不存在时也跑一次哈希，堵掉用时间差枚举用户名的路。
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, RepoError> {
        let account = match self.store.find_account(username).await? {
            Some(account) => account,
            None => {
                let _ = hash_password(password, &[0u8; 16]);
                return Ok(false);
            }
        };

        let salt: [u8; 16] = match hex::decode(&account.password_salt)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
        {
            Some(salt) => salt,
            None => return Ok(false),
        };

        let computed = hex::encode(hash_password(password, &salt));
        Ok(constant_time_eq(
            computed.as_bytes(),
            account.password_hash.as_bytes(),
        ))
    }

    /// 发表评论；url_name 或 username 解析失败返回 None，不留半写
    pub async fn post_comment(
        &self,
        url_name: &str,
        username: &str,
        text: &str,
    ) -> Result<Option<String>, RepoError> {
        let mut tx = self.store.begin().await?;

        let article = match tx.find_article_by_url_name(url_name).await? {
            Some(article) => article,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };
        let account = match tx.find_account(username).await? {
            Some(account) => account,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let comment_id = tx
            .create_comment(
                &article.id,
                &account.id,
                Utc::now().timestamp_millis(),
                text,
            )
            .await?;
        tx.commit().await?;

        Ok(Some(comment_id))
    }

    /// 编辑评论：往编辑历史追加一条
    pub async fn edit_comment(&self, comment_id: &str, text: &str) -> Result<(), RepoError> {
        let mut tx = self.store.begin().await?;
        tx.append_comment_edit(comment_id, text).await?;
        tx.commit().await?;
        Ok(())
    }

    /// 文章的评论列表，新的在前
    pub async fn list_comments(&self, url_name: &str) -> Result<Vec<CommentView>, RepoError> {
        match self.store.find_article_by_url_name(url_name).await? {
            Some(article) => self.store.list_comments(&article.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// 从主存储全量重建搜索索引（维护操作）
    pub async fn rebuild_search_index(&self) -> Result<usize, RepoError> {
        self.index.clear();

        let revisions = self.store.all_latest_revisions().await?;
        let count = revisions.len();
        for (article_id, locale, title, body) in revisions {
            self.index
                .index(ArticleDocument::new(&article_id, &locale, &title, &body));
        }

        self.index
            .refresh()
            .map_err(RepoError::IndexUnavailable)?;

        tracing::info!("Search index rebuilt: {} documents", count);
        Ok(count)
    }
}

/// 口令哈希原语：hash(password, salt) -> 32字节
///
/// 盐在前做域分隔；上层只依赖"确定、定宽、不可逆"这三点。
fn hash_password(password: &str, salt: &[u8; 16]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// 常数时间比较，长度不同直接失败
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
