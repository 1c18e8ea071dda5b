//! Primary store - transactional entity storage / 主存储
//!
//! 事务边界内的约束冲突使整个事务失败，不存在可见的半写状态。
//! 搜索索引不归这里管，主存储绝不触碰索引。

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::RepoError;
use crate::models::{Account, Article, CommentView, ContentRevision};

/// 把 SQLite 唯一性冲突映射为 DuplicateKey，其余原样作为存储错误传播
fn constraint_err(err: sqlx::Error, what: &str) -> RepoError {
    match &err {
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            RepoError::DuplicateKey(what.to_string())
        }
        _ => RepoError::Storage(err),
    }
}

/// Primary store handle / 主存储句柄
///
/// 读操作直接走连接池（快照语义，不被写事务阻塞）；
/// 写操作必须通过 [`PrimaryStore::begin`] 拿到事务。
#[derive(Clone)]
pub struct PrimaryStore {
    pool: SqlitePool,
}

impl PrimaryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a write transaction / 打开写事务
    pub async fn begin(&self) -> Result<StoreTxn, RepoError> {
        let tx = self.pool.begin().await?;
        Ok(StoreTxn { tx })
    }

    pub async fn find_article_by_url_name(
        &self,
        url_name: &str,
    ) -> Result<Option<Article>, RepoError> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE url_name = ?")
            .bind(url_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    pub async fn find_article_by_id(&self, id: &str) -> Result<Option<Article>, RepoError> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    /// 该文章存在修订的语言集合（按标签排序，结果稳定）
    pub async fn article_locales(&self, article_id: &str) -> Result<Vec<String>, RepoError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT locale FROM revisions WHERE article_id = ? ORDER BY locale",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(l,)| l).collect())
    }

    /// Latest revision for an exact locale, no fallback here / 精确语言的最新修订
    pub async fn latest_revision(
        &self,
        article_id: &str,
        locale: &str,
    ) -> Result<Option<ContentRevision>, RepoError> {
        let revision = sqlx::query_as::<_, ContentRevision>(
            "SELECT * FROM revisions WHERE article_id = ? AND locale = ? \
             ORDER BY publish_time DESC, id DESC LIMIT 1",
        )
        .bind(article_id)
        .bind(locale)
        .fetch_optional(&self.pool)
        .await?;
        Ok(revision)
    }

    /// 某语言下所有文章的 (url_name, 最新标题)，自然排序
    pub async fn list_articles_for_locale(
        &self,
        locale: &str,
    ) -> Result<Vec<(String, String)>, RepoError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT a.url_name, r.title FROM revisions r \
             JOIN articles a ON a.id = r.article_id \
             WHERE r.locale = ? \
             ORDER BY r.article_id, r.publish_time DESC, r.id DESC",
        )
        .bind(locale)
        .fetch_all(&self.pool)
        .await?;

        // 每篇文章只保留最新一行（上面的排序保证先见即最新）
        let mut seen = std::collections::HashSet::new();
        let mut list: Vec<(String, String)> = rows
            .into_iter()
            .filter(|(url_name, _)| seen.insert(url_name.clone()))
            .collect();

        list.sort_by(|a, b| natord::compare_ignore_case(&a.1, &b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(list)
    }

    /// 评论列表，新的在前，文本取编辑历史最后一条
    pub async fn list_comments(&self, article_id: &str) -> Result<Vec<CommentView>, RepoError> {
        let comments = sqlx::query_as::<_, CommentView>(
            "SELECT c.id, u.username, c.post_time, e.content FROM comments c \
             JOIN accounts u ON u.id = c.account_id \
             JOIN comment_edits e ON e.comment_id = c.id \
             WHERE c.article_id = ? \
               AND e.seq = (SELECT MAX(seq) FROM comment_edits WHERE comment_id = c.id) \
             ORDER BY c.post_time DESC, c.id DESC",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    pub async fn find_account(&self, username: &str) -> Result<Option<Account>, RepoError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// 全量重建索引的数据源：每个 (article, locale) 的最新修订
    pub async fn all_latest_revisions(
        &self,
    ) -> Result<Vec<(String, String, String, String)>, RepoError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT r.article_id, r.locale, r.title, r.body FROM revisions r \
             WHERE r.id = (SELECT r2.id FROM revisions r2 \
                           WHERE r2.article_id = r.article_id AND r2.locale = r.locale \
                           ORDER BY r2.publish_time DESC, r2.id DESC LIMIT 1)",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Scoped write transaction / 作用域写事务
///
/// drop 即回滚；commit/rollback 都消费自身。
pub struct StoreTxn {
    tx: Transaction<'static, Sqlite>,
}

impl StoreTxn {
    /// 创建文章，url_name 重复返回 DuplicateKey
    pub async fn create_article(
        &mut self,
        url_name: &str,
        original_locale: &str,
    ) -> Result<Article, RepoError> {
        let article = Article {
            id: Uuid::new_v4().to_string(),
            url_name: url_name.to_string(),
            original_locale: original_locale.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO articles (id, url_name, original_locale, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&article.id)
        .bind(&article.url_name)
        .bind(&article.original_locale)
        .bind(&article.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| constraint_err(e, &format!("article url_name '{}'", url_name)))?;

        Ok(article)
    }

    pub async fn find_article_by_url_name(
        &mut self,
        url_name: &str,
    ) -> Result<Option<Article>, RepoError> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE url_name = ?")
            .bind(url_name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(article)
    }

    pub async fn find_account(&mut self, username: &str) -> Result<Option<Account>, RepoError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(account)
    }

    /// 追加一条修订（修订不可变，没有更新路径）
    pub async fn create_revision(
        &mut self,
        article_id: &str,
        locale: &str,
        title: &str,
        body: &str,
        publish_time: i64,
    ) -> Result<ContentRevision, RepoError> {
        let created_at = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO revisions (article_id, locale, title, body, publish_time, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(article_id)
        .bind(locale)
        .bind(title)
        .bind(body)
        .bind(publish_time)
        .bind(&created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(ContentRevision {
            id: result.last_insert_rowid(),
            article_id: article_id.to_string(),
            locale: locale.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            publish_time,
            created_at,
        })
    }

    /// 创建账户，username 重复返回 DuplicateKey
    pub async fn create_account(
        &mut self,
        username: &str,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<Account, RepoError> {
        let account = Account {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            password_salt: password_salt.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO accounts (id, username, password_hash, password_salt, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(&account.password_salt)
        .bind(&account.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| constraint_err(e, &format!("account username '{}'", username)))?;

        Ok(account)
    }

    /// 创建评论，文章/账户任一引用失效返回 DanglingReference
    ///
    /// 存在性检查和写入在同一事务里做，不依赖外键约束。
    pub async fn create_comment(
        &mut self,
        article_id: &str,
        account_id: &str,
        post_time: i64,
        text: &str,
    ) -> Result<String, RepoError> {
        let article_exists: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM articles WHERE id = ?")
                .bind(article_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        if article_exists.is_none() {
            return Err(RepoError::DanglingReference(format!(
                "article '{}'",
                article_id
            )));
        }

        let account_exists: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM accounts WHERE id = ?")
                .bind(account_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        if account_exists.is_none() {
            return Err(RepoError::DanglingReference(format!(
                "account '{}'",
                account_id
            )));
        }

        let comment_id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO comments (id, article_id, account_id, post_time, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&comment_id)
        .bind(article_id)
        .bind(account_id)
        .bind(post_time)
        .bind(&created_at)
        .execute(&mut *self.tx)
        .await?;

        // 首条编辑就是评论的初始文本
        sqlx::query(
            "INSERT INTO comment_edits (comment_id, seq, content, edited_at) VALUES (?, 0, ?, ?)",
        )
        .bind(&comment_id)
        .bind(text)
        .bind(&created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(comment_id)
    }

    /// 追加一条评论编辑（历史只增不改）
    pub async fn append_comment_edit(
        &mut self,
        comment_id: &str,
        text: &str,
    ) -> Result<(), RepoError> {
        // MAX 在无行时返回 NULL，借此区分"评论不存在"
        let (max_seq,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(seq) FROM comment_edits WHERE comment_id = ?")
                .bind(comment_id)
                .fetch_one(&mut *self.tx)
                .await?;

        let next_seq = match max_seq {
            Some(seq) => seq + 1,
            None => {
                return Err(RepoError::DanglingReference(format!(
                    "comment '{}'",
                    comment_id
                )))
            }
        };

        sqlx::query(
            "INSERT INTO comment_edits (comment_id, seq, content, edited_at) VALUES (?, ?, ?, ?)",
        )
        .bind(comment_id)
        .bind(next_seq)
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// 原子提交，失败时没有任何部分状态可见
    pub async fn commit(self) -> Result<(), RepoError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// 丢弃全部变更，总是安全
    pub async fn rollback(self) -> Result<(), RepoError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
