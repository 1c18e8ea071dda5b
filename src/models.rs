use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: String,
    pub url_name: String,
    pub original_locale: String,
    pub created_at: String,
}

/// 内容修订：一经创建不可变，"最新"永远是查询结果而不是字段
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentRevision {
    pub id: i64,
    pub article_id: String,
    pub locale: String,
    pub title: String,
    pub body: String,
    pub publish_time: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub created_at: String,
}

/// 评论展示行：当前文本取编辑历史的最后一条
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentView {
    pub id: String,
    pub username: String,
    pub post_time: i64,
    pub content: String,
}

/// Article listing row (latest title per article for one locale) / 文章列表行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub url_name: String,
    pub title: String,
}

/// 读取结果：标题 + 正文 + 实际命中的语言
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedArticle {
    pub title: String,
    pub body: String,
    pub locale: String,
}
