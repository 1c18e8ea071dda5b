use thiserror::Error;

/// 仓库核心错误类型
///
/// NotFound 不在这里：按键查找落空用 `Option` / 空集合表达，不是错误。
#[derive(Debug, Error)]
pub enum RepoError {
    /// Uniqueness violation (url_name, username) / 唯一性冲突
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A referenced article/account/comment did not resolve at write time / 引用失效
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// Underlying storage I/O or transaction failure / 存储层失败
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// The search index could not refresh or serve a usable snapshot / 搜索索引不可用
    #[error("search index unavailable: {0}")]
    IndexUnavailable(String),
}
