//! NRT search engine - pending queue + snapshot swap / 近实时搜索引擎
//!
//! 写路径：index/delete 只追加到待刷新队列，代价是一次加锁 push。
//! 读路径：query 永远跑在上一次 refresh 发布的不可变快照上。
//! refresh：排干队列、重建倒排、换一个 Arc 指针——查询最多被
//! 阻塞一次指针交换的时间，写入在 refresh 之前对查询不可见。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::schema::{ArticleDocument, SearchHit, SearchOptions};
use super::tokenizer::{tokenize, tokenize_query};
use crate::locale;

/// 每个 (token, doc) 的字段内位置表
#[derive(Debug, Clone, Default)]
struct FieldPositions {
    title: Vec<usize>,
    body: Vec<usize>,
}

/// Immutable index snapshot / 不可变索引快照
#[derive(Debug, Default)]
struct Snapshot {
    /// doc_key -> document / 文档存储
    documents: HashMap<String, ArticleDocument>,
    /// token -> doc_key -> positions / 倒排索引
    inverted: HashMap<String, HashMap<String, FieldPositions>>,
    /// 本快照发布时间（毫秒），None 表示从未 refresh
    refreshed_at: Option<i64>,
}

/// 待刷新操作
enum PendingOp {
    Upsert(ArticleDocument),
    Delete(String),
    Clear,
}

/// Index statistics / 索引统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub token_count: usize,
    pub pending_count: usize,
    pub last_refresh: Option<i64>,
}

/// In-memory NRT search engine / 内存近实时搜索引擎
pub struct SearchEngine {
    pending: Mutex<Vec<PendingOp>>,
    snapshot: RwLock<Arc<Snapshot>>,
    /// 写者锁：同一时刻只允许一个 refresh 走完取队列-重建-交换
    writer: Mutex<()>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
        }
    }

    /// Stage a document write / 暂存文档写入
    ///
    /// 对同一 (article, locale) 重复提交，refresh 时后者整体取代前者。
    pub fn index(&self, doc: ArticleDocument) {
        self.pending.lock().push(PendingOp::Upsert(doc));
    }

    /// Stage a document removal / 暂存文档删除
    pub fn delete_document(&self, article_id: &str, locale: &str) {
        self.pending
            .lock()
            .push(PendingOp::Delete(ArticleDocument::make_doc_key(
                article_id, locale,
            )));
    }

    /// Stage a full wipe / 暂存整库清空
    pub fn clear(&self) {
        self.pending.lock().push(PendingOp::Clear);
    }

    /// Make staged writes visible / 让暂存的写入可见
    pub fn refresh(&self) -> Result<(), String> {
        // 两个 refresh 交错会拿同一个旧快照各建各的，后交换的把先交换的
        // 连同它已取走的队列一起覆盖掉；写者锁把整段串行化
        let _writer = self.writer.lock();

        let ops: Vec<PendingOp> = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut *pending)
        };

        let current = self.snapshot.read().clone();

        let mut documents = current.documents.clone();
        for op in ops {
            match op {
                PendingOp::Upsert(doc) => {
                    documents.insert(doc.doc_key(), doc);
                }
                PendingOp::Delete(doc_key) => {
                    documents.remove(&doc_key);
                }
                PendingOp::Clear => {
                    documents.clear();
                }
            }
        }

        // 从文档全量重建倒排，保证和 documents 永远一致
        let mut inverted: HashMap<String, HashMap<String, FieldPositions>> = HashMap::new();
        for (doc_key, doc) in &documents {
            for (pos, token) in tokenize(&doc.title).into_iter().enumerate() {
                inverted
                    .entry(token)
                    .or_default()
                    .entry(doc_key.clone())
                    .or_default()
                    .title
                    .push(pos);
            }
            for (pos, token) in tokenize(&doc.body).into_iter().enumerate() {
                inverted
                    .entry(token)
                    .or_default()
                    .entry(doc_key.clone())
                    .or_default()
                    .body
                    .push(pos);
            }
        }

        let next = Arc::new(Snapshot {
            documents,
            inverted,
            refreshed_at: Some(Utc::now().timestamp_millis()),
        });

        // 指针交换，读者拿旧 Arc 的继续读旧快照
        *self.snapshot.write() = next;

        Ok(())
    }

    /// Phrase query against the last refreshed snapshot / 对最近快照做短语查询
    ///
    /// 结果确定：分数降序，同分按 article_id 升序。
    pub fn query(&self, options: &SearchOptions) -> Vec<SearchHit> {
        let snapshot = self.snapshot.read().clone();

        let tokens = tokenize_query(&options.query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let first = match snapshot.inverted.get(&tokens[0]) {
            Some(postings) => postings,
            None => return Vec::new(),
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        for doc_key in first.keys() {
            let doc = match snapshot.documents.get(doc_key) {
                Some(doc) => doc,
                None => continue,
            };

            if let Some(want) = &options.locale {
                let locale_ok = if options.base_language_match {
                    locale::base_language(&doc.locale) == locale::base_language(want)
                } else {
                    &doc.locale == want
                };
                if !locale_ok {
                    continue;
                }
            }

            // 标题命中权重高于正文
            let title_occurrences =
                phrase_occurrences(&snapshot, &tokens, doc_key, |fp| &fp.title);
            let body_occurrences = phrase_occurrences(&snapshot, &tokens, doc_key, |fp| &fp.body);

            let score = title_occurrences as f32 * 2.0 + body_occurrences as f32;
            if score > 0.0 {
                hits.push(SearchHit {
                    article_id: doc.article_id.clone(),
                    locale: doc.locale.clone(),
                    score,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });

        if options.limit > 0 {
            hits.truncate(options.limit);
        }

        hits
    }

    /// 最近一次 refresh 的时间戳（毫秒）
    pub fn last_refresh_time(&self) -> Option<i64> {
        self.snapshot.read().refreshed_at
    }

    /// Get index statistics / 获取索引统计信息
    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot.read().clone();
        IndexStats {
            document_count: snapshot.documents.len(),
            token_count: snapshot.inverted.len(),
            pending_count: self.pending.lock().len(),
            last_refresh: snapshot.refreshed_at,
        }
    }

    pub fn document_count(&self) -> usize {
        self.snapshot.read().documents.len()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 短语出现次数：首词的每个位置 p，检查后续词是否依次出现在 p+1, p+2...
fn phrase_occurrences(
    snapshot: &Snapshot,
    tokens: &[String],
    doc_key: &str,
    field: fn(&FieldPositions) -> &Vec<usize>,
) -> usize {
    let first_positions = match snapshot
        .inverted
        .get(&tokens[0])
        .and_then(|postings| postings.get(doc_key))
    {
        Some(fp) => field(fp),
        None => return 0,
    };

    first_positions
        .iter()
        .filter(|&&start| {
            tokens.iter().enumerate().skip(1).all(|(offset, token)| {
                snapshot
                    .inverted
                    .get(token)
                    .and_then(|postings| postings.get(doc_key))
                    .map(|fp| field(fp).contains(&(start + offset)))
                    .unwrap_or(false)
            })
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(article_id: &str, locale: &str, title: &str, body: &str) -> ArticleDocument {
        ArticleDocument::new(article_id, locale, title, body)
    }

    #[test]
    fn test_writes_invisible_until_refresh() {
        let engine = SearchEngine::new();
        engine.index(doc("a1", "en-US", "Hello", "world news today"));

        let hits = engine.query(&SearchOptions::new("world").with_locale("en-US"));
        assert!(hits.is_empty());
        assert!(engine.last_refresh_time().is_none());

        engine.refresh().unwrap();

        let hits = engine.query(&SearchOptions::new("world").with_locale("en-US"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].article_id, "a1");
        assert!(engine.last_refresh_time().is_some());
    }

    #[test]
    fn test_reindex_same_key_is_idempotent() {
        let engine = SearchEngine::new();
        engine.index(doc("a1", "en", "Hello", "world one"));
        engine.index(doc("a1", "en", "Hello", "world two"));
        engine.refresh().unwrap();
        engine.index(doc("a1", "en", "Hello", "world three"));
        engine.refresh().unwrap();

        let hits = engine.query(&SearchOptions::new("world").with_locale("en"));
        assert_eq!(hits.len(), 1);
        assert_eq!(engine.document_count(), 1);
    }

    #[test]
    fn test_phrase_requires_adjacent_tokens() {
        let engine = SearchEngine::new();
        engine.index(doc("a1", "en", "One", "the quick brown fox"));
        engine.index(doc("a2", "en", "Two", "the brown quick fox"));
        engine.refresh().unwrap();

        let hits = engine.query(&SearchOptions::new("quick brown").with_locale("en"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].article_id, "a1");
    }

    #[test]
    fn test_phrase_does_not_span_title_and_body() {
        let engine = SearchEngine::new();
        engine.index(doc("a1", "en", "alpha beta", "gamma"));
        engine.refresh().unwrap();

        // 标题结尾 + 正文开头不构成短语
        assert!(engine
            .query(&SearchOptions::new("beta gamma").with_locale("en"))
            .is_empty());
        assert_eq!(
            engine
                .query(&SearchOptions::new("alpha beta").with_locale("en"))
                .len(),
            1
        );
    }

    #[test]
    fn test_locale_filter_exact_and_base_language() {
        let engine = SearchEngine::new();
        engine.index(doc("a1", "en-US", "Hello", "shared words"));
        engine.index(doc("a2", "en-GB", "Hello", "shared words"));
        engine.index(doc("a3", "de", "Hallo", "shared words"));
        engine.refresh().unwrap();

        let exact = engine.query(&SearchOptions::new("shared").with_locale("en-US"));
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].article_id, "a1");

        let base = engine.query(
            &SearchOptions::new("shared")
                .with_locale("en-US")
                .with_base_language_match(true),
        );
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_title_outranks_body_and_ties_break_by_id() {
        let engine = SearchEngine::new();
        engine.index(doc("b", "en", "plain", "match here"));
        engine.index(doc("a", "en", "plain", "match here"));
        engine.index(doc("c", "en", "match", "elsewhere"));
        engine.refresh().unwrap();

        let hits = engine.query(&SearchOptions::new("match").with_locale("en"));
        assert_eq!(hits.len(), 3);
        // 标题命中排最前，正文同分按 article_id 升序
        assert_eq!(hits[0].article_id, "c");
        assert_eq!(hits[1].article_id, "a");
        assert_eq!(hits[2].article_id, "b");
    }

    #[test]
    fn test_delete_and_clear() {
        let engine = SearchEngine::new();
        engine.index(doc("a1", "en", "One", "word"));
        engine.index(doc("a2", "en", "Two", "word"));
        engine.refresh().unwrap();
        assert_eq!(engine.document_count(), 2);

        engine.delete_document("a1", "en");
        engine.refresh().unwrap();
        assert_eq!(engine.document_count(), 1);

        engine.clear();
        engine.refresh().unwrap();
        assert_eq!(engine.document_count(), 0);
        assert!(engine.query(&SearchOptions::new("word")).is_empty());
    }

    #[test]
    fn test_concurrent_refreshes_lose_no_writes() {
        let engine = SearchEngine::new();

        // 多线程各自 index + refresh：写者串行化后一条都不能丢
        std::thread::scope(|scope| {
            for i in 0..8 {
                let engine = &engine;
                scope.spawn(move || {
                    engine.index(doc(&format!("a{}", i), "en", "Title", "shared body"));
                    engine.refresh().unwrap();
                });
            }
        });

        engine.refresh().unwrap();
        assert_eq!(engine.document_count(), 8);
        assert_eq!(
            engine
                .query(&SearchOptions::new("shared").with_locale("en"))
                .len(),
            8
        );
    }

    #[test]
    fn test_stats() {
        let engine = SearchEngine::new();
        engine.index(doc("a1", "en", "Hello", "world"));
        let stats = engine.stats();
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.document_count, 0);

        engine.refresh().unwrap();
        let stats = engine.stats();
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.document_count, 1);
        assert!(stats.last_refresh.is_some());
    }
}
