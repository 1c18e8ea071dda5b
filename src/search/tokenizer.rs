//! Tokenizer - jieba-based, position preserving / 分词器
//!
//! 索引和查询必须用同一套切分，短语匹配靠顺序位置对齐：
//! 这里用 jieba 的精确模式（不是搜索模式），切出的词不重叠，
//! 过滤掉空白和纯标点后剩下的序号就是短语位置。

use jieba_rs::Jieba;
use once_cell::sync::Lazy;

/// Global jieba tokenizer instance / 全局 jieba 分词器实例
static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Tokenize text into ordered, lowercased tokens / 对文本分词
///
/// 返回顺序即位置：第 i 个 token 的短语位置就是 i。
pub fn tokenize(text: &str) -> Vec<String> {
    JIEBA
        .cut(text, true)
        .into_iter()
        .filter_map(|word| {
            let word = word.trim();
            if word.is_empty() || !word.chars().any(char::is_alphanumeric) {
                return None;
            }
            Some(word.to_lowercase())
        })
        .collect()
}

/// Tokenize a search phrase / 对搜索短语分词
///
/// 查询分词与索引分词保持一致
pub fn tokenize_query(query: &str) -> Vec<String> {
    tokenize(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_english() {
        let tokens = tokenize("World News Today");
        assert_eq!(tokens, vec!["world", "news", "today"]);
    }

    #[test]
    fn test_tokenize_chinese() {
        let tokens = tokenize("中华人民共和国");
        assert!(!tokens.is_empty());
        println!("Chinese tokens: {:?}", tokens);
    }

    #[test]
    fn test_tokenize_drops_punctuation_keeps_order() {
        let tokens = tokenize("hello, world!");
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize("新闻 breaking news");
        assert!(tokens.contains(&"breaking".to_string()));
        assert!(tokens.contains(&"news".to_string()));
    }

    #[test]
    fn test_query_tokenization_matches_index_tokenization() {
        let text = "今日世界新闻 world news";
        assert_eq!(tokenize(text), tokenize_query(text));
    }
}
