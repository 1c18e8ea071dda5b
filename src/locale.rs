//! Locale tag normalization and fallback resolution / 语言标签规范化与回退解析
//!
//! 两个操作严格分开：
//! - 精确相等：主存储按规范化后的完整标签查找
//! - 基础语言匹配：只有回退解析用，忽略地区/脚本子标签

/// Normalize a locale tag to canonical form / 规范化语言标签
///
/// "en_us" -> "en-US", "zh-hans-CN" -> "zh-Hans-CN"
/// 语言子标签小写，地区大写，四字母脚本子标签首字母大写
pub fn normalize(tag: &str) -> String {
    let tag = tag.trim().replace('_', "-");
    let mut parts = Vec::new();

    for (i, part) in tag.split('-').filter(|p| !p.is_empty()).enumerate() {
        let part = if i == 0 {
            part.to_lowercase()
        } else if part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()) {
            part.to_uppercase()
        } else if part.len() == 4 && part.chars().all(|c| c.is_ascii_alphabetic()) {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        } else {
            part.to_lowercase()
        };
        parts.push(part);
    }

    parts.join("-")
}

/// Base language of a tag, ignoring region/script / 基础语言
pub fn base_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Resolve the best available locale for ranked preferences / 按偏好顺序解析可用语言
///
/// 依次遍历偏好，基础语言命中即返回对应的可用项；全部落空时返回
/// 可用列表的第一项（调用方提供稳定顺序，保证确定性）。
///
/// `available` 为空是调用方前置条件违规，返回 `None`，绝不默默编造默认值。
pub fn resolve<'a, S: AsRef<str>>(requested: &[S], available: &'a [String]) -> Option<&'a String> {
    if available.is_empty() {
        return None;
    }

    for want in requested {
        let want_base = base_language(want.as_ref()).to_lowercase();
        if let Some(hit) = available
            .iter()
            .find(|have| base_language(have).to_lowercase() == want_base)
        {
            return Some(hit);
        }
    }

    // 没有任何基础语言命中，退到稳定顺序的第一项
    available.first()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("en_us"), "en-US");
        assert_eq!(normalize("EN-US"), "en-US");
        assert_eq!(normalize("zh"), "zh");
        assert_eq!(normalize("zh-hans-cn"), "zh-Hans-CN");
        assert_eq!(normalize("  fr-ca "), "fr-CA");
    }

    #[test]
    fn test_base_language() {
        assert_eq!(base_language("en-US"), "en");
        assert_eq!(base_language("zh-Hans-CN"), "zh");
        assert_eq!(base_language("de"), "de");
    }

    #[test]
    fn test_resolve_second_preference_base_match() {
        let available = vec!["en-US".to_string(), "es".to_string()];
        let resolved = resolve(&["fr-CA", "en-US"], &available).unwrap();
        assert_eq!(resolved, "en-US");
    }

    #[test]
    fn test_resolve_falls_back_to_first_available() {
        let available = vec!["en-US".to_string()];
        let resolved = resolve(&["de"], &available).unwrap();
        assert_eq!(resolved, "en-US");
    }

    #[test]
    fn test_resolve_region_mismatch_still_matches_base() {
        let available = vec!["en-GB".to_string(), "zh-CN".to_string()];
        let resolved = resolve(&["en-US"], &available).unwrap();
        assert_eq!(resolved, "en-GB");
    }

    #[test]
    fn test_resolve_empty_available_is_caller_error() {
        let available: Vec<String> = Vec::new();
        assert!(resolve(&["en"], &available).is_none());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let available = vec!["ja".to_string(), "ko".to_string()];
        for _ in 0..3 {
            assert_eq!(resolve(&["de"], &available).unwrap(), "ja");
        }
    }
}
