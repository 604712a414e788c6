/// Case-insensitive keyword set matched as plain substrings.
///
/// Keywords are lower-cased once at construction, so matching a message only
/// has to fold the message text. Non-Latin entries (e.g. `下架`) go through the
/// same substring test; there is no word segmentation or stemming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keywords {
    normalized: Vec<String>,
}

impl Keywords {
    /// Build a keyword set. Empty entries are dropped since an empty needle
    /// would match every message.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = keywords
            .into_iter()
            .map(|kw| kw.as_ref().trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();
        Self { normalized }
    }

    /// True if any keyword occurs in `text`, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// The first configured keyword found in `text`, if any.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        if text.is_empty() {
            return None;
        }
        let haystack = text.to_lowercase();
        self.normalized
            .iter()
            .find(|kw| haystack.contains(kw.as_str()))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.normalized.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KEYWORDS;

    fn defaults() -> Keywords {
        Keywords::new(KEYWORDS)
    }

    #[test]
    fn test_matches_substring() {
        assert!(defaults().matches("BTC delisting notice"));
    }

    #[test]
    fn test_case_insensitive() {
        let kws = Keywords::new(["Remove Trading"]);
        assert!(kws.matches("We will REMOVE TRADING pairs tomorrow"));
        assert!(defaults().matches("Notice: DELIST of XYZ"));
    }

    #[test]
    fn test_no_match() {
        assert!(!defaults().matches("price update only"));
    }

    #[test]
    fn test_cjk_keyword() {
        assert!(defaults().matches("关于下架部分交易对的公告"));
        assert!(defaults().matches("XYZ 退市"));
    }

    #[test]
    fn test_empty_text_never_matches() {
        assert!(!defaults().matches(""));
    }

    #[test]
    fn test_empty_keyword_list_never_matches() {
        let kws = Keywords::new(Vec::<String>::new());
        assert!(kws.is_empty());
        assert!(!kws.matches("delisting"));
    }

    #[test]
    fn test_blank_keywords_dropped() {
        let kws = Keywords::new(["", "  ", "delist"]);
        assert_eq!(kws.len(), 1);
        assert!(!kws.matches("anything at all"));
    }

    #[test]
    fn test_first_match_reports_keyword() {
        let kws = Keywords::new(["delist", "remove trading"]);
        assert_eq!(kws.first_match("Will Remove Trading for ABC"), Some("remove trading"));
        assert_eq!(kws.first_match("nothing here"), None);
    }

    #[test]
    fn test_match_agrees_with_folded_substring() {
        let kws = Keywords::new(["Delist", "下架"]);
        for text in ["delist", "DeLiStInG", "de list", "下 架", "已下架", "ok"] {
            let folded = text.to_lowercase();
            let expected = ["delist", "下架"].iter().any(|k| folded.contains(k));
            assert_eq!(kws.matches(text), expected, "text: {text}");
        }
    }
}
