//! Keyword intent classifiers used to gate retrieval stages.
//!
//! Single-word keywords match whole words or their plural forms, so
//! "repository" fires on "repositories" but "pr" does not fire on
//! "program". Multi-word keywords match as phrases.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeBaseIntent {
    Relevant,
    NotRelevant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeIntent {
    /// List the requester's repositories
    ListRepositories,

    /// Look inside repositories (README snippets)
    SearchCode,

    Unrelated,
}

impl CodeIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeIntent::ListRepositories => "list_repositories",
            CodeIntent::SearchCode => "search_code",
            CodeIntent::Unrelated => "unrelated",
        }
    }
}

/// Whether `keyword` occurs in `question`, case-insensitively.
pub fn matches_keyword(question: &str, keyword: &str) -> bool {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }

    let question = question.to_lowercase();
    if keyword.contains(char::is_whitespace) {
        let normalized = question.split_whitespace().collect::<Vec<_>>().join(" ");
        return normalized.contains(&keyword);
    }

    question
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| is_inflection_of(word, &keyword))
}

/// `word` is `keyword` itself or a plural of it ("-s", "-es", "y" to "ies").
fn is_inflection_of(word: &str, keyword: &str) -> bool {
    let Some(suffix) = word.strip_prefix(keyword) else {
        return keyword
            .strip_suffix('y')
            .and_then(|stem| word.strip_prefix(stem))
            .is_some_and(|rest| rest == "ies");
    };
    matches!(suffix, "" | "s" | "es")
}

fn matches_any(question: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| matches_keyword(question, k))
}

pub fn classify_knowledge_base(question: &str, keywords: &[String]) -> KnowledgeBaseIntent {
    if matches_any(question, keywords) {
        KnowledgeBaseIntent::Relevant
    } else {
        KnowledgeBaseIntent::NotRelevant
    }
}

/// List intent (explicit list keywords or any code-host vocabulary) wins
/// over code-search intent.
pub fn classify_code(
    question: &str,
    list_keywords: &[String],
    host_keywords: &[String],
    search_keywords: &[String],
) -> CodeIntent {
    if matches_any(question, list_keywords) || matches_any(question, host_keywords) {
        CodeIntent::ListRepositories
    } else if matches_any(question, search_keywords) {
        CodeIntent::SearchCode
    } else {
        CodeIntent::Unrelated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askflow_core::RetrievalSettings;

    fn classify(question: &str) -> CodeIntent {
        let settings = RetrievalSettings::default();
        classify_code(
            question,
            &settings.repository_list_keywords,
            &settings.code_host_keywords,
            &settings.code_search_keywords,
        )
    }

    #[test]
    fn test_whole_word_matching() {
        assert!(matches_keyword("Open a PR, please", "pr"));
        assert!(!matches_keyword("Which program should I use?", "pr"));
        assert!(matches_keyword("How do I reach the VPN?", "vpn"));
        assert!(!matches_keyword("", "vpn"));
        assert!(!matches_keyword("anything", "  "));
    }

    #[test]
    fn test_plural_forms_match() {
        assert!(matches_keyword("How many repositories do I have?", "repository"));
        assert!(matches_keyword("Which functions handle auth?", "function"));
        assert!(matches_keyword("Summarize the latest commits", "commit"));
        assert!(matches_keyword("Merge both branches", "branch"));
        assert!(matches_keyword("Open PRs", "pr"));
        assert!(!matches_keyword("Press the button", "pr"));
        assert!(!matches_keyword("Is this repository-ish?", "repo"));
        assert!(!matches_keyword("committee notes", "commit"));
    }

    #[test]
    fn test_phrase_matching() {
        assert!(matches_keyword("Show me   my REPOsitories", "my repo"));
        assert!(matches_keyword("Can you find code for parsing?", "find code"));
        assert!(!matches_keyword("find the code", "find code"));
    }

    #[test]
    fn test_knowledge_base_intent() {
        let keywords = RetrievalSettings::default().knowledge_base_keywords;
        assert_eq!(
            classify_knowledge_base("How do I set up NetBadge?", &keywords),
            KnowledgeBaseIntent::Relevant
        );
        assert_eq!(
            classify_knowledge_base("Explain photosynthesis", &keywords),
            KnowledgeBaseIntent::NotRelevant
        );
    }

    #[test]
    fn test_code_intent() {
        assert_eq!(classify("List my repositories"), CodeIntent::ListRepositories);
        assert_eq!(classify("What is in my github?"), CodeIntent::ListRepositories);
        assert_eq!(
            classify("Where is the parser function implemented?"),
            CodeIntent::SearchCode
        );
        assert_eq!(classify("When is spring break?"), CodeIntent::Unrelated);
    }

    #[test]
    fn test_code_intent_with_plurals() {
        assert_eq!(
            classify("How many repositories do I have?"),
            CodeIntent::ListRepositories
        );
        assert_eq!(
            classify("Summarize the latest commits"),
            CodeIntent::ListRepositories
        );
        assert_eq!(classify("Which functions handle auth?"), CodeIntent::SearchCode);
    }

    #[test]
    fn test_list_wins_over_search() {
        assert_eq!(
            classify("Show the code in my repo"),
            CodeIntent::ListRepositories
        );
    }
}
