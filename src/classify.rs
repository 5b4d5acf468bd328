//! Directory classification.
//!
//! The archive's directory layout records where data came from, so the
//! category of an archive directory is decided from its path alone:
//!
//! 1. Category rules are tried in order; each pattern is matched
//!    case-insensitively from the start of the path and the first match
//!    wins.
//! 2. Exclude patterns are searched anywhere in the path. Any hit voids
//!    the classification, whatever rule matched.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::CategoryRuleConfig;

#[derive(Debug, Clone)]
struct CategoryRule {
    pattern: Regex,
    category: String,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CategoryRule>,
    excludes: Vec<Regex>,
}

impl Classifier {
    /// Compile category rules and exclude patterns.
    ///
    /// Blank exclude patterns are ignored; an empty regex would otherwise
    /// exclude every directory.
    pub fn new(rules: &[CategoryRuleConfig], exclude_patterns: &[String]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let pattern = Regex::new(&format!("(?i)^(?:{})", rule.pattern))
                    .with_context(|| format!("Invalid category pattern: '{}'", rule.pattern))?;
                Ok(CategoryRule {
                    pattern,
                    category: rule.category.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let excludes = exclude_patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| Regex::new(p).with_context(|| format!("Invalid exclude pattern: '{}'", p)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, excludes })
    }

    /// Return the category tag for `path`, or `None` when no rule matches
    /// or the path is excluded.
    pub fn classify(&self, path: &str) -> Option<&str> {
        if self.is_excluded(path) {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(path))
            .map(|rule| rule.category.as_str())
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|re| re.is_match(path))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, category: &str) -> CategoryRuleConfig {
        CategoryRuleConfig {
            pattern: pattern.to_string(),
            category: category.to_string(),
        }
    }

    fn classifier(excludes: &[&str]) -> Classifier {
        Classifier::new(
            &[
                rule("/archive/gt/", "gt"),
                rule("/archive/.*/pacbio", "pacbio"),
                rule("/archive/", "generic"),
            ],
            &excludes.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let c = classifier(&[]);
        assert_eq!(c.classify("/archive/gt/2020/pacbio/run1"), Some("gt"));
        assert_eq!(c.classify("/archive/lab/pacbio/run1"), Some("pacbio"));
        assert_eq!(c.classify("/archive/other"), Some("generic"));
    }

    #[test]
    fn test_case_insensitive_and_anchored() {
        let c = classifier(&[]);
        assert_eq!(c.classify("/archive/GT/2020/lab_x/run1"), Some("gt"));
        assert_eq!(c.classify("/mnt/archive/gt/run1"), None);
    }

    #[test]
    fn test_exclusion_overrides_match() {
        let c = classifier(&["/test/", r"\.old$", "expired-accounts"]);
        assert_eq!(c.classify("/archive/gt/test/run1"), None);
        assert_eq!(c.classify("/archive/gt/run1.old"), None);
        assert_eq!(c.classify("/archive/expired-accounts/x"), None);
        assert_eq!(c.classify("/archive/gt/run1"), Some("gt"));
    }

    #[test]
    fn test_exclusion_is_case_sensitive() {
        let c = classifier(&["/test/"]);
        assert_eq!(c.classify("/archive/gt/TEST/run1"), Some("gt"));
    }

    #[test]
    fn test_blank_excludes_ignored() {
        let c = classifier(&["", "  "]);
        assert_eq!(c.classify("/archive/gt/run1"), Some("gt"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(Classifier::new(&[rule("(", "x")], &[]).is_err());
        assert!(Classifier::new(&[], &["[".to_string()]).is_err());
    }

    #[test]
    fn test_no_rules() {
        let c = Classifier::new(&[], &[]).unwrap();
        assert_eq!(c.classify("/archive/anything"), None);
        assert_eq!(c.rule_count(), 0);
    }
}
