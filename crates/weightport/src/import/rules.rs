//! # Rename Rules
//!
//! A [`RenameRule`] maps one foreign checkpoint key into the target model's
//! namespace. Each rule sees the original key string and a *candidate*
//! [`KeyPath`], which is the original key split on ``.`` and ``/``.
//!
//! A rule answers with:
//! * `None` - the rule does not apply; the next rule is consulted.
//! * `Some(Translation)` - the new key, and an optional [`LayoutTransform`].
//!
//! Closures of the form ``Fn(&str, &KeyPath) -> Option<Translation>`` are
//! rules; the built-in rules cover the common declarative cases.

use crate::errors::{ImportError, ImportResult};
use crate::import::layout::LayoutTransform;
use crate::keys::KeyPath;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The result of a successful rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// The key in the target namespace.
    pub key: KeyPath,

    /// Axis permutation to apply to the tensor, if any.
    pub transform: Option<LayoutTransform>,
}

impl Translation {
    /// A plain rename.
    pub fn rename(key: KeyPath) -> Self {
        Self {
            key,
            transform: None,
        }
    }

    /// Attach a layout transform.
    pub fn with_transform(
        self,
        transform: LayoutTransform,
    ) -> Self {
        Self {
            transform: Some(transform),
            ..self
        }
    }
}

/// A single key-rename rule.
pub trait RenameRule: Send + Sync {
    /// Translate `old_key`, or decline with `None`.
    ///
    /// # Arguments
    ///
    /// - `old_key`: the key as it appears in the checkpoint.
    /// - `candidate`: `old_key` parsed as a [`KeyPath`].
    fn rename(
        &self,
        old_key: &str,
        candidate: &KeyPath,
    ) -> Option<Translation>;

    /// Short human-readable description, for logs.
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> RenameRule for F
where
    F: Fn(&str, &KeyPath) -> Option<Translation> + Send + Sync,
{
    fn rename(
        &self,
        old_key: &str,
        candidate: &KeyPath,
    ) -> Option<Translation> {
        self(old_key, candidate)
    }
}

/// Accept the candidate key unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptCandidate;

impl RenameRule for AcceptCandidate {
    fn rename(
        &self,
        _old_key: &str,
        candidate: &KeyPath,
    ) -> Option<Translation> {
        Some(Translation::rename(candidate.clone()))
    }

    fn describe(&self) -> String {
        "candidate".to_string()
    }
}

/// Regex rewrite of the original key.
///
/// The pattern must match the whole key; ``$1``-style group references in
/// the replacement are expanded. The result is re-parsed as a [`KeyPath`].
#[derive(Debug, Clone)]
pub struct RegexRename {
    pattern: Regex,
    replacement: String,
    transform: Option<LayoutTransform>,
}

impl RegexRename {
    /// Compile a rule.
    pub fn new(
        pattern: &str,
        replacement: &str,
    ) -> ImportResult<Self> {
        let anchored = format!("^(?:{pattern})$");
        let pattern = Regex::new(&anchored)
            .map_err(|e| ImportError::InvalidRule(format!("bad pattern {pattern:?}: {e}")))?;
        Ok(Self {
            pattern,
            replacement: replacement.to_string(),
            transform: None,
        })
    }

    /// Attach a layout transform to every rename.
    pub fn with_transform(
        self,
        transform: LayoutTransform,
    ) -> Self {
        Self {
            transform: Some(transform),
            ..self
        }
    }
}

impl RenameRule for RegexRename {
    fn rename(
        &self,
        old_key: &str,
        _candidate: &KeyPath,
    ) -> Option<Translation> {
        if !self.pattern.is_match(old_key) {
            return None;
        }
        let renamed = self.pattern.replace(old_key, self.replacement.as_str());
        let key = KeyPath::parse(&renamed)?;
        Some(Translation {
            key,
            transform: self.transform.clone(),
        })
    }

    fn describe(&self) -> String {
        format!("regex {} -> {}", self.pattern.as_str(), self.replacement)
    }
}

/// Keep the candidate key, but tag matching tensors with a layout transform.
///
/// Needles are matched as substrings of the candidate key in ``/`` form;
/// ``.``-delimited needles are normalized first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutHint {
    needles: Vec<String>,
    transform: LayoutTransform,
}

impl LayoutHint {
    /// Create a hint.
    pub fn new<I, S>(
        needles: I,
        transform: LayoutTransform,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            needles: needles
                .into_iter()
                .map(|n| n.as_ref().replace('.', "/"))
                .filter(|n| !n.is_empty())
                .collect(),
            transform,
        }
    }
}

impl RenameRule for LayoutHint {
    fn rename(
        &self,
        _old_key: &str,
        candidate: &KeyPath,
    ) -> Option<Translation> {
        let key = candidate.to_string();
        if self.needles.iter().any(|n| key.contains(n.as_str())) {
            Some(Translation::rename(candidate.clone()).with_transform(self.transform.clone()))
        } else {
            None
        }
    }

    fn describe(&self) -> String {
        format!("layout {:?} {:?}", self.needles, self.transform)
    }
}

/// Serializable form of the built-in rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenameRuleConfig {
    /// See [`AcceptCandidate`].
    Candidate,

    /// See [`RegexRename`].
    Regex {
        /// Whole-key pattern.
        pattern: String,

        /// Replacement, with ``$n`` group references.
        replacement: String,

        /// Optional transform for renamed tensors.
        #[serde(default)]
        transform: Option<LayoutTransform>,
    },

    /// See [`LayoutHint`].
    Layout {
        /// Candidate-key substrings.
        needles: Vec<String>,

        /// The transform for matching tensors.
        transform: LayoutTransform,
    },
}

impl RenameRuleConfig {
    /// Compile into a boxed rule.
    pub fn build(&self) -> ImportResult<Box<dyn RenameRule>> {
        let rule: Box<dyn RenameRule> = match self {
            RenameRuleConfig::Candidate => Box::new(AcceptCandidate),
            RenameRuleConfig::Regex {
                pattern,
                replacement,
                transform,
            } => {
                if let Some(transform) = transform {
                    check_transform(transform)?;
                }
                let rule = RegexRename::new(pattern, replacement)?;
                match transform {
                    Some(t) => Box::new(rule.with_transform(t.clone())),
                    None => Box::new(rule),
                }
            }
            RenameRuleConfig::Layout { needles, transform } => {
                check_transform(transform)?;
                Box::new(LayoutHint::new(needles, transform.clone()))
            }
        };
        Ok(rule)
    }
}

/// Rank-independent sanity checks, made when a rule is compiled.
fn check_transform(transform: &LayoutTransform) -> ImportResult<()> {
    match transform {
        LayoutTransform::Pattern(pattern) => {
            crate::import::layout::parse_pattern(pattern)
                .map(|_| ())
                .map_err(ImportError::InvalidRule)
        }
        LayoutTransform::Permute(axes) => LayoutTransform::Permute(axes.clone())
            .axes(axes.len())
            .map(|_| ())
            .map_err(ImportError::InvalidRule),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ImportErrorKind;

    fn key(s: &str) -> KeyPath {
        KeyPath::parse(s).unwrap()
    }

    #[test]
    fn test_accept_candidate() {
        let t = AcceptCandidate
            .rename("conv1.weight", &key("conv1.weight"))
            .unwrap();
        assert_eq!(t, Translation::rename(key("conv1/weight")));
    }

    #[test]
    fn test_closure_rule() {
        let rule = |old: &str, candidate: &KeyPath| -> Option<Translation> {
            old.strip_prefix("module.")
                .and_then(KeyPath::parse)
                .or_else(|| Some(candidate.clone()))
                .map(Translation::rename)
        };
        assert_eq!(
            rule.rename("module.fc.bias", &key("module.fc.bias")),
            Some(Translation::rename(key("fc/bias")))
        );
        assert_eq!(rule.describe(), "custom");
    }

    #[test]
    fn test_regex_rename() {
        let rule = RegexRename::new(r"fc\.(weight|bias)", "head.$1").unwrap();
        assert_eq!(
            rule.rename("fc.weight", &key("fc.weight")),
            Some(Translation::rename(key("head/weight")))
        );
        // Anchored; partial matches do not apply.
        assert_eq!(rule.rename("aux.fc.weight", &key("aux.fc.weight")), None);

        let rule = rule.with_transform(LayoutTransform::Transpose);
        assert_eq!(
            rule.rename("fc.weight", &key("fc.weight")).unwrap().transform,
            Some(LayoutTransform::Transpose)
        );
    }

    #[test]
    fn test_regex_rejects_bad_pattern() {
        let err = RegexRename::new("fc.(weight", "x").unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Translation);
    }

    #[test]
    fn test_layout_hint() {
        let rule = LayoutHint::new(["conv1.weight"], LayoutTransform::ChannelsFirstToChannelsLast);
        assert_eq!(
            rule.rename("layer1.0.conv1.weight", &key("layer1.0.conv1.weight")),
            Some(
                Translation::rename(key("layer1/0/conv1/weight"))
                    .with_transform(LayoutTransform::ChannelsFirstToChannelsLast)
            )
        );
        assert_eq!(rule.rename("conv1.bias", &key("conv1.bias")), None);
    }

    #[test]
    fn test_rule_config_serde() {
        let rules: Vec<RenameRuleConfig> = serde_json::from_str(
            r#"[
                {"kind": "regex", "pattern": "fc\\.weight", "replacement": "head/weight",
                 "transform": "transpose"},
                {"kind": "layout", "needles": ["conv"], "transform": {"pattern": "o i h w -> h w i o"}},
                {"kind": "candidate"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            rules[0],
            RenameRuleConfig::Regex {
                pattern: r"fc\.weight".to_string(),
                replacement: "head/weight".to_string(),
                transform: Some(LayoutTransform::Transpose),
            }
        );
        assert_eq!(
            rules[1],
            RenameRuleConfig::Layout {
                needles: vec!["conv".to_string()],
                transform: LayoutTransform::Pattern("o i h w -> h w i o".to_string()),
            }
        );
        assert_eq!(rules[2], RenameRuleConfig::Candidate);

        for rule in &rules {
            assert!(rule.build().is_ok());
        }
    }

    #[test]
    fn test_rule_config_rejects_bad_transform() {
        let rule = RenameRuleConfig::Layout {
            needles: vec!["conv".to_string()],
            transform: LayoutTransform::Pattern("o i -> i".to_string()),
        };
        assert!(matches!(rule.build(), Err(ImportError::InvalidRule(_))));

        let rule = RenameRuleConfig::Regex {
            pattern: "x".to_string(),
            replacement: "y".to_string(),
            transform: Some(LayoutTransform::Permute(vec![0, 0])),
        };
        assert!(matches!(rule.build(), Err(ImportError::InvalidRule(_))));
    }
}
