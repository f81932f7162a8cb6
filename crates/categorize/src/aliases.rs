use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Maps spelling variants of a merchant on statements to one canonical keyword.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerchantAlias {
    /// Case-insensitive regex tested against the raw description.
    pub pattern: String,
    pub keyword: String,
}

impl MerchantAlias {
    pub fn new(pattern: &str, keyword: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            keyword: keyword.to_string(),
        }
    }
}

struct CompiledAlias {
    regex: Regex,
    keyword: String,
}

pub struct MerchantAliasTable {
    aliases: Vec<CompiledAlias>,
}

impl MerchantAliasTable {
    /// Aliases whose regex does not compile are logged and skipped.
    pub fn new(aliases: Vec<MerchantAlias>) -> Self {
        let mut compiled = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let built = RegexBuilder::new(&alias.pattern)
                .case_insensitive(true)
                .build();
            match built {
                Ok(regex) => compiled.push(CompiledAlias {
                    regex,
                    keyword: alias.keyword.to_lowercase(),
                }),
                Err(e) => {
                    tracing::warn!(
                        pattern = %alias.pattern,
                        error = %e,
                        "skipping invalid merchant alias"
                    );
                }
            }
        }
        Self { aliases: compiled }
    }

    pub fn builtin_aliases() -> Vec<MerchantAlias> {
        vec![
            MerchantAlias::new(r"MC ?DONALDS|\bMCD\b", "mcdonalds"),
            MerchantAlias::new(r"\bICA\b", "ica"),
            MerchantAlias::new(r"SYSTEMBOL", "systembolaget"),
            MerchantAlias::new(r"HEMK[OÖ]P", "hemköp"),
            MerchantAlias::new(r"WILLY'?S", "willys"),
            MerchantAlias::new(r"PRESSBYR[AÅ]N", "pressbyrån"),
            MerchantAlias::new(r"AMZN|AMAZON", "amazon"),
            MerchantAlias::new(r"\bSL\b|STORSTOCKHOLMS LOKALTRAFIK", "sl"),
        ]
    }

    pub fn builtin() -> Self {
        Self::new(Self::builtin_aliases())
    }

    /// Built-in aliases followed by `extra`.
    pub fn with_extra(extra: Vec<MerchantAlias>) -> Self {
        let mut aliases = Self::builtin_aliases();
        aliases.extend(extra);
        Self::new(aliases)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Canonical keywords of every alias matching `raw`, without duplicates.
    pub fn keywords_for(&self, raw: &str) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for alias in &self.aliases {
            if alias.regex.is_match(raw) && !keywords.contains(&alias.keyword) {
                keywords.push(alias.keyword.clone());
            }
        }
        keywords
    }
}

impl Default for MerchantAliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}
