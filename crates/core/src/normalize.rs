//! Text normalization shared by the matcher, the history lookup and the
//! feedback recorder. Each consumer needs a slightly different shape, so the
//! variants live side by side here.

/// Upper-cased and trimmed, as compared by the local pattern table.
pub fn normalize_description(description: &str) -> String {
    description.trim().to_uppercase()
}

/// Upper-cased with runs of whitespace collapsed to one space.
pub fn collapse_description(description: &str) -> String {
    description
        .split_whitespace()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First word of the collapsed description, if any.
pub fn first_word(description: &str) -> Option<String> {
    collapse_description(description)
        .split(' ')
        .find(|w| !w.is_empty())
        .map(str::to_string)
}

/// Merchant key stored for learned patterns: the first word, extended with the
/// second word when the first is shorter than four characters ("SL", "ICA").
pub fn pattern_text(description: &str) -> Option<String> {
    let collapsed = collapse_description(description);
    let mut words = collapsed.split(' ').filter(|w| !w.is_empty());
    let first = words.next()?;
    if first.chars().count() < 4 {
        if let Some(second) = words.next() {
            return Some(format!("{first} {second}"));
        }
    }
    Some(first.to_string())
}

/// Lower-cased alphabetic keywords from the first three words; words shorter
/// than three letters after stripping are dropped. Order is preserved and
/// duplicates removed.
pub fn description_keywords(description: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in description.split_whitespace().take(3) {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphabetic())
            .flat_map(char::to_lowercase)
            .collect();
        if cleaned.chars().count() >= 3 && !keywords.contains(&cleaned) {
            keywords.push(cleaned);
        }
    }
    keywords
}
