//! Light textual clean-up applied to surviving prompts.

/// Suffix appended when a prompt carries no quality descriptor at all.
pub const DEFAULT_QUALITY_SUFFIX: &str = ", highly detailed, cinematic";

/// Clean up a prompt.
///
/// Collapses whitespace, removes consecutive repeated words (ignoring
/// case), capitalizes the first character and appends
/// [`DEFAULT_QUALITY_SUFFIX`] when neither "cinematic" nor "detailed" is
/// mentioned. Empty input stays empty.
pub fn enhance(text: &str) -> String {
    let mut words: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        let repeated = words
            .last()
            .is_some_and(|prev| prev.to_lowercase() == word.to_lowercase());
        if !repeated {
            words.push(word);
        }
    }
    if words.is_empty() {
        return String::new();
    }

    let joined = words.join(" ");
    let mut chars = joined.chars();
    let mut enhanced = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    let lowered = enhanced.to_lowercase();
    if !lowered.contains("cinematic") && !lowered.contains("detailed") {
        enhanced.push_str(DEFAULT_QUALITY_SUFFIX);
    }
    enhanced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_repeats() {
        assert_eq!(
            enhance("  a  man man   walks The the road, cinematic "),
            "A man walks The road, cinematic"
        );
    }

    #[test]
    fn appends_suffix_when_missing() {
        assert_eq!(enhance("wide shot"), "Wide shot, highly detailed, cinematic");
    }

    #[test]
    fn leaves_detailed_prompts_alone() {
        assert_eq!(enhance("Detailed portrait"), "Detailed portrait");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(enhance("   "), "");
    }

    #[test]
    fn enhancing_twice_is_stable() {
        let once = enhance("an old sailor sailor at the helm");
        assert_eq!(enhance(&once), once);
    }
}
