//! Tag parsing helper.
//!
//! Turns wire-format `"key:value"` strings into [`Tag`]s. Filtering a bag
//! of tags down to edge/hashable subsets is core's job
//! (`streamtrace_core::pathway::edge_tags`); this module only parses.

use streamtrace_core::Tag;

/// Parses one `"key:value"` string. The value may itself contain `:`
/// (split on the first occurrence only); a string with no `:` is treated
/// as a key with an empty value.
pub fn parse_tag(raw: &str) -> Tag {
    match raw.split_once(':') {
        Some((key, value)) => Tag::new(key, value),
        None => Tag::new(raw, ""),
    }
}

/// Parses a comma-separated list of `"key:value"` pairs, e.g.
/// `"type:kafka,topic:orders"`. Empty segments are skipped.
pub fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(parse_tag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tag_splits_on_first_colon() {
        let tag = parse_tag("topic:orders:v2");
        assert_eq!(tag.key, "topic");
        assert_eq!(tag.value, "orders:v2");
    }

    #[test]
    fn parse_tag_without_colon_has_empty_value() {
        let tag = parse_tag("bare-key");
        assert_eq!(tag.key, "bare-key");
        assert_eq!(tag.value, "");
    }

    #[test]
    fn parse_tags_splits_on_commas_and_trims_whitespace() {
        let tags = parse_tags("type:kafka, topic:orders ,, group:g1");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].key, "type");
        assert_eq!(tags[1].value, "orders");
        assert_eq!(tags[2].key, "group");
    }

    #[test]
    fn parse_tags_of_empty_string_is_empty() {
        assert!(parse_tags("").is_empty());
    }
}
