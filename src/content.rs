use crate::config::CLEAN_MAX_PASSES;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static BREAK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static SELF_CLOSING_REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<ref[^>]*/>").unwrap());

static REF_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<ref[^>]*>.*?</ref>").unwrap());

/// Sized icon embeds such as `[[30px|link=Category:PHY Ki Spheres]]`.
static SIZED_IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[\d+px[^\]]*\]\]").unwrap());

static IMAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[\[(?:File|Image):[^\]]*\]\]").unwrap());

static INNER_TEMPLATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap());

static PIPED_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[[^|\]]+\|([^\]]+)\]\]").unwrap());

static BARE_LINK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

static EMPHASIS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"'''?").unwrap());

static SPACE_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

static BLANK_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Captures the target of `[[target]]` and `[[target|label]]`.
pub static LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^|\]]+?)(?:\|[^\]]+)?\]\]").unwrap());

/// Reduces wikitext to readable plain text.
///
/// Rules run in a fixed order; later rules rely on earlier ones (links are only
/// unwrapped once templates, which may contain link-like pipes, are gone).
pub fn clean_wiki(text: &str) -> String {
    let text = BREAK_REGEX.replace_all(text, "\n");
    let text = COMMENT_REGEX.replace_all(&text, "");
    let text = SELF_CLOSING_REF_REGEX.replace_all(&text, "");
    let text = REF_BLOCK_REGEX.replace_all(&text, "");
    let text = SIZED_IMAGE_REGEX.replace_all(&text, "");
    let text = IMAGE_REGEX.replace_all(&text, "");
    let text = strip_templates(&text);
    let text = PIPED_LINK_REGEX.replace_all(&text, "${1}");
    let text = BARE_LINK_REGEX.replace_all(&text, "${1}");
    let text = TAG_REGEX.replace_all(&text, "");
    let text = EMPHASIS_REGEX.replace_all(&text, "");
    let text = SPACE_RUN_REGEX.replace_all(&text, " ");
    let text = BLANK_RUN_REGEX.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Removes innermost `{{...}}` invocations until none are left or the pass cap is hit.
fn strip_templates(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..CLEAN_MAX_PASSES {
        if !INNER_TEMPLATE_REGEX.is_match(&current) {
            return current;
        }
        current = INNER_TEMPLATE_REGEX.replace_all(&current, "").into_owned();
    }
    if INNER_TEMPLATE_REGEX.is_match(&current) {
        debug!(
            passes = CLEAN_MAX_PASSES,
            "Template stripping hit pass limit, keeping partial text"
        );
    }
    current
}

/// Link targets in document order, trimmed, duplicates included.
pub fn extract_link_targets(text: &str) -> Vec<String> {
    LINK_REGEX
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_line_breaks() {
        assert_eq!(clean_wiki("one<br>two<BR />three"), "one\ntwo\nthree");
    }

    #[test]
    fn removes_comments_and_refs() {
        let text = "ATK +20%<!-- hidden\nnote --><ref>source</ref><ref name=\"a\"/> end";
        assert_eq!(clean_wiki(text), "ATK +20% end");
    }

    #[test]
    fn removes_image_embeds() {
        let text = "[[30px|link=Category:PHY Ki Spheres]]Ki +3 [[File:Icon.png|20px]]";
        assert_eq!(clean_wiki(text), "Ki +3");
    }

    #[test]
    fn strips_nested_templates() {
        let text = "Raises ATK {{outer|{{inner|x}}|y}}by 50%";
        assert_eq!(clean_wiki(text), "Raises ATK by 50%");
    }

    #[test]
    fn unwraps_links() {
        let text = "[[Category:Super Saiyans|Super Saiyans]] Category and [[Goku]]";
        assert_eq!(clean_wiki(text), "Super Saiyans Category and Goku");
    }

    #[test]
    fn strips_tags_and_emphasis() {
        let text = "<span style=\"color:red\">'''Great'''</span> ''Ki'' +2";
        assert_eq!(clean_wiki(text), "Great Ki +2");
    }

    #[test]
    fn collapses_blank_lines_and_spaces() {
        let text = "  a\t\t b\n\n\n\n\nc  ";
        assert_eq!(clean_wiki(text), "a b\n\nc");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let text = "'''Ki''' +3<br/>{{Tooltip|HP}} and [[Link|ATK]] +{{Num|100}}%\n\n\n\nDEF";
        let once = clean_wiki(text);
        assert_eq!(clean_wiki(&once), once);
    }

    #[test]
    fn unbalanced_template_does_not_hang() {
        let text = "before {{broken {{inner}} after";
        let cleaned = clean_wiki(text);
        assert!(cleaned.starts_with("before"));
        assert!(!cleaned.contains("inner"));
    }

    #[test]
    fn deep_nesting_past_pass_limit_returns_partial() {
        let depth = CLEAN_MAX_PASSES + 4;
        let text = format!("{}x{}", "{{a|".repeat(depth), "}}".repeat(depth));
        let cleaned = strip_templates(&text);
        assert!(cleaned.contains("{{"));
        assert!(!cleaned.contains('x'));
    }

    #[test]
    fn link_targets_in_order() {
        let text = "[[Goku]] then [[Vegeta|the prince]] and [[Goku]]";
        assert_eq!(extract_link_targets(text), vec!["Goku", "Vegeta", "Goku"]);
    }

    #[test]
    fn link_targets_none() {
        assert!(extract_link_targets("no links {{here}}").is_empty());
    }
}
