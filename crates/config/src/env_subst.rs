//! `${VAR}` and `${VAR:-fallback}` expansion for raw config text.

/// Expand placeholders from the process environment.
///
/// Unset variables without a fallback are left as written.
pub fn substitute_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

pub(crate) fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let placeholder = &after[..end];
        let (name, fallback) = match placeholder.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (placeholder, None),
        };

        let value = if name.is_empty() {
            None
        } else {
            lookup(name)
        };
        match (value, fallback) {
            (Some(value), Some(fallback)) if value.is_empty() => out.push_str(fallback),
            (Some(value), _) => out.push_str(&value),
            (None, Some(fallback)) if !name.is_empty() => out.push_str(fallback),
            _ => {
                out.push_str("${");
                out.push_str(placeholder);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HERALD_TEST_TOKEN" => Some("123:abc".to_string()),
            "HERALD_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_var() {
        assert_eq!(
            expand_with("token = \"${HERALD_TEST_TOKEN}\"", lookup),
            "token = \"123:abc\""
        );
    }

    #[test]
    fn unknown_var_is_left_alone() {
        assert_eq!(expand_with("${HERALD_MISSING}", lookup), "${HERALD_MISSING}");
    }

    #[test]
    fn fallback_applies_to_unset_and_empty() {
        assert_eq!(expand_with("${HERALD_MISSING:-10}", lookup), "10");
        assert_eq!(expand_with("${HERALD_EMPTY:-x}", lookup), "x");
        assert_eq!(expand_with("${HERALD_TEST_TOKEN:-x}", lookup), "123:abc");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(expand_with("a ${HERALD_TEST_TOKEN", lookup), "a ${HERALD_TEST_TOKEN");
        assert_eq!(expand_with("${}", lookup), "${}");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
