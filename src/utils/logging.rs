use serde::Serialize;

/// Longest pretty-printed document handed to a debug log line.
const MAX_PRETTY_LEN: usize = 4096;

/// Pretty-prints `value` for a debug log line, only when debug is enabled.
///
/// Output longer than [`MAX_PRETTY_LEN`] bytes is cut at a char boundary and
/// marked as truncated.
pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize + ?Sized,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(truncate(&pretty, MAX_PRETTY_LEN).as_ref());
}

fn truncate(text: &str, max: usize) -> std::borrow::Cow<'_, str> {
    if text.len() <= max {
        return text.into();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... <{} bytes truncated>", &text[..end], text.len() - end).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate("{}", 10), "{}");
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        let text = "ééééé";
        let cut = truncate(text, 3);
        assert_eq!(cut, "é... <8 bytes truncated>");
    }
}
