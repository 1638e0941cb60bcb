//! Reload script splicing.

/// Insert `script` right before the last `</body>` (any case) of `content`,
/// or append it when there is none.
pub fn inject_script(content: &[u8], script: &[u8]) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let mut result = Vec::with_capacity(content.len() + script.len());

    if let Some(pos) = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        result.extend_from_slice(&content[..pos]);
        result.extend_from_slice(script);
        result.extend_from_slice(&content[pos..]);
        return result;
    }

    // Browsers still run a script after the document end
    result.extend_from_slice(content);
    result.extend_from_slice(script);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &[u8] = b"<script>x</script>";

    fn inject(content: &str) -> String {
        String::from_utf8(inject_script(content.as_bytes(), SCRIPT)).unwrap()
    }

    #[test]
    fn test_inject_before_body_close() {
        assert_eq!(
            inject("<html><body>hi</body></html>"),
            "<html><body>hi<script>x</script></body></html>"
        );
    }

    #[test]
    fn test_inject_mixed_case_with_trailing_whitespace() {
        assert_eq!(
            inject("<HTML><BODY>hi</BoDy>\n  </HTML>\n"),
            "<HTML><BODY>hi<script>x</script></BoDy>\n  </HTML>\n"
        );
    }

    #[test]
    fn test_inject_uses_last_occurrence() {
        assert_eq!(
            inject("<pre></body></pre></body>"),
            "<pre></body></pre><script>x</script></body>"
        );
    }

    #[test]
    fn test_inject_appends_without_body() {
        assert_eq!(inject("<p>fragment</p>"), "<p>fragment</p><script>x</script>");
        assert_eq!(inject(""), "<script>x</script>");
    }
}
