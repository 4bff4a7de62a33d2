/// Truncate to at most `max_bytes`, backing up to the nearest char boundary
/// so multi-byte text never splits mid-character.
pub fn truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through() {
        assert_eq!(truncate("hello", 300), "hello");
        assert_eq!(truncate("", 300), "");
    }

    #[test]
    fn ascii_cuts_at_the_cap() {
        let s = "x".repeat(500);
        assert_eq!(truncate(&s, 300).len(), 300);
    }

    #[test]
    fn multibyte_backs_up_to_a_char_boundary() {
        // "€" is 3 bytes; a 1-byte prefix puts every boundary off by one
        let s = format!("a{}", "€".repeat(200));
        let cut = truncate(&s, 300);
        assert!(cut.len() <= 300);
        assert!(s.is_char_boundary(cut.len()));
        assert!(cut.starts_with('a'));
    }
}
