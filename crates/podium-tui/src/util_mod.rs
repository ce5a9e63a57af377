use unicode_width::UnicodeWidthChar as _;

/// Fixed third-party endpoint that turns a URL into a QR code image.
const QR_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/?size=220x220&data=";

pub(crate) fn qr_image_url(target: &str) -> String {
    format!("{}{}", QR_ENDPOINT, percent_encode(target.trim()))
}

pub(crate) fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

/// Single-line summary of a question body for the list pane.
pub(crate) fn preview_text(text: &str, max_cols: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_label(&flat, max_cols)
}

pub(crate) fn truncate_label(text: &str, max_cols: usize) -> String {
    let mut width = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > max_cols {
            out.push_str("...");
            return out;
        }
        width += w;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{percent_encode, preview_text, qr_image_url, truncate_label};

    #[test]
    fn percent_encode_keeps_unreserved_and_escapes_the_rest() {
        assert_eq!(percent_encode("AZaz09-_.~"), "AZaz09-_.~");
        assert_eq!(
            percent_encode("https://forms.example/ask?x=1&y=2"),
            "https%3A%2F%2Fforms.example%2Fask%3Fx%3D1%26y%3D2"
        );
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn qr_image_url_embeds_the_encoded_target() {
        assert_eq!(
            qr_image_url(" https://example.org "),
            "https://api.qrserver.com/v1/create-qr-code/?size=220x220&data=https%3A%2F%2Fexample.org"
        );
    }

    #[test]
    fn preview_flattens_newlines_and_truncates() {
        assert_eq!(preview_text("line one\nline  two", 100), "line one line two");
        assert_eq!(preview_text("abcdef", 4), "abcd...");
    }

    #[test]
    fn truncate_counts_display_width() {
        // Wide CJK characters take two columns each.
        assert_eq!(truncate_label("ああああ", 4), "ああ...");
        assert_eq!(truncate_label("short", 10), "short");
    }
}
