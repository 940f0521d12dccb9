//! A small hand-written PDF dictionary tokenizer.
//!
//! Regex-based dictionary access breaks on adversarial PDFs: a reason
//! string containing a literal `<<`, or a hex string sitting next to a
//! nested dictionary, desynchronizes a naive bracket count. This module
//! walks the byte stream one syntactic unit at a time instead, so literal
//! strings, hex strings, arrays, and nested dictionaries are each skipped
//! as a whole before the next token starts.

use crate::error::{PdfSignError, Result};

/// Find the first `<<...>>` dictionary starting at or after `from` and
/// return its content (including the delimiters) plus the absolute
/// `[start, end)` byte span in `pdf`.
pub fn extract_balanced_dict(pdf: &[u8], from: usize) -> Result<(String, usize, usize)> {
    let start = find_subslice(pdf, b"<<", from)
        .ok_or_else(|| PdfSignError::PDFMalformed("no dictionary found".into()))?;
    let end = skip_value(pdf, start)?;
    let text = String::from_utf8_lossy(&pdf[start..end]).into_owned();
    Ok((text, start, end))
}

/// Advance past one PDF value (dictionary, array, string, hex string,
/// name, number, or keyword) starting at `i`. Returns the index just past
/// the value.
pub fn skip_value(pdf: &[u8], i: usize) -> Result<usize> {
    let mut i = skip_whitespace_and_comments(pdf, i);
    if i >= pdf.len() {
        return Err(PdfSignError::PDFMalformed("unexpected end of data".into()));
    }

    if pdf[i..].starts_with(b"<<") {
        let mut depth = 0i32;
        while i < pdf.len() {
            if pdf[i..].starts_with(b"<<") {
                depth += 1;
                i += 2;
            } else if pdf[i..].starts_with(b">>") {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Ok(i);
                }
            } else if pdf[i] == b'(' {
                i = skip_literal_string(pdf, i)?;
            } else if pdf[i] == b'<' {
                i = skip_hex_string(pdf, i)?;
            } else {
                i += 1;
            }
        }
        return Err(PdfSignError::PDFMalformed("unterminated dictionary".into()));
    }

    if pdf[i] == b'[' {
        let mut depth = 0i32;
        while i < pdf.len() {
            match pdf[i] {
                b'[' => {
                    depth += 1;
                    i += 1;
                }
                b']' => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                b'(' => i = skip_literal_string(pdf, i)?,
                b'<' if !pdf[i..].starts_with(b"<<") => i = skip_hex_string(pdf, i)?,
                b'<' => {
                    // Nested dictionary inside an array.
                    let mut depth2 = 0i32;
                    loop {
                        if pdf[i..].starts_with(b"<<") {
                            depth2 += 1;
                            i += 2;
                        } else if pdf[i..].starts_with(b">>") {
                            depth2 -= 1;
                            i += 2;
                            if depth2 == 0 {
                                break;
                            }
                        } else {
                            i += 1;
                        }
                    }
                }
                _ => i += 1,
            }
        }
        return Err(PdfSignError::PDFMalformed("unterminated array".into()));
    }

    if pdf[i] == b'(' {
        return skip_literal_string(pdf, i);
    }

    if pdf[i] == b'<' {
        return skip_hex_string(pdf, i);
    }

    // Name, number, or keyword: run until the next delimiter or whitespace.
    if pdf[i] == b'/' {
        i += 1;
    }
    while i < pdf.len() && !is_delimiter(pdf[i]) && !pdf[i].is_ascii_whitespace() {
        i += 1;
    }
    Ok(i)
}

fn skip_literal_string(pdf: &[u8], mut i: usize) -> Result<usize> {
    debug_assert_eq!(pdf[i], b'(');
    i += 1;
    let mut depth = 1i32;
    while i < pdf.len() {
        match pdf[i] {
            b'\\' => i += 2,
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => i += 1,
        }
    }
    Err(PdfSignError::PDFMalformed("unterminated literal string".into()))
}

fn skip_hex_string(pdf: &[u8], mut i: usize) -> Result<usize> {
    debug_assert_eq!(pdf[i], b'<');
    i += 1;
    while i < pdf.len() {
        if pdf[i] == b'>' {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(PdfSignError::PDFMalformed("unterminated hex string".into()))
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn skip_whitespace_and_comments(pdf: &[u8], mut i: usize) -> usize {
    loop {
        while i < pdf.len() && pdf[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < pdf.len() && pdf[i] == b'%' {
            while i < pdf.len() && pdf[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        break;
    }
    i
}

/// Flatten a dictionary's top-level content into a sequence of raw tokens:
/// each name (`/Key`), each value (numbers, names, `(strings)`, `<hex>`,
/// whole `[arrays]`, whole `<<dicts>>`, and bare keywords). Nested
/// structures are kept intact as a single token.
pub fn tokenize(dict: &str) -> Vec<String> {
    let bytes = dict.as_bytes();
    let inner_start = if bytes.starts_with(b"<<") { 2 } else { 0 };
    let inner_end = if bytes.ends_with(b">>") {
        bytes.len() - 2
    } else {
        bytes.len()
    };
    let mut i = inner_start;
    let mut tokens = Vec::new();
    while i < inner_end {
        i = skip_whitespace_and_comments(bytes, i);
        if i >= inner_end {
            break;
        }
        let Ok(end) = skip_value(bytes, i) else { break };
        let end = end.min(inner_end);
        if end <= i {
            break;
        }
        tokens.push(String::from_utf8_lossy(&bytes[i..end]).into_owned());
        i = end;
    }
    tokens
}

/// Index of the top-level key token `/name` in a flattened token stream.
pub fn find_key(tokens: &[String], name: &str) -> Option<usize> {
    let needle = format!("/{name}");
    tokens.iter().position(|t| t == &needle)
}

/// The raw value token immediately following a key at `idx`.
pub fn value_at(tokens: &[String], idx: usize) -> Option<&str> {
    tokens.get(idx + 1).map(|s| s.as_str())
}

/// Parse an indirect reference `N G R` starting at `idx` (the key's
/// index): returns `(object_number, generation)`.
pub fn ref_at(tokens: &[String], idx: usize) -> Option<(u32, u16)> {
    let num = tokens.get(idx + 1)?.parse::<u32>().ok()?;
    let gen = tokens.get(idx + 2)?.parse::<u16>().ok()?;
    if tokens.get(idx + 3).map(|s| s.as_str()) != Some("R") {
        return None;
    }
    Some((num, gen))
}

/// Parse a name value (without the leading `/`) following a key at `idx`.
pub fn name_at(tokens: &[String], idx: usize) -> Option<String> {
    let raw = value_at(tokens, idx)?;
    raw.strip_prefix('/').map(|s| s.to_string())
}

/// Parse an integer value following a key at `idx`.
pub fn int_at(tokens: &[String], idx: usize) -> Option<i64> {
    value_at(tokens, idx)?.parse::<i64>().ok()
}

/// Parse an array of indirect references (e.g. `/Kids [1 0 R 2 0 R]`).
pub fn ref_array_at(tokens: &[String], idx: usize) -> Option<Vec<u32>> {
    let raw = value_at(tokens, idx)?;
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    let parts: Vec<&str> = inner.split_whitespace().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i + 2 < parts.len() {
        if parts[i + 2] == "R" {
            if let Ok(n) = parts[i].parse::<u32>() {
                out.push(n);
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Some(out)
}

/// Escape `s` into a PDF literal string, including its `(`/`)` delimiters.
pub fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('(');
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push(')');
    out
}

/// Strip the delimiters and escape sequences from a PDF literal-string
/// token (e.g. `(Sig\)1)` -> `Sig)1`).
pub fn unescape_pdf_string(raw: &str) -> String {
    let inner = raw.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                match next {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    other => out.push(other),
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Rebuild a dictionary, replacing the value of each key in `overrides`
/// (appending it if absent) and keeping every other entry's original
/// token text untouched. Assumes top-level key/value alternation, which
/// holds for any dictionary this writer itself produced or read.
pub fn rebuild_dict(dict: &str, overrides: &[(&str, String)]) -> String {
    let tokens = tokenize(dict);
    let mut used = vec![false; overrides.len()];
    let mut out = String::from("<<");
    let mut i = 0;
    while i + 1 < tokens.len() {
        let key_tok = &tokens[i];
        let value_tok = &tokens[i + 1];
        if let Some(key_name) = key_tok.strip_prefix('/') {
            if let Some(pos) = overrides.iter().position(|(k, _)| *k == key_name) {
                out.push(' ');
                out.push_str(key_tok);
                out.push(' ');
                out.push_str(&overrides[pos].1);
                used[pos] = true;
                i += 2;
                continue;
            }
        }
        out.push(' ');
        out.push_str(key_tok);
        out.push(' ');
        out.push_str(value_tok);
        i += 2;
    }
    for (idx, (k, v)) in overrides.iter().enumerate() {
        if !used[idx] {
            out.push_str(&format!(" /{k} {v}"));
        }
    }
    out.push_str(" >>");
    out
}

#[cfg(test)]
mod rebuild_tests {
    use super::*;

    #[test]
    fn rebuild_overrides_existing_key_and_preserves_others() {
        let dict = "<< /Type /Page /Annots [1 0 R] /MediaBox [0 0 612 792] >>";
        let rebuilt = rebuild_dict(dict, &[("Annots", "[1 0 R 9 0 R]".to_string())]);
        assert!(rebuilt.contains("/Annots [1 0 R 9 0 R]"));
        assert!(rebuilt.contains("/MediaBox [0 0 612 792]"));
        assert!(rebuilt.contains("/Type /Page"));
    }

    #[test]
    fn rebuild_appends_missing_key() {
        let dict = "<< /FT /Sig /T (Sig1) >>";
        let rebuilt = rebuild_dict(dict, &[("V", "5 0 R".to_string())]);
        assert!(rebuilt.contains("/V 5 0 R"));
    }

    #[test]
    fn escape_and_unescape_round_trip() {
        let escaped = escape_pdf_string("a (b) c\\d");
        assert_eq!(unescape_pdf_string(&escaped), "a (b) c\\d");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_dict() {
        let pdf = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj";
        let (text, start, end) = extract_balanced_dict(pdf, 0).unwrap();
        assert!(text.starts_with("<<"));
        assert!(text.ends_with(">>"));
        assert_eq!(&pdf[start..end], text.as_bytes());
    }

    #[test]
    fn handles_nested_dict_and_hex_string() {
        let pdf = b"1 0 obj\n<< /A << /B 1 >> /C <ABCD> >>\nendobj";
        let (text, _, _) = extract_balanced_dict(pdf, 0).unwrap();
        let tokens = tokenize(&text);
        assert!(tokens.contains(&"/A".to_string()));
        assert!(tokens.iter().any(|t| t.starts_with("<<") && t.contains("/B")));
        assert!(tokens.contains(&"<ABCD>".to_string()));
    }

    #[test]
    fn handles_literal_string_with_escaped_paren() {
        let pdf = b"<< /Reason (signed \\) here) /X 1 >>";
        let tokens = tokenize(&String::from_utf8_lossy(pdf));
        let idx = find_key(&tokens, "Reason").unwrap();
        assert_eq!(value_at(&tokens, idx), Some("(signed \\) here)"));
    }

    #[test]
    fn parses_indirect_reference() {
        let pdf = "<< /Root 5 0 R >>".to_string();
        let tokens = tokenize(&pdf);
        let idx = find_key(&tokens, "Root").unwrap();
        assert_eq!(ref_at(&tokens, idx), Some((5, 0)));
    }

    #[test]
    fn parses_kids_array() {
        let pdf = "<< /Kids [3 0 R 4 0 R] /Count 2 >>".to_string();
        let tokens = tokenize(&pdf);
        let idx = find_key(&tokens, "Kids").unwrap();
        assert_eq!(ref_array_at(&tokens, idx), Some(vec![3, 4]));
        let count_idx = find_key(&tokens, "Count").unwrap();
        assert_eq!(int_at(&tokens, count_idx), Some(2));
    }
}
