//! Classical xref/trailer PDF reader: last trailer, the xref map built
//! by walking `/Prev`, object lookup with a priority-based scan
//! fallback, and `/Pages` tree traversal.

use std::collections::{HashMap, HashSet};

use crate::error::{PdfSignError, Result};
use crate::pdf::tokenizer::{extract_balanced_dict, find_key, int_at, name_at, ref_array_at, ref_at, tokenize};

/// Object number -> absolute byte offset of its `N G obj` header, the most
/// recent definition across the whole `/Prev` chain.
pub type XrefMap = HashMap<u32, usize>;

/// The last trailer dictionary in the file.
#[derive(Debug, Clone)]
pub struct Trailer {
    pub root: u32,
    pub size: u32,
    pub prev: Option<usize>,
}

/// A parsed indirect object: its dictionary text and absolute byte span
/// of the whole `N G obj ... endobj` region covered by the dictionary.
pub struct ObjectSpan {
    pub dict: String,
    pub start: usize,
    pub end: usize,
}

/// A parsed PDF: the original bytes, the last trailer, and the
/// accumulated xref map. Built once per operation and consumed by the
/// writer; no buffer outlives the call that parsed it here.
pub struct PdfDocument {
    pub bytes: Vec<u8>,
    pub trailer: Trailer,
    pub xref: XrefMap,
}

impl PdfDocument {
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let startxref = find_last_startxref(&bytes)?;
        let mut xref = XrefMap::new();
        let mut visited = HashSet::new();
        let trailer = walk_xref_chain(&bytes, startxref, &mut xref, &mut visited)?;
        Ok(Self { bytes, trailer, xref })
    }

    pub fn read_object(&self, num: u32) -> Result<ObjectSpan> {
        read_object(&self.bytes, &self.xref, num)
    }

    pub fn first_page_object(&self) -> Result<u32> {
        find_first_page_obj_num_safe(&self.bytes, &self.xref, self.trailer.root)
    }

    pub fn page_object_by_index(&self, index: usize) -> Result<u32> {
        find_page_obj_num_by_index(&self.bytes, &self.xref, self.trailer.root, index)
    }
}

/// Locate the last `startxref N` / `%%EOF` pair and return `N`.
pub fn find_last_startxref(pdf: &[u8]) -> Result<usize> {
    let pos = rfind_subslice(pdf, b"startxref")
        .ok_or_else(|| PdfSignError::PDFMalformed("no startxref found".into()))?;
    let after = pos + b"startxref".len();
    let rest = &pdf[after..];
    let digits_start = rest
        .iter()
        .position(|b| b.is_ascii_digit())
        .ok_or_else(|| PdfSignError::PDFMalformed("startxref has no offset".into()))?;
    let digits_end = rest[digits_start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map(|p| digits_start + p)
        .unwrap_or(rest.len());
    std::str::from_utf8(&rest[digits_start..digits_end])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| PdfSignError::PDFMalformed("malformed startxref offset".into()))
}

/// Walk `xref` / `trailer` sections through `/Prev`, merging into `xref_map`
/// (first-seen wins: the newest update is read first). Returns the
/// newest (first-encountered) trailer.
fn walk_xref_chain(
    pdf: &[u8],
    startxref: usize,
    xref_map: &mut XrefMap,
    visited: &mut HashSet<usize>,
) -> Result<Trailer> {
    if !visited.insert(startxref) {
        return Err(PdfSignError::PDFMalformed("cyclic /Prev chain".into()));
    }

    let newest = read_one_xref_section(pdf, startxref, xref_map)?;

    if let Some(prev) = newest.prev {
        if visited.contains(&prev) {
            return Ok(newest);
        }
        // Older sections only fill in objects not already defined.
        let _ = walk_xref_chain(pdf, prev, xref_map, visited);
    }

    Ok(newest)
}

/// Parse one classical xref table starting at `offset`, inserting any
/// object number not already present in `xref_map`, then parse its
/// trailer. Falls back to a whole-buffer object scan if `offset` does not
/// begin with the literal `xref` keyword (e.g. a cross-reference stream).
fn read_one_xref_section(pdf: &[u8], offset: usize, xref_map: &mut XrefMap) -> Result<Trailer> {
    if !pdf[offset..].starts_with(b"xref") {
        populate_by_scan(pdf, xref_map);
        let trailer_pos = rfind_subslice(pdf, b"trailer")
            .ok_or_else(|| PdfSignError::PDFMalformed("no trailer found".into()))?;
        return parse_trailer(pdf, trailer_pos);
    }

    let mut i = offset + b"xref".len();
    loop {
        i = skip_ws(pdf, i);
        if pdf[i..].starts_with(b"trailer") {
            return parse_trailer(pdf, i);
        }

        let (start_num, after_start) = read_uint(pdf, i)
            .ok_or_else(|| PdfSignError::PDFMalformed("malformed xref subsection header".into()))?;
        let i2 = skip_ws(pdf, after_start);
        let (count, after_count) = read_uint(pdf, i2)
            .ok_or_else(|| PdfSignError::PDFMalformed("malformed xref subsection header".into()))?;
        i = skip_ws(pdf, after_count);

        for entry_idx in 0..count {
            let entry = pdf.get(i..i + 20).ok_or_else(|| {
                PdfSignError::PDFMalformed("truncated xref entry".into())
            })?;
            let entry_str = std::str::from_utf8(entry)
                .map_err(|_| PdfSignError::PDFMalformed("non-ASCII xref entry".into()))?;
            let parts: Vec<&str> = entry_str.split_whitespace().collect();
            if parts.len() >= 3 {
                let obj_num = start_num + entry_idx as u32;
                if parts[2] == "n" {
                    if let Ok(entry_offset) = parts[0].parse::<usize>() {
                        xref_map.entry(obj_num).or_insert(entry_offset);
                    }
                }
            }
            i += 20;
        }
    }
}

/// Used when `startxref` doesn't point at a literal `xref` table (e.g. a
/// cross-reference stream, or a hand-repaired PDF): scan the whole buffer
/// for `N G obj` headers and record the first (latest-appended, since
/// later definitions are assumed to be appended later) offset seen for
/// each object number not already known.
fn populate_by_scan(pdf: &[u8], xref_map: &mut XrefMap) {
    let mut i = 0;
    while let Some(rel) = find_subslice(&pdf[i..], b" obj", 0) {
        let obj_keyword_at = i + rel;
        if let Some((num, start)) = header_before(pdf, obj_keyword_at) {
            xref_map.entry(num).or_insert(start);
        }
        i = obj_keyword_at + 4;
    }
}

/// Given the byte index of the literal `" obj"` substring, walk backwards
/// over `generation` and `object-number` to find where the header begins.
fn header_before(pdf: &[u8], obj_keyword_at: usize) -> Option<(u32, usize)> {
    let mut j = obj_keyword_at;
    // generation digits
    while j > 0 && pdf[j - 1].is_ascii_digit() {
        j -= 1;
    }
    let gen_start = j;
    if gen_start == obj_keyword_at {
        return None;
    }
    j = skip_ws_back(pdf, j);
    let num_end = j;
    while j > 0 && pdf[j - 1].is_ascii_digit() {
        j -= 1;
    }
    let num_start = j;
    if num_start == num_end {
        return None;
    }
    let num = std::str::from_utf8(&pdf[num_start..num_end]).ok()?.parse().ok()?;
    Some((num, num_start))
}

fn parse_trailer(pdf: &[u8], trailer_kw_at: usize) -> Result<Trailer> {
    let after = trailer_kw_at + b"trailer".len();
    let (dict, _, _) = extract_balanced_dict(pdf, after)?;
    let tokens = tokenize(&dict);

    let root_idx = find_key(&tokens, "Root")
        .ok_or_else(|| PdfSignError::PDFMalformed("trailer has no /Root".into()))?;
    let (root, _gen) = ref_at(&tokens, root_idx)
        .ok_or_else(|| PdfSignError::PDFMalformed("trailer /Root is not an indirect reference".into()))?;

    let size = find_key(&tokens, "Size")
        .and_then(|idx| int_at(&tokens, idx))
        .unwrap_or(0) as u32;

    let prev = find_key(&tokens, "Prev").and_then(|idx| int_at(&tokens, idx)).map(|p| p as usize);

    Ok(Trailer { root, size, prev })
}

/// Read object `num` via the xref map; if the offset doesn't actually
/// begin with `num 0 obj`, fall back to a priority-based scan across the
/// whole buffer (handles malformed/renumbered PDFs the xref disagrees with).
pub fn read_object(pdf: &[u8], xref: &XrefMap, num: u32) -> Result<ObjectSpan> {
    if let Some(&offset) = xref.get(&num) {
        if header_matches(pdf, offset, num) {
            if let Ok(span) = read_object_from_header(pdf, offset) {
                return Ok(span);
            }
        }
    }
    scan_fallback(pdf, num)
}

fn header_matches(pdf: &[u8], offset: usize, num: u32) -> bool {
    let expected = format!("{num} 0 obj");
    pdf.get(offset..offset + expected.len().min(pdf.len() - offset))
        .map(|s| {
            let s = String::from_utf8_lossy(s);
            s.trim_start().starts_with(&format!("{num} "))
        })
        .unwrap_or(false)
}

/// `header_offset` points at (or before) the `N G obj` header; finds the
/// next `obj` keyword and extracts the dictionary following it.
fn read_object_from_header(pdf: &[u8], header_offset: usize) -> Result<ObjectSpan> {
    let obj_kw = find_subslice(pdf, b"obj", header_offset)
        .ok_or_else(|| PdfSignError::PDFMalformed("missing 'obj' keyword".into()))?;
    read_object_after_obj_keyword(pdf, obj_kw + 3)
}

/// `after_obj` points just past an already-located `obj` keyword.
fn read_object_after_obj_keyword(pdf: &[u8], after_obj: usize) -> Result<ObjectSpan> {
    let (dict, start, end) = extract_balanced_dict(pdf, after_obj)?;
    Ok(ObjectSpan { dict, start, end })
}

/// Scan the whole buffer for every `num 0 obj` header and keep the
/// candidate whose `/Type` has the highest priority: Page > Pages/Catalog
/// > AcroForm/Annot/Sig/DocTimeStamp > others > FontDescriptor.
fn scan_fallback(pdf: &[u8], num: u32) -> Result<ObjectSpan> {
    let needle = format!("{num} 0 obj");
    let mut best: Option<(i32, ObjectSpan)> = None;
    let mut i = 0;
    while let Some(rel) = find_subslice(&pdf[i..], needle.as_bytes(), 0) {
        let at = i + rel;
        if let Ok(span) = read_object_after_obj_keyword(pdf, at + needle.len()) {
            let priority = type_priority(&span.dict);
            let better = match &best {
                Some((p, _)) => priority > *p,
                None => true,
            };
            if better {
                best = Some((priority, span));
            }
        }
        i = at + needle.len();
    }
    best.map(|(_, s)| s)
        .ok_or_else(|| PdfSignError::PDFMalformed(format!("object {num} not found")))
}

fn type_priority(dict: &str) -> i32 {
    let tokens = tokenize(dict);
    let Some(idx) = find_key(&tokens, "Type") else {
        return 1;
    };
    match name_at(&tokens, idx).as_deref() {
        Some("Page") => 5,
        Some("Pages") | Some("Catalog") => 4,
        Some("AcroForm") | Some("Annot") | Some("Sig") | Some("DocTimeStamp") => 3,
        Some("FontDescriptor") => 0,
        _ => 1,
    }
}

/// Resolve `/Root.Pages`, then walk `/Pages.Kids` depth-first and return
/// the first leaf whose `/Type` is `/Page`.
pub fn find_first_page_obj_num_safe(pdf: &[u8], xref: &XrefMap, root: u32) -> Result<u32> {
    let pages_root = pages_root_of(pdf, xref, root)?;
    first_page_in_subtree(pdf, xref, pages_root, &mut HashSet::new())
}

fn pages_root_of(pdf: &[u8], xref: &XrefMap, root: u32) -> Result<u32> {
    let catalog = read_object(pdf, xref, root)?;
    let tokens = tokenize(&catalog.dict);
    let idx = find_key(&tokens, "Pages")
        .ok_or_else(|| PdfSignError::PDFMalformed("catalog has no /Pages".into()))?;
    ref_at(&tokens, idx)
        .map(|(n, _)| n)
        .ok_or_else(|| PdfSignError::PDFMalformed("/Pages is not an indirect reference".into()))
}

fn first_page_in_subtree(pdf: &[u8], xref: &XrefMap, node: u32, seen: &mut HashSet<u32>) -> Result<u32> {
    if !seen.insert(node) {
        return Err(PdfSignError::PDFMalformed("cyclic page tree".into()));
    }
    let obj = read_object(pdf, xref, node)?;
    let tokens = tokenize(&obj.dict);
    if let Some(idx) = find_key(&tokens, "Type") {
        if name_at(&tokens, idx).as_deref() == Some("Page") {
            return Ok(node);
        }
    }
    let kids_idx = find_key(&tokens, "Kids")
        .ok_or_else(|| PdfSignError::PDFMalformed("page tree node has no /Kids or /Type /Page".into()))?;
    let kids = ref_array_at(&tokens, kids_idx).unwrap_or_default();
    for kid in kids {
        if let Ok(found) = first_page_in_subtree(pdf, xref, kid, seen) {
            return Ok(found);
        }
    }
    Err(PdfSignError::PDFMalformed("page tree has no leaf pages".into()))
}

/// Walk the page tree honoring `/Count` at intermediate nodes to resolve
/// the `index`-th (0-based) leaf page without visiting every earlier subtree.
pub fn find_page_obj_num_by_index(pdf: &[u8], xref: &XrefMap, root: u32, index: usize) -> Result<u32> {
    let pages_root = pages_root_of(pdf, xref, root)?;
    let mut remaining = index;
    nth_page_in_subtree(pdf, xref, pages_root, &mut remaining, &mut HashSet::new())
        .ok_or_else(|| PdfSignError::PDFMalformed(format!("page index {index} out of range")))
}

fn nth_page_in_subtree(
    pdf: &[u8],
    xref: &XrefMap,
    node: u32,
    remaining: &mut usize,
    seen: &mut HashSet<u32>,
) -> Option<u32> {
    if !seen.insert(node) {
        return None;
    }
    let obj = read_object(pdf, xref, node).ok()?;
    let tokens = tokenize(&obj.dict);
    let is_page = find_key(&tokens, "Type")
        .and_then(|idx| name_at(&tokens, idx))
        .as_deref()
        == Some("Page");
    if is_page {
        if *remaining == 0 {
            return Some(node);
        }
        *remaining -= 1;
        return None;
    }

    let kids_idx = find_key(&tokens, "Kids")?;
    let kids = ref_array_at(&tokens, kids_idx)?;
    for kid in kids {
        // Skip whole intermediate subtrees using their own /Count rather
        // than recursing leaf-by-leaf through every earlier sibling.
        if let Ok(kid_obj) = read_object(pdf, xref, kid) {
            let kid_tokens = tokenize(&kid_obj.dict);
            let kid_is_page = find_key(&kid_tokens, "Type")
                .and_then(|i| name_at(&kid_tokens, i))
                .as_deref()
                == Some("Page");
            if !kid_is_page {
                if let Some(count) = find_key(&kid_tokens, "Count").and_then(|i| int_at(&kid_tokens, i)) {
                    let count = count.max(0) as usize;
                    if *remaining >= count {
                        *remaining -= count;
                        continue;
                    }
                }
            }
        }
        if let Some(found) = nth_page_in_subtree(pdf, xref, kid, remaining, seen) {
            return Some(found);
        }
    }
    None
}

fn skip_ws(pdf: &[u8], mut i: usize) -> usize {
    while i < pdf.len() && pdf[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn skip_ws_back(pdf: &[u8], mut i: usize) -> usize {
    while i > 0 && pdf[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    i
}

fn read_uint(pdf: &[u8], i: usize) -> Option<(u32, usize)> {
    let start = i;
    let mut j = i;
    while j < pdf.len() && pdf[j].is_ascii_digit() {
        j += 1;
    }
    if j == start {
        return None;
    }
    std::str::from_utf8(&pdf[start..j]).ok()?.parse().ok().map(|n| (n, j))
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

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.7\n");
        let obj1 = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let obj2 = b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n";
        let obj3 = b"3 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n";
        let obj1_off = pdf.len();
        pdf.extend_from_slice(obj1);
        let obj2_off = pdf.len();
        pdf.extend_from_slice(obj2);
        let obj3_off = pdf.len();
        pdf.extend_from_slice(obj3);
        let xref_off = pdf.len();
        pdf.extend_from_slice(b"xref\n0 4\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{obj1_off:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(format!("{obj2_off:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(format!("{obj3_off:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref_off}\n%%EOF\n").as_bytes());
        pdf
    }

    #[test]
    fn parses_trailer_and_xref_map() {
        let pdf = minimal_pdf();
        let doc = PdfDocument::parse(pdf).unwrap();
        assert_eq!(doc.trailer.root, 1);
        assert_eq!(doc.trailer.size, 4);
        assert!(doc.trailer.prev.is_none());
        assert_eq!(doc.xref.len(), 3);
    }

    #[test]
    fn resolves_first_page() {
        let pdf = minimal_pdf();
        let doc = PdfDocument::parse(pdf).unwrap();
        assert_eq!(doc.first_page_object().unwrap(), 3);
    }

    #[test]
    fn resolves_page_by_index() {
        let pdf = minimal_pdf();
        let doc = PdfDocument::parse(pdf).unwrap();
        assert_eq!(doc.page_object_by_index(0).unwrap(), 3);
    }
}
