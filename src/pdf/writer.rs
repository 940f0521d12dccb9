//! Incremental PDF writer with signature-placeholder mechanics:
//! ensuring an AcroForm and empty `/Sig` field, preparing a fixed-width
//! `/ByteRange`/`/Contents` placeholder, hashing the byte range, and
//! splicing the final CMS bytes in place once they are signed.

use crate::error::{PdfSignError, Result};
use crate::oid::DigestAlgorithm;
use crate::pdf::reader::{find_last_startxref, PdfDocument};
use crate::pdf::tokenizer::{
    escape_pdf_string, find_key, name_at, ref_array_at, ref_at, rebuild_dict, tokenize,
    unescape_pdf_string, value_at,
};
use crate::utils;

/// A PDF rectangle `[llx lly urx ury]`. A zero rect renders an invisible
/// signature widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Default for Rect {
    fn default() -> Self {
        Rect { llx: 0.0, lly: 0.0, urx: 0.0, ury: 0.0 }
    }
}

impl Rect {
    pub fn to_pdf_array(&self) -> String {
        format!(
            "[{} {} {} {}]",
            fmt_num(self.llx),
            fmt_num(self.lly),
            fmt_num(self.urx),
            fmt_num(self.ury)
        )
    }
}

fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// The signature dictionary's `/SubFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFilter {
    CadesDetached,
    Rfc3161,
}

impl SubFilter {
    pub fn as_pdf_name(self) -> &'static str {
        match self {
            SubFilter::CadesDetached => "ETSI.CAdES.detached",
            SubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnsureFieldOptions {
    pub rect: Option<Rect>,
    pub page_index: Option<usize>,
}

#[derive(Debug)]
pub struct EnsureFieldResult {
    pub pdf: Vec<u8>,
    pub field_obj_num: u32,
    pub widget_obj_num: u32,
    pub page_obj_num: u32,
    pub applied_rect: Rect,
}

/// Ensures `pdf` has an AcroForm and an empty `/Sig` field named
/// `field_name`, reusing one if it already exists, otherwise creating the
/// AcroForm (if absent), the field, and its widget annotation, all as new
/// object revisions in a single incremental update.
pub fn ensure_acroform_and_empty_sig_field(
    pdf: Vec<u8>,
    field_name: &str,
    opts: &EnsureFieldOptions,
) -> Result<EnsureFieldResult> {
    let doc = PdfDocument::parse(pdf)?;
    let page_obj_num = match opts.page_index {
        Some(idx) => doc.page_object_by_index(idx)?,
        None => doc.first_page_object()?,
    };

    if let Some((_, fields)) = resolve_acroform_fields(&doc) {
        if let Some((field_obj_num, widget_obj_num)) = find_empty_sig_field(&doc, &fields, field_name)? {
            let applied_rect = opts.rect.unwrap_or_default();
            return Ok(EnsureFieldResult {
                pdf: doc.bytes,
                field_obj_num,
                widget_obj_num,
                page_obj_num,
                applied_rect,
            });
        }
    }

    let catalog = doc.read_object(doc.trailer.root)?;
    let catalog_tokens = tokenize(&catalog.dict);
    let acroform_ref = find_key(&catalog_tokens, "AcroForm").and_then(|idx| ref_at(&catalog_tokens, idx));

    let next = utils::get_next_object_number(&doc.bytes)?;
    let field_obj_num = next;
    let widget_obj_num = next + 1;
    let (acroform_obj_num, need_new_acroform) = match acroform_ref {
        Some((num, _)) => (num, false),
        None => (next + 2, true),
    };

    let rect = opts.rect.unwrap_or_default();
    let widget_text = format!(
        "<< /Type /Annot /Subtype /Widget /FT /Sig /Rect {} /F 132 /Parent {field_obj_num} 0 R /P {page_obj_num} 0 R >>",
        rect.to_pdf_array()
    );
    let field_text = format!(
        "<< /FT /Sig /T {} /Kids [{widget_obj_num} 0 R] >>",
        escape_pdf_string(field_name)
    );

    let mut new_objects = vec![
        (widget_obj_num, widget_text.into_bytes()),
        (field_obj_num, field_text.into_bytes()),
    ];

    let acroform_text = if need_new_acroform {
        format!("<< /Type /AcroForm /Fields [{field_obj_num} 0 R] /SigFlags 3 >>")
    } else {
        let acroform_obj = doc.read_object(acroform_obj_num)?;
        let tokens = tokenize(&acroform_obj.dict);
        let mut fields = find_key(&tokens, "Fields")
            .and_then(|idx| ref_array_at(&tokens, idx))
            .unwrap_or_default();
        fields.push(field_obj_num);
        let fields_str = format!(
            "[{}]",
            fields.iter().map(|n| format!("{n} 0 R")).collect::<Vec<_>>().join(" ")
        );
        let mut overrides = vec![("Fields", fields_str)];
        if find_key(&tokens, "SigFlags").is_none() {
            overrides.push(("SigFlags", "3".to_string()));
        }
        rebuild_dict(&acroform_obj.dict, &overrides)
    };
    new_objects.push((acroform_obj_num, acroform_text.into_bytes()));

    let page_obj = doc.read_object(page_obj_num)?;
    let page_tokens = tokenize(&page_obj.dict);
    let mut annots = find_key(&page_tokens, "Annots")
        .and_then(|idx| ref_array_at(&page_tokens, idx))
        .unwrap_or_default();
    if !annots.contains(&widget_obj_num) {
        annots.push(widget_obj_num);
    }
    let annots_str = format!(
        "[{}]",
        annots.iter().map(|n| format!("{n} 0 R")).collect::<Vec<_>>().join(" ")
    );
    new_objects.push((
        page_obj_num,
        rebuild_dict(&page_obj.dict, &[("Annots", annots_str)]).into_bytes(),
    ));

    let root_num = doc.trailer.root;
    if need_new_acroform {
        let catalog_text =
            rebuild_dict(&catalog.dict, &[("AcroForm", format!("{acroform_obj_num} 0 R"))]);
        new_objects.push((root_num, catalog_text.into_bytes()));
    }

    let size = next_size(&doc, &new_objects);
    let new_pdf = append_incremental_update(&doc.bytes, &new_objects, root_num, size);

    Ok(EnsureFieldResult {
        pdf: new_pdf,
        field_obj_num,
        widget_obj_num,
        page_obj_num,
        applied_rect: rect,
    })
}

/// The AcroForm's object number and its `/Fields` array, if the catalog
/// references one and it carries a `/Fields` entry.
fn resolve_acroform_fields(doc: &PdfDocument) -> Option<(u32, Vec<u32>)> {
    let catalog = doc.read_object(doc.trailer.root).ok()?;
    let catalog_tokens = tokenize(&catalog.dict);
    let (acroform_num, _) = find_key(&catalog_tokens, "AcroForm").and_then(|idx| ref_at(&catalog_tokens, idx))?;
    let acroform_obj = doc.read_object(acroform_num).ok()?;
    let acroform_tokens = tokenize(&acroform_obj.dict);
    let fields_idx = find_key(&acroform_tokens, "Fields")?;
    let fields = ref_array_at(&acroform_tokens, fields_idx)?;
    Some((acroform_num, fields))
}

/// Scan `field_nums` for an unsigned `/Sig` field named `field_name`,
/// returning `(field_obj_num, widget_obj_num)`. Handles both the
/// field-with-`/Kids`-widget shape this writer produces and a merged
/// field/widget object (no `/Kids`, the field dictionary is itself the
/// widget annotation) that a third-party producer may have written.
fn find_empty_sig_field(
    doc: &PdfDocument,
    field_nums: &[u32],
    field_name: &str,
) -> Result<Option<(u32, u32)>> {
    for &num in field_nums {
        let Ok(obj) = doc.read_object(num) else { continue };
        let tokens = tokenize(&obj.dict);

        let is_sig_field = find_key(&tokens, "FT").and_then(|idx| name_at(&tokens, idx)).as_deref()
            == Some("Sig");
        if !is_sig_field || find_key(&tokens, "V").is_some() {
            continue;
        }

        let Some(t_idx) = find_key(&tokens, "T") else { continue };
        let Some(raw_t) = value_at(&tokens, t_idx) else { continue };
        if unescape_pdf_string(raw_t) != field_name {
            continue;
        }

        if let Some(kids_idx) = find_key(&tokens, "Kids") {
            if let Some(widget_num) = ref_array_at(&tokens, kids_idx).and_then(|kids| kids.first().copied()) {
                return Ok(Some((num, widget_num)));
            }
        }
        return Ok(Some((num, num)));
    }
    Ok(None)
}

fn locate_empty_sig_field(doc: &PdfDocument, field_name: &str) -> Result<(u32, u32)> {
    let fields = resolve_acroform_fields(doc).map(|(_, f)| f).unwrap_or_default();
    find_empty_sig_field(doc, &fields, field_name)?
        .ok_or_else(|| PdfSignError::PDFFieldMissing(field_name.to_string()))
}

/// Inputs to `prepare_placeholder`.
#[derive(Debug, Clone)]
pub struct PlaceholderOptions {
    pub sub_filter: SubFilter,
    pub placeholder_hex_len: usize,
    pub field_name: String,
    pub signer_name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
}

/// The prepared placeholder: the new PDF bytes, the signature object
/// number, the absolute `[start, end)` span of the `/Contents` hex string
/// (including its `<`/`>` delimiters), and the `/ByteRange` four-tuple
/// already patched into the file.
#[derive(Debug)]
pub struct Placeholder {
    pub pdf: Vec<u8>,
    pub sig_obj_num: u32,
    pub contents_start: usize,
    pub contents_end: usize,
    pub byte_range: (usize, usize, usize, usize),
}

/// Allocates the signature object, appends it (plus the field's updated
/// `/V`, and for `Rfc3161` an updated `/Perms`) in one incremental update,
/// then patches the real `/ByteRange` into the fixed-width placeholder.
pub fn prepare_placeholder(pdf: Vec<u8>, opts: &PlaceholderOptions) -> Result<Placeholder> {
    let doc = PdfDocument::parse(pdf)?;
    let (field_obj_num, widget_obj_num) = locate_empty_sig_field(&doc, &opts.field_name)?;

    let widget_obj = doc.read_object(widget_obj_num)?;
    let widget_tokens = tokenize(&widget_obj.dict);
    let page_ref = find_key(&widget_tokens, "P")
        .and_then(|idx| ref_at(&widget_tokens, idx))
        .map(|(num, _)| num)
        .filter(|&num| is_page_object(&doc, num));

    let sig_obj_num = utils::get_next_object_number(&doc.bytes)?;

    let hex_len = if opts.placeholder_hex_len % 2 == 0 {
        opts.placeholder_hex_len.max(2)
    } else {
        opts.placeholder_hex_len + 1
    };

    let sig_dict = build_signature_dict(page_ref, hex_len, opts);
    let mut new_objects = vec![(sig_obj_num, sig_dict.into_bytes())];

    let field_obj = doc.read_object(field_obj_num)?;
    new_objects.push((
        field_obj_num,
        rebuild_dict(&field_obj.dict, &[("V", format!("{sig_obj_num} 0 R"))]).into_bytes(),
    ));

    let root_num = doc.trailer.root;
    if opts.sub_filter == SubFilter::Rfc3161 {
        new_objects.push((root_num, build_updated_perms(&doc, sig_obj_num)?.into_bytes()));
    }

    let size = next_size(&doc, &new_objects);
    let new_pdf = append_incremental_update(&doc.bytes, &new_objects, root_num, size);

    let new_doc = PdfDocument::parse(new_pdf)?;
    let sig_span = new_doc.read_object(sig_obj_num)?;
    let dict_bytes = sig_span.dict.as_bytes();

    let contents_kw = find_needle(dict_bytes, b"/Contents <")
        .ok_or_else(|| PdfSignError::PDFMalformed("signature dict has no /Contents placeholder".into()))?;
    let contents_lt_rel = contents_kw + b"/Contents ".len();
    let contents_gt_rel = dict_bytes[contents_lt_rel..]
        .iter()
        .position(|&b| b == b'>')
        .map(|p| p + contents_lt_rel)
        .ok_or_else(|| PdfSignError::PDFMalformed("unterminated /Contents placeholder".into()))?;
    let contents_end_rel = contents_gt_rel + 1;

    let br_kw = find_needle(dict_bytes, b"/ByteRange [")
        .ok_or_else(|| PdfSignError::PDFMalformed("signature dict has no /ByteRange placeholder".into()))?;
    let bracket_open_rel = br_kw + b"/ByteRange ".len();
    let bracket_close_rel = dict_bytes[bracket_open_rel..]
        .iter()
        .position(|&b| b == b']')
        .map(|p| p + bracket_open_rel)
        .ok_or_else(|| PdfSignError::PDFMalformed("unterminated /ByteRange placeholder".into()))?;
    let inner_start_rel = bracket_open_rel + 1;
    let inner_len = bracket_close_rel - inner_start_rel;

    let contents_start = sig_span.start + contents_lt_rel;
    let contents_end = sig_span.start + contents_end_rel;
    let inner_abs_start = sig_span.start + inner_start_rel;

    let total_len = new_doc.bytes.len();
    let a = 0usize;
    let b = contents_start;
    let c = contents_end;
    let d = total_len - c;

    let new_inner = format!(
        "{} {} {} {}",
        utils::pad_decimal(a, 10),
        utils::pad_decimal(b, 10),
        utils::pad_decimal(c, 10),
        utils::pad_decimal(d, 10)
    );
    if new_inner.len() != inner_len {
        return Err(PdfSignError::PDFMalformed(
            "/ByteRange placeholder width mismatch".into(),
        ));
    }

    let mut pdf_bytes = new_doc.bytes;
    pdf_bytes[inner_abs_start..inner_abs_start + inner_len].copy_from_slice(new_inner.as_bytes());

    Ok(Placeholder {
        pdf: pdf_bytes,
        sig_obj_num,
        contents_start,
        contents_end,
        byte_range: (a, b, c, d),
    })
}

fn is_page_object(doc: &PdfDocument, num: u32) -> bool {
    doc.read_object(num)
        .ok()
        .map(|obj| {
            let tokens = tokenize(&obj.dict);
            find_key(&tokens, "Type").and_then(|idx| name_at(&tokens, idx)).as_deref() == Some("Page")
        })
        .unwrap_or(false)
}

fn build_signature_dict(page_ref: Option<u32>, hex_len: usize, opts: &PlaceholderOptions) -> String {
    let mut dict = String::from("<< /Type /Sig /Filter /Adobe.PPKLite");
    dict.push_str(&format!(" /SubFilter /{}", opts.sub_filter.as_pdf_name()));
    if let Some(page_num) = page_ref {
        dict.push_str(&format!(" /P {page_num} 0 R"));
    }
    dict.push_str(&format!(
        " /ByteRange [{} {} {} {}]",
        utils::pad_decimal(0, 10),
        utils::pad_decimal(0, 10),
        utils::pad_decimal(0, 10),
        utils::pad_decimal(0, 10)
    ));
    dict.push_str(&format!(" /Contents <{}>", "0".repeat(hex_len)));
    dict.push_str(&format!(" /M {}", escape_pdf_string(&utils::pdf_date_now())));
    if let Some(name) = &opts.signer_name {
        dict.push_str(&format!(" /Name {}", escape_pdf_string(name)));
    }
    if let Some(reason) = &opts.reason {
        dict.push_str(&format!(" /Reason {}", escape_pdf_string(reason)));
    }
    if let Some(location) = &opts.location {
        dict.push_str(&format!(" /Location {}", escape_pdf_string(location)));
    }
    if let Some(contact) = &opts.contact_info {
        dict.push_str(&format!(" /ContactInfo {}", escape_pdf_string(contact)));
    }
    dict.push_str(" /Prop_Build << /Filter << /Name /Adobe.PPKLite >> >>");
    dict.push_str(" >>");
    dict
}

/// Rebuild the Catalog with a `/Perms` entry pointing `/DocTimeStamp` at
/// the new signature object, preserving any other `/Perms` sub-entries.
/// `/Perms` is treated as an inline sub-dictionary rather than its own
/// indirect object, which matches how small PDFs typically carry it.
fn build_updated_perms(doc: &PdfDocument, sig_obj_num: u32) -> Result<String> {
    let catalog = doc.read_object(doc.trailer.root)?;
    let catalog_tokens = tokenize(&catalog.dict);
    let doc_ts_entry = format!("{sig_obj_num} 0 R");

    let perms_value = match find_key(&catalog_tokens, "Perms") {
        Some(idx) => {
            let raw = value_at(&catalog_tokens, idx).unwrap_or("<< >>");
            rebuild_dict(raw, &[("DocTimeStamp", doc_ts_entry)])
        }
        None => format!("<< /DocTimeStamp {doc_ts_entry} >>"),
    };

    Ok(rebuild_dict(&catalog.dict, &[("Perms", perms_value)]))
}

/// Creates the signature object (and an AcroForm/field/widget if needed)
/// with `/SubFilter /ETSI.RFC3161`; everything else is identical to the
/// signing flow. Implemented as ensure-then-prepare, so this is two
/// incremental updates rather than one combined update — both are valid
/// PDF, and each stage stays independently testable.
pub fn prepare_document_timestamp_placeholder(
    pdf: Vec<u8>,
    opts: &PlaceholderOptions,
) -> Result<Placeholder> {
    let ensured = ensure_acroform_and_empty_sig_field(pdf, &opts.field_name, &EnsureFieldOptions::default())?;
    let mut docts_opts = opts.clone();
    docts_opts.sub_filter = SubFilter::Rfc3161;
    prepare_placeholder(ensured.pdf, &docts_opts)
}

/// Streams `pdf[0..b]` and `pdf[c..c+d]` into `algo`, the exact pre-image
/// the signature's `messageDigest` signed attribute must match.
pub fn compute_byte_range_hash(
    pdf: &[u8],
    byte_range: (usize, usize, usize, usize),
    algo: DigestAlgorithm,
) -> Vec<u8> {
    let (a, b, c, d) = byte_range;
    let mut preimage = Vec::with_capacity(b + d);
    preimage.extend_from_slice(&pdf[a..a + b]);
    preimage.extend_from_slice(&pdf[c..c + d]);
    utils::digest(algo, &preimage)
}

/// Hex-encodes `cms_der` uppercase, right-pads with `0` to the placeholder
/// capacity, and splices it into `pdf[placeholder.contents_start..contents_end]`
/// in place. No byte offsets change, so `/ByteRange` stays valid.
pub fn inject_cms(pdf: &mut [u8], placeholder: &Placeholder, cms_der: &[u8]) -> Result<()> {
    let capacity = placeholder.contents_end - placeholder.contents_start - 2;
    let hex_str = hex::encode_upper(cms_der);
    if hex_str.len() > capacity {
        return Err(PdfSignError::PlaceholderTooSmall {
            actual: hex_str.len(),
            capacity,
        });
    }
    let padded = format!("{hex_str:0<capacity$}");
    let start = placeholder.contents_start + 1;
    pdf[start..start + capacity].copy_from_slice(padded.as_bytes());
    Ok(())
}

pub(crate) fn next_size(doc: &PdfDocument, new_objects: &[(u32, Vec<u8>)]) -> u32 {
    let max_num = new_objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
    doc.trailer.size.max(max_num + 1)
}

/// Appends `objects` (object number -> body, `<<...>>` or `<<...>> stream
/// ... endstream` included) as a classical incremental update: copies `pdf`
/// verbatim, writes each `N 0 obj ... endobj`, then a fresh `xref`/`trailer`
/// pointing `/Prev` at the previous `startxref`. Bodies are raw bytes rather
/// than `String` so the appearance embedder can append compressed image
/// streams, which are not valid UTF-8.
pub(crate) fn append_incremental_update(
    pdf: &[u8],
    objects: &[(u32, Vec<u8>)],
    root: u32,
    size: u32,
) -> Vec<u8> {
    let mut output = pdf.to_vec();
    if !output.ends_with(b"\n") {
        output.push(b'\n');
    }

    let prev = find_last_startxref(&output).ok();

    let mut offsets: Vec<(u32, usize)> = Vec::with_capacity(objects.len());
    for (num, body) in objects {
        let pos = output.len();
        output.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        output.extend_from_slice(body);
        output.extend_from_slice(b"\nendobj\n");
        offsets.push((*num, pos));
    }
    offsets.sort_by_key(|(num, _)| *num);

    let xref_start = output.len();
    let mut xref = String::from("xref\n0 1\n0000000000 65535 f \n");
    let mut i = 0;
    while i < offsets.len() {
        let mut j = i;
        while j + 1 < offsets.len() && offsets[j + 1].0 == offsets[j].0 + 1 {
            j += 1;
        }
        xref.push_str(&format!("{} {}\n", offsets[i].0, j - i + 1));
        for entry in &offsets[i..=j] {
            xref.push_str(&format!("{:010} 00000 n \n", entry.1));
        }
        i = j + 1;
    }
    output.extend_from_slice(xref.as_bytes());

    let trailer = match prev {
        Some(p) => format!("trailer\n<< /Size {size} /Prev {p} /Root {root} 0 R >>\nstartxref\n{xref_start}\n%%EOF\n"),
        None => format!("trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_start}\n%%EOF\n"),
    };
    output.extend_from_slice(trailer.as_bytes());
    output
}

fn find_needle(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.7\n");
        let obj1 = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let obj2 = b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n";
        let obj3 = b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n";
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
    fn ensures_acroform_and_field_when_absent() {
        let pdf = minimal_pdf();
        let result =
            ensure_acroform_and_empty_sig_field(pdf, "Signature1", &EnsureFieldOptions::default()).unwrap();

        let doc = PdfDocument::parse(result.pdf).unwrap();
        let catalog = doc.read_object(doc.trailer.root).unwrap();
        assert!(catalog.dict.contains("/AcroForm"));

        let field = doc.read_object(result.field_obj_num).unwrap();
        assert!(field.dict.contains("/FT /Sig"));
        assert!(field.dict.contains(&format!("{} 0 R", result.widget_obj_num)));

        let page = doc.read_object(result.page_obj_num).unwrap();
        assert!(page.dict.contains(&format!("/Annots [{} 0 R]", result.widget_obj_num)));
    }

    #[test]
    fn reuses_existing_empty_field() {
        let pdf = minimal_pdf();
        let first =
            ensure_acroform_and_empty_sig_field(pdf, "Signature1", &EnsureFieldOptions::default()).unwrap();
        let second =
            ensure_acroform_and_empty_sig_field(first.pdf, "Signature1", &EnsureFieldOptions::default())
                .unwrap();
        assert_eq!(second.field_obj_num, first.field_obj_num);
        assert_eq!(second.widget_obj_num, first.widget_obj_num);
    }

    #[test]
    fn placeholder_byte_range_covers_whole_file_minus_contents() {
        let pdf = minimal_pdf();
        let ensured =
            ensure_acroform_and_empty_sig_field(pdf, "Signature1", &EnsureFieldOptions::default()).unwrap();
        let opts = PlaceholderOptions {
            sub_filter: SubFilter::CadesDetached,
            placeholder_hex_len: 128,
            field_name: "Signature1".to_string(),
            signer_name: Some("Jane Doe".to_string()),
            reason: Some("Testing".to_string()),
            location: None,
            contact_info: None,
        };
        let placeholder = prepare_placeholder(ensured.pdf, &opts).unwrap();

        let (a, b, c, d) = placeholder.byte_range;
        assert_eq!(a, 0);
        assert_eq!(c + d, placeholder.pdf.len());

        // The byte range must skip exactly the hex placeholder span.
        let preimage_len = b + d;
        assert_eq!(preimage_len, placeholder.pdf.len() - (c - b));
        assert_eq!(c - b, placeholder.contents_end - placeholder.contents_start);

        let hash = compute_byte_range_hash(&placeholder.pdf, placeholder.byte_range, DigestAlgorithm::Sha256);
        assert_eq!(hash.len(), 32);
    }

    #[test]
    fn inject_cms_pads_and_rejects_oversize() {
        let pdf = minimal_pdf();
        let ensured =
            ensure_acroform_and_empty_sig_field(pdf, "Signature1", &EnsureFieldOptions::default()).unwrap();
        let opts = PlaceholderOptions {
            sub_filter: SubFilter::CadesDetached,
            placeholder_hex_len: 8,
            field_name: "Signature1".to_string(),
            signer_name: None,
            reason: None,
            location: None,
            contact_info: None,
        };
        let mut placeholder = prepare_placeholder(ensured.pdf, &opts).unwrap();

        inject_cms(&mut placeholder.pdf, &placeholder, &[0xAB]).unwrap();
        let slice = &placeholder.pdf[placeholder.contents_start + 1..placeholder.contents_end - 1];
        assert_eq!(slice, b"AB000000");

        let err = inject_cms(&mut placeholder.pdf, &placeholder, &[0xAB, 0xCD, 0xEF, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, PdfSignError::PlaceholderTooSmall { .. }));
    }

    #[test]
    fn rect_renders_integers_without_decimal_point() {
        let rect = Rect { llx: 10.0, lly: 20.0, urx: 110.0, ury: 60.0 };
        assert_eq!(rect.to_pdf_array(), "[10 20 110 60]");
    }
}
