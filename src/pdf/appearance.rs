//! Visible-appearance embedder. Decodes a caller-supplied
//! PNG stamp image, writes it as an Image XObject (with an optional `/SMask`
//! alpha image) plus a Form XObject wrapping it, and attaches the form as the
//! signature widget's normal appearance stream. Runs as its own incremental
//! update before the placeholder is prepared, so the appearance objects fall
//! inside the byte range the signature covers.
//!
//! This subsystem sits outside the security-relevant core: a caller that
//! already has a PDF rendering/compositing library can embed appearances
//! itself and call the orchestrator with `visible_signature: None`.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{PdfSignError, Result};
use crate::pdf::reader::PdfDocument;
use crate::pdf::tokenizer::{find_key, rebuild_dict, tokenize};
use crate::pdf::writer::{self, Rect};
use crate::utils;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

struct DecodedPng {
    width: u32,
    height: u32,
    color_space: &'static str,
    color_samples: Vec<u8>,
    alpha_samples: Option<Vec<u8>>,
}

/// Parses IHDR/IDAT/IEND, inflates the concatenated IDAT stream, and
/// unfilters each scanline. Supports 8-bit, non-interlaced gray, gray+alpha,
/// RGB, and RGBA; anything else (16-bit samples, palettes, interlacing) is
/// rejected rather than approximated.
fn decode_png(png: &[u8]) -> Result<DecodedPng> {
    if png.len() < 8 || png[..8] != PNG_SIGNATURE {
        return Err(PdfSignError::UnsupportedAlgorithm("stamp image is not a PNG".into()));
    }

    let mut pos = 8;
    let mut width = 0u32;
    let mut height = 0u32;
    let mut color_type = 0u8;
    let mut have_ihdr = false;
    let mut idat = Vec::new();

    while pos + 8 <= png.len() {
        let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
        let kind = &png[pos + 4..pos + 8];
        let data_start = pos + 8;
        let data_end = data_start
            .checked_add(len)
            .ok_or_else(|| PdfSignError::UnsupportedAlgorithm("PNG chunk length overflow".into()))?;
        if data_end + 4 > png.len() {
            return Err(PdfSignError::UnsupportedAlgorithm("truncated PNG chunk".into()));
        }
        let data = &png[data_start..data_end];

        match kind {
            b"IHDR" => {
                if data.len() != 13 {
                    return Err(PdfSignError::UnsupportedAlgorithm("malformed PNG IHDR".into()));
                }
                width = u32::from_be_bytes(data[0..4].try_into().unwrap());
                height = u32::from_be_bytes(data[4..8].try_into().unwrap());
                let bit_depth = data[8];
                color_type = data[9];
                let interlace = data[12];
                if bit_depth != 8 {
                    return Err(PdfSignError::UnsupportedAlgorithm(format!(
                        "unsupported PNG bit depth {bit_depth}, only 8 is supported"
                    )));
                }
                if interlace != 0 {
                    return Err(PdfSignError::UnsupportedAlgorithm("interlaced PNG stamps are not supported".into()));
                }
                have_ihdr = true;
            }
            b"IDAT" => idat.extend_from_slice(data),
            b"IEND" => break,
            _ => {}
        }
        pos = data_end + 4;
    }

    if !have_ihdr {
        return Err(PdfSignError::UnsupportedAlgorithm("PNG stamp is missing IHDR".into()));
    }
    if width == 0 || height == 0 {
        return Err(PdfSignError::UnsupportedAlgorithm("PNG stamp has zero width or height".into()));
    }

    let channels: usize = match color_type {
        0 => 1,
        2 => 3,
        4 => 2,
        6 => 4,
        other => {
            return Err(PdfSignError::UnsupportedAlgorithm(format!(
                "unsupported PNG color type {other}, expected gray/rgb/gray+alpha/rgba"
            )))
        }
    };

    let mut raw = Vec::new();
    ZlibDecoder::new(idat.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| PdfSignError::UnsupportedAlgorithm(format!("failed to inflate PNG data: {e}")))?;

    let stride = width as usize * channels;
    let mut prev_row = vec![0u8; stride];
    let has_alpha = channels == 2 || channels == 4;
    let color_channels = if channels >= 3 { 3 } else { 1 };
    let mut color_samples = Vec::with_capacity(width as usize * height as usize * color_channels);
    let mut alpha_samples = has_alpha.then(|| Vec::with_capacity(width as usize * height as usize));

    let mut pos = 0usize;
    for _ in 0..height {
        if pos + 1 + stride > raw.len() {
            return Err(PdfSignError::UnsupportedAlgorithm("PNG scanline data ends early".into()));
        }
        let filter = raw[pos];
        pos += 1;
        let mut row = raw[pos..pos + stride].to_vec();
        pos += stride;
        unfilter_row(filter, &mut row, &prev_row, channels)?;

        for px in row.chunks(channels) {
            match channels {
                1 => color_samples.push(px[0]),
                2 => {
                    color_samples.push(px[0]);
                    alpha_samples.as_mut().unwrap().push(px[1]);
                }
                3 => color_samples.extend_from_slice(px),
                4 => {
                    color_samples.extend_from_slice(&px[..3]);
                    alpha_samples.as_mut().unwrap().push(px[3]);
                }
                _ => unreachable!(),
            }
        }
        prev_row = row;
    }

    let color_space = if color_channels == 1 { "DeviceGray" } else { "DeviceRGB" };
    Ok(DecodedPng { width, height, color_space, color_samples, alpha_samples })
}

fn unfilter_row(filter: u8, row: &mut [u8], prev: &[u8], bpp: usize) -> Result<()> {
    match filter {
        0 => {}
        1 => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        2 => {
            for i in 0..row.len() {
                row[i] = row[i].wrapping_add(prev[i]);
            }
        }
        3 => {
            for i in 0..row.len() {
                let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                let up = prev[i] as u16;
                row[i] = row[i].wrapping_add(((left + up) / 2) as u8);
            }
        }
        4 => {
            for i in 0..row.len() {
                let a = if i >= bpp { row[i - bpp] as i32 } else { 0 };
                let b = prev[i] as i32;
                let c = if i >= bpp { prev[i - bpp] as i32 } else { 0 };
                row[i] = row[i].wrapping_add(paeth(a, b, c));
            }
        }
        other => return Err(PdfSignError::UnsupportedAlgorithm(format!("unsupported PNG filter type {other}"))),
    }
    Ok(())
}

fn paeth(a: i32, b: i32, c: i32) -> u8 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).expect("writing to an in-memory buffer cannot fail");
    enc.finish().expect("finishing an in-memory zlib stream cannot fail")
}

fn image_xobject(width: u32, height: u32, color_space: &str, compressed: &[u8], smask: Option<u32>) -> Vec<u8> {
    let mut dict = format!(
        "<< /Type /XObject /Subtype /Image /Width {width} /Height {height} \
         /ColorSpace /{color_space} /BitsPerComponent 8 /Filter /FlateDecode /Length {}",
        compressed.len()
    );
    if let Some(num) = smask {
        dict.push_str(&format!(" /SMask {num} 0 R"));
    }
    dict.push_str(" >>\nstream\n");
    let mut body = dict.into_bytes();
    body.extend_from_slice(compressed);
    body.extend_from_slice(b"\nendstream");
    body
}

/// A small, partial Helvetica width table (per-1000-em units, from the
/// standard 14 AFM metrics) covering ASCII plus the Turkish letters remapped
/// through `/Differences`. Anything outside this table falls back to 556,
/// Helvetica's digit/most-lowercase width, which keeps positioning close
/// enough for a stamp caption rather than exact typesetting.
fn helvetica_width(ch: char) -> u16 {
    match ch {
        ' ' | '!' | '\'' | '.' | ',' | ':' | ';' | 'i' | 'l' | 'I' | '|' => 222,
        'f' | 'j' | 'r' | 't' => 333,
        '"' | '(' | ')' | '-' | 'J' => 333,
        '0'..='9' => 556,
        'a' | 'c' | 'e' | 'g' | 'k' | 'n' | 'o' | 'p' | 'q' | 's' | 'u' | 'v' | 'x' | 'y' | 'z' => 556,
        'b' | 'd' | 'h' | 'm' | 'A' | 'H' | 'U' => 556,
        'w' => 722,
        'M' | 'W' => 833,
        _ => 556,
    }
}

fn text_width(text: &str, font_size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| helvetica_width(c) as u32).sum();
    units as f64 * font_size / 1000.0
}

/// Escapes a string for use inside a `(...)` content-stream literal.
fn escape_content_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn text_overlay_stream(text: &str, width: f64, height: f64) -> String {
    let font_size = (height * 0.18).clamp(6.0, 10.0);
    let tw = text_width(text, font_size);
    let x = ((width - tw) / 2.0).max(2.0);
    let y = (height * 0.06).max(1.0);
    format!(
        "BT /Helv {font_size:.2} Tf {x:.2} {y:.2} Td ({}) Tj ET",
        escape_content_string(text)
    )
}

/// Decodes `stamp_png`, writes it (plus an `/SMask` if the PNG carries
/// alpha) as Image XObjects, wraps them in a Form XObject sized to `rect`,
/// and repoints the widget's `/AP << /N formRef >> /AS /N`, all as one
/// incremental update.
pub fn embed_appearance(
    pdf: Vec<u8>,
    widget_obj_num: u32,
    rect: Rect,
    stamp_png: &[u8],
    overlay_text: Option<&str>,
) -> Result<Vec<u8>> {
    let png = decode_png(stamp_png)?;
    let doc = PdfDocument::parse(pdf)?;

    let base = utils::get_next_object_number(&doc.bytes)?;
    let image_obj_num = base;
    let (smask_obj_num, form_obj_num, font_obj_num) = match (png.alpha_samples.is_some(), overlay_text) {
        (true, Some(_)) => (Some(base + 1), base + 2, Some(base + 3)),
        (true, None) => (Some(base + 1), base + 2, None),
        (false, Some(_)) => (None, base + 1, Some(base + 2)),
        (false, None) => (None, base + 1, None),
    };

    let mut new_objects: Vec<(u32, Vec<u8>)> = Vec::new();

    if let Some(smask_num) = smask_obj_num {
        let compressed = flate_compress(png.alpha_samples.as_ref().unwrap());
        new_objects.push((smask_num, image_xobject(png.width, png.height, "DeviceGray", &compressed, None)));
    }
    let compressed_color = flate_compress(&png.color_samples);
    new_objects.push((
        image_obj_num,
        image_xobject(png.width, png.height, png.color_space, &compressed_color, smask_obj_num),
    ));

    let width = rect.urx - rect.llx;
    let height = rect.ury - rect.lly;

    let mut content = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", fmt_dim(width), fmt_dim(height));
    if let (Some(text), Some(_)) = (overlay_text, font_obj_num) {
        content.push('\n');
        content.push_str(&text_overlay_stream(text, width, height));
    }

    let mut resources = format!("<< /XObject << /Im0 {image_obj_num} 0 R >>");
    if let Some(font_num) = font_obj_num {
        resources.push_str(&format!(" /Font << /Helv {font_num} 0 R >>"));
    }
    resources.push_str(" >>");

    let form_dict = format!(
        "<< /Type /XObject /Subtype /Form /FormType 1 /BBox [0 0 {} {}] /Resources {resources} /Length {} >>\nstream\n",
        fmt_dim(width),
        fmt_dim(height),
        content.len()
    );
    let mut form_body = form_dict.into_bytes();
    form_body.extend_from_slice(content.as_bytes());
    form_body.extend_from_slice(b"\nendstream");
    new_objects.push((form_obj_num, form_body));

    if let Some(font_num) = font_obj_num {
        new_objects.push((
            font_num,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding \
               << /Type /Encoding /BaseEncoding /WinAnsiEncoding \
               /Differences [128 /Gbreve /gbreve /Scedilla /scedilla 156 /Idotaccent /dotlessi] >> >>"
                .to_vec(),
        ));
    }

    let widget_obj = doc.read_object(widget_obj_num)?;
    let widget_tokens = tokenize(&widget_obj.dict);
    let ap_value = format!("<< /N {form_obj_num} 0 R >>");
    let mut overrides = vec![("AP", ap_value), ("AS", "/N".to_string()), ("Rect", rect.to_pdf_array())];
    if find_key(&widget_tokens, "F").is_none() {
        overrides.push(("F", "132".to_string()));
    }
    let widget_text = rebuild_dict(&widget_obj.dict, &overrides);
    new_objects.push((widget_obj_num, widget_text.into_bytes()));

    let root_num = doc.trailer.root;
    let size = writer::next_size(&doc, &new_objects);
    Ok(writer::append_incremental_update(&doc.bytes, &new_objects, root_num, size))
}

fn fmt_dim(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder as PngZlibEncoder;
    use std::io::Write as _;

    fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0, 0, 0, 0]); // CRC is not validated by this decoder
        out
    }

    /// Builds a tiny 2x2 RGB PNG (no alpha) with the `None` filter on every
    /// scanline, for exercising the IDAT inflate + unfilter path end to end.
    fn two_by_two_rgb_png() -> Vec<u8> {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

        let mut raw = Vec::new();
        for _ in 0..2 {
            raw.push(0u8); // filter type None
            raw.extend_from_slice(&[255, 0, 0, 0, 255, 0]);
        }
        let mut enc = PngZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&raw).unwrap();
        let idat = enc.finish().unwrap();

        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&png_chunk(b"IHDR", &ihdr));
        png.extend_from_slice(&png_chunk(b"IDAT", &idat));
        png.extend_from_slice(&png_chunk(b"IEND", &[]));
        png
    }

    #[test]
    fn decodes_small_rgb_png() {
        let png = two_by_two_rgb_png();
        let decoded = decode_png(&png).unwrap();
        assert_eq!(decoded.width, 2);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.color_space, "DeviceRGB");
        assert!(decoded.alpha_samples.is_none());
        assert_eq!(decoded.color_samples, vec![255, 0, 0, 0, 255, 0, 255, 0, 0, 0, 255, 0]);
    }

    #[test]
    fn rejects_bad_signature() {
        let err = decode_png(b"not a png").unwrap_err();
        assert!(matches!(err, PdfSignError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn paeth_picks_nearest_predictor() {
        assert_eq!(paeth(0, 0, 0), 0);
        assert_eq!(paeth(10, 20, 0), 10);
    }

    #[test]
    fn text_width_grows_with_length() {
        let short = text_width("A", 10.0);
        let long = text_width("Hello", 10.0);
        assert!(long > short);
    }

    #[test]
    fn embeds_appearance_into_widget() {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.7\n");
        let obj1 = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let obj2 = b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n";
        let obj3 = b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n";
        let obj4 = b"4 0 obj\n<< /Type /Annot /Subtype /Widget /FT /Sig /Rect [0 0 0 0] /P 3 0 R >>\nendobj\n";
        let mut offs = Vec::new();
        for obj in [obj1.as_slice(), obj2.as_slice(), obj3.as_slice(), obj4.as_slice()] {
            offs.push(pdf.len());
            pdf.extend_from_slice(obj);
        }
        let xref_off = pdf.len();
        pdf.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for off in &offs {
            pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref_off}\n%%EOF\n").as_bytes());

        let rect = Rect { llx: 0.0, lly: 0.0, urx: 120.0, ury: 40.0 };
        let updated = embed_appearance(pdf, 4, rect, &two_by_two_rgb_png(), Some("Signed")).unwrap();

        let doc = PdfDocument::parse(updated).unwrap();
        let widget = doc.read_object(4).unwrap();
        assert!(widget.dict.contains("/AP"));
        assert!(widget.dict.contains("/AS /N"));
    }
}
