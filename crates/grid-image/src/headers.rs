//! Pre-decode header dimension sniffing.
//!
//! Reads the advertised pixel dimensions straight out of the container
//! header for PNG, JPEG (SOF scan), GIF, WEBP (VP8 / VP8L / VP8X), BMP and
//! SVG. The point is to reject decompression bombs before any decoder
//! allocates: a 16 KiB PNG can advertise a 2-gigapixel canvas.
//!
//! SVG has no binary header; dimensions come from the `width`/`height`
//! attributes (with a CSS `var()`/`calc()` subset) falling back to the
//! `viewBox` extent.

use thiserror::Error;

/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: u32 = 10_000;
/// Largest accepted total pixel count.
pub const MAX_PIXELS: u64 = 50_000_000;
/// JPEG marker scan window.
const JPEG_SNIFF_LIMIT: usize = 1 << 20;
/// SVG text scan window.
const SVG_SNIFF_LIMIT: usize = 64 * 1024;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImageError {
    #[error("image dimensions {width}×{height} exceed limits")]
    TooLarge { width: u64, height: u64 },
    #[error("image decode failed: {reason}")]
    DecodeFailed { reason: String, recoverable: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    /// Reject against the configured limits.
    pub fn check(&self, max_dimension: u32, max_pixels: u64) -> Result<(), ImageError> {
        let (w, h) = (self.width as u64, self.height as u64);
        if self.width > max_dimension || self.height > max_dimension || w * h > max_pixels {
            return Err(ImageError::TooLarge {
                width: w,
                height: h,
            });
        }
        Ok(())
    }
}

/// Parse advertised dimensions from the container header. `None` means the
/// format was not recognized or the header is truncated; the caller decides
/// whether to pass unknown bytes on to the decoder.
pub fn sniff_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    png_dimensions(bytes)
        .or_else(|| gif_dimensions(bytes))
        .or_else(|| webp_dimensions(bytes))
        .or_else(|| bmp_dimensions(bytes))
        .or_else(|| jpeg_dimensions(bytes))
        .or_else(|| svg_dimensions(bytes))
}

fn be_u32(b: &[u8], off: usize) -> Option<u32> {
    Some(u32::from_be_bytes(b.get(off..off + 4)?.try_into().ok()?))
}

fn be_u16(b: &[u8], off: usize) -> Option<u16> {
    Some(u16::from_be_bytes(b.get(off..off + 2)?.try_into().ok()?))
}

fn le_u16(b: &[u8], off: usize) -> Option<u16> {
    Some(u16::from_le_bytes(b.get(off..off + 2)?.try_into().ok()?))
}

fn le_u32(b: &[u8], off: usize) -> Option<u32> {
    Some(u32::from_le_bytes(b.get(off..off + 4)?.try_into().ok()?))
}

fn png_dimensions(b: &[u8]) -> Option<ImageDimensions> {
    const SIG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if b.len() < 24 || b[..8] != SIG || &b[12..16] != b"IHDR" {
        return None;
    }
    Some(ImageDimensions {
        width: be_u32(b, 16)?,
        height: be_u32(b, 20)?,
    })
}

fn gif_dimensions(b: &[u8]) -> Option<ImageDimensions> {
    if b.len() < 10 || (&b[..6] != b"GIF87a" && &b[..6] != b"GIF89a") {
        return None;
    }
    Some(ImageDimensions {
        width: le_u16(b, 6)? as u32,
        height: le_u16(b, 8)? as u32,
    })
}

fn webp_dimensions(b: &[u8]) -> Option<ImageDimensions> {
    if b.len() < 30 || &b[..4] != b"RIFF" || &b[8..12] != b"WEBP" {
        return None;
    }
    match &b[12..16] {
        b"VP8 " => {
            // Lossy: 3-byte frame tag, start code 9D 01 2A, then 14-bit dims.
            if b.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            Some(ImageDimensions {
                width: (le_u16(b, 26)? & 0x3FFF) as u32,
                height: (le_u16(b, 28)? & 0x3FFF) as u32,
            })
        }
        b"VP8L" => {
            // Lossless: signature 0x2F then two 14-bit minus-one fields.
            if b[20] != 0x2F {
                return None;
            }
            let bits = le_u32(b, 21)?;
            Some(ImageDimensions {
                width: (bits & 0x3FFF) + 1,
                height: ((bits >> 14) & 0x3FFF) + 1,
            })
        }
        b"VP8X" => {
            // Extended: 24-bit canvas size minus one at payload offset 4.
            let w = (le_u32(b, 24)? & 0x00FF_FFFF) + 1;
            let h = (le_u32(b, 27)? & 0x00FF_FFFF) + 1;
            Some(ImageDimensions {
                width: w,
                height: h,
            })
        }
        _ => None,
    }
}

fn bmp_dimensions(b: &[u8]) -> Option<ImageDimensions> {
    if b.len() < 26 || &b[..2] != b"BM" {
        return None;
    }
    let dib_size = le_u32(b, 14)?;
    if dib_size == 12 {
        // BITMAPCOREHEADER: 16-bit dimensions.
        Some(ImageDimensions {
            width: le_u16(b, 18)? as u32,
            height: le_u16(b, 20)? as u32,
        })
    } else {
        // BITMAPINFOHEADER and later: signed 32-bit, height may be negative
        // for top-down rows.
        let w = le_u32(b, 18)? as i32;
        let h = le_u32(b, 22)? as i32;
        Some(ImageDimensions {
            width: w.unsigned_abs(),
            height: h.unsigned_abs(),
        })
    }
}

/// Walk JPEG markers until a start-of-frame, bounded by the sniff window.
fn jpeg_dimensions(b: &[u8]) -> Option<ImageDimensions> {
    if b.len() < 4 || b[0] != 0xFF || b[1] != 0xD8 {
        return None;
    }
    let limit = b.len().min(JPEG_SNIFF_LIMIT);
    let mut i = 2usize;
    while i + 4 <= limit {
        if b[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = b[i + 1];
        // Standalone markers without payload.
        if marker == 0xD8 || (0xD0..=0xD7).contains(&marker) || marker == 0x01 || marker == 0xFF {
            i += 2;
            continue;
        }
        let len = be_u16(b, i + 2)? as usize;
        if len < 2 {
            return None;
        }
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // Payload: precision u8, height u16, width u16.
            return Some(ImageDimensions {
                width: be_u16(b, i + 7)? as u32,
                height: be_u16(b, i + 5)? as u32,
            });
        }
        i += 2 + len;
    }
    None
}

fn svg_dimensions(b: &[u8]) -> Option<ImageDimensions> {
    let window = &b[..b.len().min(SVG_SNIFF_LIMIT)];
    let text = std::str::from_utf8(window).ok()?;
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with("<?xml") && !trimmed.starts_with("<svg") && !trimmed.starts_with("<!")
    {
        return None;
    }
    let svg_start = text.find("<svg")?;
    let tag_end = text[svg_start..].find('>')? + svg_start;
    let tag = &text[svg_start..tag_end];

    let style_vars = parse_style_vars(tag);
    let width = attr_value(tag, "width").and_then(|v| resolve_css_length(&v, &style_vars));
    let height = attr_value(tag, "height").and_then(|v| resolve_css_length(&v, &style_vars));
    if let (Some(w), Some(h)) = (width, height)
        && w > 0.0
        && h > 0.0
    {
        return Some(ImageDimensions {
            width: w.ceil() as u32,
            height: h.ceil() as u32,
        });
    }
    // viewBox fallback: min-x min-y width height.
    let vb = attr_value(tag, "viewBox")?;
    let parts: Vec<f64> = vb
        .split([' ', ','])
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok())
        .collect();
    if parts.len() == 4 && parts[2] > 0.0 && parts[3] > 0.0 {
        return Some(ImageDimensions {
            width: parts[2].ceil() as u32,
            height: parts[3].ceil() as u32,
        });
    }
    None
}

fn attr_value(tag: &str, name: &str) -> Option<String> {
    let mut search = 0usize;
    loop {
        let pos = tag[search..].find(name)? + search;
        // Must be a standalone attribute name (avoid matching "viewBox" in
        // another attribute's value or "stroke-width" for "width").
        let before_ok = pos == 0
            || tag[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_whitespace());
        let rest = &tag[pos + name.len()..];
        let rest_trim = rest.trim_start();
        if before_ok && rest_trim.starts_with('=') {
            let after_eq = rest_trim[1..].trim_start();
            let quote = after_eq.chars().next()?;
            if quote == '"' || quote == '\'' {
                let inner = &after_eq[1..];
                let end = inner.find(quote)?;
                return Some(inner[..end].to_string());
            }
            return None;
        }
        search = pos + name.len();
    }
}

/// Pull `--name: value` declarations out of the tag's `style` attribute so
/// `var(--name)` references resolve.
fn parse_style_vars(tag: &str) -> Vec<(String, String)> {
    let Some(style) = attr_value(tag, "style") else {
        return Vec::new();
    };
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            k.starts_with("--")
                .then(|| (k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// CSS length subset: plain numbers, `px`, `pt` (4/3 px), `var(--x[,
/// fallback])` and a single-level `calc()` with `+`/`-` over px terms.
/// Percentages and font-relative units are unresolvable and fall through to
/// the viewBox.
fn resolve_css_length(value: &str, vars: &[(String, String)]) -> Option<f64> {
    resolve_css_length_depth(value, vars, 0)
}

fn resolve_css_length_depth(value: &str, vars: &[(String, String)], depth: u8) -> Option<f64> {
    if depth > 4 {
        return None;
    }
    let v = value.trim();
    if let Some(inner) = v.strip_prefix("var(").and_then(|s| s.strip_suffix(')')) {
        let (name, fallback) = match inner.split_once(',') {
            Some((n, f)) => (n.trim(), Some(f.trim())),
            None => (inner.trim(), None),
        };
        if let Some((_, val)) = vars.iter().find(|(k, _)| k == name) {
            return resolve_css_length_depth(val, vars, depth + 1);
        }
        return fallback.and_then(|f| resolve_css_length_depth(f, vars, depth + 1));
    }
    if let Some(inner) = v.strip_prefix("calc(").and_then(|s| s.strip_suffix(')')) {
        return eval_calc(inner, vars, depth);
    }
    parse_px(v)
}

fn parse_px(v: &str) -> Option<f64> {
    let v = v.trim();
    if let Some(n) = v.strip_suffix("px") {
        return n.trim().parse::<f64>().ok();
    }
    if let Some(n) = v.strip_suffix("pt") {
        return n.trim().parse::<f64>().ok().map(|x| x * 4.0 / 3.0);
    }
    // Reject other unit suffixes; accept bare numbers.
    if v.ends_with('%') || v.ends_with("em") || v.ends_with("ex") || v.ends_with("vw")
        || v.ends_with("vh")
    {
        return None;
    }
    v.parse::<f64>().ok()
}

/// `a + b - c` over px/number/var terms, left to right. Terms are separated
/// by spaced operators per CSS calc grammar.
fn eval_calc(expr: &str, vars: &[(String, String)], depth: u8) -> Option<f64> {
    let mut total = 0.0f64;
    let mut sign = 1.0f64;
    let mut expect_term = true;
    for token in expr.split_whitespace() {
        if expect_term {
            let term = resolve_css_length_depth(token, vars, depth + 1)?;
            total += sign * term;
            expect_term = false;
        } else {
            sign = match token {
                "+" => 1.0,
                "-" => -1.0,
                _ => return None,
            };
            expect_term = true;
        }
    }
    (!expect_term).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut b = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        b.extend_from_slice(&13u32.to_be_bytes());
        b.extend_from_slice(b"IHDR");
        b.extend_from_slice(&width.to_be_bytes());
        b.extend_from_slice(&height.to_be_bytes());
        b.extend_from_slice(&[8, 6, 0, 0, 0]);
        b
    }

    #[test]
    fn png_header() {
        let d = sniff_dimensions(&png(640, 480)).unwrap();
        assert_eq!((d.width, d.height), (640, 480));
    }

    #[test]
    fn gif_header() {
        let mut b = b"GIF89a".to_vec();
        b.extend_from_slice(&320u16.to_le_bytes());
        b.extend_from_slice(&200u16.to_le_bytes());
        b.extend_from_slice(&[0, 0]);
        let d = sniff_dimensions(&b).unwrap();
        assert_eq!((d.width, d.height), (320, 200));
    }

    #[test]
    fn bmp_header() {
        let mut b = vec![0u8; 30];
        b[0] = b'B';
        b[1] = b'M';
        b[14..18].copy_from_slice(&40u32.to_le_bytes());
        b[18..22].copy_from_slice(&800i32.to_le_bytes());
        // Top-down BMP: negative height.
        b[22..26].copy_from_slice(&(-600i32).to_le_bytes());
        let d = sniff_dimensions(&b).unwrap();
        assert_eq!((d.width, d.height), (800, 600));
    }

    #[test]
    fn webp_vp8l_header() {
        let mut b = b"RIFF\x00\x00\x00\x00WEBPVP8L".to_vec();
        b.extend_from_slice(&0u32.to_le_bytes()); // chunk size (ignored)
        b.push(0x2F);
        // width-1 = 99 (14 bits), height-1 = 49 (next 14 bits).
        let bits: u32 = 99 | (49 << 14);
        b.extend_from_slice(&bits.to_le_bytes());
        b.extend_from_slice(&[0; 8]);
        let d = sniff_dimensions(&b).unwrap();
        assert_eq!((d.width, d.height), (100, 50));
    }

    #[test]
    fn webp_vp8x_header() {
        let mut b = b"RIFF\x00\x00\x00\x00WEBPVP8X".to_vec();
        b.extend_from_slice(&10u32.to_le_bytes());
        b.extend_from_slice(&[0, 0, 0, 0]); // flags + reserved
        // canvas 1920×1080 stored minus one, 24-bit LE.
        b.extend_from_slice(&1919u32.to_le_bytes()[..3]);
        b.extend_from_slice(&1079u32.to_le_bytes()[..3]);
        b.extend_from_slice(&[0; 4]);
        let d = sniff_dimensions(&b).unwrap();
        assert_eq!((d.width, d.height), (1920, 1080));
    }

    #[test]
    fn jpeg_sof_scan() {
        let mut b = vec![0xFF, 0xD8];
        // APP0 segment of length 16.
        b.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        b.extend_from_slice(&[0u8; 14]);
        // SOF0: len 17, precision 8, height 1080, width 1920.
        b.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        b.extend_from_slice(&1080u16.to_be_bytes());
        b.extend_from_slice(&1920u16.to_be_bytes());
        b.extend_from_slice(&[0u8; 10]);
        let d = sniff_dimensions(&b).unwrap();
        assert_eq!((d.width, d.height), (1920, 1080));
    }

    #[test]
    fn jpeg_skips_dht_before_sof() {
        let mut b = vec![0xFF, 0xD8];
        // DHT (0xC4) must not be mistaken for a SOF.
        b.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x04, 0, 0]);
        b.extend_from_slice(&[0xFF, 0xC2, 0x00, 0x11, 0x08]);
        b.extend_from_slice(&10u16.to_be_bytes());
        b.extend_from_slice(&20u16.to_be_bytes());
        b.extend_from_slice(&[0u8; 10]);
        let d = sniff_dimensions(&b).unwrap();
        assert_eq!((d.width, d.height), (20, 10));
    }

    #[test]
    fn svg_attributes() {
        let svg = br#"<?xml version="1.0"?><svg width="120px" height="80" viewBox="0 0 10 10"></svg>"#;
        let d = sniff_dimensions(svg).unwrap();
        assert_eq!((d.width, d.height), (120, 80));
    }

    #[test]
    fn svg_viewbox_fallback() {
        let svg = br#"<svg width="100%" viewBox="0 0 300 150"></svg>"#;
        let d = sniff_dimensions(svg).unwrap();
        assert_eq!((d.width, d.height), (300, 150));
    }

    #[test]
    fn svg_var_and_calc() {
        let svg = br#"<svg style="--w: 50px" width="calc(10px + var(--w))" height="var(--h, 25px)"></svg>"#;
        let d = sniff_dimensions(svg).unwrap();
        assert_eq!((d.width, d.height), (60, 25));
    }

    #[test]
    fn unknown_bytes_yield_none() {
        assert_eq!(sniff_dimensions(b"not an image"), None);
        assert_eq!(sniff_dimensions(&[]), None);
    }

    #[test]
    fn guard_rejects_bomb() {
        let d = ImageDimensions {
            width: 20_000,
            height: 20_000,
        };
        assert!(matches!(
            d.check(MAX_DIMENSION, MAX_PIXELS),
            Err(ImageError::TooLarge { .. })
        ));
        // 10_000 × 6_000 fits the dimension cap but busts the pixel cap.
        let p = ImageDimensions {
            width: 10_000,
            height: 6_000,
        };
        assert!(p.check(MAX_DIMENSION, MAX_PIXELS).is_err());
        let ok = ImageDimensions {
            width: 1_920,
            height: 1_080,
        };
        assert!(ok.check(MAX_DIMENSION, MAX_PIXELS).is_ok());
    }
}
