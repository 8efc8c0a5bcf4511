//! Content extraction: one PDF → lowercased text + embedded raster images.
//!
//! ## Text
//!
//! `pdf-extract` produces per-page text. Should it fail (or panic) on a file
//! that `lopdf` can still parse, each page is retried with `lopdf`'s own text
//! extraction and a page that still fails contributes the empty string. Page
//! texts are lowercased and concatenated in page order.
//!
//! ## Images
//!
//! [`EmbeddedImages`] walks the page tree lazily, one page at a time,
//! yielding every image XObject reachable from the page's (possibly
//! inherited) `/Resources`, including images drawn inside Form XObjects.
//! The in-page index counts image XObjects in resource order starting at 1,
//! so the numbering is stable even when a payload cannot be decoded.
//!
//! | payload                                  | written as |
//! |------------------------------------------|------------|
//! | `DCTDecode`                              | `.jpg` verbatim |
//! | `JPXDecode`                              | `.jp2` verbatim |
//! | unfiltered / `FlateDecode`, 8 bpc gray, RGB, CMYK | `.png` |
//!
//! Anything else is skipped with a warning and counted.

use crate::error::ExtractionError;
use crate::output::ImageAsset;
use crate::pipeline::canonical::{canonicalize, CanonicalImage};
use crate::pipeline::input::display_name;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{btree_map, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bound on `/Parent` hops when looking for inherited resources.
const MAX_TREE_DEPTH: usize = 32;
/// Bound on chained indirect references.
const MAX_REFERENCE_HOPS: usize = 8;
/// Bound on Form XObjects nested inside each other.
const MAX_FORM_DEPTH: usize = 8;

/// Everything extracted from one PDF.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Lowercased page texts, concatenated in page order.
    pub text: String,
    /// Extracted images in (page, index) order.
    pub images: Vec<ExtractedImage>,
    /// Image XObjects whose encoding is not supported.
    pub skipped_images: usize,
}

/// A persisted image plus its canonical form, when the file could be decoded.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub asset: ImageAsset,
    pub canonical: Option<CanonicalImage>,
}

/// Decoded payload of an image XObject.
#[derive(Debug)]
pub enum ImagePayload {
    Jpeg(Vec<u8>),
    Jpeg2000(Vec<u8>),
    Raster(DynamicImage),
}

impl ImagePayload {
    pub fn extension(&self) -> &'static str {
        match self {
            ImagePayload::Jpeg(_) => "jpg",
            ImagePayload::Jpeg2000(_) => "jp2",
            ImagePayload::Raster(_) => "png",
        }
    }
}

/// One image XObject with its provenance.
#[derive(Debug)]
pub struct EmbeddedImage {
    /// 1-based page number.
    pub page: u32,
    /// 1-based position among the page's image XObjects.
    pub index: u32,
    /// The payload, or why it was not decodable.
    pub payload: Result<ImagePayload, String>,
}

/// Extract text and (optionally) images from the PDF at `path`.
///
/// When `images_dir` is set, images are written to
/// `<images_dir>/<file name>/page_<p>_img_<i>.<ext>`, overwriting files
/// from earlier runs. The folder keeps the extension so that `a.pdf` and
/// `a.PDF` never share one.
pub fn extract_pdf(
    path: &Path,
    images_dir: Option<&Path>,
) -> Result<ExtractedContent, ExtractionError> {
    let file = display_name(path);
    let bytes = std::fs::read(path).map_err(|e| ExtractionError::Unreadable {
        file: file.clone(),
        detail: e.to_string(),
    })?;
    let doc = Document::load_mem(&bytes).map_err(|e| ExtractionError::Corrupt {
        file: file.clone(),
        detail: e.to_string(),
    })?;

    let text = extract_text(&file, &bytes, &doc);

    let mut content = ExtractedContent {
        text,
        images: Vec::new(),
        skipped_images: 0,
    };

    let mut embedded_images = EmbeddedImages::new(&doc).peekable();
    if let Some(root) = images_dir.filter(|_| embedded_images.peek().is_some()) {
        let dir = root.join(&file);
        std::fs::create_dir_all(&dir).map_err(|e| ExtractionError::ImagesDir {
            file: file.clone(),
            dir: dir.clone(),
            detail: e.to_string(),
        })?;

        for embedded in embedded_images {
            let payload = match embedded.payload {
                Ok(p) => p,
                Err(reason) => {
                    warn!(
                        "{}: skipping image {} on page {}: {}",
                        file, embedded.index, embedded.page, reason
                    );
                    content.skipped_images += 1;
                    continue;
                }
            };
            match persist_image(&file, &dir, embedded.page, embedded.index, payload) {
                Ok(image) => content.images.push(image),
                Err(reason) => {
                    warn!(
                        "{}: could not write image {} on page {}: {}",
                        file, embedded.index, embedded.page, reason
                    );
                    content.skipped_images += 1;
                }
            }
        }
    }

    debug!(
        "{}: {} chars, {} image(s), {} skipped",
        file,
        content.text.len(),
        content.images.len(),
        content.skipped_images
    );
    Ok(content)
}

// ── Text ─────────────────────────────────────────────────────────────────

fn extract_text(file: &str, bytes: &[u8], doc: &Document) -> String {
    page_texts_or_fallback(file, doc, || {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })
}

/// Run `primary` and fall back to `lopdf` page by page when it fails or
/// panics.
fn page_texts_or_fallback<E, F>(file: &str, doc: &Document, primary: F) -> String
where
    E: std::fmt::Display,
    F: FnOnce() -> Result<Vec<String>, E> + std::panic::UnwindSafe,
{
    let pages = match std::panic::catch_unwind(primary) {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            debug!("{}: pdf-extract failed ({}), using per-page fallback", file, e);
            fallback_page_texts(doc)
        }
        Err(_) => {
            warn!("{}: pdf-extract panicked, using per-page fallback", file);
            fallback_page_texts(doc)
        }
    };
    pages.iter().map(|p| p.to_lowercase()).collect()
}

fn fallback_page_texts(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .keys()
        .map(|&n| doc.extract_text(&[n]).unwrap_or_default())
        .collect()
}

// ── Image discovery ──────────────────────────────────────────────────────

/// Lazy iterator over every image XObject of a document, page by page.
pub struct EmbeddedImages<'a> {
    doc: &'a Document,
    pages: btree_map::IntoIter<u32, ObjectId>,
    pending: std::vec::IntoIter<(u32, u32, &'a Stream)>,
}

impl<'a> EmbeddedImages<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            pages: doc.get_pages().into_iter(),
            pending: Vec::new().into_iter(),
        }
    }

    fn page_images(&self, page_no: u32, page_id: ObjectId) -> Vec<(u32, u32, &'a Stream)> {
        let Some(xobjects) = page_xobjects(self.doc, page_id) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        collect_images(self.doc, xobjects, 0, &mut HashSet::new(), &mut found);
        found
            .into_iter()
            .enumerate()
            .map(|(i, s)| (page_no, i as u32 + 1, s))
            .collect()
    }
}

/// Image streams of an `/XObject` dictionary in resource order, descending
/// into Form XObjects. A referenced object is visited once per page.
fn collect_images<'a>(
    doc: &'a Document,
    xobjects: &'a Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    found: &mut Vec<&'a Stream>,
) {
    for (_, obj) in xobjects.iter() {
        if let Object::Reference(id) = obj {
            if !seen.insert(*id) {
                continue;
            }
        }
        match resolve(doc, obj) {
            Some(Object::Stream(s)) if is_image(s) => found.push(s),
            Some(Object::Stream(s)) if is_form(s) && depth < MAX_FORM_DEPTH => {
                let nested = s
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve_dict(doc, r))
                    .and_then(|r| r.get(b"XObject").ok())
                    .and_then(|x| resolve_dict(doc, x));
                if let Some(nested) = nested {
                    collect_images(doc, nested, depth + 1, seen, found);
                }
            }
            _ => {}
        }
    }
}

impl Iterator for EmbeddedImages<'_> {
    type Item = EmbeddedImage;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((page, index, stream)) = self.pending.next() {
                return Some(EmbeddedImage {
                    page,
                    index,
                    payload: decode_payload(self.doc, stream),
                });
            }
            let (page_no, page_id) = self.pages.next()?;
            self.pending = self.page_images(page_no, page_id).into_iter();
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_REFERENCE_HOPS {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// The page's `/XObject` dictionary, following `/Resources` inheritance.
fn page_xobjects(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(res) = node.get(b"Resources") {
            let resources = resolve_dict(doc, res)?;
            return resources
                .get(b"XObject")
                .ok()
                .and_then(|x| resolve_dict(doc, x));
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Image")
}

fn is_form(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Form")
}

// ── Payload decoding ─────────────────────────────────────────────────────

fn decode_payload(doc: &Document, stream: &Stream) -> Result<ImagePayload, String> {
    let filters = filter_names(doc, &stream.dict);
    let names: Vec<&[u8]> = filters.iter().map(|f| f.as_slice()).collect();
    match names.as_slice() {
        [b"DCTDecode"] => Ok(ImagePayload::Jpeg(stream.content.clone())),
        [b"JPXDecode"] => Ok(ImagePayload::Jpeg2000(stream.content.clone())),
        [] => decode_samples(doc, &stream.dict, &stream.content).map(ImagePayload::Raster),
        [b"FlateDecode"] => {
            let data = stream
                .decompressed_content()
                .map_err(|e| format!("flate: {e}"))?;
            decode_samples(doc, &stream.dict, &data).map(ImagePayload::Raster)
        }
        other => Err(format!(
            "unsupported filter chain [{}]",
            other
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    let Some(filter) = dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) else {
        return Vec::new();
    };
    match filter {
        Object::Name(n) => vec![n.clone()],
        Object::Array(items) => items
            .iter()
            .filter_map(|i| match resolve(doc, i) {
                Some(Object::Name(n)) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match resolve(doc, dict.get(key).ok()?)? {
        Object::Integer(i) => Some(*i),
        _ => None,
    }
}

/// Components per sample for the colour spaces we can rasterise.
fn components(doc: &Document, dict: &Dictionary) -> Result<usize, String> {
    let cs = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|c| resolve(doc, c))
        .ok_or("missing /ColorSpace")?;
    color_space_components(doc, cs)
}

fn color_space_components(doc: &Document, cs: &Object) -> Result<usize, String> {
    match cs {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(3),
            b"DeviceCMYK" | b"CMYK" => Ok(4),
            other => Err(format!(
                "unsupported colour space /{}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|f| resolve(doc, f))
                .ok_or("empty colour space array")?;
            match family {
                Object::Name(n) if n.as_slice() == b"ICCBased" => {
                    let profile = items
                        .get(1)
                        .and_then(|p| resolve(doc, p))
                        .ok_or("ICCBased without profile")?;
                    match profile {
                        Object::Stream(s) => match integer(doc, &s.dict, b"N") {
                            Some(n @ (1 | 3 | 4)) => Ok(n as usize),
                            other => Err(format!("ICCBased with /N {other:?}")),
                        },
                        _ => Err("ICCBased profile is not a stream".into()),
                    }
                }
                Object::Name(n) if matches!(n.as_slice(), b"CalGray" | b"CalRGB") => {
                    color_space_components(doc, family)
                }
                Object::Name(n) => Err(format!(
                    "unsupported colour space /{}",
                    String::from_utf8_lossy(n)
                )),
                _ => Err("malformed colour space".into()),
            }
        }
        _ => Err("malformed colour space".into()),
    }
}

/// Build a raster from raw 8-bit samples.
fn decode_samples(doc: &Document, dict: &Dictionary, data: &[u8]) -> Result<DynamicImage, String> {
    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return Err("stencil mask".into());
    }
    let width = integer(doc, dict, b"Width").ok_or("missing /Width")?;
    let height = integer(doc, dict, b"Height").ok_or("missing /Height")?;
    let bpc = integer(doc, dict, b"BitsPerComponent").unwrap_or(8);
    if bpc != 8 {
        return Err(format!("{bpc} bits per component"));
    }
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(format!("bad dimensions {width}x{height}")),
    };
    let n = components(doc, dict)?;
    let needed = (w as usize)
        .checked_mul(h as usize)
        .and_then(|px| px.checked_mul(n))
        .ok_or_else(|| format!("bad dimensions {width}x{height}"))?;
    if data.len() < needed {
        return Err(format!("{} sample bytes, expected {}", data.len(), needed));
    }
    let samples = &data[..needed];

    let image = match n {
        1 => GrayImage::from_raw(w, h, samples.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, samples.to_vec()).map(DynamicImage::ImageRgb8),
        _ => RgbImage::from_raw(w, h, cmyk_to_rgb(samples)).map(DynamicImage::ImageRgb8),
    };
    image.ok_or_else(|| "sample buffer does not match dimensions".to_string())
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u32::from(px[3]);
            [px[0], px[1], px[2]].map(|c| ((255 - u32::from(c)) * k / 255) as u8)
        })
        .collect()
}

// ── Persistence ──────────────────────────────────────────────────────────

fn persist_image(
    file: &str,
    dir: &Path,
    page: u32,
    index: u32,
    payload: ImagePayload,
) -> Result<ExtractedImage, String> {
    let name = format!("page_{}_img_{}.{}", page, index, payload.extension());
    let path: PathBuf = dir.join(&name);

    let canonical = match &payload {
        ImagePayload::Jpeg(bytes) => {
            std::fs::write(&path, bytes).map_err(|e| e.to_string())?;
            match image::load_from_memory_with_format(bytes, ImageFormat::Jpeg) {
                Ok(img) => Some(canonicalize(&img)),
                Err(e) => {
                    warn!("{}: {} does not decode: {}", file, name, e);
                    None
                }
            }
        }
        ImagePayload::Jpeg2000(bytes) => {
            std::fs::write(&path, bytes).map_err(|e| e.to_string())?;
            warn!("{}: {} is JPEG 2000, kept on disk but not scored", file, name);
            None
        }
        ImagePayload::Raster(img) => {
            img.save_with_format(&path, ImageFormat::Png)
                .map_err(|e| e.to_string())?;
            Some(canonicalize(img))
        }
    };

    Ok(ExtractedImage {
        asset: ImageAsset {
            document: file.to_string(),
            page,
            index,
            label: format!("{file}/{name}"),
            path,
        },
        canonical,
    })
}
