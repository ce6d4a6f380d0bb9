//! User-drawn reference glyphs and their JSON/PNG persistence format.
//!
//! The store is a JSON object mapping each symbol to a base64-encoded PNG of
//! the drawing the user saved as "the shape I want". Persisting the file is
//! the caller's business; this module only converts between that document
//! and in-memory surfaces.

use base64::Engine;
use image::{codecs::png::PngEncoder, DynamicImage, ImageEncoder};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{RecognizeError, Result};
use crate::raster::DrawingSurface;

/// Symbol → user reference drawing. At most one drawing per symbol.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    entries: HashMap<String, DrawingSurface>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the reference for `symbol`.
    pub fn insert(&mut self, symbol: impl Into<String>, drawing: DrawingSurface) {
        self.entries.insert(symbol.into(), drawing);
    }

    pub fn insert_image(&mut self, symbol: impl Into<String>, img: &DynamicImage) -> Result<()> {
        self.insert(symbol, DrawingSurface::from_image(img)?);
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&DrawingSurface> {
        self.entries.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    pub fn remove(&mut self, symbol: &str) -> Option<DrawingSurface> {
        self.entries.remove(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbols with a saved reference, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    /// Parse a `{ symbol: base64Png }` document.
    ///
    /// Entries whose image cannot be decoded are skipped with a warning so one
    /// corrupt drawing does not cost the user all the others.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(text)
            .map_err(|e| RecognizeError::References(format!("Parse error: {e}")))?;
        let mut set = Self::new();
        for (symbol, b64) in raw {
            match decode_png_b64(&b64) {
                Ok(img) => set.insert_image(symbol, &img)?,
                Err(e) => warn!(symbol = %symbol, "skipping reference drawing: {e}"),
            }
        }
        Ok(set)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut out: BTreeMap<&str, String> = BTreeMap::new();
        for (symbol, drawing) in &self.entries {
            out.insert(symbol, encode_png_b64(drawing)?);
        }
        serde_json::to_string_pretty(&out)
            .map_err(|e| RecognizeError::References(format!("Serialise error: {e}")))
    }
}

pub fn load_references(path: impl AsRef<Path>) -> Result<ReferenceSet> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        RecognizeError::References(format!("Cannot read {}: {e}", path.display()))
    })?;
    ReferenceSet::from_json(&text)
}

pub fn save_references(path: impl AsRef<Path>, refs: &ReferenceSet) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RecognizeError::References(format!("Cannot create dirs: {e}")))?;
    }
    fs::write(path, refs.to_json()?).map_err(|e| {
        RecognizeError::References(format!("Cannot write {}: {e}", path.display()))
    })
}

fn decode_png_b64(b64: &str) -> std::result::Result<DynamicImage, String> {
    // Accept both bare base64 and a full `data:image/png;base64,` URL.
    let payload = b64.split_once(',').map_or(b64, |(_, p)| p);
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("base64: {e}"))?;
    image::load_from_memory(&bytes).map_err(|e| format!("image: {e}"))
}

fn encode_png_b64(drawing: &DrawingSurface) -> Result<String> {
    let img = drawing.to_rgb_image();
    let mut png: Vec<u8> = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgb8)
        .map_err(|e| RecognizeError::References(format!("PNG encode: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn drawing() -> DrawingSurface {
        let mut img = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        for i in 0..20 {
            img.put_pixel(i, i, Rgb([0, 0, 0]));
        }
        DrawingSurface::from_image(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[test]
    fn json_round_trip_keeps_pixels() {
        let mut refs = ReferenceSet::new();
        refs.insert("क", drawing());
        let text = refs.to_json().unwrap();
        let back = ReferenceSet::from_json(&text).unwrap();
        assert_eq!(back.symbols(), vec!["क"]);
        assert_eq!(back.get("क").unwrap().to_rgb_image(), drawing().to_rgb_image());
    }

    #[test]
    fn corrupt_entry_is_skipped() {
        let mut refs = ReferenceSet::new();
        refs.insert("ख", drawing());
        let mut doc: HashMap<String, String> =
            serde_json::from_str(&refs.to_json().unwrap()).unwrap();
        doc.insert("ग".into(), "not base64!".into());
        let back = ReferenceSet::from_json(&serde_json::to_string(&doc).unwrap()).unwrap();
        assert!(back.contains("ख"));
        assert!(!back.contains("ग"));
    }

    #[test]
    fn data_url_prefix_is_accepted() {
        let mut refs = ReferenceSet::new();
        refs.insert("घ", drawing());
        let doc: HashMap<String, String> = serde_json::from_str(&refs.to_json().unwrap()).unwrap();
        let url = format!("data:image/png;base64,{}", doc["घ"]);
        assert!(decode_png_b64(&url).is_ok());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(ReferenceSet::from_json("[1, 2]").is_err());
    }
}
