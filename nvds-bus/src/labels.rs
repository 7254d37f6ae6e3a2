//! Label set of the loaded model and the class color table derived from it.

use std::path::Path;

use anyhow::Context;

use crate::draw::Rgba;

const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Reads one label per line, ignoring blank lines.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read label file {}", path.display()))?;
        let labels = Self::parse(&text);
        log::info!("Labels: loaded {} classes from {}", labels.len(), path.display());
        Ok(labels)
    }

    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn get(&self, class_id: i32) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Class id to color, fixed once the pipeline is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassColors {
    colors: Vec<Rgba>,
    fallback: Rgba,
}

impl ClassColors {
    /// Spreads hues by the golden angle so neighbouring ids stay distinct.
    pub fn for_labels(labels: &LabelSet) -> Self {
        Self {
            colors: (0..labels.len()).map(palette_color).collect(),
            fallback: Rgba::GRAY,
        }
    }

    /// Color of `class_id`, or the fallback for ids outside the label set.
    pub fn get(&self, class_id: i32) -> Rgba {
        usize::try_from(class_id)
            .ok()
            .and_then(|i| self.colors.get(i).copied())
            .unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> Rgba {
        self.fallback
    }
}

fn palette_color(i: usize) -> Rgba {
    let hue = (i as f64 * GOLDEN_RATIO_CONJUGATE).fract();
    let (r, g, b) = hsv_to_rgb(hue, 0.75, 0.95);
    Rgba::new(r, g, b, 1.0)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    match sector as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
