//! Deterministic display colors.
//!
//! Resolution order: a configured person named in the title, then the
//! first non-blank `[...]` token of the title, then the title itself.
//! The last two go through [`string_hash`] into fixed 16-color palettes,
//! so the same group (`[TP1]`) or title always gets the same color.

use std::collections::BTreeMap;

/// Palette for bracketed group tokens.
pub const BRACKET_PALETTE: [&str; 16] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#46a0a0", "#d63ab9", "#9a9c1d",
    "#c0507a", "#008080", "#9a6324", "#800000", "#2f7f5f", "#808000", "#ca6f1e", "#000075",
];

/// Palette for plain titles.
pub const TITLE_PALETTE: [&str; 16] = [
    "#5b8def", "#e86a5c", "#4fb286", "#d9a43b", "#9b6fd1", "#3aa6b9", "#d1698f", "#7d9a3a",
    "#c47f4a", "#5d7fa3", "#b0558a", "#3f9e73", "#a38b2d", "#6d6fcf", "#cc5a3d", "#4d9bc2",
];

/// 32-bit rolling hash over UTF-16 code units: `h = h * 31 + unit`,
/// written as `(h << 5) - h + unit` with wrapping arithmetic, seed 0.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    })
}

/// Pick a palette entry for `s`. `|i32::MIN|` is taken as `2^31`.
pub fn palette_color(s: &str, palette: &[&'static str]) -> &'static str {
    let index = string_hash(s).unsigned_abs() as usize % palette.len();
    palette[index]
}

/// Resolves the display color of an occurrence from its title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Colorizer {
    /// Lower-cased person name -> color
    persons: BTreeMap<String, String>,
}

impl Colorizer {
    pub fn new<I, K, V>(persons: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Colorizer {
            persons: persons
                .into_iter()
                .map(|(name, color)| (name.as_ref().to_lowercase(), color.into()))
                .collect(),
        }
    }

    /// Return a copy with one more person override.
    pub fn with_person(mut self, name: &str, color: impl Into<String>) -> Self {
        self.persons.insert(name.to_lowercase(), color.into());
        self
    }

    pub fn persons(&self) -> impl Iterator<Item = (&str, &str)> {
        self.persons.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn resolve(&self, title: &str) -> String {
        let lowered = title.to_lowercase();

        if let Some((_, color)) = self
            .persons
            .iter()
            .find(|(name, _)| !name.is_empty() && lowered.contains(name.as_str()))
        {
            return color.clone();
        }

        if let Some(token) = bracket_token(title) {
            return palette_color(&token.to_lowercase(), &BRACKET_PALETTE).to_string();
        }

        palette_color(title, &TITLE_PALETTE).to_string()
    }
}

/// Content of the first `[...]` group in `title`, trimmed, if non-blank.
fn bracket_token(title: &str) -> Option<&str> {
    let open = title.find('[')?;
    let rest = &title[open + 1..];
    let close = rest.find(']')?;
    let token = rest[..close].trim();

    (!token.is_empty()).then_some(token)
}
