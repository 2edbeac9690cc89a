use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compose::scene::TextAlign;
use crate::foundation::error::{PosterError, PosterResult};

/// System families tried after the custom fonts directory is exhausted.
const SYSTEM_FALLBACKS: [&str; 3] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans{suffix}.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush carried through Parley layout styling.
pub(crate) struct TextBrush {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

#[derive(Clone)]
/// Font bytes that registered successfully, plus the family name Parley
/// reported for them.
pub(crate) struct LoadedFont {
    pub(crate) bytes: Arc<Vec<u8>>,
    pub(crate) family_name: String,
}

/// Horizontal origin of one measured line within its bounding box.
pub(crate) fn aligned_line_x(
    align: TextAlign,
    bbox_left: f64,
    bbox_width: f64,
    line_width: f64,
) -> f64 {
    match align {
        TextAlign::Left => bbox_left,
        TextAlign::Right => bbox_left + bbox_width - line_width,
        TextAlign::Center => bbox_left + (bbox_width - line_width) / 2.0,
    }
}

/// Candidate font files for a (family, bold, italic) request, best first.
///
/// Custom files with the exact variant suffix come first (two extension
/// candidates), then the bare family, then the system fallbacks with and
/// without the variant.
pub(crate) fn font_candidates(
    fonts_dir: &Path,
    family: &str,
    bold: bool,
    italic: bool,
) -> Vec<PathBuf> {
    let suffix = match (bold, italic) {
        (true, true) => "-BoldItalic",
        (true, false) => "-Bold",
        (false, true) => "-Italic",
        (false, false) => "",
    };

    let mut out = vec![
        fonts_dir.join(format!("{family}{suffix}.ttf")),
        fonts_dir.join(format!("{family}{suffix}.otf")),
        fonts_dir.join(format!("{family}.ttf")),
        fonts_dir.join(format!("{family}.otf")),
    ];
    for pattern in SYSTEM_FALLBACKS {
        out.push(PathBuf::from(pattern.replace("{suffix}", suffix)));
    }
    out
}

/// Stateful helper for resolving fonts and building Parley line layouts.
///
/// One engine lives per render call; registered fonts accumulate in its
/// Parley contexts for the duration of the render.
pub(crate) struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl TextEngine {
    pub(crate) fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Walk the candidate chain and return the first font that both exists
    /// on disk and registers successfully. Unreadable or unparseable files
    /// fall through to the next candidate; total exhaustion returns `None`
    /// (the caller skips glyph drawing rather than failing the render).
    pub(crate) fn resolve_font(
        &mut self,
        fonts_dir: &Path,
        family: &str,
        bold: bool,
        italic: bool,
    ) -> Option<LoadedFont> {
        for candidate in font_candidates(fonts_dir, family, bold, italic) {
            let Ok(bytes) = std::fs::read(&candidate) else {
                continue;
            };
            match self.register(bytes) {
                Some(font) => {
                    tracing::debug!(
                        family,
                        path = %candidate.display(),
                        resolved = %font.family_name,
                        "resolved font"
                    );
                    return Some(font);
                }
                None => {
                    tracing::debug!(path = %candidate.display(), "font failed to register");
                }
            }
        }
        tracing::warn!(family, bold, italic, "font resolution chain exhausted");
        None
    }

    fn register(&mut self, bytes: Vec<u8>) -> Option<LoadedFont> {
        let bytes = Arc::new(bytes);
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.as_ref().clone()), None);
        let family_id = families.first().map(|(id, _)| *id)?;
        let family_name = self.font_ctx.collection.family_name(family_id)?.to_string();
        Some(LoadedFont { bytes, family_name })
    }

    /// Shape and lay out a single line of text at `size_px`.
    ///
    /// No wrapping width is applied; the caller measures the result with
    /// [`parley::Layout::width`] and positions it by alignment.
    pub(crate) fn layout_line(
        &mut self,
        text: &str,
        font: &LoadedFont,
        size_px: f32,
        brush: TextBrush,
    ) -> PosterResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(PosterError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(font.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_arithmetic() {
        // Right-aligned: bbox left 100, width 500 => right edge at 600
        // regardless of content length.
        for line_width in [0.0, 37.5, 499.0] {
            let x = aligned_line_x(TextAlign::Right, 100.0, 500.0, line_width);
            assert!((x + line_width - 600.0).abs() < 1e-9);
        }
        assert_eq!(aligned_line_x(TextAlign::Left, 100.0, 500.0, 80.0), 100.0);
        assert_eq!(
            aligned_line_x(TextAlign::Center, 100.0, 500.0, 80.0),
            100.0 + (500.0 - 80.0) / 2.0
        );
    }

    #[test]
    fn candidate_chain_order() {
        let dir = Path::new("/fonts");
        let c = font_candidates(dir, "Inter", true, false);
        assert_eq!(c[0], dir.join("Inter-Bold.ttf"));
        assert_eq!(c[1], dir.join("Inter-Bold.otf"));
        assert_eq!(c[2], dir.join("Inter.ttf"));
        assert_eq!(c[3], dir.join("Inter.otf"));
        assert!(
            c[4].to_string_lossy()
                .ends_with("dejavu/DejaVuSans-Bold.ttf")
        );
        assert!(c[5].to_string_lossy().ends_with("dejavu/DejaVuSans.ttf"));
        assert!(
            c[6].to_string_lossy()
                .ends_with("liberation/LiberationSans-Regular.ttf")
        );
    }

    #[test]
    fn variant_suffixes() {
        let dir = Path::new("/fonts");
        let c = font_candidates(dir, "A", true, true);
        assert_eq!(c[0], dir.join("A-BoldItalic.ttf"));
        let c = font_candidates(dir, "A", false, true);
        assert_eq!(c[0], dir.join("A-Italic.ttf"));
        let c = font_candidates(dir, "A", false, false);
        assert_eq!(c[0], dir.join("A.ttf"));
    }

    #[test]
    fn resolution_skips_unparseable_files() {
        let tmp = std::env::temp_dir().join(format!(
            "postera_fonts_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&tmp).unwrap();
        // Present but not a font: must fall through, not short-circuit.
        std::fs::write(tmp.join("Fake-Bold.ttf"), b"not a font").unwrap();

        let mut engine = TextEngine::new();
        let resolved = engine.resolve_font(&tmp, "Fake", true, false);
        if let Some(font) = &resolved {
            // Only a real system fallback may have won.
            assert_ne!(font.bytes.as_slice(), b"not a font");
        }

        std::fs::remove_dir_all(&tmp).ok();
    }
}
