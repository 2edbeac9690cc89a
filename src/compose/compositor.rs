use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use kurbo::Point;

use crate::compose::background::{frame_background, gradient_fill, solid_fill};
use crate::compose::raster::{
    bezpath_to_cpu, flatten_premul_over_black, image_paint_from_premul, stroke_quad,
};
use crate::compose::scene::{Background, FontStyle, FontWeight, PosterScene, TextLayer};
use crate::compose::text::{LoadedFont, TextBrush, TextEngine, aligned_line_x};
use crate::config::Config;
use crate::foundation::color::Rgb8;
use crate::foundation::error::{PosterError, PosterResult};
use crate::media::FrameSource;

/// Fixed-resolution, fully opaque RGBA8 raster produced by a render.
#[derive(Clone, Debug)]
pub struct RenderedPoster {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, alpha always 255.
    pub pixels: Vec<u8>,
}

/// Renders [`PosterScene`]s onto a fixed-size canvas and persists them.
///
/// Output resolution is configured once and independent of the scene's
/// editing-canvas size; the two scale factors derived from their ratio map
/// editing-space measurements (font sizes, stroke widths) into output space,
/// while normalized 0-1 coordinates multiply directly against the output
/// dimensions.
pub struct Compositor {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    fonts_dir: PathBuf,
    source: Arc<dyn FrameSource>,
}

impl Compositor {
    /// Create the compositor, making sure the output directory exists.
    pub fn new(cfg: &Config, source: Arc<dyn FrameSource>) -> PosterResult<Self> {
        std::fs::create_dir_all(&cfg.output_dir)
            .with_context(|| format!("create output dir '{}'", cfg.output_dir.display()))?;
        Ok(Self {
            output_dir: cfg.output_dir.clone(),
            width: cfg.poster_width,
            height: cfg.poster_height,
            fonts_dir: cfg.fonts_dir.clone(),
            source,
        })
    }

    /// Render the scene and persist it as a PNG in the output directory.
    ///
    /// Returns the final stored file name (not the full path); name
    /// collisions are resolved with `_1`, `_2`, ... suffixes.
    #[tracing::instrument(skip_all, fields(filename = %scene.filename))]
    pub fn generate(&self, scene: &PosterScene) -> PosterResult<String> {
        let poster = self.render(scene)?;
        self.persist(poster, &scene.filename)
    }

    /// Render the scene to an opaque raster. Deterministic for identical
    /// inputs and a stable background source.
    pub fn render(&self, scene: &PosterScene) -> PosterResult<RenderedPoster> {
        scene.validate()?;

        let (w, h) = (self.width, self.height);
        let pm_w: u16 = w
            .try_into()
            .map_err(|_| PosterError::render("poster width exceeds u16"))?;
        let pm_h: u16 = h
            .try_into()
            .map_err(|_| PosterError::render("poster height exceeds u16"))?;

        let scale_x = f64::from(w) / scene.canvas_width;
        let scale_y = f64::from(h) / scene.canvas_height;

        let background = self.background_buffer(scene)?;

        let mut ctx = vello_cpu::RenderContext::new(pm_w, pm_h);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(image_paint_from_premul(&background, w, h)?);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(w),
            f64::from(h),
        ));

        self.draw_lines(&mut ctx, scene, scale_x);
        self.draw_text_layers(&mut ctx, scene, scale_y);

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(pm_w, pm_h);
        ctx.render_to_pixmap(&mut pixmap);

        let mut pixels = pixmap.data_as_u8_slice().to_vec();
        flatten_premul_over_black(&mut pixels);
        Ok(RenderedPoster {
            width: w,
            height: h,
            pixels,
        })
    }

    /// Produce the premultiplied background buffer for the scene.
    ///
    /// Image mode falls back to a solid fill when no source is given, and to
    /// the plain black base when the decoder fails; a missing frame never
    /// fails the render.
    fn background_buffer(&self, scene: &PosterScene) -> PosterResult<Vec<u8>> {
        let (w, h) = (self.width, self.height);
        match scene.background_mode {
            Background::Image => {
                let Some(path) = scene.video_path.as_deref() else {
                    return Ok(solid_fill(w, h, scene.background_color));
                };
                let Some(frame) = self.source.extract_frame_lossless(path, scene.timestamp)
                else {
                    tracing::warn!(
                        path = %path.display(),
                        timestamp = scene.timestamp,
                        "frame extraction failed, rendering black background"
                    );
                    return Ok(solid_fill(w, h, Rgb8::BLACK));
                };
                match frame_background(&frame, scene.selection_coords, w, h, scene.blur) {
                    Ok(buf) => Ok(buf),
                    Err(e) => {
                        tracing::warn!(error = %e, "frame background failed, rendering black");
                        Ok(solid_fill(w, h, Rgb8::BLACK))
                    }
                }
            }
            Background::Gradient => Ok(gradient_fill(
                w,
                h,
                scene.gradient_colors,
                scene.gradient_direction,
            )),
            Background::Solid => Ok(solid_fill(w, h, scene.background_color)),
        }
    }

    /// Draw line elements in scene order, after the background and before
    /// text; later elements occlude earlier ones.
    fn draw_lines(&self, ctx: &mut vello_cpu::RenderContext, scene: &PosterScene, scale_x: f64) {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        for line in &scene.line_elements {
            let p1 = Point::new(line.x1 * w, line.y1 * h);
            let p2 = Point::new(line.x2 * w, line.y2 * h);
            // Stroke width is authored in editing-canvas units; scale and
            // floor to a minimum of one output pixel.
            let stroke_px = (line.stroke_width * scale_x).floor().max(1.0);
            let Some(quad) = stroke_quad(p1, p2, stroke_px) else {
                continue;
            };

            let c = line.stroke;
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, 255));
            ctx.fill_path(&bezpath_to_cpu(&quad));
        }
    }

    fn draw_text_layers(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        scene: &PosterScene,
        scale_y: f64,
    ) {
        let mut engine = TextEngine::new();
        let mut resolved: HashMap<(String, bool, bool), Option<LoadedFont>> = HashMap::new();

        for layer in &scene.text_layers {
            let bold = layer.font_weight == FontWeight::Bold;
            let italic = layer.font_style == FontStyle::Italic;
            let font = resolved
                .entry((layer.font_family.clone(), bold, italic))
                .or_insert_with(|| {
                    engine.resolve_font(&self.fonts_dir, &layer.font_family, bold, italic)
                })
                .clone();
            let Some(font) = font else {
                // Chain exhausted; the layer is skipped rather than failing
                // the whole render.
                continue;
            };

            self.draw_text_layer(ctx, &mut engine, &font, layer, scale_y);
        }
    }

    fn draw_text_layer(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        engine: &mut TextEngine,
        font: &LoadedFont,
        layer: &TextLayer,
        scale_y: f64,
    ) {
        let out_w = f64::from(self.width);
        let out_h = f64::from(self.height);

        let bbox_left = layer.left * out_w;
        let bbox_top = layer.top * out_h;
        let bbox_width = layer.width.unwrap_or(0.5) * out_w;

        // The vertical scale factor doubles as a font-size multiplier, so
        // text scales with the canvas like every other vertical measurement.
        let font_size = layer.font_size * scale_y * layer.scale_y;
        let line_height = (font_size * 1.2).round();

        let brush = TextBrush {
            r: layer.fill.r,
            g: layer.fill.g,
            b: layer.fill.b,
            a: 255,
        };
        let font_data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font.bytes.as_ref().clone()),
            0,
        );

        for (i, line) in layer.content.split('\n').enumerate() {
            // Blank lines keep their slot so vertical spacing is preserved,
            // but draw nothing.
            if line.trim().is_empty() {
                continue;
            }

            let layout = match engine.layout_line(line, font, font_size as f32, brush) {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(error = %e, "text layout failed, skipping line");
                    continue;
                }
            };
            let line_width = f64::from(layout.width());

            let line_x = aligned_line_x(layer.text_align, bbox_left, bbox_width, line_width);
            let line_y = bbox_top + i as f64 * line_height;

            ctx.set_transform(vello_cpu::kurbo::Affine::translate((line_x, line_y)));
            for lay_line in layout.lines() {
                for item in lay_line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let b = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(b.r, b.g, b.b, b.a));
                    let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(&font_data)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }

            if layer.underline {
                let underline_y = line_y + font_size + 2.0;
                let thickness = (font_size / 16.0).max(1.0);
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, 255,
                ));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    line_x,
                    underline_y,
                    line_x + line_width,
                    underline_y + thickness,
                ));
            }
        }
    }

    /// Encode and write the poster under a sanitized, collision-free name.
    ///
    /// The final create is exclusive (`create_new`), so two concurrent
    /// generations requesting the same name cannot clobber each other; the
    /// loser of the race moves on to the next suffix.
    fn persist(&self, poster: RenderedPoster, requested: &str) -> PosterResult<String> {
        let mut base: String = requested
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if base.is_empty() {
            base = "poster".to_string();
        }

        let img = image::RgbaImage::from_raw(poster.width, poster.height, poster.pixels)
            .ok_or_else(|| PosterError::render("poster pixel buffer size mismatch"))?;
        let mut encoded = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
            .context("encode poster png")?;

        let mut counter = 0u32;
        loop {
            let name = if counter == 0 {
                format!("{base}.png")
            } else {
                format!("{base}_{counter}.png")
            };
            let path = self.output_dir.join(&name);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(&encoded)
                        .with_context(|| format!("write poster '{}'", path.display()))?;
                    tracing::debug!(name, "poster written");
                    return Ok(name);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    counter += 1;
                }
                Err(e) => {
                    return Err(PosterError::Other(anyhow::Error::new(e).context(format!(
                        "create poster '{}'",
                        path.display()
                    ))));
                }
            }
        }
    }
}
