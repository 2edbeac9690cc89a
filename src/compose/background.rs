use crate::compose::blur::gaussian_blur_premul;
use crate::compose::raster::{over_premul_in_place, premultiply_rgba8_in_place};
use crate::compose::scene::{GradientDirection, SelectionRect};
use crate::foundation::color::Rgb8;
use crate::foundation::error::PosterResult;

/// Preview blur values are authored against the smaller editing surface;
/// this factor rescales them so the blur reads visually identical on the
/// larger output canvas.
const BLUR_SCALE: f64 = 1.25;

/// Uniform opaque fill.
pub(crate) fn solid_fill(width: u32, height: u32, color: Rgb8) -> Vec<u8> {
    let px = color.to_rgba8();
    px.repeat((width as usize) * (height as usize))
}

/// Two-color linear gradient, drawn as a line sweep.
///
/// Horizontal sweeps one column per step, vertical one row, and diagonal one
/// anti-diagonal band per step (a segment of slope -1 between the clamped
/// edge points), so no direction needs per-pixel interpolation state.
pub(crate) fn gradient_fill(
    width: u32,
    height: u32,
    colors: [Rgb8; 2],
    direction: GradientDirection,
) -> Vec<u8> {
    let [from, to] = colors;
    let mut buf = solid_fill(width, height, from);
    let (w, h) = (width as i64, height as i64);

    match direction {
        GradientDirection::Horizontal => {
            for x in 0..w {
                let t = x as f64 / w as f64;
                let px = from.lerp(to, t).to_rgba8();
                for y in 0..h {
                    put_px(&mut buf, w, h, x, y, px);
                }
            }
        }
        GradientDirection::Vertical => {
            for y in 0..h {
                let t = y as f64 / h as f64;
                let px = from.lerp(to, t).to_rgba8();
                for x in 0..w {
                    put_px(&mut buf, w, h, x, y, px);
                }
            }
        }
        GradientDirection::Diagonal => {
            for i in 0..(w + h) {
                let t = i as f64 / (w + h) as f64;
                let px = from.lerp(to, t).to_rgba8();
                let x1 = (i - h).max(0);
                let y1 = i.min(h);
                let x2 = i.min(w);
                let y2 = (i - w).max(0);
                stamp_segment(&mut buf, w, h, x1, y1, x2, y2, px);
            }
        }
    }
    buf
}

/// Crop a decoded source frame to the selection, resize to the output
/// resolution, blur, and composite over an opaque black base.
///
/// The selection rectangle is clamped so its origin stays inside the frame
/// and its far edge inside the frame bounds; geometry is never rejected.
/// The Lanczos resize to the output resolution, not the source resolution,
/// determines final sharpness.
pub(crate) fn frame_background(
    frame_bytes: &[u8],
    selection: SelectionRect,
    out_width: u32,
    out_height: u32,
    blur: f64,
) -> PosterResult<Vec<u8>> {
    use anyhow::Context as _;

    let decoded = image::load_from_memory(frame_bytes).context("decode source frame")?;
    let rgba = decoded.to_rgba8();
    let (fw, fh) = (rgba.width() as i64, rgba.height() as i64);

    let crop_left = ((selection.left * fw as f64) as i64).clamp(0, fw - 1);
    let crop_top = ((selection.top * fh as f64) as i64).clamp(0, fh - 1);
    let crop_w = (selection.width * fw as f64) as i64;
    let crop_h = (selection.height * fh as f64) as i64;
    let crop_right = (crop_left + crop_w).min(fw).max(crop_left + 1);
    let crop_bottom = (crop_top + crop_h).min(fh).max(crop_top + 1);

    let cropped = image::imageops::crop_imm(
        &rgba,
        crop_left as u32,
        crop_top as u32,
        (crop_right - crop_left) as u32,
        (crop_bottom - crop_top) as u32,
    )
    .to_image();

    let resized = image::imageops::resize(
        &cropped,
        out_width,
        out_height,
        image::imageops::FilterType::Lanczos3,
    );

    let mut frame_buf = resized.into_raw();
    premultiply_rgba8_in_place(&mut frame_buf);

    if blur > 0.0 {
        let sigma = (blur * BLUR_SCALE) as f32;
        gaussian_blur_premul(&mut frame_buf, out_width, out_height, sigma)?;
    }

    let mut base = solid_fill(out_width, out_height, Rgb8::BLACK);
    over_premul_in_place(&mut base, &frame_buf)?;
    Ok(base)
}

fn put_px(buf: &mut [u8], w: i64, h: i64, x: i64, y: i64, px: [u8; 4]) {
    if x < 0 || y < 0 || x >= w || y >= h {
        return;
    }
    let idx = ((y * w + x) as usize) * 4;
    buf[idx..idx + 4].copy_from_slice(&px);
}

/// Plot every pixel of a straight segment, stepping along the longer axis.
fn stamp_segment(buf: &mut [u8], w: i64, h: i64, x1: i64, y1: i64, x2: i64, y2: i64, px: [u8; 4]) {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let steps = dx.abs().max(dy.abs());
    if steps == 0 {
        put_px(buf, w, h, x1, y1, px);
        return;
    }
    for s in 0..=steps {
        let x = x1 + (dx * s + if dx >= 0 { steps / 2 } else { -steps / 2 }) / steps;
        let y = y1 + (dy * s + if dy >= 0 { steps / 2 } else { -steps / 2 }) / steps;
        put_px(buf, w, h, x, y, px);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn px_at(buf: &[u8], w: u32, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * w + x) * 4) as usize;
        [buf[idx], buf[idx + 1], buf[idx + 2], buf[idx + 3]]
    }

    #[test]
    fn solid_fill_is_uniform_and_opaque() {
        let buf = solid_fill(3, 2, Rgb8::new(1, 2, 3));
        assert_eq!(buf.len(), 3 * 2 * 4);
        for px in buf.chunks_exact(4) {
            assert_eq!(px, &[1, 2, 3, 255]);
        }
    }

    #[test]
    fn horizontal_gradient_endpoints_and_midpoint() {
        let w = 256u32;
        let buf = gradient_fill(w, 4, [Rgb8::BLACK, Rgb8::WHITE], GradientDirection::Horizontal);

        assert_eq!(px_at(&buf, w, 0, 0)[0], 0);
        let mid = px_at(&buf, w, w / 2, 2)[0];
        assert!((i32::from(mid) - 127).abs() <= 1, "mid channel {mid}");
        let last = px_at(&buf, w, w - 1, 3)[0];
        assert!(i32::from(last) >= 254, "last channel {last}");
    }

    #[test]
    fn vertical_gradient_interpolates_rows() {
        let h = 100u32;
        let buf = gradient_fill(4, h, [Rgb8::BLACK, Rgb8::WHITE], GradientDirection::Vertical);
        assert_eq!(px_at(&buf, 4, 1, 0)[1], 0);
        let last = px_at(&buf, 4, 1, h - 1)[1];
        assert!(i32::from(last) >= 252);
    }

    #[test]
    fn diagonal_gradient_covers_every_pixel() {
        let (w, h) = (9u32, 5u32);
        // Fill from a sentinel color so uncovered pixels would stand out.
        let buf = gradient_fill(w, h, [Rgb8::new(10, 0, 0), Rgb8::new(210, 0, 0)], GradientDirection::Diagonal);

        for y in 0..h {
            for x in 0..w {
                let px = px_at(&buf, w, x, y);
                let i = x + y;
                let t = f64::from(i) / f64::from(w + h);
                let expected = Rgb8::new(10, 0, 0).lerp(Rgb8::new(210, 0, 0), t).r;
                assert_eq!(px[0], expected, "pixel ({x},{y})");
            }
        }
    }

    fn encode_png(img: image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn frame_background_crops_and_fills_output() {
        // 2x1 frame: red | blue; select the right half.
        let img = image::RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        let png = encode_png(img);

        let sel = SelectionRect {
            left: 0.5,
            top: 0.0,
            width: 0.5,
            height: 1.0,
        };
        let buf = frame_background(&png, sel, 8, 6, 0.0).unwrap();
        assert_eq!(buf.len(), 8 * 6 * 4);
        let center = px_at(&buf, 8, 4, 3);
        assert_eq!(center, [0, 0, 255, 255]);
    }

    #[test]
    fn out_of_range_selection_is_clamped() {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([9, 9, 9, 255]));
        let png = encode_png(img);

        let sel = SelectionRect {
            left: -2.0,
            top: 0.5,
            width: 10.0,
            height: 10.0,
        };
        let buf = frame_background(&png, sel, 5, 5, 0.0).unwrap();
        assert_eq!(px_at(&buf, 5, 2, 2), [9, 9, 9, 255]);
    }

    #[test]
    fn undecodable_frame_is_an_error() {
        assert!(frame_background(b"not an image", SelectionRect::default(), 4, 4, 0.0).is_err());
    }
}
