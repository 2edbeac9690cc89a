use std::sync::Arc;

use kurbo::{Point, Vec2};

use crate::foundation::error::{PosterError, PosterResult};

/// Composite premultiplied `src` over premultiplied `dst`, in place.
pub(crate) fn over_premul_in_place(dst: &mut [u8], src: &[u8]) -> PosterResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(PosterError::render(
            "over_premul_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = s[3];
        if sa == 0 {
            continue;
        }
        if sa == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = u16::from(255 - sa);
        for c in 0..4 {
            d[c] = s[c].saturating_add(mul_div255(u16::from(d[c]), inv));
        }
    }
    Ok(())
}

/// Flatten premultiplied RGBA8 onto an opaque black backdrop.
///
/// Over black the color channels of a premultiplied pixel are already the
/// flattened result, so this only forces alpha fully opaque.
pub(crate) fn flatten_premul_over_black(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(4) {
        px[3] = 255;
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Filled quad covering a stroked segment of the given width.
///
/// Returns `None` for degenerate (zero-length) segments.
pub(crate) fn stroke_quad(p1: Point, p2: Point, width: f64) -> Option<kurbo::BezPath> {
    let d = p2 - p1;
    let len = d.hypot();
    if !len.is_finite() || len <= f64::EPSILON {
        return None;
    }
    let n = Vec2::new(-d.y / len, d.x / len) * (width / 2.0);

    let mut path = kurbo::BezPath::new();
    path.move_to(p1 + n);
    path.line_to(p2 + n);
    path.line_to(p2 - n);
    path.line_to(p1 - n);
    path.close_path();
    Some(path)
}

pub(crate) fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> PosterResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| PosterError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| PosterError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(PosterError::render("pixmap byte len mismatch"));
    }

    // Pixmap stores PremulRgba8; our bytes are already premultiplied.
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

pub(crate) fn image_paint_from_premul(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> PosterResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(bytes, width, height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        if a == 255 {
            continue;
        }
        px[0] = ((u16::from(px[0]) * a + 127) / 255) as u8;
        px[1] = ((u16::from(px[1]) * a + 127) / 255) as u8;
        px[2] = ((u16::from(px[2]) * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_transparent_src_is_noop() {
        let mut dst = vec![10u8, 20, 30, 255];
        over_premul_in_place(&mut dst, &[0, 0, 0, 0]).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn over_opaque_src_replaces_dst() {
        let mut dst = vec![10u8, 20, 30, 255];
        over_premul_in_place(&mut dst, &[200, 100, 50, 255]).unwrap();
        assert_eq!(dst, vec![200, 100, 50, 255]);
    }

    #[test]
    fn over_half_alpha_blends() {
        // Premultiplied white @ 50% over opaque black: 128 + 0*(1-0.5).
        let mut dst = vec![0u8, 0, 0, 255];
        over_premul_in_place(&mut dst, &[128, 128, 128, 128]).unwrap();
        assert_eq!(dst[0], 128);
        assert_eq!(dst[3], 255);
    }

    #[test]
    fn flatten_forces_opacity() {
        let mut buf = vec![5u8, 6, 7, 0, 1, 2, 3, 99];
        flatten_premul_over_black(&mut buf);
        assert_eq!(buf[3], 255);
        assert_eq!(buf[7], 255);
        assert_eq!(&buf[0..3], &[5, 6, 7]);
    }

    #[test]
    fn stroke_quad_spans_the_width() {
        let quad = stroke_quad(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 4.0).unwrap();
        let bbox = kurbo::Shape::bounding_box(&quad);
        assert!((bbox.height() - 4.0).abs() < 1e-9);
        assert!((bbox.width() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn stroke_quad_rejects_degenerate_segment() {
        assert!(stroke_quad(Point::new(1.0, 1.0), Point::new(1.0, 1.0), 4.0).is_none());
    }

    #[test]
    fn premultiply_scales_color_by_alpha() {
        let mut px = vec![100u8, 50, 200, 128];
        premultiply_rgba8_in_place(&mut px);
        assert_eq!(px[0], ((100u16 * 128 + 127) / 255) as u8);
        assert_eq!(px[3], 128);
    }
}
