use crate::foundation::error::{PosterError, PosterResult};

/// Separable Gaussian blur over premultiplied RGBA8, in place.
///
/// The kernel radius is derived from sigma (`ceil(2*sigma)`), which keeps the
/// visible falloff while bounding cost for large blur values. `sigma <= 0`
/// is a no-op.
pub(crate) fn gaussian_blur_premul(
    buf: &mut [u8],
    width: u32,
    height: u32,
    sigma: f32,
) -> PosterResult<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| PosterError::render("blur buffer size overflow"))?;
    if buf.len() != expected {
        return Err(PosterError::render(
            "gaussian_blur_premul expects buf matching width*height*4",
        ));
    }
    if !sigma.is_finite() {
        return Err(PosterError::validation("blur sigma must be finite"));
    }
    if sigma <= 0.0 {
        return Ok(());
    }

    let radius = (2.0 * sigma).ceil().min(256.0) as u32;
    let kernel = gaussian_kernel_q16(radius, sigma)?;

    let mut scratch = vec![0u8; expected];
    convolve_axis(buf, &mut scratch, width, height, &kernel, Axis::Horizontal);
    convolve_axis(&scratch, buf, width, height, &kernel, Axis::Vertical);
    Ok(())
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// One 1-D convolution pass along `axis`, clamping taps at the edges.
/// Weights are q16 fixed point and sum to exactly 1<<16.
fn convolve_axis(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;

    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let offset = ki as i32 - radius;
                let (sx, sy) = match axis {
                    Axis::Horizontal => ((x + offset).clamp(0, w - 1), y),
                    Axis::Vertical => (x, (y + offset).clamp(0, h - 1)),
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> PosterResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;

    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(PosterError::render("gaussian kernel sum is zero"));
    }

    // Quantize to q16 and push any rounding drift into the center tap so the
    // weights sum to exactly one.
    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn q16_to_u8(acc: u64) -> u8 {
    (((acc + 32768) >> 16).min(255)) as u8
}
