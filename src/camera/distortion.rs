use rayon::prelude::*;

use crate::annotation::frame::{Channel, ChannelBuffer};
use crate::camera::intrinsics::CameraIntrinsics;
use crate::foundation::core::Resolution;
use crate::foundation::error::{BatError, BatResult};

/// Project an undistorted pixel position through the Brown–Conrady lens model.
pub fn distort(x: f64, y: f64, cam: &CameraIntrinsics) -> (f64, f64) {
    let xn = (x - cam.cx) / cam.fx;
    let yn = (y - cam.cy) / cam.fy;

    let x2 = xn * xn;
    let y2 = yn * yn;
    let xy2 = 2.0 * xn * yn;
    let r2 = x2 + y2;
    let radial = 1.0 + (((cam.k4 * r2 + cam.k3) * r2 + cam.k2) * r2 + cam.k1) * r2;
    let tx = cam.p1 * (r2 + 2.0 * x2) + cam.p2 * xy2;
    let ty = cam.p2 * (r2 + 2.0 * y2) + cam.p1 * xy2;

    (
        cam.fx * (xn * radial + tx) + cam.cx,
        cam.fy * (yn * radial + ty) + cam.cy,
    )
}

/// Lookup table from distorted pixel to the undistorted pixel that lands there.
///
/// Layout: row-major, three floats per pixel: `(source_y, source_x, valid)`. `valid` is `1.0`
/// where the source was hit directly by forward projection and `0.0` where it was interpolated.
#[derive(Clone, Debug, PartialEq)]
pub struct InverseDistortionMap {
    /// Map resolution (equals the render resolution).
    pub resolution: Resolution,
    /// Interleaved `(source_y, source_x, valid)` triples.
    pub data: Vec<f32>,
}

impl InverseDistortionMap {
    /// Build the map for a `resolution` render seen through `cam`.
    #[tracing::instrument(skip(cam))]
    pub fn generate(resolution: Resolution, cam: &CameraIntrinsics) -> BatResult<Self> {
        for (name, v) in [("fx", cam.fx), ("fy", cam.fy)] {
            if let Err(msg) = CameraIntrinsics::check_field(name, v) {
                return Err(BatError::validation(format!("camera.{name}"), msg));
            }
        }
        let w = resolution.width as usize;
        let h = resolution.height as usize;
        let n = w * h;

        let projected: Vec<(f64, f64)> = (0..n)
            .into_par_iter()
            .map(|i| distort((i % w) as f64, (i / w) as f64, cam))
            .collect();

        // Forward projection folds over itself near strong distortion; only keep samples where the
        // distorted coordinate still grows along the row (x) and down the column (y).
        let mut src_y = vec![0.0f64; n];
        let mut src_x = vec![0.0f64; n];
        let mut hit = vec![false; n];
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                let (dx, dy) = projected[i];
                let mono_x = if w < 2 {
                    true
                } else {
                    let xa = x.min(w - 2);
                    projected[y * w + xa + 1].0 > projected[y * w + xa].0
                };
                let mono_y = if h < 2 {
                    true
                } else {
                    let ya = y.min(h - 2);
                    projected[(ya + 1) * w + x].1 > projected[ya * w + x].1
                };
                if !(mono_x && mono_y) {
                    continue;
                }
                // Bounds apply to the projected position itself, before it is snapped to a pixel.
                if !(dx >= 0.0 && dy >= 0.0 && dx < w as f64 && dy < h as f64) {
                    continue;
                }
                let tx = (dx.round() as usize).min(w - 1);
                let ty = (dy.round() as usize).min(h - 1);
                let t = ty * w + tx;
                src_y[t] = y as f64;
                src_x[t] = x as f64;
                hit[t] = true;
            }
        }

        let (src_y, src_x) = rayon::join(
            || fill_missing(&src_y, &hit, h, w),
            || fill_missing(&src_x, &hit, h, w),
        );

        let mut data = Vec::with_capacity(n * 3);
        for i in 0..n {
            data.push(src_y[i] as f32);
            data.push(src_x[i] as f32);
            data.push(if hit[i] { 1.0 } else { 0.0 });
        }
        Ok(Self { resolution, data })
    }

    /// `(source_y, source_x, valid)` at a distorted pixel.
    pub fn get(&self, x: u32, y: u32) -> Option<(f32, f32, bool)> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        let i = (y as usize * self.resolution.width as usize + x as usize) * 3;
        Some((self.data[i], self.data[i + 1], self.data[i + 2] > 0.5))
    }

    /// Share of pixels hit directly by forward projection.
    pub fn coverage(&self) -> f64 {
        let n = self.resolution.pixel_count();
        if n == 0 {
            return 0.0;
        }
        let hits = self.data.chunks_exact(3).filter(|p| p[2] > 0.5).count();
        hits as f64 / n as f64
    }

    /// Convert into a `distortion_map` channel buffer.
    pub fn into_channel(self) -> BatResult<ChannelBuffer> {
        ChannelBuffer::f32(Channel::DistortionMap, self.resolution, self.data)
    }
}

/// Fill holes in a `rows x cols` grid from the `valid` samples.
///
/// Four meander passes (rows forward/backward, columns forward/backward) each interpolate
/// linearly along a snake-ordered walk; the passes are blended with weights `1 / (d + 1)`, where
/// `d` is the walk distance to the nearest valid sample. Valid samples are kept as-is.
fn fill_missing(values: &[f64], valid: &[bool], rows: usize, cols: usize) -> Vec<f64> {
    let values_t = transpose(values, rows, cols);
    let valid_t = transpose(valid, rows, cols);

    let ((r0, r1), (c0, c1)) = rayon::join(
        || {
            (
                meander_pass(values, valid, rows, cols, 0),
                meander_pass(values, valid, rows, cols, 1),
            )
        },
        || {
            let (i0, w0) = meander_pass(&values_t, &valid_t, cols, rows, 0);
            let (i1, w1) = meander_pass(&values_t, &valid_t, cols, rows, 1);
            (
                (transpose(&i0, cols, rows), transpose(&w0, cols, rows)),
                (transpose(&i1, cols, rows), transpose(&w1, cols, rows)),
            )
        },
    );

    let passes = [r0, r1, c0, c1];
    (0..rows * cols)
        .map(|i| {
            if valid[i] {
                return values[i];
            }
            let mut num = 0.0;
            let mut den = 0.0;
            for (inter, weights) in &passes {
                if inter[i].is_finite() {
                    num += inter[i] * weights[i];
                    den += weights[i];
                }
            }
            if den > 0.0 { num / den } else { 0.0 }
        })
        .collect()
}

/// One snake-ordered interpolation pass. Rows `flip, flip + 2, ...` are walked right-to-left.
///
/// Returns per-cell interpolated values (`NaN` before the first and after the last valid sample)
/// and per-cell weights.
fn meander_pass(
    values: &[f64],
    valid: &[bool],
    rows: usize,
    cols: usize,
    flip: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n = rows * cols;
    let cell = |k: usize| {
        let r = k / cols;
        let c = k % cols;
        let reversed = r >= flip && (r - flip) % 2 == 0;
        r * cols + if reversed { cols - 1 - c } else { c }
    };

    let samples: Vec<usize> = (0..n).filter(|&k| valid[cell(k)]).collect();
    let mut inter = vec![f64::NAN; n];
    let mut weights = vec![0.0; n];
    let (Some(&first), Some(&last)) = (samples.first(), samples.last()) else {
        return (inter, weights);
    };

    // `j` = number of samples at or before walk position k.
    let mut j = 0usize;
    for k in 0..n {
        while j < samples.len() && samples[j] <= k {
            j += 1;
        }
        let prev = if j > 0 { samples[j - 1] } else { first };
        let next = if j < samples.len() {
            samples[j]
        } else {
            last
        };
        // Samples at exactly `k` count as the next sample too.
        let next = if j > 0 && samples[j - 1] == k { k } else { next };

        let dist = k.abs_diff(prev).min(k.abs_diff(next));
        let idx = cell(k);
        weights[idx] = 1.0 / (dist as f64 + 1.0);

        if k < first || k > last {
            continue;
        }
        let vp = values[cell(prev)];
        inter[idx] = if prev == next || prev == k {
            vp
        } else {
            let vn = values[cell(next)];
            let t = (k - prev) as f64 / (next - prev) as f64;
            vp + (vn - vp) * t
        };
    }
    (inter, weights)
}

fn transpose<T: Copy>(src: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(src.len());
    for c in 0..cols {
        for r in 0..rows {
            out.push(src[r * cols + c]);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/camera/distortion.rs"]
mod tests;
