//! Sliding-window face detection.
//!
//! Classical cascade-style detection split into the driver (this module)
//! and the per-window classifier (a frozen external model behind the
//! `WindowClassifier` seam):
//!
//! 1. Build an image pyramid, each level smaller by `scale_factor`.
//! 2. Slide a fixed-size window over every level and score each window.
//! 3. Map hits back to frame coordinates.
//! 4. Group overlapping hits; clusters with fewer than `min_neighbors`
//!    raw hits are rejected as noise.
//!
//! The driver is pure logic and is tested with a scripted classifier; the
//! production classifier lives behind the `backend-tract` feature.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::detect::backend::FaceDetector;
use crate::detect::result::FaceRegion;

/// Two boxes closer than `eps` relative to their size count as neighbors.
const GROUP_EPS: f32 = 0.2;

/// Window scan step, as a fraction of the window size.
const STRIDE_DIVISOR: u32 = 4;

/// Cascade tuning. Defaults match the detector this replaces:
/// pyramid step 1.1, 4 neighbors required.
#[derive(Clone, Copy, Debug)]
pub struct CascadeParams {
    /// Pyramid step between scan scales. Must be > 1.0.
    pub scale_factor: f32,
    /// Minimum raw hits per cluster for a face to be reported.
    /// 0 disables grouping and reports raw hits.
    pub min_neighbors: u32,
    /// Per-window score above which a window counts as a raw hit.
    pub score_threshold: f32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
            score_threshold: 0.5,
        }
    }
}

/// Per-window classifier seam. The model is loaded once and never updated.
pub trait WindowClassifier: Send {
    /// Classifier identifier.
    fn name(&self) -> &'static str;

    /// Side length of the square greyscale window the model expects.
    fn window_size(&self) -> u32;

    /// Score one window (`window_size * window_size` greyscale bytes) in [0, 1].
    fn score(&mut self, window: &[u8]) -> Result<f32>;
}

/// Pyramid-scan face detector driving a `WindowClassifier`.
pub struct CascadeDetector {
    classifier: Box<dyn WindowClassifier>,
    params: CascadeParams,
}

impl CascadeDetector {
    pub fn new(classifier: Box<dyn WindowClassifier>, params: CascadeParams) -> Result<Self> {
        if params.scale_factor <= 1.0 {
            return Err(anyhow!(
                "scale_factor must be > 1.0, got {}",
                params.scale_factor
            ));
        }
        if !(0.0..=1.0).contains(&params.score_threshold) {
            return Err(anyhow!(
                "score_threshold must be in [0, 1], got {}",
                params.score_threshold
            ));
        }
        Ok(Self { classifier, params })
    }

    fn scan_level(
        &mut self,
        level: &GrayImage,
        scale: f32,
        hits: &mut Vec<FaceRegion>,
    ) -> Result<()> {
        let win = self.classifier.window_size();
        let (lw, lh) = level.dimensions();
        if lw < win || lh < win {
            return Ok(());
        }

        let stride = (win / STRIDE_DIVISOR).max(1);
        let pixels = level.as_raw();
        let mut window = vec![0u8; (win * win) as usize];

        let mut y = 0;
        while y + win <= lh {
            let mut x = 0;
            while x + win <= lw {
                for row in 0..win {
                    let src = ((y + row) * lw + x) as usize;
                    let dst = (row * win) as usize;
                    window[dst..dst + win as usize]
                        .copy_from_slice(&pixels[src..src + win as usize]);
                }
                if self.classifier.score(&window)? >= self.params.score_threshold {
                    hits.push(FaceRegion {
                        x: (x as f32 * scale) as u32,
                        y: (y as f32 * scale) as u32,
                        w: (win as f32 * scale) as u32,
                        h: (win as f32 * scale) as u32,
                    });
                }
                x += stride;
            }
            y += stride;
        }
        Ok(())
    }
}

impl FaceDetector for CascadeDetector {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn detect(&mut self, gray: &[u8], width: u32, height: u32) -> Result<Vec<FaceRegion>> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if gray.len() != expected {
            return Err(anyhow!(
                "expected {} greyscale bytes, received {}",
                expected,
                gray.len()
            ));
        }

        let base = GrayImage::from_raw(width, height, gray.to_vec())
            .ok_or_else(|| anyhow!("greyscale buffer does not match dimensions"))?;

        let mut hits = Vec::new();
        for scale in pyramid_scales(
            width,
            height,
            self.classifier.window_size(),
            self.params.scale_factor,
        ) {
            if (scale - 1.0).abs() < f32::EPSILON {
                self.scan_level(&base, scale, &mut hits)?;
            } else {
                let lw = ((width as f32 / scale).round() as u32).max(1);
                let lh = ((height as f32 / scale).round() as u32).max(1);
                let level = imageops::resize(&base, lw, lh, FilterType::Triangle);
                self.scan_level(&level, scale, &mut hits)?;
            }
        }

        Ok(group_regions(&hits, self.params.min_neighbors))
    }

    fn warm_up(&mut self) -> Result<()> {
        let win = self.classifier.window_size();
        let blank = vec![0u8; (win * win) as usize];
        self.classifier.score(&blank).map(|_| ())
    }
}

/// Scan scales for a pyramid: 1.0, then multiplied by `scale_factor` while
/// the scaled window still fits inside the frame.
pub fn pyramid_scales(width: u32, height: u32, window: u32, scale_factor: f32) -> Vec<f32> {
    let mut scales = Vec::new();
    let limit = width.min(height) as f32;
    let mut scale = 1.0f32;
    while window as f32 * scale <= limit {
        scales.push(scale);
        scale *= scale_factor;
    }
    scales
}

/// Cluster raw hits and keep clusters with at least `min_neighbors`
/// members, each reported as the average box of its cluster.
/// `min_neighbors == 0` returns the raw hits unchanged.
pub fn group_regions(raw: &[FaceRegion], min_neighbors: u32) -> Vec<FaceRegion> {
    if min_neighbors == 0 {
        return raw.to_vec();
    }
    if raw.is_empty() {
        return Vec::new();
    }

    // Union-find over pairwise-similar boxes.
    let mut parent: Vec<usize> = (0..raw.len()).collect();
    fn find(parent: &mut [usize], i: usize) -> usize {
        let up = parent[i];
        if up == i {
            return i;
        }
        let root = find(parent, up);
        parent[i] = root;
        root
    }
    for i in 0..raw.len() {
        for j in (i + 1)..raw.len() {
            if similar(&raw[i], &raw[j]) {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut clusters: std::collections::HashMap<usize, (u64, u64, u64, u64, u32)> =
        std::collections::HashMap::new();
    for (i, region) in raw.iter().enumerate() {
        let root = find(&mut parent, i);
        let entry = clusters.entry(root).or_insert((0, 0, 0, 0, 0));
        entry.0 += region.x as u64;
        entry.1 += region.y as u64;
        entry.2 += region.w as u64;
        entry.3 += region.h as u64;
        entry.4 += 1;
    }

    let mut grouped: Vec<FaceRegion> = clusters
        .into_values()
        .filter(|&(_, _, _, _, count)| count >= min_neighbors)
        .map(|(x, y, w, h, count)| FaceRegion {
            x: (x / count as u64) as u32,
            y: (y / count as u64) as u32,
            w: (w / count as u64) as u32,
            h: (h / count as u64) as u32,
        })
        .collect();
    // HashMap iteration order is arbitrary; keep output stable.
    grouped.sort_by_key(|r| (r.y, r.x));
    grouped
}

fn similar(a: &FaceRegion, b: &FaceRegion) -> bool {
    let delta = GROUP_EPS * 0.5 * (a.w.min(b.w) + a.h.min(b.h)) as f32;
    let close = |p: u32, q: u32| (p as f32 - q as f32).abs() <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.w, b.x + b.w)
        && close(a.y + a.h, b.y + b.h)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores 1.0 for windows whose mean brightness clears a bar.
    struct BrightWindowClassifier {
        window: u32,
    }

    impl WindowClassifier for BrightWindowClassifier {
        fn name(&self) -> &'static str {
            "bright"
        }

        fn window_size(&self) -> u32 {
            self.window
        }

        fn score(&mut self, window: &[u8]) -> Result<f32> {
            let sum: u64 = window.iter().map(|&p| p as u64).sum();
            let mean = sum / window.len() as u64;
            Ok(if mean > 200 { 1.0 } else { 0.0 })
        }
    }

    fn region(x: u32, y: u32, w: u32, h: u32) -> FaceRegion {
        FaceRegion { x, y, w, h }
    }

    #[test]
    fn pyramid_scales_step_by_factor() {
        let scales = pyramid_scales(110, 110, 100, 1.1);
        assert_eq!(scales, vec![1.0]);

        let scales = pyramid_scales(640, 480, 96, 1.1);
        assert!(scales.len() > 3);
        assert_eq!(scales[0], 1.0);
        assert!((scales[1] - 1.1).abs() < 1e-6);
        // Every scale keeps the scan window inside the frame.
        for s in &scales {
            assert!(96.0 * s <= 480.0);
        }
    }

    #[test]
    fn grouping_rejects_small_clusters() {
        // Four overlapping hits plus one stray.
        let raw = vec![
            region(100, 100, 40, 40),
            region(102, 101, 40, 40),
            region(99, 103, 41, 39),
            region(101, 99, 40, 41),
            region(300, 300, 40, 40),
        ];
        let grouped = group_regions(&raw, 4);
        assert_eq!(grouped.len(), 1);
        let face = grouped[0];
        assert!(face.x >= 99 && face.x <= 102);
        assert!(face.y >= 99 && face.y <= 103);
    }

    #[test]
    fn grouping_disabled_returns_raw_hits() {
        let raw = vec![region(0, 0, 10, 10), region(50, 50, 10, 10)];
        assert_eq!(group_regions(&raw, 0), raw);
    }

    #[test]
    fn grouping_keeps_two_distinct_clusters() {
        let mut raw = Vec::new();
        for d in 0..4u32 {
            raw.push(region(100 + d, 100, 40, 40));
            raw.push(region(300 + d, 300, 40, 40));
        }
        let grouped = group_regions(&raw, 4);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn detector_finds_bright_patch() {
        // Dark frame with one bright 32x32 patch.
        let (w, h) = (96u32, 96u32);
        let mut gray = vec![10u8; (w * h) as usize];
        for y in 32..64 {
            for x in 32..64 {
                gray[(y * w + x) as usize] = 255;
            }
        }
        let mut detector = CascadeDetector::new(
            Box::new(BrightWindowClassifier { window: 32 }),
            CascadeParams {
                min_neighbors: 1,
                ..CascadeParams::default()
            },
        )
        .unwrap();

        let faces = detector.detect(&gray, w, h).unwrap();
        assert!(!faces.is_empty());
        let face = faces[0];
        assert!(face.x >= 24 && face.x <= 40, "x = {}", face.x);
        assert!(face.y >= 24 && face.y <= 40, "y = {}", face.y);
    }

    #[test]
    fn detector_reports_nothing_on_dark_frame() {
        let mut detector = CascadeDetector::new(
            Box::new(BrightWindowClassifier { window: 32 }),
            CascadeParams::default(),
        )
        .unwrap();
        let gray = vec![10u8; 96 * 96];
        assert!(detector.detect(&gray, 96, 96).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_params() {
        let make = |scale_factor, score_threshold| {
            CascadeDetector::new(
                Box::new(BrightWindowClassifier { window: 32 }),
                CascadeParams {
                    scale_factor,
                    min_neighbors: 4,
                    score_threshold,
                },
            )
        };
        assert!(make(1.0, 0.5).is_err());
        assert!(make(1.1, 1.5).is_err());
        assert!(make(1.1, 0.5).is_ok());
    }

    #[test]
    fn rejects_mismatched_gray_buffer() {
        let mut detector = CascadeDetector::new(
            Box::new(BrightWindowClassifier { window: 32 }),
            CascadeParams::default(),
        )
        .unwrap();
        assert!(detector.detect(&[0u8; 10], 96, 96).is_err());
    }
}
