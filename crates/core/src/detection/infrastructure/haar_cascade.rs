/// Viola-Jones Haar cascade classifier.
///
/// Cascades load from OpenCV storage XML (see [`super::opencv_cascade_xml`])
/// or from the same model serialized as JSON. A model is a base detection
/// window, a shared feature table, and boosted stages of weak classifiers,
/// each a small decision tree over feature values.
///
/// Evaluation follows `cv::CascadeClassifier`: the image is shrunk through a
/// pyramid, the base window slides over every level, feature sums come from
/// summed-area tables (rotated ones for tilted features) and are normalized
/// by the window's standard deviation. Overlapping hits are then grouped into
/// one region per object.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::detection_algorithm::DetectionError;
use crate::detection::domain::object_classifier::ObjectClassifier;
use crate::shared::constants::{CASCADE_MIN_NEIGHBORS, CASCADE_SCALE_FACTOR};
use crate::shared::region::{Region, DEFAULT_GROUP_EPS};

use super::integral_image::IntegralImage;
use super::opencv_cascade_xml::{self, CascadeXmlError};

#[derive(Error, Debug)]
pub enum CascadeLoadError {
    #[error("failed to read cascade {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: CascadeXmlError,
    },
    #[error("malformed cascade {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid cascade: {0}")]
    Invalid(String),
}

impl From<CascadeLoadError> for DetectionError {
    fn from(e: CascadeLoadError) -> Self {
        DetectionError::Model(Box::new(e))
    }
}

/// A rectangle of a Haar feature, relative to the base window.
///
/// For tilted features `(x, y)` is the top corner of a 45° rotated rectangle,
/// `width` runs down-right and `height` down-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
    #[serde(default)]
    pub tilted: bool,
}

/// Split on feature `feature`: go `left` if its normalized value is below
/// `threshold`, `right` otherwise. A child `> 0` is another node index,
/// a child `<= 0` selects leaf `-child`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: usize,
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

impl WeakClassifier {
    /// Single split: `below` under `threshold`, `above` otherwise.
    pub fn stump(feature: usize, threshold: f64, below: f64, above: f64) -> Self {
        Self {
            nodes: vec![TreeNode {
                feature,
                threshold,
                left: 0,
                right: -1,
            }],
            leaves: vec![below, above],
        }
    }

    /// Walks the tree from node 0 and returns the reached leaf value.
    pub fn evaluate(&self, feature_value: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            let next = if feature_value(node.feature) < node.threshold {
                node.left
            } else {
                node.right
            };
            if next > 0 {
                idx = next as usize;
            } else {
                return self.leaves[next.unsigned_abs() as usize];
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeStage {
    /// A window is rejected when the classifier sum falls below this.
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeModel {
    /// Base window `[width, height]`.
    pub window: [u32; 2],
    pub features: Vec<HaarFeature>,
    pub stages: Vec<CascadeStage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeParams {
    /// Pyramid step between scan levels; must be > 1.
    pub scale_factor: f64,
    /// Hits a group needs beyond the first to be reported; 0 reports raw hits.
    pub min_neighbors: usize,
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: CASCADE_SCALE_FACTOR,
            min_neighbors: CASCADE_MIN_NEIGHBORS,
            min_size: None,
            max_size: None,
        }
    }
}

pub struct HaarCascade {
    model: CascadeModel,
    params: CascadeParams,
    norm: NormRect,
    tilted: bool,
}

impl HaarCascade {
    /// Reads a cascade file. Content starting with `<` is taken as OpenCV XML,
    /// anything else as the JSON form of [`CascadeModel`].
    pub fn load(path: &Path, params: CascadeParams) -> Result<Self, CascadeLoadError> {
        let content = fs::read_to_string(path).map_err(|e| CascadeLoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model = if content.trim_start().starts_with('<') {
            opencv_cascade_xml::parse(&content).map_err(|e| CascadeLoadError::Xml {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| CascadeLoadError::Json {
                path: path.to_path_buf(),
                source: e,
            })?
        };
        let cascade = Self::from_model(model, params)?;
        log::info!(
            "Loaded cascade {} ({} stages, {} features, {}x{} window)",
            path.display(),
            cascade.model.stages.len(),
            cascade.model.features.len(),
            cascade.model.window[0],
            cascade.model.window[1]
        );
        Ok(cascade)
    }

    pub fn from_model(model: CascadeModel, params: CascadeParams) -> Result<Self, CascadeLoadError> {
        validate_model(&model)?;
        if !params.scale_factor.is_finite() || params.scale_factor <= 1.0 {
            return Err(CascadeLoadError::Invalid(format!(
                "scale factor must be > 1, got {}",
                params.scale_factor
            )));
        }
        let [bw, bh] = model.window;
        let tilted = model.features.iter().any(|f| f.tilted);
        Ok(Self {
            model,
            params,
            norm: NormRect::for_window(bw, bh),
            tilted,
        })
    }

    pub fn model(&self) -> &CascadeModel {
        &self.model
    }

    pub fn params(&self) -> &CascadeParams {
        &self.params
    }

    /// Every window position and size that passes all stages, ungrouped,
    /// in scan order (smallest windows first, then row-major).
    pub fn raw_hits(&self, image: &GrayImage) -> Vec<Region> {
        let (iw, ih) = image.dimensions();
        let [bw, bh] = self.model.window;
        let mut hits = Vec::new();
        let mut factor = 1.0f64;

        loop {
            let win_w = (bw as f64 * factor).round() as u32;
            let win_h = (bh as f64 * factor).round() as u32;
            let level_w = (iw as f64 / factor).round() as u32;
            let level_h = (ih as f64 / factor).round() as u32;
            if level_w < bw || level_h < bh {
                break;
            }
            if let Some(max) = self.params.max_size {
                if win_w > max || win_h > max {
                    break;
                }
            }

            let big_enough = self
                .params
                .min_size
                .map_or(true, |min| win_w >= min && win_h >= min);
            if big_enough {
                let resized = (factor > 1.0)
                    .then(|| imageops::resize(image, level_w, level_h, FilterType::Triangle));
                let level = resized.as_ref().unwrap_or(image);
                let integral = if self.tilted {
                    IntegralImage::with_tilted(level)
                } else {
                    IntegralImage::new(level)
                };

                for y in 0..=level_h - bh {
                    for x in 0..=level_w - bw {
                        if self.passes(&integral, x, y) {
                            hits.push(Region::new(
                                (x as f64 * factor).round() as i32,
                                (y as f64 * factor).round() as i32,
                                win_w as i32,
                                win_h as i32,
                            ));
                        }
                    }
                }
            }

            factor *= self.params.scale_factor;
        }

        hits
    }

    /// Runs every stage on the base window at `(x, y)` of one pyramid level.
    fn passes(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        let norm = &self.norm;
        let area = (norm.width * norm.height) as f64;
        let sum = integral.rect_sum(x + norm.x, y + norm.y, norm.width, norm.height) as f64;
        let sq_sum = integral.rect_sq_sum(x + norm.x, y + norm.y, norm.width, norm.height) as f64;
        // area^2 * variance; flat windows carry no signal
        let nf = area * sq_sum - sum * sum;
        if nf <= 0.0 {
            return false;
        }
        let inv_norm = 1.0 / nf.sqrt();

        let feature_value = |idx: usize| {
            let feature = &self.model.features[idx];
            let raw: f64 = feature
                .rects
                .iter()
                .map(|r| {
                    let (rx, ry) = (x + r.x, y + r.y);
                    let s = if feature.tilted {
                        integral.tilted_sum(rx, ry, r.width, r.height) as f64
                    } else {
                        integral.rect_sum(rx, ry, r.width, r.height) as f64
                    };
                    r.weight * s
                })
                .sum();
            raw * inv_norm
        };

        self.model.stages.iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|weak| weak.evaluate(&feature_value))
                .sum();
            score >= stage.threshold
        })
    }
}

impl ObjectClassifier for HaarCascade {
    fn detect_multi_scale(&self, image: &GrayImage) -> Vec<Region> {
        let hits = self.raw_hits(image);
        group_rectangles(&hits, self.params.min_neighbors, DEFAULT_GROUP_EPS)
    }
}

/// Variance window inside the base window: one pixel in from each edge when
/// the window is big enough.
struct NormRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl NormRect {
    fn for_window(width: u32, height: u32) -> Self {
        if width > 2 && height > 2 {
            Self {
                x: 1,
                y: 1,
                width: width - 2,
                height: height - 2,
            }
        } else {
            Self {
                x: 0,
                y: 0,
                width,
                height,
            }
        }
    }
}

fn validate_model(model: &CascadeModel) -> Result<(), CascadeLoadError> {
    let [bw, bh] = model.window;
    if bw == 0 || bh == 0 {
        return Err(CascadeLoadError::Invalid(format!(
            "window must be non-empty, got {bw}x{bh}"
        )));
    }
    if model.stages.is_empty() {
        return Err(CascadeLoadError::Invalid("cascade has no stages".into()));
    }

    for (fi, feature) in model.features.iter().enumerate() {
        if feature.rects.is_empty() {
            return Err(CascadeLoadError::Invalid(format!(
                "feature {fi} has no rectangles"
            )));
        }
        for r in &feature.rects {
            let inside = if feature.tilted {
                r.height <= r.x && r.x + r.width <= bw && r.y + r.width + r.height <= bh
            } else {
                r.x + r.width <= bw && r.y + r.height <= bh
            };
            if r.width == 0 || r.height == 0 || !inside {
                return Err(CascadeLoadError::Invalid(format!(
                    "feature {fi} rectangle {r:?} falls outside the {bw}x{bh} window"
                )));
            }
        }
    }

    for (si, stage) in model.stages.iter().enumerate() {
        if stage.classifiers.is_empty() {
            return Err(CascadeLoadError::Invalid(format!(
                "stage {si} has no classifiers"
            )));
        }
        for weak in &stage.classifiers {
            validate_tree(weak, model.features.len())
                .map_err(|why| CascadeLoadError::Invalid(format!("stage {si}: {why}")))?;
        }
    }
    Ok(())
}

/// Children must point forward, so every walk ends on a leaf.
fn validate_tree(weak: &WeakClassifier, feature_count: usize) -> Result<(), String> {
    if weak.nodes.is_empty() {
        return Err("weak classifier has no nodes".into());
    }
    for (ni, node) in weak.nodes.iter().enumerate() {
        if node.feature >= feature_count {
            return Err(format!(
                "node {ni} uses feature {} of {feature_count}",
                node.feature
            ));
        }
        for child in [node.left, node.right] {
            let ok = if child > 0 {
                (child as usize) > ni && (child as usize) < weak.nodes.len()
            } else {
                (child.unsigned_abs() as usize) < weak.leaves.len()
            };
            if !ok {
                return Err(format!("node {ni} has dangling child {child}"));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Clusters similar hits and averages each cluster.
///
/// A cluster is kept when it has more than `min_neighbors` members. Clusters
/// come out in order of their first member. A kept region nested inside a
/// clearly stronger one is dropped. `min_neighbors == 0` returns the hits
/// unchanged.
pub fn group_rectangles(hits: &[Region], min_neighbors: usize, eps: f64) -> Vec<Region> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits.to_vec();
    }

    let mut parent: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if hits[i].is_similar(&hits[j], eps) {
                union(&mut parent, i, j);
            }
        }
    }

    // root → index into `clusters`, in first-appearance order
    let mut cluster_of_root: HashMap<usize, usize> = HashMap::new();
    let mut clusters: Vec<([i64; 4], usize)> = Vec::new();
    for (i, hit) in hits.iter().enumerate() {
        let root = find(&mut parent, i);
        let idx = *cluster_of_root.entry(root).or_insert_with(|| {
            clusters.push(([0; 4], 0));
            clusters.len() - 1
        });
        let (sums, count) = &mut clusters[idx];
        sums[0] += hit.x as i64;
        sums[1] += hit.y as i64;
        sums[2] += hit.width as i64;
        sums[3] += hit.height as i64;
        *count += 1;
    }

    let averaged: Vec<(Region, usize)> = clusters
        .into_iter()
        .filter(|(_, count)| *count > min_neighbors)
        .map(|(sums, count)| {
            let avg = |v: i64| (v as f64 / count as f64).round() as i32;
            (
                Region::new(avg(sums[0]), avg(sums[1]), avg(sums[2]), avg(sums[3])),
                count,
            )
        })
        .collect();

    averaged
        .iter()
        .enumerate()
        .filter(|(i, (inner, inner_count))| {
            !averaged.iter().enumerate().any(|(j, (outer, outer_count))| {
                if *i == j || *outer_count <= (*inner_count).max(3) {
                    return false;
                }
                let dx = (outer.width as f64 * eps).round() as i32;
                let dy = (outer.height as f64 * eps).round() as i32;
                let inflated = Region::new(
                    outer.x - dx,
                    outer.y - dy,
                    outer.width + 2 * dx,
                    outer.height + 2 * dy,
                );
                inner != outer && inflated.contains(inner)
            })
        })
        .map(|(_, (region, _))| *region)
        .collect()
}

fn find(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }
    let mut node = i;
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // Keep the earlier index as root so cluster order follows scan order.
        let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[merge] = keep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BAR_CASCADE: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/bar_cascade.xml"
    ));

    /// One stump: bright top half over dark bottom half of an 8x8 window.
    fn bright_over_dark() -> CascadeModel {
        CascadeModel {
            window: [8, 8],
            features: vec![HaarFeature {
                rects: vec![
                    WeightedRect {
                        x: 0,
                        y: 0,
                        width: 8,
                        height: 4,
                        weight: 1.0,
                    },
                    WeightedRect {
                        x: 0,
                        y: 4,
                        width: 8,
                        height: 4,
                        weight: -1.0,
                    },
                ],
                tilted: false,
            }],
            stages: vec![CascadeStage {
                threshold: 0.0,
                classifiers: vec![WeakClassifier::stump(0, 0.6, -1.0, 1.0)],
            }],
        }
    }

    /// Black 48x48 frame with an 8x4 white bar at (20, 20).
    fn frame_with_bar() -> GrayImage {
        GrayImage::from_fn(48, 48, |x, y| {
            if (20..28).contains(&x) && (20..24).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn params(min_neighbors: usize) -> CascadeParams {
        CascadeParams {
            min_neighbors,
            ..CascadeParams::default()
        }
    }

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // ── Detection ────────────────────────────────────────────────────

    #[test]
    fn test_exact_window_over_pattern_is_a_hit() {
        let cascade = HaarCascade::from_model(bright_over_dark(), params(0)).unwrap();
        let hits = cascade.raw_hits(&frame_with_bar());
        assert!(hits.contains(&Region::new(20, 20, 8, 8)));
    }

    #[test]
    fn test_flat_frame_has_no_hits() {
        let cascade = HaarCascade::from_model(bright_over_dark(), params(0)).unwrap();
        let frame = GrayImage::from_pixel(32, 32, Luma([90]));
        assert!(cascade.raw_hits(&frame).is_empty());
    }

    #[test]
    fn test_inverted_pattern_is_rejected() {
        let cascade = HaarCascade::from_model(bright_over_dark(), params(0)).unwrap();
        // Dark bar on a bright frame: the window whose top half is the bar
        // sees dark over bright.
        let frame = GrayImage::from_fn(48, 48, |x, y| {
            if (20..28).contains(&x) && (20..24).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        assert!(!cascade.raw_hits(&frame).contains(&Region::new(20, 20, 8, 8)));
    }

    #[test]
    fn test_frame_smaller_than_window_has_no_hits() {
        let cascade = HaarCascade::from_model(bright_over_dark(), params(3)).unwrap();
        let frame = GrayImage::new(7, 20);
        assert!(cascade.detect_multi_scale(&frame).is_empty());
    }

    #[test]
    fn test_grouped_detection_is_centered_on_pattern() {
        let cascade = HaarCascade::from_model(bright_over_dark(), params(1)).unwrap();

        let regions = cascade.detect_multi_scale(&frame_with_bar());

        assert!(!regions.is_empty());
        for r in &regions {
            let (cx, cy) = r.center();
            assert!((cx - 24).abs() <= 4, "center x {cx} too far from bar");
            assert!((cy - 24).abs() <= 4, "center y {cy} too far from bar");
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let cascade = HaarCascade::from_model(bright_over_dark(), params(1)).unwrap();
        let frame = frame_with_bar();
        assert_eq!(
            cascade.detect_multi_scale(&frame),
            cascade.detect_multi_scale(&frame)
        );
    }

    #[test]
    fn test_max_size_limits_window_growth() {
        let limited = CascadeParams {
            min_neighbors: 0,
            max_size: Some(8),
            ..CascadeParams::default()
        };
        let cascade = HaarCascade::from_model(bright_over_dark(), limited).unwrap();
        let hits = cascade.raw_hits(&frame_with_bar());
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|r| r.width == 8 && r.height == 8));
    }

    #[test]
    fn test_min_size_skips_small_windows() {
        let limited = CascadeParams {
            min_neighbors: 0,
            min_size: Some(9),
            ..CascadeParams::default()
        };
        let cascade = HaarCascade::from_model(bright_over_dark(), limited).unwrap();
        let hits = cascade.raw_hits(&frame_with_bar());
        assert!(hits.iter().all(|r| r.width >= 9));
    }

    #[test]
    fn test_larger_pattern_is_found_on_a_coarser_level() {
        let cascade = HaarCascade::from_model(bright_over_dark(), params(0)).unwrap();
        // 16x8 bar: twice the base pattern
        let frame = GrayImage::from_fn(64, 64, |x, y| {
            if (16..32).contains(&x) && (16..24).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let hits = cascade.raw_hits(&frame);

        assert!(hits.iter().any(|r| r.width > 8 && r.width == r.height));
    }

    #[test]
    fn test_fixture_cascade_matches_single_stump() {
        let stump = HaarCascade::from_model(bright_over_dark(), params(0)).unwrap();
        let fixture = HaarCascade::from_model(
            opencv_cascade_xml::parse(BAR_CASCADE).unwrap(),
            params(0),
        )
        .unwrap();
        let frame = frame_with_bar();

        // the fixture's second stage is a tilted-feature tree whose leaves all pass
        assert_eq!(fixture.raw_hits(&frame), stump.raw_hits(&frame));
    }

    // ── Weak classifiers ─────────────────────────────────────────────

    #[test]
    fn test_stump_picks_side_of_threshold() {
        let stump = WeakClassifier::stump(0, 0.5, -2.0, 3.0);
        assert_eq!(stump.evaluate(|_| 0.4), -2.0);
        assert_eq!(stump.evaluate(|_| 0.5), 3.0);
    }

    #[test]
    fn test_tree_walks_internal_nodes() {
        // node 0 on feature 0 → node 1 on feature 1 → leaves 1 or 2
        let tree = WeakClassifier {
            nodes: vec![
                TreeNode {
                    feature: 0,
                    threshold: 0.0,
                    left: 1,
                    right: 0,
                },
                TreeNode {
                    feature: 1,
                    threshold: 1.0,
                    left: -1,
                    right: -2,
                },
            ],
            leaves: vec![10.0, 20.0, 30.0],
        };
        let values = |a: f64, b: f64| move |i: usize| if i == 0 { a } else { b };

        assert_eq!(tree.evaluate(values(0.5, 0.0)), 10.0);
        assert_eq!(tree.evaluate(values(-0.5, 0.0)), 20.0);
        assert_eq!(tree.evaluate(values(-0.5, 2.0)), 30.0);
    }

    #[test]
    fn test_tilted_feature_drives_decision() {
        // a stump on a single tilted rect fires only where the rotated
        // square is bright
        let model = CascadeModel {
            window: [8, 8],
            features: vec![HaarFeature {
                rects: vec![
                    WeightedRect {
                        x: 4,
                        y: 0,
                        width: 4,
                        height: 4,
                        weight: 1.0,
                    },
                    WeightedRect {
                        x: 4,
                        y: 0,
                        width: 1,
                        height: 1,
                        weight: -1.0,
                    },
                ],
                tilted: true,
            }],
            stages: vec![CascadeStage {
                threshold: 0.0,
                classifiers: vec![WeakClassifier::stump(0, 0.1, -1.0, 1.0)],
            }],
        };
        let cascade = HaarCascade::from_model(
            model,
            CascadeParams {
                min_neighbors: 0,
                max_size: Some(8),
                ..CascadeParams::default()
            },
        )
        .unwrap();
        let lit = GrayImage::from_fn(8, 8, |x, y| Luma([((x * 7 + y * 13) % 200 + 40) as u8]));
        let dark = GrayImage::from_fn(8, 8, |x, y| {
            // same texture, black over the 32 pixels the rotated rect covers
            let inside = (2 * x as i32 - 6).abs() + (2 * y as i32 - 7).abs() <= 7;
            if inside {
                Luma([0])
            } else {
                Luma([((x * 7 + y * 13) % 200 + 40) as u8])
            }
        });

        assert_eq!(cascade.raw_hits(&lit), vec![Region::new(0, 0, 8, 8)]);
        assert!(cascade.raw_hits(&dark).is_empty());
    }

    // ── Loading ──────────────────────────────────────────────────────

    #[test]
    fn test_load_opencv_xml() {
        let file = write_temp(BAR_CASCADE);

        let cascade = HaarCascade::load(file.path(), CascadeParams::default()).unwrap();

        assert_eq!(cascade.model().window, [8, 8]);
        assert_eq!(cascade.model().stages.len(), 2);
        assert!(cascade.model().features[1].tilted);
    }

    #[test]
    fn test_load_round_trips_json() {
        let file = write_temp(&serde_json::to_string(&bright_over_dark()).unwrap());

        let cascade = HaarCascade::load(file.path(), CascadeParams::default()).unwrap();

        assert_eq!(cascade.model(), &bright_over_dark());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = HaarCascade::load(Path::new("/nonexistent/cascade.xml"), CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::Io { .. })));
    }

    #[test]
    fn test_load_truncated_xml_is_xml_error() {
        let file = write_temp("<opencv_storage>");

        let result = HaarCascade::load(file.path(), CascadeParams::default());

        assert!(matches!(result, Err(CascadeLoadError::Xml { .. })));
    }

    #[test]
    fn test_load_malformed_json_is_json_error() {
        let file = write_temp("{\"window\": [8, 8]");

        let result = HaarCascade::load(file.path(), CascadeParams::default());

        assert!(matches!(result, Err(CascadeLoadError::Json { .. })));
    }

    #[test]
    fn test_empty_cascade_is_invalid() {
        let model = CascadeModel {
            window: [24, 24],
            features: vec![],
            stages: vec![],
        };
        let result = HaarCascade::from_model(model, CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::Invalid(_))));
    }

    #[test]
    fn test_rect_outside_window_is_invalid() {
        let mut model = bright_over_dark();
        model.features[0].rects[0].width = 9;
        let result = HaarCascade::from_model(model, CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::Invalid(_))));
    }

    #[test]
    fn test_tilted_rect_crossing_left_edge_is_invalid() {
        let mut model = opencv_cascade_xml::parse(BAR_CASCADE).unwrap();
        // height runs down-left from x, so it may not exceed x
        model.features[1].rects[0].height = 5;
        let result = HaarCascade::from_model(model, CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::Invalid(_))));
    }

    #[test]
    fn test_unknown_feature_index_is_invalid() {
        let mut model = bright_over_dark();
        model.stages[0].classifiers[0].nodes[0].feature = 1;
        let result = HaarCascade::from_model(model, CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::Invalid(_))));
    }

    #[test]
    fn test_backward_tree_edge_is_invalid() {
        let mut model = opencv_cascade_xml::parse(BAR_CASCADE).unwrap();
        model.stages[1].classifiers[0].nodes[1].left = 1;
        let result = HaarCascade::from_model(model, CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::Invalid(_))));
    }

    #[test]
    fn test_missing_leaf_is_invalid() {
        let mut model = bright_over_dark();
        model.stages[0].classifiers[0].leaves.pop();
        let result = HaarCascade::from_model(model, CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::Invalid(_))));
    }

    #[test]
    fn test_scale_factor_must_exceed_one() {
        let result = HaarCascade::from_model(
            bright_over_dark(),
            CascadeParams {
                scale_factor: 1.0,
                ..CascadeParams::default()
            },
        );
        assert!(matches!(result, Err(CascadeLoadError::Invalid(_))));
    }

    #[test]
    fn test_load_error_becomes_model_detection_error() {
        let err: DetectionError = CascadeLoadError::Invalid("no stages".into()).into();
        assert!(matches!(err, DetectionError::Model(_)));
        assert!(err.to_string().contains("no stages"));
    }

    // ── Grouping ─────────────────────────────────────────────────────

    #[test]
    fn test_group_zero_neighbors_passes_hits_through() {
        let hits = vec![Region::new(0, 0, 10, 10), Region::new(1, 0, 10, 10)];
        assert_eq!(group_rectangles(&hits, 0, DEFAULT_GROUP_EPS), hits);
    }

    #[test]
    fn test_group_averages_cluster() {
        let hits = vec![
            Region::new(10, 10, 20, 20),
            Region::new(12, 10, 20, 20),
            Region::new(11, 12, 20, 20),
        ];
        let grouped = group_rectangles(&hits, 1, DEFAULT_GROUP_EPS);
        assert_eq!(grouped, vec![Region::new(11, 11, 20, 20)]);
    }

    #[test]
    fn test_group_drops_sparse_clusters() {
        let hits = vec![
            Region::new(10, 10, 20, 20),
            Region::new(11, 10, 20, 20),
            Region::new(80, 80, 20, 20),
        ];
        let grouped = group_rectangles(&hits, 1, DEFAULT_GROUP_EPS);
        assert_eq!(grouped, vec![Region::new(11, 10, 20, 20)]);
    }

    #[test]
    fn test_group_preserves_first_appearance_order() {
        let hits = vec![
            Region::new(80, 80, 20, 20),
            Region::new(10, 10, 20, 20),
            Region::new(80, 81, 20, 20),
            Region::new(10, 11, 20, 20),
        ];
        let grouped = group_rectangles(&hits, 1, DEFAULT_GROUP_EPS);
        assert_eq!(grouped.len(), 2);
        assert!(grouped[0].x > grouped[1].x);
    }

    #[test]
    fn test_group_drops_weak_region_nested_in_strong_one() {
        let mut hits = vec![Region::new(0, 0, 40, 40); 6];
        hits.extend(vec![Region::new(10, 10, 10, 10); 2]);
        let grouped = group_rectangles(&hits, 1, DEFAULT_GROUP_EPS);
        assert_eq!(grouped, vec![Region::new(0, 0, 40, 40)]);
    }
}
