//! Two-view correspondence of detector output.
//!
//! The external detector yields axis-aligned [`BoundingBox`]es per image.
//! Each box is reduced to its center pixel, a [`Detection2D`], and detections
//! of the two views are paired into [`Correspondence`]s either by a shared
//! target identifier or by pixel proximity. Detections that find no partner
//! are counted in the [`MatchReport`] and never invented.

use log::{debug, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Axis-aligned detector box in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    /// Target identifier decoded by the detector, when it provides one.
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn full_confidence() -> f64 {
    1.0
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, confidence: f64) -> Self {
        BoundingBox {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }
}

/// One observation of a target in one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection2D {
    pub target_id: String,
    pub pixel: Point2<f64>,
}

impl Detection2D {
    pub fn new(target_id: impl Into<String>, pixel: Point2<f64>) -> Self {
        Detection2D {
            target_id: target_id.into(),
            pixel,
        }
    }

    /// Reduces a detector box to its center pixel.
    pub fn from_bbox(target_id: impl Into<String>, bbox: &BoundingBox) -> Self {
        Self::new(target_id, bbox.center())
    }
}

/// Pixel observations of the same target in the first and second view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub target_id: String,
    pub first: Point2<f64>,
    pub second: Point2<f64>,
}

/// Outcome of pairing two detection lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub correspondences: Vec<Correspondence>,
    /// Detections in the first view left without a partner.
    pub unmatched_first: usize,
    /// Detections in the second view left without a partner.
    pub unmatched_second: usize,
}

impl MatchReport {
    pub fn has_unmatched(&self) -> bool {
        self.unmatched_first > 0 || self.unmatched_second > 0
    }

    fn log_summary(&self, strategy: &str) {
        debug!(
            "{} matching paired {} detections",
            strategy,
            self.correspondences.len()
        );
        if self.has_unmatched() {
            warn!(
                "{} matching dropped {} detection(s) in the first view and {} in the second view",
                strategy, self.unmatched_first, self.unmatched_second
            );
        }
    }
}

/// Identifier assigned to the `index`-th (0-based) target when boxes carry no label.
pub fn default_target_id(index: usize) -> String {
    format!("palette_{}", index + 1)
}

/// Turns the boxes of one image into detections.
///
/// Boxes below `min_confidence` are discarded first. Boxes without a detector
/// label are named `palette_<n>` by their position among the kept boxes.
pub fn detections_from_boxes(boxes: &[BoundingBox], min_confidence: f64) -> Vec<Detection2D> {
    boxes
        .iter()
        .filter(|b| b.confidence >= min_confidence)
        .enumerate()
        .map(|(idx, b)| {
            let id = b.label.clone().unwrap_or_else(|| default_target_id(idx));
            Detection2D::from_bbox(id, b)
        })
        .collect()
}

/// Pairs detections that share a target identifier.
///
/// Output follows the order of `first`. An identifier that appears more than
/// once in a view is matched only on its first occurrence; later repeats are
/// counted as unmatched.
pub fn match_by_id(first: &[Detection2D], second: &[Detection2D]) -> MatchReport {
    let mut second_by_id: HashMap<&str, &Detection2D> = HashMap::new();
    let mut unmatched_second = 0;
    for det in second {
        if second_by_id.contains_key(det.target_id.as_str()) {
            unmatched_second += 1;
        } else {
            second_by_id.insert(det.target_id.as_str(), det);
        }
    }

    let mut report = MatchReport::default();
    let mut used: HashSet<&str> = HashSet::new();
    for det in first {
        let id = det.target_id.as_str();
        match second_by_id.get(id) {
            Some(other) if used.insert(id) => report.correspondences.push(Correspondence {
                target_id: det.target_id.clone(),
                first: det.pixel,
                second: other.pixel,
            }),
            _ => report.unmatched_first += 1,
        }
    }
    report.unmatched_second = unmatched_second + second_by_id.len() - used.len();

    report.log_summary("Identifier");
    report
}

/// Pairs detections by mutual nearest pixel distance within `max_distance`.
///
/// Candidate pairs are accepted greedily from the closest upward, each
/// detection being used at most once; ties keep input order. The resulting
/// correspondence takes its identifier from the first view and the output is
/// sorted in first-view order.
pub fn match_by_proximity(
    first: &[Detection2D],
    second: &[Detection2D],
    max_distance: f64,
) -> MatchReport {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for (i, a) in first.iter().enumerate() {
        for (j, b) in second.iter().enumerate() {
            let d = (a.pixel - b.pixel).norm();
            if d <= max_distance {
                candidates.push((d, i, j));
            }
        }
    }
    candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));

    let mut first_used = vec![false; first.len()];
    let mut second_used = vec![false; second.len()];
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (_, i, j) in candidates {
        if first_used[i] || second_used[j] {
            continue;
        }
        first_used[i] = true;
        second_used[j] = true;
        pairs.push((i, j));
    }
    pairs.sort_unstable();

    let report = MatchReport {
        correspondences: pairs
            .into_iter()
            .map(|(i, j)| Correspondence {
                target_id: first[i].target_id.clone(),
                first: first[i].pixel,
                second: second[j].pixel,
            })
            .collect(),
        unmatched_first: first_used.iter().filter(|used| !**used).count(),
        unmatched_second: second_used.iter().filter(|used| !**used).count(),
    };

    report.log_summary("Proximity");
    report
}
