//! K-Means segmentation on CV for when no thresholds are known up front

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::classify::{ClassificationResult, Segment};
use crate::error::SegmentationError;

/// Number of clusters, one per segment X, Y, Z
pub const SEGMENT_CLUSTERS: usize = 3;

/// K-Means fitting parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansConfig {
    pub max_iters: u64,
    pub tolerance: f64,
    /// RNG seed for centroid initialisation
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iters: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Results relabelled by clustering, plus the fitted clusters
#[derive(Debug, Clone)]
pub struct KMeansSegmentation {
    /// Same order and products as the input; only the segment may differ
    pub results: Vec<ClassificationResult>,
    /// Cluster centres in CV units, ordered X, Y, Z
    pub centroids: [f64; SEGMENT_CLUSTERS],
    /// Within-cluster sum of squares
    pub inertia: f64,
}

/// Re-segment classified products by clustering their CV values
///
/// Clusters are ordered by centroid: lowest is X, highest is Z. Unclassified
/// products are passed through untouched.
///
/// # Arguments
/// * `results` - Output of the threshold classifier
/// * `config` - K-Means parameters
///
/// # Returns
/// * `KMeansSegmentation`, or `InsufficientProducts` with fewer classifiable
///   products than clusters
pub fn segment_by_kmeans(
    results: &[ClassificationResult],
    config: &KMeansConfig,
) -> crate::Result<KMeansSegmentation> {
    let classified: Vec<(usize, f64)> = results
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.cv.map(|cv| (i, cv)))
        .collect();

    if classified.len() < SEGMENT_CLUSTERS {
        return Err(SegmentationError::InsufficientProducts {
            required: SEGMENT_CLUSTERS,
            available: classified.len(),
        }
        .into());
    }

    let n_samples = classified.len();
    let features = Array2::from_shape_vec(
        (n_samples, 1),
        classified.iter().map(|&(_, cv)| cv).collect(),
    )?;

    // Dummy targets for unsupervised learning
    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(features.clone(), targets);

    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with(SEGMENT_CLUSTERS, rng, L2Dist)
        .max_n_iterations(config.max_iters)
        .tolerance(config.tolerance)
        .fit(&dataset)?;

    let labels: Array1<usize> = model.predict(&features);
    let centers: Vec<f64> = model.centroids().column(0).to_vec();

    // rank[cluster] = position of the cluster when sorted by centroid
    let mut order: Vec<usize> = (0..SEGMENT_CLUSTERS).collect();
    order.sort_by(|&a, &b| centers[a].total_cmp(&centers[b]));
    let mut rank = [0usize; SEGMENT_CLUSTERS];
    for (position, &cluster) in order.iter().enumerate() {
        rank[cluster] = position;
    }

    let segments = [Segment::X, Segment::Y, Segment::Z];
    let mut relabelled = results.to_vec();
    for (&(index, _), &label) in classified.iter().zip(labels.iter()) {
        relabelled[index].segment = segments[rank[label]];
    }

    let centroids = [centers[order[0]], centers[order[1]], centers[order[2]]];
    let inertia = compute_inertia(&features, &labels, &centers);

    tracing::info!(
        x = centroids[0],
        y = centroids[1],
        z = centroids[2],
        inertia,
        "k-means cluster centres"
    );

    Ok(KMeansSegmentation {
        results: relabelled,
        centroids,
        inertia,
    })
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centers: &[f64]) -> f64 {
    features
        .column(0)
        .iter()
        .zip(labels.iter())
        .filter(|(_, label)| **label < centers.len())
        .map(|(&cv, &label)| (cv - centers[label]).powi(2))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::UnclassifiedReason;

    fn result(id: &str, cv: Option<f64>) -> ClassificationResult {
        ClassificationResult {
            product_id: id.to_string(),
            mean: 100.0,
            std_dev: cv.map(|c| c * 100.0),
            cv,
            segment: if cv.is_some() { Segment::Z } else { Segment::Unclassified },
            reason: cv.is_none().then_some(UnclassifiedReason::ZeroMean),
            data_points: 6,
        }
    }

    fn three_groups() -> Vec<ClassificationResult> {
        vec![
            result("high-1", Some(1.50)),
            result("low-1", Some(0.05)),
            result("mid-1", Some(0.60)),
            result("none", None),
            result("low-2", Some(0.07)),
            result("high-2", Some(1.55)),
            result("mid-2", Some(0.62)),
        ]
    }

    #[test]
    fn test_segment_by_kmeans() {
        let outcome = segment_by_kmeans(&three_groups(), &KMeansConfig::default()).unwrap();

        let segments: Vec<Segment> = outcome.results.iter().map(|r| r.segment).collect();
        assert_eq!(
            segments,
            vec![
                Segment::Z,
                Segment::X,
                Segment::Y,
                Segment::Unclassified,
                Segment::X,
                Segment::Z,
                Segment::Y,
            ]
        );
        assert!(outcome.centroids[0] < outcome.centroids[1]);
        assert!(outcome.centroids[1] < outcome.centroids[2]);
    }

    #[test]
    fn test_model_inertia() {
        let outcome = segment_by_kmeans(&three_groups(), &KMeansConfig::default()).unwrap();
        assert!(outcome.inertia >= 0.0);
        assert!(outcome.inertia.is_finite());
        assert!(outcome.inertia < 0.01);
    }

    #[test]
    fn test_insufficient_products() {
        let results = vec![result("a", Some(0.1)), result("b", Some(0.2)), result("c", None)];
        let err = segment_by_kmeans(&results, &KMeansConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SegmentationError>(),
            Some(SegmentationError::InsufficientProducts { available: 2, .. })
        ));
    }
}
