//! PCA projection of the standardized RFM features onto two axes
//!
//! The projection runs in three steps:
//! 1. every feature is standardized with its sample mean and sample standard
//!    deviation; a zero-variance feature becomes a constant zero column and
//!    raises a [`DataWarning::DegenerateFeature`],
//! 2. the covariance matrix of the standardized data is diagonalized with a
//!    cyclic Jacobi eigenvalue iteration,
//! 3. rows are projected onto the two eigenvectors with the largest
//!    eigenvalues.
//!
//! Eigenvalues within a relative `1e-9` of each other are treated as tied.
//! Tied axes are ordered by the feature carrying the largest absolute
//! loading (Recency, then Frequency, then Monetary). Each axis is oriented so
//! that its largest loading is positive; consumers should still treat the
//! sign of an axis as arbitrary.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

use crate::data::{feature_matrix, ClusterLabel, CustomerSegmentRecord, Feature};
use crate::error::{DataWarning, SegmentError, SegmentResult};

const MIN_RECORDS: usize = 2;
const MIN_VARYING_FEATURES: usize = 2;
const N_COMPONENTS: usize = 2;

/// Relative tolerance under which a standard deviation counts as zero
const DEGENERATE_TOLERANCE: f64 = 1e-12;
/// Relative tolerance under which two eigenvalues count as equal
const EIGEN_TIE_TOLERANCE: f64 = 1e-9;
const JACOBI_TOLERANCE: f64 = 1e-14;
const MAX_JACOBI_SWEEPS: usize = 100;

/// A customer placed in the 2D projected space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub pc1: f64,
    pub pc2: f64,
    pub cluster: ClusterLabel,
}

/// Sample mean and standard deviation fitted for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureScaler {
    pub feature: Feature,
    pub mean: f64,
    pub std_dev: f64,
}

impl FeatureScaler {
    /// Fit on one feature column using the n - 1 denominator
    pub fn fit(feature: Feature, values: ArrayView1<f64>) -> Self {
        let n = values.len();
        let mean = if n == 0 { 0.0 } else { values.sum() / n as f64 };
        let std_dev = if n < 2 {
            0.0
        } else {
            let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (n - 1) as f64).sqrt()
        };

        Self {
            feature,
            mean,
            std_dev,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.std_dev <= DEGENERATE_TOLERANCE * self.mean.abs().max(1.0)
    }

    pub fn transform(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            (value - self.mean) / self.std_dev
        }
    }
}

/// Standardized feature matrix together with the scalers that produced it
#[derive(Debug, Clone)]
pub struct Standardized {
    pub matrix: Array2<f64>,
    pub scalers: Vec<FeatureScaler>,
    pub warnings: Vec<DataWarning>,
}

impl Standardized {
    pub fn varying_features(&self) -> usize {
        self.scalers.iter().filter(|scaler| !scaler.is_degenerate()).count()
    }
}

/// One principal axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrincipalComponent {
    /// Unit loading vector in `Feature::ALL` order
    pub loadings: Vec<f64>,
    /// Variance of the scores along this axis (the eigenvalue)
    pub variance: f64,
    /// Share of the total standardized variance captured by this axis
    pub variance_ratio: f64,
}

/// Full result of a projection fit
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub points: Vec<ProjectedPoint>,
    pub components: Vec<PrincipalComponent>,
    pub scalers: Vec<FeatureScaler>,
    pub warnings: Vec<DataWarning>,
}

impl Projection {
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        self.components
            .iter()
            .map(|component| component.variance_ratio)
            .collect()
    }
}

/// Standardize every column of a raw feature matrix
///
/// Columns must follow `Feature::ALL` order.
pub fn standardize(raw: &Array2<f64>) -> Standardized {
    let scalers: Vec<FeatureScaler> = Feature::ALL
        .iter()
        .map(|&feature| FeatureScaler::fit(feature, raw.column(feature.index())))
        .collect();

    let warnings = scalers
        .iter()
        .filter(|scaler| scaler.is_degenerate())
        .map(|scaler| DataWarning::DegenerateFeature {
            feature: scaler.feature,
        })
        .collect();

    let matrix = Array2::from_shape_fn(raw.dim(), |(row, col)| scalers[col].transform(raw[[row, col]]));

    Standardized {
        matrix,
        scalers,
        warnings,
    }
}

/// Project customers onto the two directions of maximal variance
///
/// # Returns
/// * One point per record, in input order, labelled with the record's cluster
///
/// # Errors
/// * `SegmentError::InsufficientData` with fewer than 2 records or fewer
///   than 2 features with nonzero variance
/// * `SegmentError::InvalidValue` when a feature value is NaN or infinite
pub fn project(records: &[CustomerSegmentRecord]) -> SegmentResult<Vec<ProjectedPoint>> {
    fit_projection(records).map(|projection| projection.points)
}

/// Like [`project`], also returning the fitted axes, scalers and warnings
pub fn fit_projection(records: &[CustomerSegmentRecord]) -> SegmentResult<Projection> {
    if records.len() < MIN_RECORDS {
        return Err(SegmentError::InsufficientData {
            required: MIN_RECORDS,
            found: records.len(),
            what: "records",
        });
    }

    let raw = feature_matrix(records);
    if let Some(((row, col), value)) = raw.indexed_iter().find(|(_, value)| !value.is_finite()) {
        return Err(SegmentError::InvalidValue {
            column: Feature::ALL[col].column_name().to_string(),
            row,
            value: value.to_string(),
        });
    }

    let standardized = standardize(&raw);
    let varying = standardized.varying_features();
    if varying < MIN_VARYING_FEATURES {
        return Err(SegmentError::InsufficientData {
            required: MIN_VARYING_FEATURES,
            found: varying,
            what: "features with nonzero variance",
        });
    }

    for warning in &standardized.warnings {
        tracing::warn!("{}", warning);
    }

    let covariance = covariance(&standardized.matrix);
    let (eigenvalues, eigenvectors) = symmetric_eigen(&covariance);
    let order = component_order(&eigenvalues, &eigenvectors);

    let total_variance: f64 = eigenvalues.iter().map(|value| value.max(0.0)).sum();
    let mut basis = Array2::<f64>::zeros((Feature::ALL.len(), N_COMPONENTS));
    let mut components = Vec::with_capacity(N_COMPONENTS);

    for (axis, &index) in order.iter().take(N_COMPONENTS).enumerate() {
        let loadings = oriented(eigenvectors.column(index));
        let variance = eigenvalues[index].max(0.0);

        basis.column_mut(axis).assign(&loadings);
        components.push(PrincipalComponent {
            loadings: loadings.to_vec(),
            variance,
            variance_ratio: variance / total_variance,
        });
    }

    let scores = standardized.matrix.dot(&basis);
    let points = scores
        .outer_iter()
        .zip(records)
        .map(|(row, record)| ProjectedPoint {
            pc1: row[0],
            pc2: row[1],
            cluster: record.cluster,
        })
        .collect();

    tracing::debug!(
        customers = records.len(),
        pc1_ratio = components[0].variance_ratio,
        pc2_ratio = components[1].variance_ratio,
        "fitted projection"
    );

    Ok(Projection {
        points,
        components,
        scalers: standardized.scalers,
        warnings: standardized.warnings,
    })
}

/// Sample covariance of an already centered matrix
fn covariance(centered: &Array2<f64>) -> Array2<f64> {
    let n = centered.len_of(Axis(0));
    centered.t().dot(centered) / (n - 1) as f64
}

/// Eigenvalues and eigenvectors (as columns) of a symmetric matrix
///
/// Cyclic Jacobi rotations; the matrices here are 3x3 so convergence takes a
/// handful of sweeps.
pub(crate) fn symmetric_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.to_owned();
    let mut v = Array2::<f64>::eye(n);
    let norm = a.iter().map(|x| x * x).sum::<f64>().sqrt();

    for _ in 0..MAX_JACOBI_SWEEPS {
        let off_diagonal = off_diagonal_norm(&a);
        if off_diagonal <= JACOBI_TOLERANCE * norm.max(f64::MIN_POSITIVE) {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    a.indexed_iter()
        .filter(|((row, col), _)| row != col)
        .map(|(_, value)| value * value)
        .sum::<f64>()
        .sqrt()
}

/// Eigenpair indices by descending eigenvalue, ties broken by dominant feature
pub(crate) fn component_order(eigenvalues: &Array1<f64>, eigenvectors: &Array2<f64>) -> Vec<usize> {
    let scale = eigenvalues
        .iter()
        .fold(0.0_f64, |acc, value| acc.max(value.abs()))
        .max(f64::MIN_POSITIVE);

    let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        let (lambda_a, lambda_b) = (eigenvalues[a], eigenvalues[b]);
        if (lambda_a - lambda_b).abs() <= EIGEN_TIE_TOLERANCE * scale {
            dominant_feature(eigenvectors.column(a)).cmp(&dominant_feature(eigenvectors.column(b)))
        } else {
            lambda_b.total_cmp(&lambda_a)
        }
    });
    order
}

/// Index of the largest absolute loading; the lowest index wins near-ties
fn dominant_feature(vector: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (index, value) in vector.iter().enumerate().skip(1) {
        if value.abs() > vector[best].abs() + 1e-12 {
            best = index;
        }
    }
    best
}

fn oriented(vector: ArrayView1<f64>) -> Array1<f64> {
    if vector[dominant_feature(vector)] < 0.0 {
        vector.mapv(|value| -value)
    } else {
        vector.to_owned()
    }
}
