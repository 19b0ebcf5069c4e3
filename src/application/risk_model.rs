use crate::config::{GradientBoostingProfile, RiskScoringConfig};
use crate::domain::errors::PipelineError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{
    LogisticRegression, LogisticRegressionParameters,
};
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::{debug, info};

/// Selects among the capability-equivalent classifiers. Unknown kinds are a
/// fatal configuration error, never a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    Logistic,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "logistic" | "logistic-regression" => Ok(ModelKind::Logistic),
            "random-forest" => Ok(ModelKind::RandomForest),
            "gradient-boosting" => Ok(ModelKind::GradientBoosting),
            _ => Err(PipelineError::UnsupportedModelKind(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Logistic => "logistic",
            ModelKind::RandomForest => "random-forest",
            ModelKind::GradientBoosting => "gradient-boosting",
        }
    }
}

/// How the trained model can explain itself, resolved once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExplanationCapability {
    /// Per-feature importances (permutation importance on the training set).
    Importances(Vec<f64>),
    /// Absolute linear coefficients.
    Coefficients(Vec<f64>),
    /// The model exposes neither; every feature gets uniform weight.
    Opaque,
}

impl ExplanationCapability {
    pub fn weights(&self, n_features: usize) -> Vec<f64> {
        match self {
            ExplanationCapability::Importances(w) | ExplanationCapability::Coefficients(w) => {
                w.clone()
            }
            ExplanationCapability::Opaque => vec![1.0; n_features],
        }
    }
}

/// Log-odds boosting over regression tree weak learners. smartcore ships no
/// boosted classifier, so the boosting profile is realized here: base score =
/// log-odds of the positive rate, each round fits a depth-limited tree to the
/// logistic pseudo-residuals and adds it with shrinkage.
#[derive(Debug, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl GradientBoostedTrees {
    fn fit(
        x: &DenseMatrix<f64>,
        y: &[f64],
        profile: &GradientBoostingProfile,
    ) -> Result<Self, PipelineError> {
        let n = y.len();
        let positive_rate =
            (y.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (positive_rate / (1.0 - positive_rate)).ln();
        let mut scores = vec![base_score; n];
        let mut trees = Vec::with_capacity(profile.n_estimators);

        for _ in 0..profile.n_estimators {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&scores)
                .map(|(yi, s)| yi - sigmoid(*s))
                .collect();
            let params =
                DecisionTreeRegressorParameters::default().with_max_depth(profile.max_depth);
            let tree = DecisionTreeRegressor::fit(x, &residuals, params)
                .map_err(|e| PipelineError::Training(format!("boosting round: {e}")))?;
            let step = tree
                .predict(x)
                .map_err(|e| PipelineError::Training(format!("boosting round: {e}")))?;
            for (score, delta) in scores.iter_mut().zip(&step) {
                *score += profile.learning_rate * delta;
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            learning_rate: profile.learning_rate,
            trees,
        })
    }

    fn predict_proba(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, PipelineError> {
        let (rows, _) = x.shape();
        let mut scores = vec![self.base_score; rows];
        for tree in &self.trees {
            let step = tree
                .predict(x)
                .map_err(|e| PipelineError::Prediction(e.to_string()))?;
            for (score, delta) in scores.iter_mut().zip(&step) {
                *score += self.learning_rate * delta;
            }
        }
        Ok(scores.iter().map(|s| sigmoid(*s)).collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
enum Classifier {
    Logistic(LogisticRegression<f64, u32, DenseMatrix<f64>, Vec<u32>>),
    RandomForest(RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>),
    GradientBoosting(GradientBoostedTrees),
}

impl Classifier {
    fn predict_proba(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, PipelineError> {
        match self {
            Classifier::Logistic(model) => {
                let (weights, intercept) = linear_weights(model);
                let (rows, cols) = x.shape();
                let mut probs = Vec::with_capacity(rows);
                for r in 0..rows {
                    let mut z = intercept;
                    for c in 0..cols.min(weights.len()) {
                        z += weights[c] * *x.get((r, c));
                    }
                    probs.push(sigmoid(z));
                }
                Ok(probs)
            }
            Classifier::RandomForest(model) => {
                // Probability forest: trees vote with their 0/1 leaf means
                let raw = model
                    .predict(x)
                    .map_err(|e| PipelineError::Prediction(e.to_string()))?;
                Ok(raw.into_iter().map(|p| p.clamp(0.0, 1.0)).collect())
            }
            Classifier::GradientBoosting(model) => model.predict_proba(x),
        }
    }
}

/// Signed coefficient vector and intercept of the fitted logistic model.
fn linear_weights(
    model: &LogisticRegression<f64, u32, DenseMatrix<f64>, Vec<u32>>,
) -> (Vec<f64>, f64) {
    let coef = model.coefficients();
    let (rows, cols) = coef.shape();
    // Binary models come back as a single row or a single column depending on
    // the solver path; normalize to one weight per feature.
    let weights: Vec<f64> = if rows == 1 {
        (0..cols).map(|c| *coef.get((0, c))).collect()
    } else {
        (0..rows).map(|r| *coef.get((r, 0))).collect()
    };
    let intercept = *model.intercept().get((0, 0));
    (weights, intercept)
}

/// Holdout evaluation of the classifier. Positive class is Lost (label 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub roc_auc: f64,
    pub avg_precision: f64,
    pub precision_positive: f64,
    pub recall_positive: f64,
}

/// Trained risk model plus everything scoring needs: the ordered feature
/// columns it expects and its resolved explanation capability. Read-only
/// after training.
#[derive(Debug, Serialize, Deserialize)]
pub struct RiskModel {
    pub kind: ModelKind,
    classifier: Classifier,
    pub feature_columns: Vec<String>,
    pub capability: ExplanationCapability,
}

impl RiskModel {
    /// Trains a classifier of the requested kind. `y` uses the risk framing:
    /// 1 = Lost, 0 = Won.
    pub fn train(
        x: &[Vec<f64>],
        y: &[u8],
        kind: ModelKind,
        feature_columns: Vec<String>,
        config: &RiskScoringConfig,
    ) -> Result<Self, PipelineError> {
        if x.is_empty() {
            return Err(PipelineError::EmptyBatch(
                "cannot train on zero rows".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(PipelineError::Training(format!(
                "feature/label length mismatch: {} != {}",
                x.len(),
                y.len()
            )));
        }
        let matrix = DenseMatrix::from_2d_vec(&x.to_vec())
            .map_err(|e| PipelineError::Training(e.to_string()))?;
        info!(kind = kind.as_str(), rows = x.len(), "Training risk model");

        let classifier = match kind {
            ModelKind::Logistic => {
                let labels: Vec<u32> = y.iter().map(|&v| v as u32).collect();
                let params =
                    LogisticRegressionParameters::default().with_alpha(config.logistic.alpha);
                let model = LogisticRegression::fit(&matrix, &labels, params)
                    .map_err(|e| PipelineError::Training(e.to_string()))?;
                Classifier::Logistic(model)
            }
            ModelKind::RandomForest => {
                let labels: Vec<f64> = y.iter().map(|&v| v as f64).collect();
                let profile = &config.random_forest;
                let params = RandomForestRegressorParameters::default()
                    .with_n_trees(profile.n_trees)
                    .with_max_depth(profile.max_depth)
                    .with_min_samples_split(profile.min_samples_split)
                    .with_seed(config.random_seed);
                let model = RandomForestRegressor::fit(&matrix, &labels, params)
                    .map_err(|e| PipelineError::Training(e.to_string()))?;
                Classifier::RandomForest(model)
            }
            ModelKind::GradientBoosting => {
                let labels: Vec<f64> = y.iter().map(|&v| v as f64).collect();
                Classifier::GradientBoosting(GradientBoostedTrees::fit(
                    &matrix,
                    &labels,
                    &config.gradient_boosting,
                )?)
            }
        };

        let capability = Self::resolve_capability(&classifier, &matrix, y, config);
        Ok(Self {
            kind,
            classifier,
            feature_columns,
            capability,
        })
    }

    fn resolve_capability(
        classifier: &Classifier,
        x: &DenseMatrix<f64>,
        y: &[u8],
        config: &RiskScoringConfig,
    ) -> ExplanationCapability {
        match classifier {
            Classifier::Logistic(model) => {
                let (weights, _) = linear_weights(model);
                ExplanationCapability::Coefficients(
                    weights.into_iter().map(f64::abs).collect(),
                )
            }
            Classifier::RandomForest(_) | Classifier::GradientBoosting(_) => {
                if config.compute_importances {
                    match permutation_importance(classifier, x, y, config.random_seed) {
                        Ok(importances) => ExplanationCapability::Importances(importances),
                        Err(e) => {
                            debug!("Permutation importance failed ({e}), model stays opaque");
                            ExplanationCapability::Opaque
                        }
                    }
                } else {
                    ExplanationCapability::Opaque
                }
            }
        }
    }

    /// Loss probabilities in [0,1], one per input row, order-preserving.
    pub fn predict_loss_probability(
        &self,
        x: &[Vec<f64>],
    ) -> Result<Vec<f64>, PipelineError> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = DenseMatrix::from_2d_vec(&x.to_vec())
            .map_err(|e| PipelineError::Prediction(e.to_string()))?;
        self.classifier.predict_proba(&matrix)
    }

    /// Ranking weights for the explainer, one per feature column.
    pub fn feature_weights(&self) -> Vec<f64> {
        self.capability.weights(self.feature_columns.len())
    }
}

/// Evaluates predictions against ground truth. Threshold-based metrics use
/// the supplied hard predictions; ranking metrics use the probabilities.
pub fn evaluate(y_true: &[u8], y_pred: &[u8], probabilities: &[f64]) -> EvaluationMetrics {
    EvaluationMetrics {
        roc_auc: roc_auc(y_true, probabilities),
        avg_precision: average_precision(y_true, probabilities),
        precision_positive: precision_at_half(y_true, y_pred),
        recall_positive: recall_at_half(y_true, y_pred),
    }
}

/// Mann-Whitney formulation with tie-averaged ranks.
fn roc_auc(y_true: &[u8], probabilities: &[f64]) -> f64 {
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }
    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut ranks = vec![0.0; y_true.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|&(&y, _)| y == 1)
        .map(|(_, &r)| r)
        .sum();
    let n_pos = n_pos as f64;
    (rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}

/// Area under the precision-recall curve, stepped at each positive sample in
/// descending probability order.
fn average_precision(y_true: &[u8], probabilities: &[f64]) -> f64 {
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    if n_pos == 0 {
        return 0.0;
    }
    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

    let mut true_positives = 0usize;
    let mut seen = 0usize;
    let mut ap = 0.0;
    for idx in order {
        seen += 1;
        if y_true[idx] == 1 {
            true_positives += 1;
            ap += true_positives as f64 / seen as f64;
        }
    }
    ap / n_pos as f64
}

fn precision_at_half(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let predicted_pos = y_pred.iter().filter(|&&p| p == 1).count();
    if predicted_pos == 0 {
        return 0.0;
    }
    let true_pos = y_true
        .iter()
        .zip(y_pred)
        .filter(|&(&y, &p)| y == 1 && p == 1)
        .count();
    true_pos as f64 / predicted_pos as f64
}

fn recall_at_half(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let actual_pos = y_true.iter().filter(|&&y| y == 1).count();
    if actual_pos == 0 {
        return 0.0;
    }
    let true_pos = y_true
        .iter()
        .zip(y_pred)
        .filter(|&(&y, &p)| y == 1 && p == 1)
        .count();
    true_pos as f64 / actual_pos as f64
}

/// Importance of feature j = log-loss degradation when column j is shuffled.
/// Seeded per column, so repeated training runs agree.
fn permutation_importance(
    classifier: &Classifier,
    x: &DenseMatrix<f64>,
    y: &[u8],
    seed: u64,
) -> Result<Vec<f64>, PipelineError> {
    let (rows, cols) = x.shape();
    let baseline = log_loss(y, &classifier.predict_proba(x)?);

    let mut importances = Vec::with_capacity(cols);
    for col in 0..cols {
        let mut shuffled: Vec<f64> = (0..rows).map(|r| *x.get((r, col))).collect();
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(col as u64));
        shuffled.shuffle(&mut rng);

        let permuted: Vec<Vec<f64>> = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| if c == col { shuffled[r] } else { *x.get((r, c)) })
                    .collect()
            })
            .collect();
        let permuted = DenseMatrix::from_2d_vec(&permuted)
            .map_err(|e| PipelineError::Prediction(e.to_string()))?;
        let loss = log_loss(y, &classifier.predict_proba(&permuted)?);
        importances.push((loss - baseline).max(0.0));
    }
    Ok(importances)
}

fn log_loss(y_true: &[u8], probabilities: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(probabilities)
        .map(|(&y, &p)| {
            let p = p.clamp(1e-12, 1.0 - 1e-12);
            if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum::<f64>()
        / n
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
