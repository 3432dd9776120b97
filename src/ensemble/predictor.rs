//! Deployable ensemble predictor

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView2};

use crate::model::Artifact;
use crate::stack::concat_columns;

use super::selector::EnsembleMember;

/// A deployed full-data refit artifact with its registration identity
pub struct TrainedModel {
    pub id: usize,
    pub family: String,
    pub level: usize,
    pub artifact: Box<dyn Artifact>,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

/// The single predictor a run deploys
///
/// Holds every successful model (stackers need lower-level predictions as
/// input columns even when those models carry no ensemble weight) and the
/// selected members. Prediction cascades level by level, augmenting the
/// original features with lower-level predictions in registration order —
/// the same column order the stackers were trained on.
pub struct EnsemblePredictor {
    base: Vec<TrainedModel>,
    members: Vec<EnsembleMember>,
}

impl EnsemblePredictor {
    /// Build a predictor from all deployed models and the selected members
    #[must_use]
    pub fn new(mut base: Vec<TrainedModel>, members: Vec<EnsembleMember>) -> Self {
        base.sort_by_key(|model| model.id);
        Self { base, members }
    }

    /// Selected members and their weights
    #[must_use]
    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    /// All deployed models, registration order
    #[must_use]
    pub fn base_models(&self) -> &[TrainedModel] {
        &self.base
    }

    /// Weighted ensemble prediction for new feature rows
    #[must_use]
    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
        let max_level = self.base.iter().map(|m| m.level).max().unwrap_or(0);
        let mut predictions: BTreeMap<usize, Array1<f64>> = BTreeMap::new();

        for level in 0..=max_level {
            let lower: Vec<_> = self
                .base
                .iter()
                .filter(|m| m.level < level)
                .map(|m| predictions[&m.id].view())
                .collect();
            let augmented = concat_columns(features, &lower);
            for model in self.base.iter().filter(|m| m.level == level) {
                predictions.insert(model.id, model.artifact.predict(augmented.view()));
            }
        }

        let mut output = Array1::zeros(features.nrows());
        for member in &self.members {
            if let Some(prediction) = predictions.get(&member.model_id) {
                output.scaled_add(member.weight, prediction);
            }
        }
        output
    }
}

impl std::fmt::Debug for EnsemblePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsemblePredictor")
            .field("base_models", &self.base.len())
            .field("members", &self.members)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct ConstModel(f64);

    impl Artifact for ConstModel {
        fn predict(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
            Array1::from_elem(features.nrows(), self.0)
        }
    }

    /// Returns the value of one input column; used to test the cascade
    struct ColumnEcho(usize);

    impl Artifact for ColumnEcho {
        fn predict(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
            features.column(self.0).to_owned()
        }
    }

    fn trained(id: usize, level: usize, artifact: Box<dyn Artifact>) -> TrainedModel {
        TrainedModel { id, family: format!("m{id}"), level, artifact }
    }

    #[test]
    fn test_weighted_average_of_members() {
        let base = vec![
            trained(0, 0, Box::new(ConstModel(2.0))),
            trained(1, 0, Box::new(ConstModel(4.0))),
        ];
        let members = vec![
            EnsembleMember { model_id: 0, weight: 0.75 },
            EnsembleMember { model_id: 1, weight: 0.25 },
        ];
        let predictor = EnsemblePredictor::new(base, members);
        let preds = predictor.predict(array![[0.0], [1.0]].view());
        assert!((preds[0] - 2.5).abs() < 1e-12);
        assert!((preds[1] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_stacker_sees_lower_level_predictions() {
        // One original feature column; the level-1 model echoes column 1,
        // which is the level-0 model's prediction.
        let base = vec![
            trained(0, 0, Box::new(ConstModel(7.0))),
            trained(1, 1, Box::new(ColumnEcho(1))),
        ];
        let members = vec![EnsembleMember { model_id: 1, weight: 1.0 }];
        let predictor = EnsemblePredictor::new(base, members);
        let preds = predictor.predict(array![[0.5], [0.6]].view());
        assert!((preds[0] - 7.0).abs() < 1e-12);
        assert!((preds[1] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_unweighted_base_model_still_feeds_stacker() {
        let base = vec![
            trained(0, 0, Box::new(ConstModel(3.0))),
            trained(1, 0, Box::new(ConstModel(5.0))),
            // Echoes the second level-0 model's column (original col 0, then ids 0, 1)
            trained(2, 1, Box::new(ColumnEcho(2))),
        ];
        let members = vec![EnsembleMember { model_id: 2, weight: 1.0 }];
        let predictor = EnsemblePredictor::new(base, members);
        let preds = predictor.predict(array![[9.9]].view());
        assert!((preds[0] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_base_models_sorted_by_registration() {
        let base = vec![
            trained(2, 0, Box::new(ConstModel(1.0))),
            trained(0, 0, Box::new(ConstModel(1.0))),
        ];
        let predictor = EnsemblePredictor::new(base, Vec::new());
        let ids: Vec<usize> = predictor.base_models().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }
}
