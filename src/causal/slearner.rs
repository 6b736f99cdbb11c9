//! S-Learner meta-learner.
//!
//! The S-Learner estimates the CATE with a single model per treatment,
//! augmented with a binary `is_treatment` feature: each treatment group is
//! paired with the control group, a model is fitted on that two-group
//! subset, and counterfactual outcomes are simulated by scoring the whole
//! population twice with the flag forced to 1 and to 0. The per-unit
//! difference is the uplift, and the treatment with the best positive
//! uplift is recommended.
//!
//! References:
//! [1] https://matheusfacure.github.io/python-causality-handbook/21-Meta-Learners.html
//! [2] https://causalml.readthedocs.io/en/latest/methodology.html
use crate::data::{Column, DataFrame};
use crate::errors::UpliftError;
use crate::learner::{Learner, LearnerFactory, LearnerLog, Pipeline, Predictor};
use hashbrown::HashMap;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the transient binary treatment indicator feature.
pub const TREATMENT_FEATURE: &str = "is_treatment";

/// Append the treatment flag to a model's feature list.
pub fn append_treatment_feature(features: &[String]) -> Vec<String> {
    let mut out = features.to_vec();
    out.push(TREATMENT_FEATURE.to_string());
    out
}

/// Distinct treatment labels of `treatment_column`, excluding the control
/// label, in first-seen row order.
///
/// The returned order is fixed here and threaded through fitting and
/// simulation; it is the tie-break authority for treatment recommendation.
pub fn unique_treatments(
    df: &DataFrame,
    treatment_column: &str,
    control_name: &str,
) -> Result<Vec<String>, UpliftError> {
    let values = df.unique_str(treatment_column)?;
    if !values.iter().any(|v| v == control_name) {
        return Err(UpliftError::MissingControl);
    }
    Ok(values.into_iter().filter(|v| v != control_name).collect())
}

/// Rows belonging to one treatment group plus the control group, in their
/// original order.
///
/// Both presence checks run against the full input before any filtering.
pub fn filter_by_treatment(
    df: &DataFrame,
    treatment_column: &str,
    treatment_name: &str,
    control_name: &str,
) -> Result<DataFrame, UpliftError> {
    let values = df.unique_str(treatment_column)?;
    if !values.iter().any(|v| v == control_name) {
        return Err(UpliftError::MissingControl);
    }
    if !values.iter().any(|v| v == treatment_name) {
        return Err(UpliftError::MissingTreatment);
    }
    let assignments = df.str_column(treatment_column)?;
    let mask: Vec<bool> = assignments
        .iter()
        .map(|v| v == treatment_name || v == control_name)
        .collect();
    df.filter(&mask)
}

/// Append the binary treatment flag to a two-group subset: 1.0 where
/// `treatment_column` equals the treatment label, 0.0 where it equals the
/// control label. Operates on a copy; the caller's frame is untouched.
///
/// Validation order is fixed: more than one distinct non-control label is
/// `MultipleTreatments`, then absent control is `MissingControl`, then
/// absent treatment is `MissingTreatment`.
pub fn create_treatment_flag(
    df: &DataFrame,
    treatment_column: &str,
    treatment_name: &str,
    control_name: &str,
) -> Result<DataFrame, UpliftError> {
    let values = df.unique_str(treatment_column)?;
    if values.iter().filter(|v| *v != control_name).count() > 1 {
        return Err(UpliftError::MultipleTreatments);
    }
    if !values.iter().any(|v| v == control_name) {
        return Err(UpliftError::MissingControl);
    }
    if !values.iter().any(|v| v == treatment_name) {
        return Err(UpliftError::MissingTreatment);
    }

    let flag: Vec<f64> = df
        .str_column(treatment_column)?
        .iter()
        .map(|v| if v == treatment_name { 1.0 } else { 0.0 })
        .collect();
    let mut flagged = df.clone();
    flagged.set_column(TREATMENT_FEATURE, Column::Float(flag))?;
    Ok(flagged)
}

/// Fit one learner per treatment label.
///
/// Each treatment, in list order, is paired with the control group, flagged,
/// and fitted independently on its own copied subset; the fits run on the
/// rayon pool. Results are merged back in `treatments` order, so the mapping
/// insertion order and the surfaced error are deterministic regardless of
/// completion order. Any per-treatment failure aborts the whole call; no
/// partially-fitted mapping is ever returned.
pub fn fit_by_treatment(
    df: &DataFrame,
    learner: &dyn Learner,
    treatment_column: &str,
    control_name: &str,
    treatments: &[String],
) -> Result<(HashMap<String, Box<dyn Predictor>>, HashMap<String, LearnerLog>), UpliftError> {
    let fits: Vec<Result<_, UpliftError>> = treatments
        .par_iter()
        .map(|treatment| {
            let subset = filter_by_treatment(df, treatment_column, treatment, control_name)?;
            let flagged =
                create_treatment_flag(&subset, treatment_column, treatment, control_name)?;
            info!(
                "Fitting treatment {} against control {} on {} rows.",
                treatment,
                control_name,
                flagged.n_rows()
            );
            learner.fit(&flagged)
        })
        .collect();

    let mut fitted_learners: HashMap<String, Box<dyn Predictor>> =
        HashMap::with_capacity(treatments.len());
    let mut learner_logs: HashMap<String, LearnerLog> = HashMap::with_capacity(treatments.len());
    for (treatment, fit) in treatments.iter().zip(fits) {
        let out = fit?;
        fitted_learners.insert(treatment.clone(), out.predictor);
        learner_logs.insert(treatment.clone(), out.log);
    }
    Ok((fitted_learners, learner_logs))
}

/// Removes the treatment flag from the working frame when the scoring scope
/// exits, whether normally or through an error.
struct FlagGuard<'a> {
    frame: &'a mut DataFrame,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.frame.drop_column(TREATMENT_FEATURE);
    }
}

/// Score a population under a forced counterfactual.
///
/// Overwrites (creating it if absent) the treatment flag on `df` with all
/// 1.0 when `as_treatment`, all 0.0 otherwise, runs the predictor on the
/// full feature set, and extracts the prediction column aligned to row
/// order. The flag never survives on `df` past this call, on any exit path.
pub fn predict_by_treatment_flag(
    df: &mut DataFrame,
    predictor: &dyn Predictor,
    as_treatment: bool,
    prediction_column: &str,
) -> Result<Vec<f64>, UpliftError> {
    let flag = vec![if as_treatment { 1.0 } else { 0.0 }; df.n_rows()];
    df.set_column(TREATMENT_FEATURE, Column::Float(flag))?;

    let guard = FlagGuard { frame: df };
    let scored = predictor.predict(&*guard.frame)?;
    Ok(scored.float_column(prediction_column)?.to_vec())
}

/// Simulate the effect of every treatment over a population and recommend
/// one treatment per row.
///
/// For each treatment label, in list order, the population is scored as
/// treated and as control via [`predict_by_treatment_flag`], and three
/// columns are appended:
/// `treatment_<label>__<prediction_column>_on_treatment`, the matching
/// `_on_control`, and `treatment_<label>__uplift` (their difference).
/// Afterwards, per row, `uplift` is the maximum per-label uplift (ties go
/// to the first label in `treatments` order) and `suggested_treatment` is
/// the control label when that maximum is non-positive, else the winning
/// treatment label.
pub fn simulate_treatment_effect(
    df: &DataFrame,
    treatments: &[String],
    control_name: &str,
    learners: &HashMap<String, Box<dyn Predictor>>,
    prediction_column: &str,
) -> Result<DataFrame, UpliftError> {
    let n = df.n_rows();
    let mut scored = df.clone();
    let mut uplifts: Vec<(&str, Vec<f64>)> = Vec::with_capacity(treatments.len());

    for treatment in treatments {
        let predictor = learners
            .get(treatment)
            .ok_or(UpliftError::MissingTreatment)?;
        let on_treatment =
            predict_by_treatment_flag(&mut scored, predictor.as_ref(), true, prediction_column)?;
        let on_control =
            predict_by_treatment_flag(&mut scored, predictor.as_ref(), false, prediction_column)?;
        let uplift: Vec<f64> = on_treatment
            .iter()
            .zip(&on_control)
            .map(|(t, c)| t - c)
            .collect();

        scored.set_column(
            &format!("treatment_{treatment}__{prediction_column}_on_treatment"),
            Column::Float(on_treatment),
        )?;
        scored.set_column(
            &format!("treatment_{treatment}__{prediction_column}_on_control"),
            Column::Float(on_control),
        )?;
        scored.set_column(
            &format!("treatment_{treatment}__uplift"),
            Column::Float(uplift.clone()),
        )?;
        uplifts.push((treatment.as_str(), uplift));
    }

    let mut max_uplift = Vec::with_capacity(n);
    let mut suggested = Vec::with_capacity(n);
    for i in 0..n {
        let mut best = f64::NEG_INFINITY;
        let mut best_label = control_name;
        // Strict comparison keeps the first maximal label on ties.
        for (label, uplift) in &uplifts {
            if uplift[i] > best {
                best = uplift[i];
                best_label = *label;
            }
        }
        max_uplift.push(best);
        suggested.push(if best <= 0.0 {
            control_name.to_string()
        } else {
            best_label.to_string()
        });
    }
    scored.set_column("uplift", Column::Float(max_uplift))?;
    scored.set_column("suggested_treatment", Column::Str(suggested))?;

    Ok(scored)
}

/// A fitted S-Learner: the owned state behind treatment-effect scoring.
///
/// Holds one fitted predictor per treatment label together with the label
/// order resolved at fit time, and scores any population on demand.
pub struct SLearnerModel {
    treatments: Vec<String>,
    control_name: String,
    prediction_column: String,
    learners: HashMap<String, Box<dyn Predictor>>,
}

impl SLearnerModel {
    /// Treatment labels in their resolution order.
    pub fn treatments(&self) -> &[String] {
        &self.treatments
    }

    /// Score a population: per-treatment counterfactual predictions, uplift
    /// columns, and the per-row treatment recommendation.
    pub fn predict(&self, df: &DataFrame) -> Result<DataFrame, UpliftError> {
        simulate_treatment_effect(
            df,
            &self.treatments,
            &self.control_name,
            &self.learners,
            &self.prediction_column,
        )
    }
}

// The fitted predictors are opaque trait objects, so only the label order
// and naming configuration are shown.
impl fmt::Debug for SLearnerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SLearnerModel")
            .field("treatments", &self.treatments)
            .field("control_name", &self.control_name)
            .field("prediction_column", &self.prediction_column)
            .finish_non_exhaustive()
    }
}

/// Structured log of one S-Learner fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SLearnerLog {
    /// Each treatment's underlying learner log, keyed by treatment label.
    pub learners: HashMap<String, LearnerLog>,
    /// The flag-augmented feature list the underlying models were fitted on.
    pub causal_features: Vec<String>,
}

/// Everything [`SLearner::fit`] produces.
#[derive(Debug)]
pub struct SLearnerFit {
    /// The fitted model, reusable on any future population.
    pub model: SLearnerModel,
    /// The training frame scored through the fitted model.
    pub scored: DataFrame,
    /// The fit log.
    pub log: SLearnerLog,
}

/// S-Learner (Single Learner) configuration.
///
/// Estimates $Y \approx \mu(X, W)$ with one model per treatment group and
/// recommends per unit the treatment maximizing
/// CATE(x) = $\mu(x, 1) - \mu(x, 0)$.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SLearner {
    /// Column holding the categorical treatment assignment of each row.
    pub treatment_column: String,
    /// Label of the control group within the treatment column.
    pub control_name: String,
    /// Prediction column the underlying model writes.
    pub prediction_column: String,
}

impl SLearner {
    pub fn new(treatment_column: &str, control_name: &str, prediction_column: &str) -> Self {
        SLearner {
            treatment_column: treatment_column.to_string(),
            control_name: control_name.to_string(),
            prediction_column: prediction_column.to_string(),
        }
    }

    /// Fit the S-Learner.
    ///
    /// Reads the factory's declared feature list, augments it with the
    /// treatment flag, resolves the treatment labels, fits one model (plus
    /// any `transformers`, chained after it) per treatment, and scores the
    /// training frame through the fitted model.
    ///
    /// * `df` - Training frame with features, treatment and target columns.
    /// * `factory` - Constructor for the underlying model, parameterized by
    ///   its feature list.
    /// * `transformers` - Learner stages applied after the model within each
    ///   per-treatment fit, e.g. probability calibrators.
    pub fn fit(
        &self,
        df: &DataFrame,
        factory: &dyn LearnerFactory,
        transformers: Vec<Box<dyn Learner>>,
    ) -> Result<SLearnerFit, UpliftError> {
        let causal_features = append_treatment_feature(&factory.features());
        let treatments = unique_treatments(df, &self.treatment_column, &self.control_name)?;
        info!(
            "Fitting S-Learner over {} treatment(s) with features {:?}.",
            treatments.len(),
            causal_features
        );

        let base = factory.with_features(causal_features.clone());
        let learner: Box<dyn Learner> = if transformers.is_empty() {
            base
        } else {
            let mut stages = vec![base];
            stages.extend(transformers);
            Box::new(Pipeline::new(stages))
        };

        let (fitted_learners, learner_logs) = fit_by_treatment(
            df,
            learner.as_ref(),
            &self.treatment_column,
            &self.control_name,
            &treatments,
        )?;

        let model = SLearnerModel {
            treatments,
            control_name: self.control_name.clone(),
            prediction_column: self.prediction_column.clone(),
            learners: fitted_learners,
        };
        let scored = model.predict(df)?;
        let log = SLearnerLog {
            learners: learner_logs,
            causal_features,
        };
        Ok(SLearnerFit { model, scored, log })
    }
}
