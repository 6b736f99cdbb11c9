//! Learner
//!
//! Contracts for the underlying trainable model and its post-fit
//! transformers. The meta-learner engine treats both as opaque: a learner
//! turns a frame into a fitted predictor, the predictions on its own
//! training data, and a structured log.
use crate::data::DataFrame;
use crate::errors::UpliftError;
use std::fmt;

/// Structured log emitted by a learner; owned by the collaborator, carried
/// through opaquely.
pub type LearnerLog = serde_json::Value;

/// A fitted predictor.
///
/// `predict` returns a frame containing at least the prediction column the
/// model was configured with; it must not mutate the input.
pub trait Predictor: Send + Sync {
    fn predict(&self, df: &DataFrame) -> Result<DataFrame, UpliftError>;
}

/// Everything a fit call produces.
pub struct FitOutput {
    /// The fitted predictor.
    pub predictor: Box<dyn Predictor>,
    /// The training frame scored by the fitted predictor.
    pub scored: DataFrame,
    /// The learner's own structured log.
    pub log: LearnerLog,
}

// The predictor is an opaque trait object, so it is elided from the output.
impl fmt::Debug for FitOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitOutput")
            .field("scored", &self.scored)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

/// A trainable model: one required method, taking the training frame.
pub trait Learner: Send + Sync {
    fn fit(&self, df: &DataFrame) -> Result<FitOutput, UpliftError>;
}

/// Instantiates a learner over a configurable feature list.
///
/// The orchestrator reads the declared features, appends the treatment flag,
/// and asks the factory for a learner over the augmented set.
pub trait LearnerFactory: Send + Sync {
    /// Feature columns the model is configured to consume.
    fn features(&self) -> Vec<String>;
    /// Build a learner over the given feature set.
    fn with_features(&self, features: Vec<String>) -> Box<dyn Learner>;
}

/// An ordered sequence of learner stages fitted back to back.
///
/// Stage `k + 1` is fitted on stage `k`'s scored frame, so transformers
/// (e.g. probability calibrators) can consume the base model's predictions.
/// The composed predictor applies every stage's predictor in the same order,
/// and the pipeline log is the array of stage logs.
pub struct Pipeline {
    stages: Vec<Box<dyn Learner>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Learner>>) -> Self {
        Pipeline { stages }
    }
}

impl Learner for Pipeline {
    fn fit(&self, df: &DataFrame) -> Result<FitOutput, UpliftError> {
        let mut predictors: Vec<Box<dyn Predictor>> = Vec::with_capacity(self.stages.len());
        let mut logs: Vec<LearnerLog> = Vec::with_capacity(self.stages.len());
        let mut scored = df.clone();
        for stage in &self.stages {
            let out = stage.fit(&scored)?;
            scored = out.scored;
            predictors.push(out.predictor);
            logs.push(out.log);
        }
        Ok(FitOutput {
            predictor: Box::new(ComposedPredictor { steps: predictors }),
            scored,
            log: serde_json::Value::Array(logs),
        })
    }
}

struct ComposedPredictor {
    steps: Vec<Box<dyn Predictor>>,
}

impl Predictor for ComposedPredictor {
    fn predict(&self, df: &DataFrame) -> Result<DataFrame, UpliftError> {
        let mut scored = df.clone();
        for step in &self.steps {
            scored = step.predict(&scored)?;
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use serde_json::json;

    /// Learner writing `base = x + shift`; used to observe stage chaining.
    struct ShiftLearner {
        input: &'static str,
        output: &'static str,
        shift: f64,
    }

    struct ShiftPredictor {
        input: String,
        output: String,
        shift: f64,
    }

    impl Predictor for ShiftPredictor {
        fn predict(&self, df: &DataFrame) -> Result<DataFrame, UpliftError> {
            let preds: Vec<f64> =
                df.float_column(&self.input)?.iter().map(|x| x + self.shift).collect();
            let mut scored = df.clone();
            scored.set_column(&self.output, Column::Float(preds))?;
            Ok(scored)
        }
    }

    impl Learner for ShiftLearner {
        fn fit(&self, df: &DataFrame) -> Result<FitOutput, UpliftError> {
            let predictor = ShiftPredictor {
                input: self.input.to_string(),
                output: self.output.to_string(),
                shift: self.shift,
            };
            let scored = predictor.predict(df)?;
            Ok(FitOutput {
                predictor: Box::new(predictor),
                scored,
                log: json!({ "stage": self.output, "shift": self.shift }),
            })
        }
    }

    #[test]
    fn test_pipeline_chains_stages() {
        let mut df = DataFrame::new();
        df.set_column("x", Column::Float(vec![1.0, 2.0])).unwrap();

        // Second stage reads the first stage's output column, so chaining is
        // observable in the result.
        let pipe = Pipeline::new(vec![
            Box::new(ShiftLearner {
                input: "x",
                output: "base",
                shift: 1.0,
            }),
            Box::new(ShiftLearner {
                input: "base",
                output: "final",
                shift: 10.0,
            }),
        ]);

        let out = pipe.fit(&df).unwrap();
        assert_eq!(out.scored.float_column("base").unwrap(), &[2.0, 3.0]);
        assert_eq!(out.scored.float_column("final").unwrap(), &[12.0, 13.0]);

        let rescored = out.predictor.predict(&df).unwrap();
        assert_eq!(rescored.float_column("final").unwrap(), &[12.0, 13.0]);

        let logs = out.log.as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["stage"], "base");

        // The fit output is debuggable with the boxed predictor elided.
        let rendered = format!("{out:?}");
        assert!(rendered.contains("FitOutput"));
        assert!(rendered.contains("scored"));
    }

    #[test]
    fn test_pipeline_propagates_stage_error() {
        let mut df = DataFrame::new();
        df.set_column("x", Column::Float(vec![1.0])).unwrap();

        let pipe = Pipeline::new(vec![Box::new(ShiftLearner {
            input: "not_there",
            output: "base",
            shift: 0.0,
        })]);

        assert!(matches!(pipe.fit(&df).unwrap_err(), UpliftError::MissingColumn(_)));
    }
}
