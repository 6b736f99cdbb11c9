// Modules
pub mod causal;
pub mod data;
pub mod errors;
pub mod learner;

// Individual classes, and functions
pub use causal::slearner::{SLearner, SLearnerFit, SLearnerLog, SLearnerModel, TREATMENT_FEATURE};
pub use data::{Column, DataFrame, Series};
pub use errors::UpliftError;
pub use learner::{FitOutput, Learner, LearnerFactory, LearnerLog, Pipeline, Predictor};
