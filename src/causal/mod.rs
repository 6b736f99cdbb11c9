//! Causal
//!
//! This module implements the S-Learner meta-algorithm for Conditional
//! Average Treatment Effect (CATE) estimation over tabular data with a
//! categorical treatment assignment: per-treatment fitting of a single
//! flag-augmented model, counterfactual scoring, and uplift-based
//! treatment recommendation.
pub mod slearner;
