//! Generalized Linear Model fitting for negative binomial data

mod fitting;
pub mod linalg;
mod negative_binomial;

pub use fitting::{fit_feature, fit_features, FeatureFit, GlmFitParams};
pub use negative_binomial::{nb_log_density, nb_mean, nb_weight, MAX_BETA, MIN_MU};
