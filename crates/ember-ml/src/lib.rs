//! # ember-ml
//!
//! A self-contained numerical computing and machine learning substrate in
//! pure Rust: a shaped-array tensor engine, a layer-based neural-network
//! trainer, classical estimators, and the preprocessing transformers and
//! metrics that feed fit/train/evaluate loops.
//!
//! ## Modules
//!
//! - **core** — Tensor engine: shape-strict arrays, arithmetic, reductions,
//!   matrix multiply, the shared error taxonomy and seedable RNG helper
//! - **preprocessing** — scalers, power transform, imputation, label/one-hot
//!   encoding, train/test split, k-fold
//! - **metrics** — classification, regression and clustering metrics
//! - **linear** — LinearRegression, Ridge, LogisticRegression
//! - **tree** — decision trees (CART) and random forests
//! - **cluster** — KMeans with k-means++ seeding and restarts
//! - **neighbors** — k-nearest-neighbors classifier and regressor
//! - **svm** — support vector classifier with kernel support
//! - **optim** — SGD (momentum) and Adam
//! - **loss** — MSE, binary and categorical cross-entropy with gradients
//! - **nn** — Dense/Activation/Dropout/BatchNorm layers and the Network
//!   compile/train/evaluate/predict trainer
//! - **export** — portable model specs, int8 quantization, magnitude pruning

/// Core tensor engine and error taxonomy.
pub use ember_ml_core as core;

/// Data preprocessing and split utilities.
pub use ember_ml_preprocessing as preprocessing;

/// Evaluation metrics.
pub use ember_ml_metrics as metrics;

/// Linear models.
pub use ember_ml_linear as linear;

/// Tree-based models.
pub use ember_ml_tree as tree;

/// Clustering algorithms.
pub use ember_ml_cluster as cluster;

/// Nearest neighbors.
pub use ember_ml_neighbors as neighbors;

/// Support vector machines.
pub use ember_ml_svm as svm;

/// Optimizers.
pub use ember_ml_optim as optim;

/// Loss functions.
pub use ember_ml_loss as loss;

/// Neural network layers and trainer.
pub use ember_ml_nn as nn;

/// Model export, quantization and pruning.
pub use ember_ml_export as export;
