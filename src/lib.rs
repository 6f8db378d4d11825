// Modules
pub mod config;
pub mod constants;
pub mod data;
pub mod dataset;
pub mod errors;
pub mod grower;
pub mod model;
pub mod node;
pub mod sampler;
pub mod scorer;
pub mod sorted;
pub mod table;
pub mod tree;
pub mod utils;

// Individual classes, and functions
pub use config::{JsonIO, TreeConfig};
pub use data::{DataMatrix, Matrix, SparseMatrix};
pub use dataset::{DataManagement, TrainingData};
pub use errors::SortForestError;
pub use model::TreeModel;
pub use scorer::{Scorer, SplitDecision, SquaredErrorScorer};
pub use tree::tree::Tree;
pub use tree::warm_start::WarmStartMode;
