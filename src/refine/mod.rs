mod features;
mod forest;
mod providers;
mod refine;
mod training;

pub use features::{FeatureParams, FeatureRow, DEFAULT_CHUNK_SIZE};
pub use forest::{num_trees_for, BinaryClassifier, ClassProbs, RandomForest};
pub use providers::{
    Aggregator, BedGraphConservation, ConservationSource, FaidxSequenceSource, SequenceSource,
};
pub use refine::{refine_split, RefineParams, DEFAULT_CUTOFF};
pub use training::{build_training_regions, TrainingParams, TrainingRegions};
