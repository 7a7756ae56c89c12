mod score;
mod smooth;

pub use score::{score_tss_enrichment, TssEnrichment, TssParams};
pub use smooth::loess_smooth;
