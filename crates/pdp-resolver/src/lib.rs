//! Piece <-> blob resolution and deduped commP computation.

pub mod commp_pipeline;
pub mod resolver;

pub use commp_pipeline::{CommpPipeline, CommpResult};
pub use resolver::{PieceResolver, ResolveResult};
