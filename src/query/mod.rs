pub mod engine;

pub use engine::{
    DEFAULT_SEARCH_LIMIT, MatchTier, PayloadEncoding, QueryService, Statistics, UnitDetail, UnitPayload,
    UnitSummary,
};
