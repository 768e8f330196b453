// src/casts/mod.rs
pub mod feed;
pub mod normalize;
pub mod paginate;
pub mod rank;
pub mod service;
pub mod types;

pub use feed::{CastFeed, NeynarFeed};
pub use service::{parse_author_id, CastService, InvalidAuthorId};
pub use types::{Author, Cast, Engagement, Link, PageResult, RankedResult};
