//! Feature types.

mod id;
mod model;

pub use id::random_id;
pub use model::{Feature, FeatureMeta, CREATED_AT_POINTER, META_NAMESPACE};
pub(crate) use model::is_tombstone;
