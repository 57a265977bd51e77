pub mod api;
pub mod cancel;
pub mod check;
pub mod error;
pub mod filter;
pub mod ids;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod optimistic;
pub mod paths;
pub mod time;

pub use api::*;
pub use cancel::{CancelHandle, CancelToken, cancel_pair, run_cancellable};
pub use check::PathPolicy;
pub use error::{StoreError, StoreResult};
pub use filter::*;
pub use ids::*;
pub use memory::MemoryVersionedStore;
pub use model::*;
pub use normalize::{
    CaseSensitive, PathTransformation, SharedTransformation, UnicodeCaseFold, transformation_for,
};
pub use optimistic::{
    Attempt, RetryPolicy, Sequenced, Versioned, VersionedStore, allocate_sequence,
    increment_sequence, mutate_with_retry,
};
pub use time::{Clock, ManualClock, SystemClock};
