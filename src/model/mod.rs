//! Model family plugin contract
//!
//! Learning algorithms are external collaborators behind the [`ModelFamily`]
//! trait: fit, predict (via [`Artifact`]), a pre-fit memory estimate, and
//! cooperative cancellation. The core registers concrete families at startup
//! in a [`FamilyRegistry`] and depends only on the trait.

mod cancel;
mod plugin;

pub use cancel::CancelToken;
pub use plugin::{Artifact, FamilyRegistry, FitError, ModelFamily};
