//! Static site builder for tsswf projects.
//!
//! Renders every page under `src/pages/` into the skeleton, inlines the styles
//! and scripts of the components each page uses, and copies global assets.

pub mod assets;
pub mod builder;

pub use assets::{AssetError, AssetPipeline};
pub use builder::{BuildConfig, BuildError, BuildResult, PageFailure, StaticBuilder};
