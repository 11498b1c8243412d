//! Image builder: dependency install, asset normalization, image definition

pub mod containerfile;
pub mod manifest;
pub mod normalize;
pub mod prepare;

pub use manifest::{Constraint, DependencyManifest, ManifestError, Requirement};
pub use normalize::{mark_executable, normalize_file, strip_carriage_returns};
pub use prepare::{ImageBuilder, PrepareReport, PrepareStage};
