mod args;
mod artifact;
mod handle;

pub use args::{coerce_args, display_args, normalize_args};
pub use artifact::{ArtifactStore, ContractArtifact, VerificationSource};
pub use handle::{ContractHandle, IERC20, IOwnable};
