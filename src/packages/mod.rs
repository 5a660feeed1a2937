pub mod classify;
pub mod pip;
pub mod repository;

// Re-export commonly used types
pub use pip::PipRepository;
pub use repository::{BuildMode, InstallRequest, PackageRepository, RepoError};
