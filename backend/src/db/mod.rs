//! Storage layer for the relief engine.
//!
//! The engine talks to storage only through the traits in [`repository`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  services (orchestrator, applier, ...)       │
//! └───────────────────┬──────────────────────────┘
//!                     │ Arc<dyn FullRepository>
//! ┌───────────────────▼──────────────────────────┐
//! │  repository traits                           │
//! └──────────┬───────────────────────┬───────────┘
//!            │                       │
//!   ┌────────▼────────┐    ┌─────────▼─────────┐
//!   │ LocalRepository │    │ PostgresRepository│
//!   │   (in-memory)   │    │ (postgres-repo)   │
//!   └─────────────────┘    └───────────────────┘
//! ```
//!
//! Use [`RepositoryFactory::from_environment`] to pick a backend at startup.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::RepositoryConfig;
pub use repositories::{LocalRepository, SeedData};
#[cfg(feature = "postgres-repo")]
pub use repositories::{PostgresConfig, PostgresRepository};
pub use repository::{
    ErrorContext, FullRepository, RecommendationRepository, ReliefDataRepository,
    RepositoryError, RepositoryResult,
};
