//! Repository trait definitions for the engine's collaborators.
//!
//! The engine reads rescue requests, warehouses and resources it does not own,
//! and persists the recommendations, distribution logs and feedback it does.
//! Splitting those concerns across traits keeps each implementation focused:
//!
//! - [`error`]: Error types for repository operations
//! - [`relief`]: Read access to requests, warehouses and inventory
//! - [`recommendation`]: Recommendation lifecycle, distribution log and feedback
//!
//! # Convenience Trait Bound
//!
//! For code that needs both capabilities, use the [`FullRepository`] trait bound:
//!
//! ```ignore
//! async fn refresh<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<()> {
//!     let requests = repo.list_open_requests().await?;
//!     let pending = repo.pending_request_refs().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod recommendation;
pub mod relief;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use recommendation::RecommendationRepository;
pub use relief::ReliefDataRepository;

/// Composite trait bound for a complete repository implementation.
pub trait FullRepository: ReliefDataRepository + RecommendationRepository {}

// Blanket implementation: anything implementing both traits is a FullRepository
impl<T> FullRepository for T where T: ReliefDataRepository + RecommendationRepository {}
