//! Services module
//!
//! Business logic services that coordinate between the HTTP layer, the
//! viewer engine and the repository.

pub mod annotations;
pub mod library;

pub use annotations::AnnotationsService;
pub use library::LibraryService;
