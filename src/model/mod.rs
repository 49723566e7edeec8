//! Pure data structures (DTOs) returned by the route registry.

pub mod envelope;
pub mod photo;
pub mod post;

pub use envelope::*;
pub use photo::*;
pub use post::*;
