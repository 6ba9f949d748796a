//! External service clients the saga depends on.

pub mod directory;

pub use directory::{DirectoryError, InMemoryUserDirectory, UserDirectory};
