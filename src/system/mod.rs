pub mod adapters;
pub mod traits;

#[cfg(windows)]
pub mod hotkeys_win32;
#[cfg(windows)]
pub mod windows;

// Mock implementations for testing
#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks;

// Re-export traits and adapters for easy access
pub use adapters::*;
pub use traits::*;

// Re-export mocks when testing
#[cfg(any(test, feature = "test-mocks"))]
pub use mocks::*;
