// # Ignored Store Implementations
//
// Implementations of the IgnoredPreviewStore trait.

pub mod file;
pub mod memory;

pub use file::FileIgnoredStore;
pub use memory::MemoryIgnoredStore;
