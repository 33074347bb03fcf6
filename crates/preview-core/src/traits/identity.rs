// # Identity Extractor Trait
//
// Defines the interface for reading the build identity of the running binary.
//
// ## Implementations
//
// - Loaded-image introspection: `crate::identity::LoadedImageExtractor`
// - Build-time constant: `crate::identity::StaticIdentity`
//
// ## Usage
//
// ```rust,ignore
// use preview_core::IdentityExtractor;
// use preview_core::identity::LoadedImageExtractor;
//
// match LoadedImageExtractor.extract() {
//     Some(id) => println!("running build {}", id),
//     None => println!("this binary carries no build identity"),
// }
// ```

use crate::model::BuildIdentity;

/// Trait for build identity extraction
///
/// # Contract
///
/// - Synchronous and side-effect free
/// - Deterministic for a given running binary, so callers may cache the
///   result for the lifetime of the process
/// - No network or disk I/O beyond metadata already mapped into the process
///
/// Returning `None` is a normal outcome, not an error. The monitor refuses to
/// check for updates when no identity is available.
pub trait IdentityExtractor: Send + Sync {
    /// Extract the identity embedded in the running executable
    fn extract(&self) -> Option<BuildIdentity>;
}

impl<F> IdentityExtractor for F
where
    F: Fn() -> Option<BuildIdentity> + Send + Sync,
{
    fn extract(&self) -> Option<BuildIdentity> {
        self()
    }
}
