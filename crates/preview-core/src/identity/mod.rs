//! Build identity extraction strategies
//!
//! - [`LoadedImageExtractor`]: reads the identity the linker embedded in the
//!   running executable (GNU build-id on Linux/Android, `LC_UUID` on Apple
//!   targets). Memoized for the life of the process.
//! - [`StaticIdentity`]: a value fixed at build or startup time.
//! - [`ChainedExtractor`]: first strategy that yields an identity wins.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod elf;
#[cfg(target_vendor = "apple")]
mod macho;

use std::sync::OnceLock;

use crate::model::BuildIdentity;
use crate::traits::IdentityExtractor;

static LOADED_IMAGE_IDENTITY: OnceLock<Option<BuildIdentity>> = OnceLock::new();

/// Identity of the running executable, read once per process
///
/// Returns `None` on platforms without an introspection strategy and for
/// binaries linked without a build identifier (e.g. `-Wl,--build-id=none`).
pub fn current_identity() -> Option<BuildIdentity> {
    LOADED_IMAGE_IDENTITY
        .get_or_init(|| {
            let identity = read_loaded_image();
            match &identity {
                Some(id) => tracing::debug!("Running build identity: {}", id),
                None => tracing::debug!("Running executable carries no build identity"),
            }
            identity
        })
        .clone()
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn read_loaded_image() -> Option<BuildIdentity> {
    elf::main_executable_build_id().and_then(|bytes| BuildIdentity::new(hex::encode(bytes)))
}

#[cfg(target_vendor = "apple")]
fn read_loaded_image() -> Option<BuildIdentity> {
    macho::first_image_uuid().and_then(|bytes| {
        BuildIdentity::new(uuid::Uuid::from_bytes(bytes).hyphenated().to_string().to_uppercase())
    })
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
fn read_loaded_image() -> Option<BuildIdentity> {
    None
}

/// Extractor backed by the loaded executable image
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadedImageExtractor;

impl IdentityExtractor for LoadedImageExtractor {
    fn extract(&self) -> Option<BuildIdentity> {
        current_identity()
    }
}

/// Extractor returning a fixed identity
///
/// Useful where the build pipeline stamps the identifier into the binary as a
/// constant:
///
/// ```rust
/// use preview_core::identity::StaticIdentity;
///
/// let extractor = StaticIdentity::new(option_env!("PREVIEW_BINARY_ID"));
/// # let _ = extractor;
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<BuildIdentity>);

impl StaticIdentity {
    /// Blank or missing values yield an extractor that reports no identity
    pub fn new(value: Option<&str>) -> Self {
        Self(value.and_then(BuildIdentity::new))
    }
}

impl IdentityExtractor for StaticIdentity {
    fn extract(&self) -> Option<BuildIdentity> {
        self.0.clone()
    }
}

/// Tries each extractor in order
#[derive(Default)]
pub struct ChainedExtractor {
    extractors: Vec<Box<dyn IdentityExtractor>>,
}

impl ChainedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fallback strategy
    pub fn then(mut self, extractor: impl IdentityExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }
}

impl IdentityExtractor for ChainedExtractor {
    fn extract(&self) -> Option<BuildIdentity> {
        self.extractors.iter().find_map(|e| e.extract())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_identity() {
        assert_eq!(
            StaticIdentity::new(Some("ABC")).extract(),
            BuildIdentity::new("ABC")
        );
        assert!(StaticIdentity::new(Some("")).extract().is_none());
        assert!(StaticIdentity::new(None).extract().is_none());
    }

    #[test]
    fn test_chain_uses_first_available() {
        let chain = ChainedExtractor::new()
            .then(StaticIdentity::new(None))
            .then(StaticIdentity::new(Some("second")))
            .then(StaticIdentity::new(Some("third")));
        assert_eq!(chain.extract(), BuildIdentity::new("second"));

        assert!(ChainedExtractor::new().extract().is_none());
    }

    #[test]
    fn test_loaded_image_is_stable() {
        // Whatever the platform yields, it must not change within a process
        assert_eq!(LoadedImageExtractor.extract(), LoadedImageExtractor.extract());
        assert_eq!(current_identity(), LoadedImageExtractor.extract());
    }
}
