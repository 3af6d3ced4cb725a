use crate::RuntimeError;
use std::path::Path;

/// Platform dynamic linker primitives.
///
/// Implementations keep whatever they load resident for as long as they live;
/// there is no unload operation.
pub trait DynamicLoader: Send {
    fn name(&self) -> &str;

    /// Load a shared library from an absolute path.
    fn load_path(&mut self, path: &Path) -> Result<(), RuntimeError>;

    /// Load a shared library by logical name through the system search path.
    fn load_system(&mut self, name: &str) -> Result<(), RuntimeError>;
}

pub fn select_backend(name: &str) -> Result<Box<dyn DynamicLoader>, RuntimeError> {
    match name {
        "native" => Ok(Box::new(crate::native::NativeLoader::new())),
        "mock" => Ok(Box::new(crate::mock::MockLoader::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
