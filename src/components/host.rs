// Host application seam

use super::PushResult;

/// Queries answered by the host application's OS integration
pub trait HostEnvironment: Send + Sync {
    /// Class or identifier of the entry UI surface launched for this application
    fn entry_surface_name(&self) -> PushResult<String>;
}

impl<F> HostEnvironment for F
where
    F: Fn() -> PushResult<String> + Send + Sync,
{
    fn entry_surface_name(&self) -> PushResult<String> {
        self()
    }
}
