//! Container helpers (the `services` part).

use super::Module;
use rehearsal_core::di::{ServiceDefinition, ServiceInstance};
use rehearsal_core::{AssertionFailure, HarnessResult};
use rehearsal_telemetry::{debug_section, logging::sections};
use std::sync::Arc;

impl Module {
    /// Resolves a service of the running application.
    ///
    /// Fails the test when the container has no such service.
    #[track_caller]
    pub fn grab_service_from_container<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> HarnessResult<Arc<T>> {
        let di = self.di()?;
        if !di.has(name) {
            AssertionFailure::new(format!("Service {name} is not available in container")).raise();
        }
        di.get::<T>(name)
    }

    /// Registers a service and resolves it immediately.
    ///
    /// Fails the test with the resolution error when the definition cannot
    /// be built.
    #[track_caller]
    pub fn add_service_to_container(
        &self,
        name: &str,
        definition: ServiceDefinition,
        shared: bool,
    ) -> HarnessResult<ServiceInstance> {
        let di = self.di()?;
        let service = di.set(name, definition, shared);
        match service.resolve(di) {
            Ok(instance) => {
                debug_section!(sections::SERVICE, service = name, shared, "Service registered");
                Ok(instance)
            }
            Err(e) => AssertionFailure::new(e.to_string()).raise(),
        }
    }
}
