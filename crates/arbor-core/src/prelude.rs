//! Convenience re-exports of the types most consumers need.

pub use crate::handles::{
    AppControllerRequest, BoundHandle, ClientEnd, ControllerRequest, DirectoryHandle,
    DirectoryRequest, EnvironmentRequest, IoHandle, LauncherRequest, ServerEnd,
    ServiceProviderRequest, ServiceRequest, endpoints,
};
pub use crate::launch::{FlatNamespace, LaunchInfo, ServiceList};
pub use crate::provider::CapabilityProvider;
pub use crate::types::{AppId, EnvironmentId};
pub use crate::urls::canonicalize_url;
