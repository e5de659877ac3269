//! Discovery adapters
//!
//! Two heterogeneous sources feed the catalog:
//!
//! - [`ExternalServerAdapter`] queries configured tool servers and also carries
//!   immediate invocations back to them.
//! - [`LocalRegistrationAdapter`] reads in-process event-listener
//!   registrations; calls to those tools are queued, never invoked here.
//!
//! Both produce raw records that are normalized into [`ToolDescriptor`]s by
//! the registry.
//!
//! [`ToolDescriptor`]: crate::tools::ToolDescriptor

mod external;
mod local;

pub use external::{ExternalServerAdapter, RawToolInfo, ServerDiscovery};
pub use local::{
    EventListenerRegistry, ListenerRegistration, LocalRegistrationAdapter, DEFAULT_LOCAL_SOURCE,
};
