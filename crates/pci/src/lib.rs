//! Portable Custom Interactions: loading widget runtimes and rendering them.
//!
//! A [`PciLoader`] pulls one runtime bundle through a scoped AMD loader,
//! collects the widget it registers into a private [`PciRegistry`] and
//! renders instances through that registry. Loading and rendering are timed
//! against one shared budget, see [`LoadOptions`].

mod config;
mod interaction;
mod loader;
mod registry;
pub mod response;

pub use config::{BOUND_TO, Config, DEFAULT_LOAD_TIMEOUT_MS, LoadOptions, ONDONE, ONREADY, PROPERTIES, STATUS, TEMPLATE_VARIABLES};
pub use interaction::{GET_RESPONSE, GET_STATE, Interaction, ONCOMPLETED};
pub use loader::{CONTEXT_NAME, LOAD_TIMEOUT_MESSAGE, LoaderStatus, PciLoader, REGISTER, RENDER_TIMEOUT_MESSAGE};
pub use registry::{Descriptor, GET_INSTANCE, INSTANTIATE, PciRegistry, RegistryGetter, TYPE_IDENTIFIER};
pub use response::Response;
