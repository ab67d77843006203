//! Widgets registered by type identifier.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use qti_data::{Closure, Error, Result, Value};

pub const TYPE_IDENTIFIER: &str = "typeIdentifier";
pub const GET_INSTANCE: &str = "getInstance";
/// Alternate entry point name used by some widget runtimes.
pub const INSTANTIATE: &str = "instantiate";

const INVALID_INTERACTION: &str = "Invalid interaction";

/// A widget descriptor accepted by [`PciRegistry::register`].
#[derive(Debug, Clone)]
pub struct Descriptor {
	type_identifier: String,
	get_instance: Closure,
}

impl Descriptor {
	/// Validates a descriptor. It needs a non-empty `typeIdentifier` and a
	/// callable `getInstance` (or `instantiate`).
	pub fn from_value(value: &Value) -> Result<Self> {
		let invalid = || Error::Format(INVALID_INTERACTION.to_string());
		let type_identifier = value
			.get(TYPE_IDENTIFIER)
			.and_then(|id| id.as_str().ok().map(str::to_string))
			.filter(|id| !id.is_empty())
			.ok_or_else(invalid)?;
		let get_instance = [GET_INSTANCE, INSTANTIATE]
			.into_iter()
			.find_map(|key| value.get(key).and_then(|entry| entry.as_closure().ok().cloned()))
			.ok_or_else(invalid)?;

		Ok(Self {
			type_identifier,
			get_instance,
		})
	}

	pub fn type_identifier(&self) -> &str {
		&self.type_identifier
	}
}

#[derive(Debug, Default)]
pub struct PciRegistry {
	widgets: RwLock<HashMap<String, Descriptor>>,
}

impl PciRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a widget, replacing any earlier one with the same identifier.
	pub fn register(&self, descriptor: &Value) -> Result<()> {
		let descriptor = Descriptor::from_value(descriptor)?;
		tracing::debug!(type_identifier = descriptor.type_identifier(), "pci.registry.register");
		self.widgets.write().insert(descriptor.type_identifier.clone(), descriptor);
		Ok(())
	}

	/// Calls the widget's `getInstance(container, configuration, state)`.
	///
	/// Whatever the widget returns is ignored; the rendered instance arrives
	/// through `configuration.onready`.
	pub fn get_instance(&self, type_identifier: &str, container: Value, configuration: Value, state: Value) -> Result<()> {
		let descriptor = self
			.widgets
			.read()
			.get(type_identifier)
			.cloned()
			.ok_or_else(|| Error::NotFound(type_identifier.to_string()))?;

		tracing::trace!(type_identifier, "pci.registry.get_instance");
		descriptor.get_instance.call(&[container, configuration, state])?;
		Ok(())
	}

	pub fn contains(&self, type_identifier: &str) -> bool {
		self.widgets.read().contains_key(type_identifier)
	}

	pub fn len(&self) -> usize {
		self.widgets.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.widgets.read().is_empty()
	}

	pub fn type_identifiers(&self) -> Vec<String> {
		let mut ids: Vec<_> = self.widgets.read().keys().cloned().collect();
		ids.sort();
		ids
	}
}

/// Handle a loaded widget runtime resolves to.
///
/// Clones share the same registry; the getter is what every successful
/// [`PciLoader::load`](crate::PciLoader::load) on one loader returns.
#[derive(Debug, Clone)]
pub struct RegistryGetter(Arc<PciRegistry>);

impl RegistryGetter {
	pub fn new(registry: PciRegistry) -> Self {
		Self(Arc::new(registry))
	}

	pub fn get_instance(&self, type_identifier: &str, container: Value, configuration: Value, state: Value) -> Result<()> {
		self.0.get_instance(type_identifier, container, configuration, state)
	}

	pub fn registry(&self) -> &PciRegistry {
		&self.0
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl PartialEq for RegistryGetter {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}
