/// Execution classes used to tag spawned loader work in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// One serialized import window of a scoped module loader.
	ImportWindow,
	/// Loading a widget runtime and waiting for its registration.
	WidgetLoad,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ImportWindow => "import_window",
			Self::WidgetLoad => "widget_load",
		}
	}
}
