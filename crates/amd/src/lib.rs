//! Scoped AMD module loading over one shared resolution engine.
//!
//! Legacy bundles announce their modules by calling a single global
//! `define(...)`. Several independent consumers can load such bundles in the
//! same process without seeing each other's names: each [`ScopedLoader`]
//! owns a private import map, and while one of its loads is in flight the
//! global hook on the [`Host`] is swapped to an adapter bound to that loader.
//! The swap is serialized process-wide by the host's [`ImportFlow`], one
//! window at a time, in call order.

pub mod define;
mod engine;
mod flow;
mod host;
mod loader;
pub mod memory;

pub use define::{DefineShape, Definition};
pub use engine::{Declaration, Exporter, ImportMap, ModuleContext, Registration, ResolutionEngine, Setter};
pub use flow::{FlowTicket, FlowTurn, ImportFlow};
pub use host::{DefineHook, Disposition, FaultObserver, HookGuard, Host, ObserverGuard, UncaughtHandler};
pub use loader::{ENGINE_FAULT_MARKER, LoadHandle, ScopedLoader, Target};
pub use memory::MemoryEngine;
