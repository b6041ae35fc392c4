//! Message plugin system
//!
//! Every message received from the chat transport is wrapped in an
//! [`Envelope`] and handed through an ordered chain of plugins before it is
//! forwarded. Plugins may rewrite the text, attach a replacement media file,
//! set a reply target, or veto forwarding altogether.
//!
//! # Lifecycle
//!
//! 1. [`PluginRegistry::build`] resolves the configured plugin ids against a
//!    [`PluginFactories`] table. Unknown or misbehaving plugins are recorded as
//!    [`LoadError`]s and skipped; the registry is always usable.
//! 2. [`init::initialize`] runs the one-time async setup hooks and yields a
//!    [`ReadyRegistry`].
//! 3. [`Pipeline::apply`] runs one message through every plugin, in
//!    configuration order.
//!
//! # Modules
//!
//! - `envelope`: per-message state carried through the chain
//! - `traits`: the plugin contract
//! - `registry`: factory table and registry build
//! - `init`: async initializer
//! - `pipeline`: per-message executor
//! - `config`: plugin entries and pipeline settings
//! - `builtin`: first-party plugins

pub mod builtin;
pub mod config;
pub mod envelope;
pub mod error;
pub mod init;
pub mod pipeline;
pub mod registry;
pub mod traits;

pub use config::{PipelineConfig, PluginEntry};
pub use envelope::{Envelope, FileKind};
pub use error::{LoadError, PluginError};
pub use init::{initialize, InitPolicy, InitReport, ReadyRegistry};
pub use pipeline::Pipeline;
pub use registry::{LoadedPlugin, PluginFactories, PluginFactory, PluginRegistry};
pub use traits::{Plugin, Verdict};
