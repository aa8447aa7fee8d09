//! Extension modules
//!
//! An extension is initialized once against an [`ExtensionContext`], through
//! which it adds to the same tables the built-ins live in: lib natives,
//! codecs, devices and datatype behaviors. Extensions are shut down in
//! reverse load order when the interpreter is dropped.

use super::codec::Codec;
use super::device::Device;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::natives::NativeFn;
use crate::interpreter::type_system::TypeEntry;
use crate::memory::value::Kind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    #[error("cannot register {name}: {reason}")]
    Registration { name: String, reason: String },
    #[error("extension {name} failed: {reason}")]
    Failed { name: String, reason: String },
}

pub trait Extension {
    fn name(&self) -> &str;

    fn init(&mut self, context: &mut ExtensionContext<'_>) -> Result<(), ExtensionError>;

    fn quit(&mut self) -> Result<(), ExtensionError> {
        Ok(())
    }
}

/// Registration surface handed to [`Extension::init`]
pub struct ExtensionContext<'a> {
    interp: &'a mut Interpreter,
}

impl ExtensionContext<'_> {
    pub fn register_native(&mut self, name: &str, spec: &str, f: NativeFn) -> Result<(), ExtensionError> {
        self.interp
            .register_native(name, spec, f)
            .map(|_| ())
            .map_err(|failure| ExtensionError::Registration {
                name: name.to_string(),
                reason: failure.to_string(),
            })
    }

    pub fn register_codec(&mut self, kind: Kind, extensions: &[&str], codec: Box<dyn Codec>) {
        self.interp.codecs.register(kind, extensions, codec);
    }

    pub fn register_device(&mut self, scheme: &str, device: Box<dyn Device>) {
        self.interp.devices.register(scheme, device);
    }

    /// Current behaviors of a datatype, as a base for an override
    pub fn type_entry(&self, kind: Kind) -> TypeEntry {
        *self.interp.types.entry(kind)
    }

    pub fn override_type(&mut self, kind: Kind, entry: TypeEntry) {
        self.interp.types.set(kind, entry);
    }
}

impl Interpreter {
    /// Initialize an extension and keep it until shutdown
    pub fn load_extension(&mut self, mut extension: Box<dyn Extension>) -> Result<(), ExtensionError> {
        let mut context = ExtensionContext { interp: self };
        extension.init(&mut context)?;
        log::debug!("loaded extension {}", extension.name());
        self.extensions.push(extension);
        Ok(())
    }

    /// Names of the loaded extensions, in load order
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    pub(crate) fn shutdown_extensions(&mut self) {
        while let Some(mut extension) = self.extensions.pop() {
            if let Err(err) = extension.quit() {
                log::warn!("{}", err);
            }
        }
    }
}
