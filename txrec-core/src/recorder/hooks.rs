//! Extension recording hooks
//!
//! Payload types often carry protocol-specific extensions the recorder knows
//! nothing about. Hooks registered here get the open handle around every
//! recorded call and may add their own attributes to it.

use std::fmt;

use crate::recording::TxHandle;
use crate::transport::Protocol;

/// Adds attributes for one payload extension
pub trait ExtensionRecording<P: Protocol> {
    /// Called after the handle was opened, before the call is forwarded
    fn record_begin_tx(&self, handle: &TxHandle, trans: &P::Payload);

    /// Called after the call returned, before the handle is ended
    fn record_end_tx(&self, handle: &TxHandle, trans: &P::Payload);
}

/// Ordered set of hooks owned by one recorder
pub struct ExtensionRecordingRegistry<P: Protocol> {
    hooks: Vec<Box<dyn ExtensionRecording<P>>>,
}

impl<P: Protocol> Default for ExtensionRecordingRegistry<P> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<P: Protocol> fmt::Debug for ExtensionRecordingRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRecordingRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl<P: Protocol> ExtensionRecordingRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks run in registration order
    pub fn register(&mut self, hook: Box<dyn ExtensionRecording<P>>) {
        self.hooks.push(hook);
    }

    pub fn with(mut self, hook: impl ExtensionRecording<P> + 'static) -> Self {
        self.register(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn record_begin_tx(&self, handle: &TxHandle, trans: &P::Payload) {
        for hook in &self.hooks {
            hook.record_begin_tx(handle, trans);
        }
    }

    pub fn record_end_tx(&self, handle: &TxHandle, trans: &P::Payload) {
        for hook in &self.hooks {
            hook.record_end_tx(handle, trans);
        }
    }
}
