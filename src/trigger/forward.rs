//! Callbacks that forward synchronized values into a render sink.
//!
//! A view binds one [`ForwardAttributes`] per tracked record and one
//! [`ForwardContent`] per (record, watched tag) pair.

use std::sync::Arc;

use tracing::debug;

use crate::address::{Address, Tag};
use crate::error::CallbackError;
use crate::render::RenderSink;

use super::registry::{Callback, TriggerEvent};

/// Writes attribute updates to `render[address][field]`.
pub struct ForwardAttributes {
    render: Arc<dyn RenderSink>,
    address: Address,
}

impl ForwardAttributes {
    #[must_use]
    pub fn new(render: Arc<dyn RenderSink>, address: Address) -> Self {
        Self { render, address }
    }
}

impl Callback for ForwardAttributes {
    fn name(&self) -> &str {
        "forward_attributes"
    }

    fn call(&self, event: &TriggerEvent<'_>) -> Result<(), CallbackError> {
        let TriggerEvent::Attributes { updates, .. } = event else {
            return Err(CallbackError::new(
                self.name(),
                format!("expected attribute event for {}", self.address),
            ));
        };

        debug!(address = %self.address, ?updates, "forwarding attribute update");
        let at = self.render.address(self.address);
        for (field, value) in updates.iter() {
            at.set(field, value)
                .map_err(|e| CallbackError::new(self.name(), e.to_string()))?;
        }
        Ok(())
    }
}

/// Writes content updates to `render[address][sub][tag]`.
pub struct ForwardContent {
    render: Arc<dyn RenderSink>,
    address: Address,
    tag: Tag,
}

impl ForwardContent {
    #[must_use]
    pub fn new(render: Arc<dyn RenderSink>, address: Address, tag: Tag) -> Self {
        Self {
            render,
            address,
            tag,
        }
    }
}

impl Callback for ForwardContent {
    fn name(&self) -> &str {
        "forward_content"
    }

    fn call(&self, event: &TriggerEvent<'_>) -> Result<(), CallbackError> {
        let TriggerEvent::Content { updates, .. } = event else {
            return Err(CallbackError::new(
                self.name(),
                format!("expected content event for {}:{}", self.address, self.tag),
            ));
        };

        debug!(address = %self.address, tag = %self.tag, ?updates, "forwarding content update");
        for (sub, value) in updates.iter() {
            self.render
                .address(self.address)
                .address(*sub)
                .set(&self.tag, value)
                .map_err(|e| CallbackError::new(self.name(), e.to_string()))?;
        }
        Ok(())
    }
}
