//! View model instances and the ownership transfer between artboards.

use crate::error::{LookupKind, RuntimeError};
use crate::handle::{native_object, NativeHandle};
use crate::types::PropertyValue;
use crate::Result;

/// A view model instance. Deliberately not `Clone`: moving it between
/// owners goes through [`ViewModelInstance::transfer`].
#[derive(Debug)]
pub struct ViewModelInstance {
    handle: NativeHandle,
}

native_object!(ViewModelInstance);

impl ViewModelInstance {
    pub(crate) fn from_handle(handle: NativeHandle) -> Self {
        Self { handle }
    }

    pub fn name(&self) -> Result<String> {
        self.handle
            .with_object(|engine, ptr| engine.view_model_instance_name(ptr))
    }

    pub fn property(&self, path: &str) -> Result<PropertyValue> {
        self.handle
            .with_object(|engine, ptr| engine.property(ptr, path))?
            .ok_or_else(|| RuntimeError::not_found(LookupKind::Property, path))
    }

    pub fn number(&self, path: &str) -> Result<f32> {
        match self.property(path)? {
            PropertyValue::Number(value) => Ok(value),
            _ => Err(RuntimeError::not_found(LookupKind::Property, path)),
        }
    }

    pub fn string(&self, path: &str) -> Result<String> {
        match self.property(path)? {
            PropertyValue::String(value) => Ok(value),
            _ => Err(RuntimeError::not_found(LookupKind::Property, path)),
        }
    }

    pub fn boolean(&self, path: &str) -> Result<bool> {
        match self.property(path)? {
            PropertyValue::Boolean(value) => Ok(value),
            _ => Err(RuntimeError::not_found(LookupKind::Property, path)),
        }
    }

    pub fn set_number(&self, path: &str, value: f32) -> Result<()> {
        self.write(path, PropertyValue::Number(value))
    }

    pub fn set_string(&self, path: &str, value: impl Into<String>) -> Result<()> {
        self.write(path, PropertyValue::String(value.into()))
    }

    pub fn set_boolean(&self, path: &str, value: bool) -> Result<()> {
        self.write(path, PropertyValue::Boolean(value))
    }

    pub fn fire_trigger(&self, path: &str) -> Result<()> {
        self.write(path, PropertyValue::Trigger)
    }

    fn write(&self, path: &str, value: PropertyValue) -> Result<()> {
        let written = self
            .handle
            .with_object(|engine, ptr| engine.set_property(ptr, path, value))?;
        if written {
            Ok(())
        } else {
            Err(RuntimeError::not_found(LookupKind::Property, path))
        }
    }

    /// Starts moving this instance to another owner, typically an artboard
    /// from a different file. The transfer holds its own reference, so the
    /// instance survives its originating file being released.
    pub fn transfer(self) -> Result<Transfer> {
        self.handle.acquire()?;
        Ok(Transfer {
            handle: Some(self.handle),
        })
    }
}

/// In-flight ownership of a [`ViewModelInstance`].
///
/// Exactly one of [`end`](Self::end), [`dispose`](Self::dispose) or a
/// receiving bind (`Artboard::receive_view_model_instance`) consumes the
/// transfer; dropping it unfinished behaves like `dispose`.
#[derive(Debug)]
#[must_use = "a transfer holds a reference until ended or disposed"]
pub struct Transfer {
    handle: Option<NativeHandle>,
}

impl Transfer {
    /// Hands the transferred reference to the receiver, who now owns it.
    pub fn end(self) -> ViewModelInstance {
        ViewModelInstance::from_handle(self.into_handle())
    }

    /// Gives up the transferred reference without receiving the instance.
    pub fn dispose(mut self) -> Result<usize> {
        let handle = self.take();
        handle.release()
    }

    pub fn ref_count(&self) -> usize {
        self.handle.as_ref().map_or(0, NativeHandle::ref_count)
    }

    /// The transferred handle, still carrying the transfer's reference.
    pub(crate) fn into_handle(mut self) -> NativeHandle {
        self.take()
    }

    fn take(&mut self) -> NativeHandle {
        match self.handle.take() {
            Some(handle) => handle,
            // `end`/`dispose` consume `self`, and Drop is the only other reader.
            None => unreachable!("transfer consumed twice"),
        }
    }
}

impl Drop for Transfer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::warn!("view model transfer dropped without end(); releasing");
            if let Err(err) = handle.release() {
                log::warn!("releasing dropped transfer failed: {err}");
            }
        }
    }
}
