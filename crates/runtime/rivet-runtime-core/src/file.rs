use crate::artboard::Artboard;
use crate::context::Runtime;
use crate::engine::Selector;
use crate::error::{LookupKind, RuntimeError};
use crate::handle::{native_object, HandleKind, NativeHandle};
use crate::view_model::ViewModelInstance;
use crate::Result;

/// An imported file. Root of a handle graph.
///
/// Artboards and view model instances handed out by the file are retained
/// as its dependencies, so releasing the file's last reference releases
/// them too. A caller that wants one to outlive the file acquires it.
#[derive(Clone, Debug)]
pub struct File {
    handle: NativeHandle,
}

native_object!(File);

impl File {
    pub fn import(runtime: &Runtime, bytes: &[u8]) -> Result<Self> {
        let engine = runtime.engine();
        let ptr = engine.import_file(bytes)?;
        log::debug!("imported file {ptr} ({} bytes)", bytes.len());
        Ok(Self {
            handle: NativeHandle::root(HandleKind::File, engine.clone(), ptr),
        })
    }

    pub fn artboard_names(&self) -> Result<Vec<String>> {
        self.handle
            .with_object(|engine, ptr| engine.artboard_names(ptr))
    }

    pub fn artboard_count(&self) -> Result<usize> {
        self.artboard_names().map(|names| names.len())
    }

    /// Instances the first artboard in the file.
    pub fn first_artboard(&self) -> Result<Artboard> {
        self.instance_artboard(Selector::Index(0))
    }

    pub fn artboard(&self, name: &str) -> Result<Artboard> {
        self.instance_artboard(Selector::Name(name))
    }

    pub fn artboard_at(&self, index: usize) -> Result<Artboard> {
        self.instance_artboard(Selector::Index(index))
    }

    fn instance_artboard(&self, selector: Selector<'_>) -> Result<Artboard> {
        let _graph = self.handle.lock();
        let ptr = self
            .handle
            .with_object(|engine, ptr| engine.instance_artboard(ptr, selector))?
            .ok_or_else(|| RuntimeError::not_found(LookupKind::Artboard, selector_label(selector)))?;
        let artboard = Artboard::from_handle(self.handle.derive(HandleKind::Artboard, ptr));
        self.handle.retain_dependency(artboard.handle.clone())?;
        Ok(artboard)
    }

    pub fn view_model_names(&self) -> Result<Vec<String>> {
        self.handle
            .with_object(|engine, ptr| engine.view_model_names(ptr))
    }

    /// Instances a view model. `instance` picks a named instance authored in
    /// the file; `None` creates one with default values.
    pub fn view_model_instance(
        &self,
        view_model: &str,
        instance: Option<&str>,
    ) -> Result<ViewModelInstance> {
        let _graph = self.handle.lock();
        let view_model_known = self
            .handle
            .with_object(|engine, ptr| engine.view_model_names(ptr))?
            .iter()
            .any(|name| name == view_model);
        if !view_model_known {
            return Err(RuntimeError::not_found(LookupKind::ViewModel, view_model));
        }
        let ptr = self
            .handle
            .with_object(|engine, ptr| engine.instance_view_model(ptr, view_model, instance))?
            .ok_or_else(|| {
                RuntimeError::not_found(
                    LookupKind::ViewModelInstance,
                    instance.unwrap_or(view_model),
                )
            })?;
        let handle = self.handle.derive(HandleKind::ViewModelInstance, ptr);
        self.handle.retain_dependency(handle.clone())?;
        Ok(ViewModelInstance::from_handle(handle))
    }
}

pub(crate) fn selector_label(selector: Selector<'_>) -> String {
    match selector {
        Selector::Name(name) => name.to_string(),
        Selector::Index(index) => format!("#{index}"),
    }
}
