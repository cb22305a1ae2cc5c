//! Reference-counted wrapper around a native engine pointer.
//!
//! Every handle derived from the same file shares one re-entrant *graph
//! lock*. Disposal takes that lock before taking the pointer away, and every
//! dereference runs inside it, so a dispose issued on the control thread
//! either happens before a worker's access (which then sees a disposed
//! handle) or waits until that access has finished.
//!
//! A handle may adopt a dependency from another graph (a view model instance
//! bound across files). Code that needs two graphs at once takes them through
//! [`lock_pair`], and a release never waits on a foreign graph while it still
//! holds its own: foreign dependencies are released after the guard is
//! dropped. A caller holding a graph guard across a release gives that up.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use serde::{Deserialize, Serialize};

use crate::engine::{NativeEngine, NativeRef};
use crate::error::RuntimeError;
use crate::refcount::RefCount;
use crate::Result;

/// Kinds of reference-counted objects, used in diagnostics and errors.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    File,
    Artboard,
    LinearAnimationInstance,
    StateMachineInstance,
    ViewModelInstance,
    Renderer,
    Surface,
    Controller,
}

impl HandleKind {
    pub fn name(&self) -> &'static str {
        match self {
            HandleKind::File => "File",
            HandleKind::Artboard => "Artboard",
            HandleKind::LinearAnimationInstance => "LinearAnimationInstance",
            HandleKind::StateMachineInstance => "StateMachineInstance",
            HandleKind::ViewModelInstance => "ViewModelInstance",
            HandleKind::Renderer => "Renderer",
            HandleKind::Surface => "Surface",
            HandleKind::Controller => "Controller",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Guard returned by [`NativeHandle::lock`].
pub type GraphGuard<'a> = ReentrantMutexGuard<'a, ()>;

struct HandleState {
    refs: RefCount,
    pointer: Option<NativeRef>,
    dependencies: Vec<NativeHandle>,
}

struct HandleInner {
    kind: HandleKind,
    engine: Arc<dyn NativeEngine>,
    graph: Arc<ReentrantMutex<()>>,
    state: Mutex<HandleState>,
}

impl HandleInner {
    fn shares_graph(&self, other: &NativeHandle) -> bool {
        Arc::ptr_eq(&self.graph, &other.inner.graph)
    }

    /// Releases adopted dependencies (newest first), then the pointer itself.
    /// Dependencies from another graph are pushed onto `foreign` instead.
    /// Caller holds the graph lock.
    fn dispose(
        &self,
        dependencies: Vec<NativeHandle>,
        pointer: Option<NativeRef>,
        foreign: &mut Vec<NativeHandle>,
    ) {
        for dependency in dependencies.into_iter().rev() {
            if !self.shares_graph(&dependency) {
                foreign.push(dependency);
                continue;
            }
            if let Err(err) = dependency.release_within(foreign) {
                log::warn!("{}: dependency release failed: {err}", self.kind);
            }
        }
        if let Some(ptr) = pointer {
            log::trace!("disposing {} {}", self.kind, ptr);
            self.engine.dispose(self.kind, ptr);
        }
    }
}

fn release_foreign(owner: HandleKind, foreign: Vec<NativeHandle>) {
    for dependency in foreign {
        if let Err(err) = dependency.release() {
            log::warn!("{owner}: dependency release failed: {err}");
        }
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let Some(ptr) = state.pointer.take() else {
            return;
        };
        log::warn!(
            "{} {} dropped with {} outstanding reference(s); disposing",
            self.kind,
            ptr,
            state.refs.count()
        );
        let dependencies = std::mem::take(&mut state.dependencies);
        let mut foreign = Vec::new();
        {
            let graph = Arc::clone(&self.graph);
            let _graph = graph.lock();
            self.dispose(dependencies, Some(ptr), &mut foreign);
        }
        release_foreign(self.kind, foreign);
    }
}

/// Shared, reference-counted native object.
///
/// Cloning a `NativeHandle` shares the same count; it does not acquire. Use
/// [`acquire`](Self::acquire) to take an additional owning reference.
#[derive(Clone)]
pub struct NativeHandle {
    inner: Arc<HandleInner>,
}

impl NativeHandle {
    /// Wraps a pointer that starts a new handle graph (a file or renderer).
    pub(crate) fn root(kind: HandleKind, engine: Arc<dyn NativeEngine>, ptr: NativeRef) -> Self {
        Self::build(kind, engine, Arc::new(ReentrantMutex::new(())), ptr)
    }

    /// Wraps a pointer derived from `self`, sharing its engine and graph lock.
    pub(crate) fn derive(&self, kind: HandleKind, ptr: NativeRef) -> Self {
        Self::build(
            kind,
            Arc::clone(&self.inner.engine),
            Arc::clone(&self.inner.graph),
            ptr,
        )
    }

    fn build(
        kind: HandleKind,
        engine: Arc<dyn NativeEngine>,
        graph: Arc<ReentrantMutex<()>>,
        ptr: NativeRef,
    ) -> Self {
        log::trace!("created {kind} {ptr}");
        Self {
            inner: Arc::new(HandleInner {
                kind,
                engine,
                graph,
                state: Mutex::new(HandleState {
                    refs: RefCount::new(kind),
                    pointer: Some(ptr),
                    dependencies: Vec::new(),
                }),
            }),
        }
    }

    #[inline]
    pub fn kind(&self) -> HandleKind {
        self.inner.kind
    }

    /// True until the count reaches zero and the pointer is disposed.
    pub fn has_object(&self) -> bool {
        self.inner.state.lock().pointer.is_some()
    }

    pub fn ref_count(&self) -> usize {
        self.inner.state.lock().refs.count()
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.state.lock().dependencies.len()
    }

    /// Adds an owning reference. Fails on a disposed handle.
    pub fn acquire(&self) -> Result<usize> {
        let _graph = self.inner.graph.lock();
        self.inner.state.lock().refs.acquire()
    }

    /// Drops an owning reference, disposing the native object (after its
    /// dependencies) when the count reaches zero.
    pub fn release(&self) -> Result<usize> {
        let mut foreign = Vec::new();
        let released = self.release_within(&mut foreign);
        release_foreign(self.kind(), foreign);
        released
    }

    /// [`release`](Self::release) minus the foreign dependencies, which are
    /// left in `foreign` for the outermost caller.
    fn release_within(&self, foreign: &mut Vec<NativeHandle>) -> Result<usize> {
        let _graph = self.inner.graph.lock();
        let (dependencies, pointer) = {
            let mut state = self.inner.state.lock();
            let count = state.refs.release()?;
            if count > 0 {
                return Ok(count);
            }
            (
                std::mem::take(&mut state.dependencies),
                state.pointer.take(),
            )
        };
        self.inner.dispose(dependencies, pointer, foreign);
        Ok(0)
    }

    /// Holds the graph lock. Disposal of any handle in this graph waits
    /// until the guard is dropped. The lock is re-entrant, so handle calls
    /// made while holding it from the same thread do not deadlock.
    pub fn lock(&self) -> GraphGuard<'_> {
        self.inner.graph.lock()
    }

    /// Runs `f` against the live pointer, inside the graph lock.
    pub fn with_object<R>(&self, f: impl FnOnce(&dyn NativeEngine, NativeRef) -> R) -> Result<R> {
        self.with_object_if_alive(f)
            .ok_or(RuntimeError::UseAfterDispose { kind: self.kind() })
    }

    /// Like [`with_object`](Self::with_object) but reports a disposed handle
    /// as `None`. Worker-side code uses this to skip objects that were
    /// disposed out from under it.
    pub fn with_object_if_alive<R>(
        &self,
        f: impl FnOnce(&dyn NativeEngine, NativeRef) -> R,
    ) -> Option<R> {
        let _graph = self.inner.graph.lock();
        let ptr = self.inner.state.lock().pointer?;
        Some(f(self.inner.engine.as_ref(), ptr))
    }

    /// Adopts one reference of `child`; it is released when `self` is
    /// disposed or on [`release_dependency`](Self::release_dependency).
    pub fn retain_dependency(&self, child: NativeHandle) -> Result<()> {
        let _graph = self.inner.graph.lock();
        let mut state = self.inner.state.lock();
        if state.pointer.is_none() {
            return Err(RuntimeError::UseAfterDispose { kind: self.kind() });
        }
        state.dependencies.push(child);
        Ok(())
    }

    /// Removes `child` from the dependency list and releases the reference
    /// adopted for it. Returns false when `child` was not a dependency,
    /// including when `self` has already been disposed.
    pub fn release_dependency(&self, child: &NativeHandle) -> Result<bool> {
        let removed = {
            let _graph = self.inner.graph.lock();
            let mut state = self.inner.state.lock();
            state
                .dependencies
                .iter()
                .position(|dep| dep.ptr_eq(child))
                .map(|index| state.dependencies.remove(index))
        };
        match removed {
            Some(dependency) => {
                dependency.release()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_dependency(&self, child: &NativeHandle) -> bool {
        self.inner
            .state
            .lock()
            .dependencies
            .iter()
            .any(|dep| dep.ptr_eq(child))
    }

    pub(crate) fn dependencies_of(&self, kind: HandleKind) -> Vec<NativeHandle> {
        self.inner
            .state
            .lock()
            .dependencies
            .iter()
            .filter(|dep| dep.kind() == kind)
            .cloned()
            .collect()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &NativeHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakHandle {
        WeakHandle(Arc::downgrade(&self.inner))
    }
}

/// Holds the graph locks of `a` and `b`, taken lowest address first so two
/// threads locking the same pair of graphs cannot wait on each other.
pub(crate) fn lock_pair<'a>(
    a: &'a NativeHandle,
    b: &'a NativeHandle,
) -> (GraphGuard<'a>, Option<GraphGuard<'a>>) {
    if a.inner.shares_graph(b) {
        return (a.lock(), None);
    }
    let (first, second) = if Arc::as_ptr(&a.inner.graph) < Arc::as_ptr(&b.inner.graph) {
        (a, b)
    } else {
        (b, a)
    };
    let first = first.lock();
    (first, Some(second.lock()))
}

impl PartialEq for NativeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for NativeHandle {}

impl Hash for NativeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("NativeHandle")
            .field("kind", &self.inner.kind)
            .field("refs", &state.refs.count())
            .field("pointer", &state.pointer)
            .finish()
    }
}

/// Non-owning back reference from a child to its parent handle.
#[derive(Clone)]
pub(crate) struct WeakHandle(Weak<HandleInner>);

impl WeakHandle {
    pub(crate) fn upgrade(&self) -> Option<NativeHandle> {
        self.0.upgrade().map(|inner| NativeHandle { inner })
    }
}

/// Common surface of every typed handle.
pub trait NativeObject {
    fn handle(&self) -> &NativeHandle;

    fn acquire(&self) -> Result<usize> {
        self.handle().acquire()
    }

    fn release(&self) -> Result<usize> {
        self.handle().release()
    }

    fn has_object(&self) -> bool {
        self.handle().has_object()
    }

    fn ref_count(&self) -> usize {
        self.handle().ref_count()
    }
}

macro_rules! native_object {
    ($ty:ty) => {
        impl $crate::handle::NativeObject for $ty {
            fn handle(&self) -> &$crate::handle::NativeHandle {
                &self.handle
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.handle.ptr_eq(&other.handle)
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.handle.hash(state);
            }
        }
    };
}

pub(crate) use native_object;
