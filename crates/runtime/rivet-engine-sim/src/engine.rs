//! [`SimEngine`]: an in-process implementation of [`NativeEngine`].
//!
//! Objects live in a table keyed by fake pointer values. Touching a pointer
//! that is not in the table, or disposing one twice, panics: that is the
//! simulator's equivalent of a segfault, and tests rely on it to prove the
//! handle layer never reaches freed memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use rivet_runtime_core::{
    AdvanceResult, Aabb, AnimationSnapshot, Direction, DrawParams, HandleKind, ImportError,
    InputInfo, InputKind, InputValue, Loop, NativeEngine, NativeRef, PlayableKind, PropertyValue,
    RendererType, ReportedEvent, Selector, SurfaceInfo,
};

use crate::document::{ArtboardDoc, Document, SUPPORTED_MAJOR};
use crate::machine::{InputSlot, Machine};
use crate::timeline::Timeline;

/// Called with the artboard pointer in the middle of every draw.
pub type DrawHook = Arc<dyn Fn(NativeRef) + Send + Sync>;

/// Counters exposed for assertions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub imports: u64,
    pub draws: u64,
    pub artboard_advances: u64,
    pub animation_applies: u64,
}

#[derive(Debug)]
struct ArtboardObj {
    doc: ArtboardDoc,
    nested: Vec<(String, Vec<InputSlot>)>,
    text_runs: Vec<(String, String)>,
    bound_view_model: Option<u64>,
    dirty: bool,
}

#[derive(Debug)]
struct ViewModelObj {
    instance_name: String,
    values: Vec<(String, PropertyValue)>,
}

#[derive(Debug)]
struct RendererObj {
    renderer_type: RendererType,
    surface: Option<SurfaceInfo>,
}

#[derive(Debug)]
enum SimObject {
    File(Arc<Document>),
    Artboard(Box<ArtboardObj>),
    Animation(Timeline),
    StateMachine(Box<Machine>),
    ViewModel(ViewModelObj),
    Renderer(RendererObj),
}

impl SimObject {
    fn kind(&self) -> HandleKind {
        match self {
            SimObject::File(_) => HandleKind::File,
            SimObject::Artboard(_) => HandleKind::Artboard,
            SimObject::Animation(_) => HandleKind::LinearAnimationInstance,
            SimObject::StateMachine(_) => HandleKind::StateMachineInstance,
            SimObject::ViewModel(_) => HandleKind::ViewModelInstance,
            SimObject::Renderer(_) => HandleKind::Renderer,
        }
    }
}

#[derive(Default)]
pub struct SimEngine {
    objects: Mutex<HashMap<u64, SimObject>>,
    next_ptr: AtomicU64,
    disposed: Mutex<HashMap<HandleKind, usize>>,
    stats: Mutex<EngineStats>,
    draw_hook: Mutex<Option<DrawHook>>,
}

impl std::fmt::Debug for SimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEngine")
            .field("live", &self.objects.lock().len())
            .finish()
    }
}

/// Panics with a pointer diagnostic. Stands in for a native crash.
fn fault(ptr: NativeRef, what: &str) -> ! {
    panic!("native fault at {ptr}: {what}")
}

macro_rules! expect_variant {
    ($obj:expr, $ptr:expr, $variant:ident) => {
        match $obj {
            SimObject::$variant(inner) => inner,
            other => fault(
                $ptr,
                &format!("expected {}, found {}", stringify!($variant), other.kind()),
            ),
        }
    };
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of live objects of `kind`.
    pub fn live_count(&self, kind: HandleKind) -> usize {
        self.objects
            .lock()
            .values()
            .filter(|obj| obj.kind() == kind)
            .count()
    }

    pub fn total_live(&self) -> usize {
        self.objects.lock().len()
    }

    /// Number of successful disposals of `kind`.
    pub fn disposed_count(&self, kind: HandleKind) -> usize {
        self.disposed.lock().get(&kind).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    pub fn set_draw_hook(&self, hook: Option<DrawHook>) {
        *self.draw_hook.lock() = hook;
    }

    fn insert(&self, objects: &mut HashMap<u64, SimObject>, object: SimObject) -> NativeRef {
        let raw = 0x1000 + self.next_ptr.fetch_add(1, Ordering::Relaxed) * 0x10;
        objects.insert(raw, object);
        match NativeRef::new(raw) {
            Some(ptr) => ptr,
            None => unreachable!("pointer values start above zero"),
        }
    }

    fn with<R>(&self, ptr: NativeRef, f: impl FnOnce(&mut SimObject) -> R) -> R {
        let mut objects = self.objects.lock();
        match objects.get_mut(&ptr.get()) {
            Some(object) => f(object),
            None => fault(ptr, "use after free"),
        }
    }

    fn artboard<R>(&self, ptr: NativeRef, f: impl FnOnce(&mut ArtboardObj) -> R) -> R {
        self.with(ptr, |obj| f(expect_variant!(obj, ptr, Artboard)))
    }

    fn timeline<R>(&self, ptr: NativeRef, f: impl FnOnce(&mut Timeline) -> R) -> R {
        self.with(ptr, |obj| f(expect_variant!(obj, ptr, Animation)))
    }

    fn machine<R>(&self, ptr: NativeRef, f: impl FnOnce(&mut Machine) -> R) -> R {
        self.with(ptr, |obj| f(expect_variant!(obj, ptr, StateMachine)))
    }

    fn view_model<R>(&self, ptr: NativeRef, f: impl FnOnce(&mut ViewModelObj) -> R) -> R {
        self.with(ptr, |obj| f(expect_variant!(obj, ptr, ViewModel)))
    }

    fn document(&self, ptr: NativeRef) -> Arc<Document> {
        self.with(ptr, |obj| Arc::clone(expect_variant!(obj, ptr, File)))
    }

    fn require_live(&self, objects: &HashMap<u64, SimObject>, ptr: NativeRef, kind: HandleKind) {
        match objects.get(&ptr.get()) {
            Some(obj) if obj.kind() == kind => {}
            Some(obj) => fault(ptr, &format!("expected {kind}, found {}", obj.kind())),
            None => fault(ptr, "use after free"),
        }
    }
}

fn pick<'a, T>(items: &'a [T], selector: Selector<'_>, name: impl Fn(&T) -> &str) -> Option<&'a T> {
    match selector {
        Selector::Name(wanted) => items.iter().find(|item| name(item) == wanted),
        Selector::Index(index) => items.get(index),
    }
}

impl NativeEngine for SimEngine {
    fn import_file(&self, bytes: &[u8]) -> Result<NativeRef, ImportError> {
        let doc = Document::from_slice(bytes).map_err(|err| ImportError::Malformed(err.to_string()))?;
        if doc.version.major != SUPPORTED_MAJOR {
            return Err(ImportError::UnsupportedVersion {
                major: doc.version.major,
                minor: doc.version.minor,
                expected_major: SUPPORTED_MAJOR,
            });
        }
        self.stats.lock().imports += 1;
        let mut objects = self.objects.lock();
        Ok(self.insert(&mut objects, SimObject::File(Arc::new(doc))))
    }

    fn dispose(&self, kind: HandleKind, ptr: NativeRef) {
        let removed = self.objects.lock().remove(&ptr.get());
        match removed {
            Some(obj) if obj.kind() == kind => {
                *self.disposed.lock().entry(kind).or_insert(0) += 1;
            }
            Some(obj) => fault(ptr, &format!("disposed as {kind} but is {}", obj.kind())),
            None => fault(ptr, "double free"),
        }
    }

    fn artboard_names(&self, file: NativeRef) -> Vec<String> {
        self.document(file)
            .artboards
            .iter()
            .map(|ab| ab.name.clone())
            .collect()
    }

    fn instance_artboard(&self, file: NativeRef, selector: Selector<'_>) -> Option<NativeRef> {
        let doc = self.document(file);
        let ab = pick(&doc.artboards, selector, |ab| &ab.name)?.clone();
        let obj = ArtboardObj {
            nested: ab
                .nested
                .iter()
                .map(|n| (n.path.clone(), n.inputs.iter().map(InputSlot::from_doc).collect()))
                .collect(),
            text_runs: ab
                .text_runs
                .iter()
                .map(|run| (run.name.clone(), run.text.clone()))
                .collect(),
            doc: ab,
            bound_view_model: None,
            dirty: false,
        };
        let mut objects = self.objects.lock();
        Some(self.insert(&mut objects, SimObject::Artboard(Box::new(obj))))
    }

    fn view_model_names(&self, file: NativeRef) -> Vec<String> {
        self.document(file)
            .view_models
            .iter()
            .map(|vm| vm.name.clone())
            .collect()
    }

    fn instance_view_model(
        &self,
        file: NativeRef,
        view_model: &str,
        instance: Option<&str>,
    ) -> Option<NativeRef> {
        let doc = self.document(file);
        let vm = doc.view_model(view_model)?;
        let mut values: Vec<(String, PropertyValue)> = vm
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        let instance_name = match instance {
            Some(wanted) => {
                let authored = vm.instances.iter().find(|i| i.name == wanted)?;
                for (name, value) in values.iter_mut() {
                    if let Some(v) = authored.values.get(name.as_str()) {
                        *value = v.clone();
                    }
                }
                authored.name.clone()
            }
            None => String::new(),
        };
        let mut objects = self.objects.lock();
        Some(self.insert(
            &mut objects,
            SimObject::ViewModel(ViewModelObj {
                instance_name,
                values,
            }),
        ))
    }

    fn artboard_name(&self, artboard: NativeRef) -> String {
        self.artboard(artboard, |ab| ab.doc.name.clone())
    }

    fn artboard_bounds(&self, artboard: NativeRef) -> Aabb {
        self.artboard(artboard, |ab| ab.doc.bounds)
    }

    fn playable_names(&self, artboard: NativeRef, kind: PlayableKind) -> Vec<String> {
        self.artboard(artboard, |ab| match kind {
            PlayableKind::Animation => ab.doc.animations.iter().map(|a| a.name.clone()).collect(),
            PlayableKind::StateMachine => {
                ab.doc.state_machines.iter().map(|s| s.name.clone()).collect()
            }
        })
    }

    fn instance_playable(
        &self,
        artboard: NativeRef,
        kind: PlayableKind,
        selector: Selector<'_>,
    ) -> Option<NativeRef> {
        let object = self.artboard(artboard, |ab| match kind {
            PlayableKind::Animation => {
                pick(&ab.doc.animations, selector, |a| &a.name).map(|a| SimObject::Animation(Timeline::new(a)))
            }
            PlayableKind::StateMachine => pick(&ab.doc.state_machines, selector, |s| &s.name)
                .map(|s| SimObject::StateMachine(Box::new(Machine::new(s)))),
        })?;
        let mut objects = self.objects.lock();
        Some(self.insert(&mut objects, object))
    }

    fn advance_artboard(&self, artboard: NativeRef, _elapsed: f32) -> bool {
        self.stats.lock().artboard_advances += 1;
        self.artboard(artboard, |ab| std::mem::replace(&mut ab.dirty, false))
    }

    fn nested_input_kind(&self, artboard: NativeRef, path: &str, input: &str) -> Option<InputKind> {
        self.artboard(artboard, |ab| {
            ab.nested
                .iter()
                .find(|(p, _)| p == path)
                .and_then(|(_, inputs)| inputs.iter().find(|slot| slot.name == input))
                .map(|slot| slot.value.kind())
        })
    }

    fn set_nested_input(&self, artboard: NativeRef, path: &str, input: &str, value: InputValue) {
        self.artboard(artboard, |ab| {
            let slot = ab
                .nested
                .iter_mut()
                .find(|(p, _)| p == path)
                .and_then(|(_, inputs)| inputs.iter_mut().find(|slot| slot.name == input));
            if let Some(slot) = slot {
                slot.write(value);
                ab.dirty = true;
            }
        })
    }

    fn text_run(&self, artboard: NativeRef, name: &str) -> Option<String> {
        self.artboard(artboard, |ab| {
            ab.text_runs
                .iter()
                .find(|(run, _)| run == name)
                .map(|(_, text)| text.clone())
        })
    }

    fn set_text_run(&self, artboard: NativeRef, name: &str, text: &str) -> bool {
        self.artboard(artboard, |ab| {
            match ab.text_runs.iter_mut().find(|(run, _)| run == name) {
                Some((_, current)) => {
                    *current = text.to_string();
                    ab.dirty = true;
                    true
                }
                None => false,
            }
        })
    }

    fn bind_view_model_instance(&self, target: NativeRef, instance: Option<NativeRef>) {
        let mut objects = self.objects.lock();
        if let Some(vmi) = instance {
            self.require_live(&objects, vmi, HandleKind::ViewModelInstance);
        }
        let raw = instance.map(|vmi| vmi.get());
        match objects.get_mut(&target.get()) {
            Some(SimObject::Artboard(ab)) => {
                ab.bound_view_model = raw;
                ab.dirty = true;
            }
            Some(SimObject::StateMachine(machine)) => machine.bound_view_model = raw,
            Some(other) => fault(target, &format!("cannot bind a view model to {}", other.kind())),
            None => fault(target, "use after free"),
        }
    }

    fn draw(&self, renderer: NativeRef, artboard: NativeRef, _params: &DrawParams) {
        {
            let objects = self.objects.lock();
            self.require_live(&objects, renderer, HandleKind::Renderer);
            self.require_live(&objects, artboard, HandleKind::Artboard);
        }
        self.stats.lock().draws += 1;
        let hook = self.draw_hook.lock().clone();
        if let Some(hook) = hook {
            hook(artboard);
        }
        // The frame is still "in flight" until here; both objects must have
        // survived it.
        let objects = self.objects.lock();
        self.require_live(&objects, renderer, HandleKind::Renderer);
        self.require_live(&objects, artboard, HandleKind::Artboard);
    }

    fn animation_snapshot(&self, animation: NativeRef) -> AnimationSnapshot {
        self.timeline(animation, |t| t.snapshot())
    }

    fn set_animation_time(&self, animation: NativeRef, time: f32) {
        self.timeline(animation, |t| t.time = time)
    }

    fn set_animation_direction(&self, animation: NativeRef, direction: Direction) {
        self.timeline(animation, |t| t.set_direction(direction))
    }

    fn set_animation_loop(&self, animation: NativeRef, mode: Loop) {
        self.timeline(animation, |t| t.set_loop(mode))
    }

    fn advance_animation(&self, animation: NativeRef, elapsed: f32) -> AdvanceResult {
        self.timeline(animation, |t| t.advance(elapsed))
    }

    fn apply_animation(&self, animation: NativeRef, artboard: NativeRef, _mix: f32) {
        {
            let objects = self.objects.lock();
            self.require_live(&objects, animation, HandleKind::LinearAnimationInstance);
            self.require_live(&objects, artboard, HandleKind::Artboard);
        }
        self.stats.lock().animation_applies += 1;
    }

    fn state_machine_name(&self, state_machine: NativeRef) -> String {
        self.machine(state_machine, |m| m.name.clone())
    }

    fn state_machine_inputs(&self, state_machine: NativeRef) -> Vec<InputInfo> {
        self.machine(state_machine, |m| m.input_infos())
    }

    fn input_value(&self, state_machine: NativeRef, input: &str) -> Option<InputValue> {
        self.machine(state_machine, |m| m.input(input).map(|slot| slot.value))
    }

    fn set_input(&self, state_machine: NativeRef, input: &str, value: InputValue) {
        self.machine(state_machine, |m| {
            if let Some(slot) = m.input_mut(input) {
                slot.write(value);
            }
        })
    }

    fn advance_state_machine(&self, state_machine: NativeRef, elapsed: f32) -> bool {
        self.machine(state_machine, |m| m.advance(elapsed))
    }

    fn take_state_changes(&self, state_machine: NativeRef) -> Vec<String> {
        self.machine(state_machine, |m| m.take_changes())
    }

    fn take_reported_events(&self, state_machine: NativeRef) -> Vec<ReportedEvent> {
        self.machine(state_machine, |m| m.take_events())
    }

    fn view_model_instance_name(&self, instance: NativeRef) -> String {
        self.view_model(instance, |vm| vm.instance_name.clone())
    }

    fn property(&self, instance: NativeRef, path: &str) -> Option<PropertyValue> {
        self.view_model(instance, |vm| {
            vm.values
                .iter()
                .find(|(name, _)| name == path)
                .map(|(_, value)| value.clone())
        })
    }

    fn set_property(&self, instance: NativeRef, path: &str, value: PropertyValue) -> bool {
        self.view_model(instance, |vm| {
            let Some((_, current)) = vm.values.iter_mut().find(|(name, _)| name == path) else {
                return false;
            };
            let same_type =
                std::mem::discriminant(current) == std::mem::discriminant(&value);
            if same_type && value != PropertyValue::Trigger {
                *current = value;
            }
            same_type
        })
    }

    fn make_renderer(&self, renderer_type: RendererType) -> Option<NativeRef> {
        let mut objects = self.objects.lock();
        Some(self.insert(
            &mut objects,
            SimObject::Renderer(RendererObj {
                renderer_type,
                surface: None,
            }),
        ))
    }

    fn bind_surface(&self, renderer: NativeRef, surface: Option<SurfaceInfo>) {
        self.with(renderer, |obj| {
            let r = expect_variant!(obj, renderer, Renderer);
            log::trace!("{} renderer bound to {surface:?}", r.renderer_type.name());
            r.surface = surface;
        })
    }
}
