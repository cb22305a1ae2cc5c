use rivet_engine_sim::{document::Condition, Document, SimEngine, SUPPORTED_MAJOR};
use rivet_runtime_core::{HandleKind, NativeEngine, PlayableKind, Selector};
use rivet_test_fixtures::documents;

#[test]
fn playback_document_parses() {
    let doc = Document::from_slice(&documents::bytes("playback").unwrap()).unwrap();
    assert_eq!(doc.version.major, SUPPORTED_MAJOR);

    let main = doc.artboard("main").expect("main artboard");
    let names: Vec<_> = main.animations.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["one", "loopy", "bounce", "trimmed"]);

    let machine = &main.state_machines[0];
    assert_eq!(machine.inputs.len(), 3);
    assert!(machine
        .transitions
        .iter()
        .any(|t| matches!(t.condition, Condition::Number { .. })));

    assert!(doc.view_model("Profile").is_some());
    assert!(doc.artboard("missing").is_none());
}

#[test]
fn import_counts_and_disposal_bookkeeping() {
    let engine = SimEngine::new();
    let file = engine
        .import_file(&documents::bytes("playback").unwrap())
        .unwrap();
    let artboard = engine
        .instance_artboard(file, Selector::Name("second"))
        .unwrap();
    let wave = engine
        .instance_playable(artboard, PlayableKind::Animation, Selector::Index(0))
        .unwrap();
    assert_eq!(engine.total_live(), 3);
    assert_eq!(engine.stats().imports, 1);
    assert!(engine
        .instance_playable(artboard, PlayableKind::StateMachine, Selector::Index(0))
        .is_none());

    engine.dispose(HandleKind::LinearAnimationInstance, wave);
    engine.dispose(HandleKind::Artboard, artboard);
    engine.dispose(HandleKind::File, file);
    assert_eq!(engine.total_live(), 0);
    assert_eq!(engine.disposed_count(HandleKind::Artboard), 1);
}

#[test]
#[should_panic(expected = "double free")]
fn double_dispose_faults() {
    let engine = SimEngine::new();
    let file = engine
        .import_file(&documents::bytes("empty").unwrap())
        .unwrap();
    engine.dispose(HandleKind::File, file);
    engine.dispose(HandleKind::File, file);
}

#[test]
#[should_panic(expected = "native fault")]
fn use_after_free_faults() {
    let engine = SimEngine::new();
    let file = engine
        .import_file(&documents::bytes("playback").unwrap())
        .unwrap();
    let artboard = engine.instance_artboard(file, Selector::Index(0)).unwrap();
    engine.dispose(HandleKind::Artboard, artboard);
    engine.artboard_name(artboard);
}

#[test]
fn view_model_instances_start_from_authored_values() {
    let engine = SimEngine::new();
    let file = engine
        .import_file(&documents::bytes("playback").unwrap())
        .unwrap();
    assert_eq!(engine.view_model_names(file), ["Profile"]);
    assert!(engine
        .instance_view_model(file, "Profile", Some("nobody"))
        .is_none());
    let alice = engine
        .instance_view_model(file, "Profile", Some("alice"))
        .unwrap();
    assert_eq!(engine.view_model_instance_name(alice), "alice");
}
