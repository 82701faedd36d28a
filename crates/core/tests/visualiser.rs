mod common;

use common::*;
use preset_visualiser_core::{ComponentConfig, SchedulerState, TickOutcome, VisualiserError};
use serde_json::json;

const MAGENTA_PRESET: &str = r##"{
    "components": [
        {
            "type": "EffectList",
            "clearFrame": true,
            "input": "REPLACE",
            "output": "ADDITIVE",
            "components": [
                { "type": "ClearScreen", "options": { "color": "#ff0000" } },
                { "type": "ClearScreen", "options": { "color": "#0000ff", "blendMode": "ADDITIVE" } }
            ]
        }
    ]
}"##;

#[test]
fn nested_list_composes_into_canvas() {
    let mut vis = visualiser(4, 4);
    vis.load_preset(preset(MAGENTA_PRESET)).unwrap();
    vis.start();

    assert_eq!(tick(&mut vis).unwrap(), Some(TickOutcome::Rendered));
    assert_uniform(last_frame(&vis), MAGENTA);

    let pool = vis.renderer().unwrap().pool();
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.stats().peak_outstanding, 1);
    assert_eq!(pool.stats().allocated, 1);

    // Additive onto an already magenta canvas saturates.
    tick(&mut vis).unwrap();
    assert_uniform(last_frame(&vis), MAGENTA);
    assert_eq!(vis.renderer().unwrap().pool().stats().allocated, 1);
}

#[test]
fn replacing_fills_inside_a_list_keep_only_the_last() {
    let mut vis = visualiser(4, 4);
    vis.load_preset(preset(
        r##"{ "components": [ {
            "type": "EffectList",
            "clearFrame": true,
            "input": "REPLACE",
            "output": "ADDITIVE",
            "components": [
                { "type": "ClearScreen", "options": { "color": "#ff0000" } },
                { "type": "ClearScreen", "options": { "color": "#0000ff" } }
            ]
        } ] }"##,
    ))
    .unwrap();
    vis.start();

    // Children draw in place on the working surface, so the second REPLACE
    // fill overwrites the first before the list merges into the canvas.
    tick(&mut vis).unwrap();
    assert_uniform(last_frame(&vis), BLUE);
}

#[test]
fn buffer_restore_blends_saved_frame() {
    let mut vis = visualiser(3, 2);
    vis.load_preset(preset(
        r##"{ "clearFrame": true, "components": [
            { "type": "ClearScreen", "options": { "color": "#ff0000" } },
            { "type": "BufferSave", "options": { "action": "SAVE", "bufferId": 1 } },
            { "type": "ClearScreen", "options": { "color": "#0000ff" } },
            { "type": "BufferSave", "options": { "action": "RESTORE", "bufferId": 1, "blendMode": "ADDITIVE" } }
        ] }"##,
    ))
    .unwrap();
    vis.start();

    tick(&mut vis).unwrap();
    assert_uniform(last_frame(&vis), MAGENTA);
    assert!(vis.renderer().unwrap().buffers().contains(1));
}

#[test]
fn restoring_an_unsaved_buffer_is_a_no_op() {
    let mut vis = visualiser(2, 2);
    vis.load_preset(preset(
        r##"{ "components": [
            { "type": "ClearScreen", "options": { "color": "#0000ff" } },
            { "type": "BufferSave", "options": { "action": "RESTORE", "bufferId": 9 } }
        ] }"##,
    ))
    .unwrap();
    vis.start();

    tick(&mut vis).unwrap();
    assert_uniform(last_frame(&vis), BLUE);
}

#[test]
fn pending_resources_hold_the_loop() {
    let mut vis = visualiser(2, 2);
    vis.load_preset(preset(
        r#"{ "resources": { "uris": { "logo": "https://example.com/logo.png" } } }"#,
    ))
    .unwrap();

    vis.start();
    assert_eq!(vis.scheduler_state(), SchedulerState::Waiting);
    assert!(vis.host().outstanding().is_empty());

    vis.resource_loaded("logo");
    assert_eq!(vis.scheduler_state(), SchedulerState::Active);
    let token = vis.host_mut().take_request().unwrap();

    vis.resource_loading("font");
    assert_eq!(vis.scheduler_state(), SchedulerState::Waiting);
    assert_eq!(vis.on_frame(token).unwrap(), TickOutcome::Skipped);
    assert_eq!(vis.host().presented(), 0);

    vis.resource_failed("font");
    assert_eq!(vis.scheduler_state(), SchedulerState::Waiting);

    vis.resource_loaded("font");
    assert_eq!(vis.scheduler_state(), SchedulerState::Active);
    assert_eq!(tick(&mut vis).unwrap(), Some(TickOutcome::Rendered));
}

#[test]
fn stop_cancels_the_pending_frame() {
    let mut vis = visualiser(2, 2);
    vis.start();
    let token = vis.host().outstanding()[0];

    vis.stop();
    assert_eq!(vis.scheduler_state(), SchedulerState::Stopped);
    assert_eq!(vis.host().cancelled(), [token]);
    assert_eq!(vis.on_frame(token).unwrap(), TickOutcome::Skipped);
}

#[test]
fn context_loss_keeps_edits_and_resumes() {
    let mut vis = visualiser(2, 2);
    vis.load_preset(preset(MAGENTA_PRESET)).unwrap();
    vis.start();
    tick(&mut vis).unwrap();

    let tree = vis.renderer_mut().unwrap().tree_mut();
    let list = tree.children(tree.root()).unwrap()[0];
    tree.set_option(list, "output", json!("REPLACE")).unwrap();
    let edited = vis.to_config().unwrap();

    vis.context_lost();
    assert!(vis.renderer().is_none());
    assert_eq!(vis.scheduler_state(), SchedulerState::Stopped);
    assert!(vis.host().outstanding().is_empty());
    assert_eq!(vis.to_config().unwrap(), edited);

    vis.host_mut().set_context_available(false);
    assert!(matches!(
        vis.context_restored(),
        Err(VisualiserError::ContextUnavailable)
    ));

    vis.host_mut().set_context_available(true);
    vis.context_restored().unwrap();
    assert_eq!(vis.scheduler_state(), SchedulerState::Active);
    assert_eq!(vis.to_config().unwrap(), edited);
    assert_eq!(tick(&mut vis).unwrap(), Some(TickOutcome::Rendered));
    assert_uniform(last_frame(&vis), MAGENTA);
}

#[test]
fn stopped_visualiser_stays_stopped_after_restore() {
    let mut vis = visualiser(2, 2);
    vis.context_lost();
    vis.context_restored().unwrap();
    assert_eq!(vis.scheduler_state(), SchedulerState::Stopped);
}

#[test]
fn broken_preset_leaves_running_one_alone() {
    let mut vis = visualiser(2, 2);
    vis.load_preset(preset(MAGENTA_PRESET)).unwrap();
    vis.start();
    let before = vis.to_config().unwrap();

    let err = vis
        .load_preset(preset(
            r#"{ "components": [ { "type": "ClearScreen" }, { "type": "Starfield" } ] }"#,
        ))
        .unwrap_err();
    assert!(err.is_config());
    assert_eq!(vis.to_config().unwrap(), before);
    assert_eq!(vis.scheduler_state(), SchedulerState::Active);

    tick(&mut vis).unwrap();
    assert_uniform(last_frame(&vis), MAGENTA);
}

#[test]
fn registers_persist_until_the_next_load() {
    let mut vis = visualiser(2, 2);
    vis.start();
    vis.renderer_mut().unwrap().registers_mut().set("reg00", 2.5);

    tick(&mut vis).unwrap();
    tick(&mut vis).unwrap();
    assert_eq!(vis.renderer().unwrap().registers().get("reg00"), 2.5);

    vis.load_preset(preset(MAGENTA_PRESET)).unwrap();
    assert_eq!(vis.renderer().unwrap().registers().get("reg00"), 0.0);
    assert_eq!(vis.renderer().unwrap().ticks(), 0);
}

#[test]
fn exhausted_pool_fails_the_tick_and_stops() {
    let mut vis = visualiser_with(app_config(2, 2, 1), beats(&[]));
    vis.load_preset(preset(
        r#"{ "components": [ { "type": "EffectList", "components": [
            { "type": "EffectList", "components": [ { "type": "ClearScreen" } ] }
        ] } ] }"#,
    ))
    .unwrap();
    vis.start();

    let err = tick(&mut vis).unwrap_err();
    assert!(matches!(err, VisualiserError::ResourceExhausted { capacity: 1 }));
    assert_eq!(vis.scheduler_state(), SchedulerState::Stopped);
    assert_eq!(vis.renderer().unwrap().pool().outstanding(), 0);
    assert_eq!(vis.host().presented(), 0);
}

#[test]
fn resize_applies_to_the_next_tick() {
    let mut vis = visualiser(8, 6);
    vis.load_preset(preset(MAGENTA_PRESET)).unwrap();
    vis.start();
    tick(&mut vis).unwrap();
    assert_eq!(last_frame(&vis).dimensions(), (8, 6));

    vis.resize(4, 3);
    tick(&mut vis).unwrap();
    assert_eq!(last_frame(&vis).dimensions(), (4, 3));
    assert_uniform(last_frame(&vis), MAGENTA);

    let stats = vis.renderer().unwrap().pool().stats();
    assert_eq!(stats.allocated, 2);
    assert_eq!(stats.destroyed, 1);
}

#[test]
fn beat_gated_clear_follows_the_analyser() {
    let mut vis = visualiser_with(
        app_config(2, 2, 4),
        beats(&[false, true, false, true, true]),
    );
    vis.load_preset(preset(
        r##"{ "components": [
            { "type": "ClearScreen", "options": { "color": "#0000ff", "beatCount": 2 } }
        ] }"##,
    ))
    .unwrap();
    vis.start();

    let mut blue_ticks = Vec::new();
    for i in 0..5 {
        tick(&mut vis).unwrap();
        if last_frame(&vis).pixel(0, 0) == BLUE {
            blue_ticks.push(i);
        }
    }
    // Nothing clears the canvas, so it stays blue after the first hit.
    assert_eq!(blue_ticks, [3, 4]);
}

#[test]
fn components_can_be_added_while_running() {
    let mut vis = visualiser(2, 2);
    vis.start();
    let root = vis.renderer().unwrap().tree().root();
    vis.insert_component(
        root,
        None,
        &ComponentConfig::new("ClearScreen").with_option("color", "#ff0000"),
    )
    .unwrap();

    tick(&mut vis).unwrap();
    assert_uniform(last_frame(&vis), RED);
    assert_eq!(vis.to_config().unwrap().components.len(), 1);
}
