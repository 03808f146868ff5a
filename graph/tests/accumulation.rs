//! Progressive accumulation through a running graph.

mod common;

use common::{add, add_with, assert_uniform, graph, path_tracer, scene};
use lantern_core::scene::{SceneBinding, SceneUpdates};
use lantern_graph::{Extent2d, Properties, RenderGraph};
use rstest::rstest;

/// `Src -> Acc`, with `Acc.output` marked.
fn accumulate(acc: Properties) -> RenderGraph {
    accumulate_source(Properties::new(), acc)
}

fn accumulate_source(src: Properties, acc: Properties) -> RenderGraph {
    let mut graph = graph("Accumulate");
    add_with(&mut graph, "Constant", "Src", src);
    add_with(&mut graph, "AccumulatePass", "Acc", acc);
    graph.add_edge("Src.out", "Acc.input").unwrap();
    graph.mark_output("Acc.output").unwrap();
    graph
}

fn frame_count(graph: &RenderGraph) -> u32 {
    graph
        .pass("Acc")
        .and_then(|pass| pass.accumulator())
        .map(|acc| acc.frame_count())
        .unwrap()
}

/// Run one frame with `Src` producing `value`; returns the accumulated value.
fn run(graph: &mut RenderGraph, scene: &SceneBinding, value: f32) -> f32 {
    graph.set_pass_property("Src", "value", value).unwrap();
    let outputs = graph.execute(scene).unwrap();
    let output = outputs.get("Acc.output").unwrap();
    common::mean(output)
}

#[test]
fn test_counter_grows_each_frame() {
    common::init_logging();
    let mut graph = accumulate(Properties::new());
    let scene = scene();
    for expected in 1..=4 {
        graph.execute(&scene).unwrap();
        assert_eq!(frame_count(&graph), expected);
    }
}

#[test]
fn test_running_average() {
    let mut graph = accumulate(Properties::new());
    let scene = scene();
    assert_eq!(run(&mut graph, &scene, 1.0), 1.0);
    assert_eq!(run(&mut graph, &scene, 3.0), 2.0);
    assert_eq!(run(&mut graph, &scene, 5.0), 3.0);
    assert_eq!(frame_count(&graph), 3);
}

#[rstest]
#[case::single("Single")]
#[case::compensated("SingleCompensated")]
#[case::double("Double")]
fn test_precision_modes_agree(#[case] mode: &str) {
    let mut graph = accumulate(Properties::new().with("precisionMode", mode));
    let scene = scene();
    let mut last = 0.0;
    for value in [0.25, 0.5, 0.75, 1.0] {
        last = run(&mut graph, &scene, value);
    }
    assert!((last - 0.625).abs() < 1e-6, "{mode}: {last}");
}

#[test]
fn test_requested_reset_restarts_from_input() {
    let mut graph = accumulate(Properties::new());
    let scene = scene();
    run(&mut graph, &scene, 1.0);
    run(&mut graph, &scene, 1.0);
    run(&mut graph, &scene, 1.0);

    assert_eq!(graph.request_reset("Acc"), Ok(true));
    assert_eq!(graph.request_reset("Src"), Ok(false));
    assert!(graph.request_reset("Missing").is_err());

    assert_eq!(run(&mut graph, &scene, 4.0), 4.0);
    assert_eq!(frame_count(&graph), 0);
    assert_eq!(run(&mut graph, &scene, 2.0), 2.0);
    assert_eq!(frame_count(&graph), 1);
}

#[test]
fn test_reset_accumulation_counts_accumulating_passes() {
    let mut graph = accumulate(Properties::new());
    add(&mut graph, "NeuralAccumulatePass", "Neural");
    graph.add_edge("Src.out", "Neural.color").unwrap();
    assert_eq!(graph.reset_accumulation(), 2);
}

#[test]
fn test_scene_change_resets() {
    let mut graph = accumulate(Properties::new());
    let first = scene();
    run(&mut graph, &first, 1.0);
    run(&mut graph, &first, 3.0);
    assert_eq!(frame_count(&graph), 2);

    let second = scene();
    assert_eq!(run(&mut graph, &second, 7.0), 7.0);
    assert_eq!(frame_count(&graph), 0);
}

#[test]
fn test_rebinding_same_scene_keeps_accumulating() {
    let mut graph = accumulate(Properties::new());
    let scene = scene();
    graph.execute(&scene).unwrap();
    // Structural edits re-bind the scene on the next frame.
    add(&mut graph, "Offset", "Extra");
    graph.add_edge("Src.out", "Extra.in").unwrap();
    graph.execute(&scene).unwrap();
    assert_eq!(frame_count(&graph), 2);
}

#[test]
fn test_resize_resets() {
    let mut graph = accumulate(Properties::new());
    let scene = scene();
    run(&mut graph, &scene, 1.0);
    run(&mut graph, &scene, 3.0);

    graph.resize(8, 4);
    assert!(graph.outputs().is_none());
    assert_eq!(graph.resolution(), Extent2d::new(8, 4));

    let outputs = graph.execute(&scene).unwrap();
    let output = outputs.get("Acc.output").unwrap();
    assert_eq!(output.extent(), Extent2d::new(8, 4));
    assert_uniform(output, 3.0);
    assert_eq!(frame_count(&graph), 0);
}

#[test]
fn test_resize_to_same_resolution_is_ignored() {
    let mut graph = accumulate(Properties::new());
    let scene = scene();
    run(&mut graph, &scene, 1.0);
    graph.resize(common::RESOLUTION.width, common::RESOLUTION.height);
    assert!(graph.outputs().is_some());
    graph.execute(&scene).unwrap();
    assert_eq!(frame_count(&graph), 2);
}

#[rstest]
#[case::auto_reset(true, 0)]
#[case::manual(false, 3)]
fn test_refresh_flags(#[case] auto_reset: bool, #[case] expected: u32) {
    let mut graph = accumulate_source(
        Properties::new().with("raise", true),
        Properties::new().with("autoReset", auto_reset),
    );
    let scene = scene();
    for _ in 0..3 {
        graph.execute(&scene).unwrap();
    }
    assert_eq!(frame_count(&graph), expected);
}

#[rstest]
#[case::camera_moved(SceneUpdates::CAMERA_MOVED, 0)]
#[case::lights(SceneUpdates::LIGHTS_CHANGED, 0)]
#[case::jitter(SceneUpdates::CAMERA_JITTER, 3)]
#[case::none(SceneUpdates::empty(), 3)]
fn test_scene_updates(#[case] updates: SceneUpdates, #[case] expected: u32) {
    let mut graph = accumulate(Properties::new());
    let scene = scene();
    graph.execute(&scene).unwrap();
    graph.execute(&scene).unwrap();
    graph.on_scene_updates(updates);
    graph.execute(&scene).unwrap();
    assert_eq!(frame_count(&graph), expected);
}

#[test]
fn test_disabled_pass_copies_input() {
    let mut graph = accumulate(Properties::new().with("enabled", false));
    let scene = scene();
    assert_eq!(run(&mut graph, &scene, 1.0), 1.0);
    assert_eq!(run(&mut graph, &scene, 5.0), 5.0);
    assert_eq!(frame_count(&graph), 0);

    // Enabling starts a fresh accumulation.
    graph.set_pass_property("Acc", "enabled", true).unwrap();
    assert_eq!(run(&mut graph, &scene, 3.0), 3.0);
    assert_eq!(frame_count(&graph), 0);
    assert_eq!(run(&mut graph, &scene, 5.0), 5.0);
    assert_eq!(run(&mut graph, &scene, 7.0), 6.0);
}

#[test]
fn test_legacy_option_name() {
    let mut graph = accumulate(Properties::new().with("enableAccumulation", false));
    let scene = scene();
    run(&mut graph, &scene, 2.0);
    assert_eq!(run(&mut graph, &scene, 6.0), 6.0);
}

#[test]
fn test_max_frame_count_stop_holds_output() {
    let mut graph = accumulate(Properties::new().with("maxFrameCount", 2));
    let scene = scene();
    run(&mut graph, &scene, 1.0);
    assert_eq!(run(&mut graph, &scene, 3.0), 2.0);
    assert_eq!(run(&mut graph, &scene, 100.0), 2.0);
    assert_eq!(frame_count(&graph), 2);
}

#[test]
fn test_max_frame_count_ema() {
    let mut graph = accumulate(
        Properties::new()
            .with("maxFrameCount", 2)
            .with("overflowMode", "Ema"),
    );
    let scene = scene();
    run(&mut graph, &scene, 1.0);
    run(&mut graph, &scene, 3.0);
    // Window of two: 2 + (6 - 2) / 2.
    assert_eq!(run(&mut graph, &scene, 6.0), 4.0);
    assert_eq!(frame_count(&graph), 2);
}

#[test]
fn test_max_frame_count_reset() {
    let mut graph = accumulate(
        Properties::new()
            .with("maxFrameCount", 2)
            .with("overflowMode", "Reset"),
    );
    let scene = scene();
    run(&mut graph, &scene, 1.0);
    run(&mut graph, &scene, 3.0);
    assert_eq!(run(&mut graph, &scene, 10.0), 10.0);
    assert_eq!(frame_count(&graph), 1);
}

#[test]
fn test_neural_accumulate_shares_one_counter() {
    let mut graph = graph("Neural");
    add_with(&mut graph, "Constant", "Src", Properties::new().with("value", 2.0));
    add(&mut graph, "NeuralAccumulatePass", "Neural");
    graph.add_edge("Src.out", "Neural.color").unwrap();
    graph.add_edge("Src.out", "Neural.posW").unwrap();
    graph.mark_output("Neural.color_out").unwrap();
    graph.mark_output("Neural.posW_out").unwrap();
    graph.mark_output("Neural.normW_out").unwrap();

    let scene = scene();
    for _ in 0..3 {
        graph.execute(&scene).unwrap();
    }
    let outputs = graph.outputs().unwrap();
    assert_uniform(outputs.get("Neural.color_out").unwrap(), 2.0);
    assert_uniform(outputs.get("Neural.posW_out").unwrap(), 2.0);
    // Unconnected channels are cleared.
    assert_uniform(outputs.get("Neural.normW_out").unwrap(), 0.0);

    let neural = graph.pass("Neural").unwrap();
    assert_eq!(neural.accumulator().map(|acc| acc.frame_count()), Some(3));
}

fn accumulated_frames(graph: &RenderGraph) -> u32 {
    graph
        .pass("AccumulatePass")
        .and_then(|pass| pass.accumulator())
        .map(|acc| acc.frame_count())
        .unwrap()
}

#[rstest]
#[case::path_tracer_bounces("PathTracer", "maxDiffuseBounces", 0, 0)]
#[case::path_tracer_samples("PathTracer", "samplesPerPixel", 2, 0)]
#[case::gbuffer_sample_count("GBufferRT", "sampleCount", 4, 0)]
#[case::unchanged_value("PathTracer", "maxDiffuseBounces", 3, 4)]
fn test_upstream_option_change_resets(
    #[case] pass: &str,
    #[case] option: &str,
    #[case] value: i64,
    #[case] expected: u32,
) {
    let mut graph = path_tracer();
    let scene = scene();
    for _ in 0..3 {
        graph.execute(&scene).unwrap();
    }
    assert_eq!(accumulated_frames(&graph), 3);

    graph.set_pass_property(pass, option, value).unwrap();
    graph.execute(&scene).unwrap();
    assert_eq!(accumulated_frames(&graph), expected);

    // The change is reported once.
    graph.execute(&scene).unwrap();
    assert_eq!(accumulated_frames(&graph), expected + 1);
}

#[test]
fn test_upstream_option_change_without_auto_reset() {
    let mut graph = path_tracer();
    graph
        .set_pass_property("AccumulatePass", "autoReset", false)
        .unwrap();
    let scene = scene();
    for _ in 0..3 {
        graph.execute(&scene).unwrap();
    }
    let before = accumulated_frames(&graph);
    graph
        .set_pass_property("PathTracer", "maxDiffuseBounces", 0)
        .unwrap();
    graph.execute(&scene).unwrap();
    assert_eq!(accumulated_frames(&graph), before + 1);
}
