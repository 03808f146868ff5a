//! Common utilities for render graph integration tests.
//!
//! Provides a small frame resolution, a registry with deterministic plugin
//! passes, and builders for the graphs most tests start from.

#![allow(dead_code)]

use std::any::Any;
use std::sync::OnceLock;

use lantern_core::scene::{SceneBinding, SceneDescriptor, SceneFlags};
use lantern_graph::{
    ExecutorConfig, Extent2d, ParamSchema, PassContext, PassError, PassRegistry, PortDesc,
    Properties, RefreshFlags, RenderGraph, RenderPass, Resource, ResourceKind,
};

/// Frame resolution used by every test graph.
pub const RESOLUTION: Extent2d = Extent2d::new(16, 9);

pub fn config() -> ExecutorConfig {
    ExecutorConfig::default().with_resolution(RESOLUTION)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn scene() -> SceneBinding {
    scene_with_flags(SceneFlags::empty())
}

pub fn scene_with_flags(flags: SceneFlags) -> SceneBinding {
    SceneBinding::new(SceneDescriptor {
        name: "test-scene".into(),
        flags,
        seed: 7,
        light_count: 3,
        ..Default::default()
    })
}

// ============================================================================
// Plugin passes
// ============================================================================

/// `vbuffer` is updated in place (+1 per texel); `viewW` is filled with 0.25.
#[derive(Debug, Default)]
pub struct TestGBuffer;

impl RenderPass for TestGBuffer {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input_output("vbuffer", ResourceKind::Color),
            PortDesc::output("viewW", ResourceKind::Color),
        ]
    }

    fn configure(&mut self, _props: &Properties) -> Result<(), PassError> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        if let Some(vbuffer) = ctx.output("vbuffer") {
            vbuffer.data_mut().iter_mut().for_each(|v| *v += 1.0);
        }
        if let Some(view) = ctx.output("viewW") {
            view.fill(0.25);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `color = vbuffer + viewW`.
#[derive(Debug, Default)]
pub struct TestShade;

impl RenderPass for TestShade {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("vbuffer", ResourceKind::Color),
            PortDesc::input("viewW", ResourceKind::Color).optional(),
            PortDesc::output("color", ResourceKind::Color),
        ]
    }

    fn configure(&mut self, _props: &Properties) -> Result<(), PassError> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let vbuffer = ctx.require_input("vbuffer")?;
        let view = ctx.input("viewW");
        let color = ctx
            .output("color")
            .ok_or_else(|| PassError::InvalidConfiguration("color has no storage".into()))?;
        color.copy_from(vbuffer)?;
        if let Some(view) = view {
            for (out, v) in color.data_mut().iter_mut().zip(view.data()) {
                *out += v;
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fills `out` with `value`. Optionally raises refresh flags.
#[derive(Debug, Default)]
pub struct Constant {
    pub value: f32,
    pub raise: bool,
}

impl Constant {
    pub const SCHEMA: &'static [ParamSchema] = &[
        ParamSchema::float("value", -1.0e6, 1.0e6, 1.0),
        ParamSchema::bool("raise", false),
    ];
}

impl RenderPass for Constant {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![PortDesc::output("out", ResourceKind::Color)]
    }

    fn configure(&mut self, props: &Properties) -> Result<(), PassError> {
        self.value = props.get_float("value").unwrap_or(1.0) as f32;
        self.raise = props.get_bool("raise").unwrap_or(false);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        if self.raise {
            ctx.raise(RefreshFlags::RENDER_OPTIONS_CHANGED);
        }
        if let Some(out) = ctx.output("out") {
            out.fill(self.value);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `out = in + offset`, with an optional unused `debug` output.
#[derive(Debug, Default)]
pub struct Offset {
    pub offset: f32,
}

impl Offset {
    pub const SCHEMA: &'static [ParamSchema] = &[ParamSchema::float("offset", -1.0e6, 1.0e6, 1.0)];
}

impl RenderPass for Offset {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("in", ResourceKind::Color),
            PortDesc::output("out", ResourceKind::Color),
            PortDesc::output("debug", ResourceKind::Color).optional(),
        ]
    }

    fn configure(&mut self, props: &Properties) -> Result<(), PassError> {
        self.offset = props.get_float("offset").unwrap_or(1.0) as f32;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let input = ctx.require_input("in")?;
        if let Some(out) = ctx.output("out") {
            out.copy_from(input)?;
            out.data_mut().iter_mut().for_each(|v| *v += self.offset);
        }
        if let Some(debug) = ctx.output("debug") {
            debug.fill(-1.0);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `out = a + b`.
#[derive(Debug, Default)]
pub struct Blend;

impl RenderPass for Blend {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("a", ResourceKind::Color),
            PortDesc::input("b", ResourceKind::Color),
            PortDesc::output("out", ResourceKind::Color),
        ]
    }

    fn configure(&mut self, _props: &Properties) -> Result<(), PassError> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let a = ctx.require_input("a")?;
        let b = ctx.require_input("b")?;
        if let Some(out) = ctx.output("out") {
            for ((out, a), b) in out.data_mut().iter_mut().zip(a.data()).zip(b.data()) {
                *out = a + b;
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fails while `fail` is set; otherwise copies `in` to `out`.
#[derive(Debug, Default)]
pub struct Flaky {
    pub fail: bool,
    pub runs: u32,
}

impl Flaky {
    pub const SCHEMA: &'static [ParamSchema] = &[ParamSchema::bool("fail", true)];
}

impl RenderPass for Flaky {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("in", ResourceKind::Color),
            PortDesc::output("out", ResourceKind::Color),
        ]
    }

    fn configure(&mut self, props: &Properties) -> Result<(), PassError> {
        self.fail = props.get_bool("fail").unwrap_or(true);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        self.runs += 1;
        if self.fail {
            return Err(PassError::Failed("requested failure".into()));
        }
        let input = ctx.require_input("in")?;
        if let Some(out) = ctx.output("out") {
            out.copy_from(input)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records scene bindings; writes the scene's light count into `out`.
#[derive(Debug, Default)]
pub struct SceneProbe {
    pub bindings: u32,
    pub light_count: u32,
}

impl RenderPass for SceneProbe {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![PortDesc::output("out", ResourceKind::Mask)]
    }

    fn configure(&mut self, _props: &Properties) -> Result<(), PassError> {
        Ok(())
    }

    fn set_scene(&mut self, scene: &SceneBinding) {
        self.bindings += 1;
        self.light_count = scene.light_count();
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        if let Some(out) = ctx.output("out") {
            out.fill(self.light_count as f32);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

const NO_OPTIONS: &[ParamSchema] = &[];

/// Built-in types plus every plugin above.
pub fn registry() -> &'static PassRegistry {
    static REGISTRY: OnceLock<PassRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let build = || -> Result<PassRegistry, lantern_graph::ConstructionError> {
            Ok(PassRegistry::builder()
                .register("TestGBuffer", NO_OPTIONS, |_| Ok(Box::new(TestGBuffer)))?
                .register("TestShade", NO_OPTIONS, |_| Ok(Box::new(TestShade)))?
                .register("Constant", Constant::SCHEMA, |props| {
                    let mut pass = Constant::default();
                    pass.configure(props)?;
                    Ok(Box::new(pass))
                })?
                .register("Offset", Offset::SCHEMA, |props| {
                    let mut pass = Offset::default();
                    pass.configure(props)?;
                    Ok(Box::new(pass))
                })?
                .register("Blend", NO_OPTIONS, |_| Ok(Box::new(Blend)))?
                .register("Flaky", Flaky::SCHEMA, |props| {
                    let mut pass = Flaky::default();
                    pass.configure(props)?;
                    Ok(Box::new(pass))
                })?
                .register("SceneProbe", NO_OPTIONS, |_| Ok(Box::new(SceneProbe::default())))?
                .build())
        };
        build().expect("test registry")
    })
}

// ============================================================================
// Graph builders
// ============================================================================

pub fn graph(name: &str) -> RenderGraph {
    RenderGraph::with_config(name, config())
}

pub fn add(graph: &mut RenderGraph, type_name: &str, name: &str) {
    add_with(graph, type_name, name, Properties::new());
}

pub fn add_with(graph: &mut RenderGraph, type_name: &str, name: &str, props: Properties) {
    graph
        .create_pass(registry(), type_name, name, &props)
        .unwrap_or_else(|err| panic!("failed to add {name}: {err}"));
}

/// `G -> P -> Acc` with `Acc.output` marked.
pub fn scenario_a() -> RenderGraph {
    let mut graph = graph("ScenarioA");
    add(&mut graph, "TestGBuffer", "G");
    add(&mut graph, "TestShade", "P");
    add(&mut graph, "AccumulatePass", "Acc");
    graph.add_edge("G.vbuffer", "P.vbuffer").unwrap();
    graph.add_edge("G.viewW", "P.viewW").unwrap();
    graph.add_edge("P.color", "Acc.input").unwrap();
    graph.mark_output("Acc.output").unwrap();
    graph
}

/// Built-in `GBufferRT -> PathTracer -> AccumulatePass`.
pub fn path_tracer() -> RenderGraph {
    let mut graph = graph("TestPathTracer");
    add_with(
        &mut graph,
        "GBufferRT",
        "GBufferRT",
        Properties::new().with("samplePattern", "Stratified"),
    );
    add(&mut graph, "PathTracer", "PathTracer");
    add(&mut graph, "AccumulatePass", "AccumulatePass");
    graph.add_edge("GBufferRT.vbuffer", "PathTracer.vbuffer").unwrap();
    graph.add_edge("GBufferRT.viewW", "PathTracer.viewW").unwrap();
    graph.add_edge("PathTracer.color", "AccumulatePass.input").unwrap();
    graph.mark_output("AccumulatePass.output").unwrap();
    graph
}

/// `Src -> O1 -> ... -> On`, marking the last output.
pub fn offset_chain(len: usize) -> RenderGraph {
    offset_chain_with(config(), len)
}

pub fn offset_chain_with(config: ExecutorConfig, len: usize) -> RenderGraph {
    let mut graph = RenderGraph::with_config("Chain", config);
    add_with(&mut graph, "Constant", "Src", Properties::new().with("value", 0.5));
    let mut previous = "Src.out".to_string();
    for i in 1..=len {
        let name = format!("O{i}");
        add(&mut graph, "Offset", &name);
        graph.add_edge(&previous, &format!("{name}.in")).unwrap();
        previous = format!("{name}.out");
    }
    graph.mark_output(&previous).unwrap();
    graph
}

/// Mean of the first channel.
pub fn mean(resource: &Resource) -> f32 {
    resource.channel_means().first().copied().unwrap_or(0.0)
}

/// Every texel's first channel equals `expected`.
pub fn assert_uniform(resource: &Resource, expected: f32) {
    let channels = resource.channels();
    for (i, value) in resource.data().iter().step_by(channels).enumerate() {
        assert!(
            (value - expected).abs() < 1e-5,
            "texel {i}: expected {expected}, got {value}"
        );
    }
}
