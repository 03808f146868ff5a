use std::process::ExitCode;

use clap::Parser;
use lantern_app::{CliArgs, Sandbox, SandboxError, SandboxOptions};
use lantern_core::scene::{SceneBinding, SceneDescriptor};

fn run(options: &SandboxOptions) -> Result<(), SandboxError> {
    let mut sandbox = Sandbox::new(options);

    match &options.graph {
        Some(path) => sandbox.load_graph(path)?,
        None => sandbox.load_default_graph()?,
    }

    match &options.scene {
        Some(path) => sandbox.load_scene(path, options.scene_flags)?,
        None => sandbox.set_scene(SceneBinding::new(SceneDescriptor {
            flags: options.scene_flags,
            ..Default::default()
        })),
    }

    let summary = sandbox.run(options.frames)?;
    if summary.frames == 0 {
        log::warn!("No frame completed");
    }

    if let Some(dir) = &options.capture_dir {
        sandbox.capture_all(dir)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    lantern_core::init();
    lantern_graph::init();
    lantern_app::init();
    lantern_core::profiling::start();

    let options = SandboxOptions::from(CliArgs::parse());
    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
