use clap::Parser;

use vehicle_replay::app::{self, AppError, ViewerConfig};
use vehicle_replay::config::{Cli, ConfigError};
use vehicle_replay::export::ExportSettings;
use vehicle_replay::resources::ObjLoader;
use vehicle_replay::scene::Scene;
use vehicle_replay::trajectory::Trajectory;

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    App(#[from] AppError),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let env = cli.environment()?;

    let load = Trajectory::load(env.trajectory_path()?);
    if let Some(e) = &load.error {
        log::warn!(
            "Trajectory partially loaded ({} samples): {}",
            load.trajectory.len(),
            e
        );
    }

    let loader = if env.vehicle.y_up {
        ObjLoader::y_up()
    } else {
        ObjLoader::new()
    };
    let scene = Scene::from_environment(&env, load.trajectory, &loader);

    let viewer = ViewerConfig {
        width: cli.width,
        height: cli.height,
        vsync: !cli.no_vsync,
        ..Default::default()
    };

    match &cli.export {
        Some(output) => {
            let settings = ExportSettings {
                width: cli.export_width,
                height: cli.export_height,
                fps: cli.export_fps,
            };
            let summary = app::run_export(&viewer, scene, output, &settings)?;
            if summary.cancelled {
                log::warn!("Export cancelled; {} frames written", summary.frames);
            }
        }
        None => app::run(&viewer, scene)?,
    }
    Ok(())
}
