use bevy::prelude::*;
use bevy_function_graph::{
    FunctionGraphPlugin,
    function::FunctionKind,
    grid::EvaluationStrategy,
    plugin::{FunctionGraph, FunctionGraphConfig, GraphPointPrefab, SelectGraphFunction},
};
use bevy_infinite_grid::{InfiniteGridBundle, InfiniteGridPlugin, InfiniteGridSettings};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            FunctionGraphPlugin::default(),
            PanOrbitCameraPlugin,
            InfiniteGridPlugin,
        ))
        .add_systems(Startup, setup)
        .add_systems(Update, (cycle_function, switch_strategy))
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    bevy::log::info!("Function Graph Example: Space cycles functions, 1/2/3 pick a strategy");

    commands.spawn(InfiniteGridBundle {
        settings: InfiniteGridSettings {
            fadeout_distance: 100.0,
            ..Default::default()
        },
        ..Default::default()
    });

    commands.spawn((
        Camera3d::default(),
        PanOrbitCamera::default(),
        Transform::from_xyz(0.0, 2.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::OVERCAST_DAY,
            ..Default::default()
        },
        Transform::default().with_rotation(Quat::from_rotation_x(-45.0_f32.to_radians())),
    ));

    let graph = FunctionGraph::new(50).expect("resolution is non-zero");
    commands.spawn((
        graph,
        GraphPointPrefab {
            mesh: meshes.add(Cuboid::default()),
            material: materials.add(StandardMaterial {
                base_color: Color::srgb(1., 0.6, 0.1),
                ..Default::default()
            }),
        },
    ));
}

fn cycle_function(
    keyboard: Res<ButtonInput<KeyCode>>,
    graphs: Query<&FunctionGraph>,
    mut select: MessageWriter<SelectGraphFunction>,
) {
    if !keyboard.just_pressed(KeyCode::Space) {
        return;
    }
    let current = graphs
        .iter()
        .next()
        .map_or(FunctionKind::default(), FunctionGraph::function);
    let next = current.next();
    info!("switching to {next}");
    select.write(SelectGraphFunction {
        name: next.name().to_owned(),
    });
}

fn switch_strategy(keyboard: Res<ButtonInput<KeyCode>>, mut config: ResMut<FunctionGraphConfig>) {
    let strategy = if keyboard.just_pressed(KeyCode::Digit1) {
        EvaluationStrategy::Synchronous
    } else if keyboard.just_pressed(KeyCode::Digit2) {
        EvaluationStrategy::FanOut
    } else if keyboard.just_pressed(KeyCode::Digit3) {
        EvaluationStrategy::Background
    } else {
        return;
    };
    info!("evaluation strategy: {strategy:?}");
    config.strategy = strategy;
}
