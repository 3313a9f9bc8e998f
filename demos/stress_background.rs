use bevy::prelude::*;
use bevy_function_graph::{
    FunctionGraphPlugin,
    function::FunctionKind,
    grid::EvaluationStrategy,
    plugin::{FunctionGraph, GraphPointPrefab},
};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            FunctionGraphPlugin {
                strategy: EvaluationStrategy::Background,
            },
            PanOrbitCameraPlugin,
        ))
        .add_systems(Startup, setup)
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    const RESOLUTION: usize = 100;
    const SPACING: f32 = 2.5;

    commands.spawn((
        Camera3d::default(),
        PanOrbitCamera {
            button_orbit: MouseButton::Right,
            button_pan: MouseButton::Middle,
            ..default()
        },
        Transform::from_xyz(0., 8., 10.).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight::default(),
        Transform::default().with_rotation(Quat::from_rotation_x(-45.0_f32.to_radians())),
    ));

    let mesh = meshes.add(Sphere::new(0.5));

    // One graph per catalog entry, laid out in a row.
    let offset = (FunctionKind::COUNT - 1) as f32 * SPACING / 2.;
    for kind in FunctionKind::ALL {
        let hue = kind.index() as f32 / FunctionKind::COUNT as f32 * 360.;
        commands.spawn((
            FunctionGraph::new(RESOLUTION)
                .expect("resolution is non-zero")
                .with_function(kind),
            GraphPointPrefab {
                mesh: mesh.clone(),
                material: materials.add(StandardMaterial {
                    base_color: Color::hsl(hue, 0.8, 0.5),
                    ..Default::default()
                }),
            },
            Transform::from_xyz(kind.index() as f32 * SPACING - offset, 0., 0.),
        ));
    }
}
