use bevy::{
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};
use tracing::{debug, trace, warn};

use crate::{
    error::Result,
    function::FunctionKind,
    grid::{EvaluationStrategy, Grid, TickOutput},
    sink::{PositionSink, point_buffer},
    types::Point,
};

/// System sets for the function graph pipeline.
///
/// ```text
/// FunctionGraphSet::Spawn  →  FunctionGraphSet::Select  →  FunctionGraphSet::Evaluate  →  FunctionGraphSet::Upload
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FunctionGraphSet {
    /// Spawns point entities for new graphs and rebuilds them on a resolution change.
    Spawn,
    /// Applies [`SelectGraphFunction`] messages.
    Select,
    /// Recomputes cell positions, inline or on the async compute pool.
    Evaluate,
    /// Copies cell positions into the point entities' [`Transform`]s.
    Upload,
}

/// An animated grid of points driven by a surface function.
///
/// Add it to an entity and the plugin spawns `resolution²` [`GraphPoint`] children,
/// re-evaluates the grid every frame and moves the children to the evaluated positions.
///
/// ```rust,ignore
/// commands.spawn((
///     FunctionGraph::new(50)?.with_function(FunctionKind::Ripple),
///     GraphPointPrefab { mesh, material },
/// ));
/// ```
#[derive(Component, Debug, Clone)]
#[require(Transform, Visibility)]
pub struct FunctionGraph {
    grid: Grid<Point>,
}

impl FunctionGraph {
    /// Creates a graph with `resolution × resolution` points.
    ///
    /// Fails if `resolution` is zero.
    pub fn new(resolution: usize) -> Result<Self> {
        Ok(Self {
            grid: Grid::new(resolution, &mut point_buffer)?,
        })
    }

    /// Sets the initial surface function.
    pub fn with_function(mut self, function: FunctionKind) -> Self {
        self.grid.set_function(function);
        self
    }

    pub fn grid(&self) -> &Grid<Point> {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid<Point> {
        &mut self.grid
    }

    pub fn function(&self) -> FunctionKind {
        self.grid.function()
    }

    pub fn set_function(&mut self, function: FunctionKind) {
        self.grid.set_function(function);
    }

    /// See [`Grid::set_function_by_name`].
    pub fn set_function_by_name(&mut self, name: &str) -> bool {
        self.grid.set_function_by_name(name)
    }
}

/// One point of a [`FunctionGraph`]; a child of the graph entity.
///
/// `index` is the row-major cell index, `z * resolution + x`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
#[require(Transform)]
pub struct GraphPoint {
    pub index: usize,
}

/// Mesh and material given to every spawned [`GraphPoint`].
///
/// Optional: without it points are spawned as bare transforms, which is enough for headless
/// use or for attaching visuals yourself.
#[derive(Component, Debug, Clone)]
pub struct GraphPointPrefab {
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
}

/// Requests a surface function by name for every [`FunctionGraph`].
///
/// Unknown names are ignored and each graph keeps its current function.
#[derive(Message, Debug, Clone)]
pub struct SelectGraphFunction {
    pub name: String,
}

/// Holds the in-flight background tick of a [`FunctionGraph`].
///
/// While present the graph is not evaluated again, so at most one tick per graph is ever
/// in flight.
#[derive(Component)]
pub struct TickTask(Task<TickOutput>);

/// Runtime configuration for the function graph pipeline.
///
/// ```rust,ignore
/// fn go_wide(mut config: ResMut<FunctionGraphConfig>) {
///     config.strategy = EvaluationStrategy::FanOut;
/// }
/// ```
#[derive(Resource, Debug, Clone, Default)]
pub struct FunctionGraphConfig {
    /// How each frame's evaluation is scheduled. Default: [`EvaluationStrategy::Synchronous`].
    pub strategy: EvaluationStrategy,
}

/// Bevy plugin that animates every [`FunctionGraph`].
///
/// ```text
/// FunctionGraph added (or replaced with a new resolution)
///   → GraphPoint children (re)spawned   (FunctionGraphSet::Spawn, `auto_spawn` feature)
///   → SelectGraphFunction applied       (FunctionGraphSet::Select)
///   → grid ticked at Time::elapsed_secs (FunctionGraphSet::Evaluate)
///       Synchronous / FanOut: inline, same frame
///       Background: TickTask spawned, applied on a later frame
///   → child Transforms updated          (FunctionGraphSet::Upload)
/// ```
#[derive(Default)]
pub struct FunctionGraphPlugin {
    /// Initial value for [`FunctionGraphConfig::strategy`].
    pub strategy: EvaluationStrategy,
}

impl Plugin for FunctionGraphPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(FunctionGraphConfig {
            strategy: self.strategy,
        })
        .add_message::<SelectGraphFunction>()
        .configure_sets(
            Update,
            (
                FunctionGraphSet::Spawn,
                FunctionGraphSet::Select,
                FunctionGraphSet::Evaluate,
                FunctionGraphSet::Upload,
            )
                .chain(),
        )
        .add_systems(
            Update,
            (
                apply_function_selection.in_set(FunctionGraphSet::Select),
                (poll_tick_tasks, evaluate_graphs, spawn_tick_tasks)
                    .chain()
                    .in_set(FunctionGraphSet::Evaluate),
                upload_positions.in_set(FunctionGraphSet::Upload),
            ),
        );

        #[cfg(feature = "auto_spawn")]
        app.add_systems(Update, spawn_graph_points.in_set(FunctionGraphSet::Spawn));
    }
}

/// Resolution the current [`GraphPoint`] children of a graph were spawned for.
///
/// Inserted by [`spawn_graph_points`]. When a [`FunctionGraph`] is replaced with one of a
/// different resolution, the mismatch triggers a rebuild of its points.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedResolution(pub usize);

/// Spawns one [`GraphPoint`] child per cell for every new or rebuilt [`FunctionGraph`].
///
/// Points are scaled uniformly to the grid step. A graph whose resolution no longer matches
/// its [`SpawnedResolution`] has its old points despawned first. Registered automatically with
/// the `auto_spawn` feature; otherwise schedule it yourself in [`FunctionGraphSet::Spawn`].
pub fn spawn_graph_points(
    mut commands: Commands,
    graphs: Query<
        (
            Entity,
            &FunctionGraph,
            Option<&SpawnedResolution>,
            Option<&GraphPointPrefab>,
        ),
        Changed<FunctionGraph>,
    >,
    points: Query<(Entity, &ChildOf), With<GraphPoint>>,
) {
    for (entity, graph, spawned, prefab) in graphs.iter() {
        let grid = graph.grid();
        let resolution = grid.resolution();
        if spawned == Some(&SpawnedResolution(resolution)) {
            continue;
        }

        if let Some(SpawnedResolution(previous)) = spawned {
            debug!(?entity, previous, resolution, "rebuilding graph points");
            for (point, child_of) in points.iter() {
                if child_of.parent() == entity {
                    commands.entity(point).despawn();
                }
            }
        }

        let scale = Vec3::splat(grid.step());
        commands
            .entity(entity)
            .insert(SpawnedResolution(resolution))
            .with_children(|parent| {
                for index in 0..grid.len() {
                    let mut transform = Transform::from_scale(scale);
                    if let Some(position) = grid.cell_at(index) {
                        transform.set_position(*position);
                    }

                    let mut point = parent.spawn((GraphPoint { index }, transform));
                    if let Some(prefab) = prefab {
                        point.insert((
                            Mesh3d(prefab.mesh.clone()),
                            MeshMaterial3d(prefab.material.clone()),
                        ));
                    }
                }
            });
    }
}

/// Drains [`SelectGraphFunction`] messages into every graph.
fn apply_function_selection(
    mut messages: MessageReader<SelectGraphFunction>,
    mut graphs: Query<&mut FunctionGraph>,
) {
    for message in messages.read() {
        for mut graph in graphs.iter_mut() {
            graph.set_function_by_name(&message.name);
        }
    }
}

/// Ticks graphs inline for the [`Synchronous`](EvaluationStrategy::Synchronous) and
/// [`FanOut`](EvaluationStrategy::FanOut) strategies.
fn evaluate_graphs(
    config: Res<FunctionGraphConfig>,
    time: Res<Time>,
    mut graphs: Query<&mut FunctionGraph, Without<TickTask>>,
) {
    let strategy = config.strategy;
    if strategy == EvaluationStrategy::Background {
        return;
    }

    let elapsed = time.elapsed_secs();
    for mut graph in graphs.iter_mut() {
        graph.grid_mut().tick_with(strategy, elapsed);
    }
}

/// Spawns a background tick for every graph that has none in flight.
fn spawn_tick_tasks(
    mut commands: Commands,
    config: Res<FunctionGraphConfig>,
    time: Res<Time>,
    graphs: Query<(Entity, &FunctionGraph), Without<TickTask>>,
) {
    if config.strategy != EvaluationStrategy::Background {
        return;
    }

    let task_pool = AsyncComputeTaskPool::get();
    let elapsed = time.elapsed_secs();

    for (entity, graph) in graphs.iter() {
        let job = graph.grid().job(elapsed);
        trace!(?entity, function = %job.function(), time = job.time(), "spawning graph tick");

        let task = task_pool.spawn(async move { job.run() });
        commands.entity(entity).insert(TickTask(task));
    }
}

/// Polls in-flight [`TickTask`]s and applies finished outputs.
///
/// Non-blocking: unfinished tasks are retried next frame. Runs regardless of the configured
/// strategy so switching away from `Background` never strands a task.
fn poll_tick_tasks(
    mut commands: Commands,
    mut graphs: Query<(Entity, &mut FunctionGraph, &mut TickTask)>,
) {
    for (entity, mut graph, mut tick_task) in graphs.iter_mut() {
        if let Some(output) = block_on(future::poll_once(&mut tick_task.0)) {
            if let Err(err) = graph.grid_mut().apply(&output) {
                warn!(?entity, %err, "discarding background tick");
            }
            commands.entity(entity).remove::<TickTask>();
        }
    }
}

/// Moves every [`GraphPoint`] to its cell's position when its graph has changed.
fn upload_positions(
    graphs: Query<Ref<FunctionGraph>>,
    mut points: Query<(&GraphPoint, &ChildOf, &mut Transform)>,
) {
    points
        .par_iter_mut()
        .for_each(|(point, child_of, mut transform)| {
            let Ok(graph) = graphs.get(child_of.parent()) else {
                return;
            };
            if !graph.is_changed() {
                return;
            }
            if let Some(position) = graph.grid().cell_at(point.index) {
                transform.set_position(*position);
            }
        });
}
