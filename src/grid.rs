use ndarray::{Array2, Zip};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, warn};

use crate::{
    error::{GraphError, Result},
    function::FunctionKind,
    sink::{CellFactory, PositionSink},
    types::{Point, Value},
};

/// How a tick distributes its per-cell work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EvaluationStrategy {
    /// Every cell in row-major order on the calling thread.
    #[default]
    Synchronous,
    /// One rayon work unit per cell; the tick returns once all of them have joined.
    FanOut,
    /// A detached [`TickJob`] on a background task pool, applied when it finishes.
    ///
    /// Only the plugin can defer work. Called directly on a [`Grid`] this behaves like
    /// [`FanOut`](EvaluationStrategy::FanOut).
    Background,
}

/// Normalized parameter for grid index `index`: `(index + 0.5) * step - 1`.
///
/// Samples sit at cell centres, so the result is strictly inside `(-1, 1)`.
#[inline]
pub fn coordinate(index: usize, step: Value) -> Value {
    (index as Value + 0.5) * step - 1.
}

/// A `resolution × resolution` grid of position sinks driven by a [`FunctionKind`].
///
/// Cells are stored as `cells[[z, x]]` in standard layout, so the flat index of a cell is
/// `z * resolution + x`.
///
/// ```text
///   x →  0     1    ...  r-1
/// z 0  [ 0 ] [ 1 ]  ... [r-1]
/// ↓ 1  [ r ] [r+1]  ...
///   .
/// ```
#[derive(Debug, Clone)]
pub struct Grid<S = Point> {
    resolution: usize,
    step: Value,
    function: FunctionKind,
    cells: Array2<S>,
    last_time: Option<Value>,
}

impl<S: PositionSink> Grid<S> {
    /// Allocates `resolution²` cells through `factory`, each sized to `2 / resolution`.
    ///
    /// Fails with [`GraphError::InvalidResolution`] for a zero resolution and with
    /// [`GraphError::CellCountMismatch`] if the factory returns the wrong number of cells.
    pub fn new<F>(resolution: usize, factory: &mut F) -> Result<Self>
    where
        F: CellFactory<S> + ?Sized,
    {
        let count = match resolution.checked_mul(resolution) {
            Some(count) if count > 0 => count,
            _ => return Err(GraphError::InvalidResolution(resolution)),
        };
        let step = 2. / resolution as Value;

        let cells = factory.create_cells(count, step);
        let actual = cells.len();
        let cells = Array2::from_shape_vec((resolution, resolution), cells).map_err(|_| {
            GraphError::CellCountMismatch {
                expected: count,
                actual,
            }
        })?;

        debug!(resolution, cells = count, "created function graph grid");

        Ok(Self {
            resolution,
            step,
            function: FunctionKind::default(),
            cells,
            last_time: None,
        })
    }

    /// Evaluates every cell sequentially, in row-major order.
    pub fn tick(&mut self, time: Value) {
        let function = self.function.function();
        let step = self.step;
        for ((z, x), cell) in self.cells.indexed_iter_mut() {
            cell.set_position(function(coordinate(x, step), coordinate(z, step), time));
        }
        self.last_time = Some(time);
    }

    /// Writes the result of a finished [`TickJob`] into the cells.
    pub fn apply(&mut self, output: &TickOutput) -> Result<()> {
        if output.positions.len() != self.cells.len() {
            return Err(GraphError::CellCountMismatch {
                expected: self.cells.len(),
                actual: output.positions.len(),
            });
        }
        for (cell, position) in self.cells.iter_mut().zip(&output.positions) {
            cell.set_position(*position);
        }
        self.last_time = Some(output.time);
        Ok(())
    }
}

impl<S: PositionSink + Send> Grid<S> {
    /// Evaluates every cell on the rayon pool and blocks until all cells are written.
    ///
    /// The function and time are captured before dispatch, so every cell sees the same pair.
    pub fn par_tick(&mut self, time: Value) {
        let function = self.function.function();
        let step = self.step;
        Zip::indexed(&mut self.cells).par_for_each(|(z, x), cell| {
            cell.set_position(function(coordinate(x, step), coordinate(z, step), time));
        });
        self.last_time = Some(time);
    }

    pub fn tick_with(&mut self, strategy: EvaluationStrategy, time: Value) {
        match strategy {
            EvaluationStrategy::Synchronous => self.tick(time),
            EvaluationStrategy::FanOut | EvaluationStrategy::Background => self.par_tick(time),
        }
    }
}

impl<S> Grid<S> {
    /// Snapshots resolution, active function and `time` into a job that can run elsewhere.
    pub fn job(&self, time: Value) -> TickJob {
        TickJob {
            resolution: self.resolution,
            function: self.function,
            time,
        }
    }

    /// Takes effect on the next tick.
    pub fn set_function(&mut self, function: FunctionKind) {
        self.function = function;
    }

    /// Selects a function by catalog name.
    ///
    /// Unknown names are ignored: the current selection is kept and `false` is returned.
    pub fn set_function_by_name(&mut self, name: &str) -> bool {
        match name.parse() {
            Ok(function) => {
                self.function = function;
                true
            }
            Err(err) => {
                warn!(%err, current = %self.function, "ignoring function selection");
                false
            }
        }
    }

    pub fn function(&self) -> FunctionKind {
        self.function
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Cell size, `2 / resolution`.
    pub fn step(&self) -> Value {
        self.step
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &Array2<S> {
        &self.cells
    }

    pub fn cell(&self, x: usize, z: usize) -> Option<&S> {
        self.cells.get((z, x))
    }

    /// Cell at flat row-major index `z * resolution + x`.
    pub fn cell_at(&self, index: usize) -> Option<&S> {
        self.cells.get((index / self.resolution, index % self.resolution))
    }

    /// Parameter coordinates `(u, v)` of column `x`, row `z`.
    pub fn uv(&self, x: usize, z: usize) -> (Value, Value) {
        (coordinate(x, self.step), coordinate(z, self.step))
    }

    pub fn uv_at(&self, index: usize) -> (Value, Value) {
        self.uv(index % self.resolution, index / self.resolution)
    }

    /// Time of the last tick applied to the cells, if any.
    pub fn last_time(&self) -> Option<Value> {
        self.last_time
    }
}

/// A detached snapshot of one tick.
///
/// Holds everything needed to evaluate the grid, so it can be moved onto another thread or
/// task pool while the grid itself stays put. Only [`Grid::job`] creates one, so the
/// resolution is always one a grid accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickJob {
    resolution: usize,
    function: FunctionKind,
    time: Value,
}

/// Positions produced by [`TickJob::run`], in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub function: FunctionKind,
    pub time: Value,
    pub positions: Vec<Point>,
}

impl TickJob {
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn function(&self) -> FunctionKind {
        self.function
    }

    pub fn time(&self) -> Value {
        self.time
    }

    /// Evaluates all cells in parallel using rayon.
    pub fn run(self) -> TickOutput {
        let TickJob {
            resolution,
            function: kind,
            time,
        } = self;
        let function = kind.function();
        let step = 2. / resolution as Value;

        let count = resolution.saturating_mul(resolution);
        let positions = (0..count)
            .into_par_iter()
            .map(|i| {
                let (z, x) = (i / resolution, i % resolution);
                function(coordinate(x, step), coordinate(z, step), time)
            })
            .collect();

        TickOutput {
            function: kind,
            time,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::point_buffer;

    const EPS: Value = 1e-6;

    fn grid(resolution: usize) -> Grid {
        Grid::new(resolution, &mut point_buffer).unwrap()
    }

    fn positions(grid: &Grid) -> Vec<Point> {
        grid.cells().iter().copied().collect()
    }

    /// Sink that counts how often it was written to.
    #[derive(Default)]
    struct CountingSink {
        writes: usize,
        position: Option<Point>,
    }

    impl PositionSink for CountingSink {
        fn set_position(&mut self, position: Point) {
            self.writes += 1;
            self.position = Some(position);
        }
    }

    #[test]
    fn resolution_ten_has_a_hundred_cells() {
        let grid = grid(10);
        assert_eq!(grid.len(), 100);
        assert_eq!(grid.resolution(), 10);
        assert!((grid.step() - 0.2).abs() < EPS);
    }

    #[test]
    fn zero_resolution_fails() {
        let err = Grid::<Point>::new(0, &mut point_buffer).unwrap_err();
        assert_eq!(err, GraphError::InvalidResolution(0));
    }

    #[test]
    fn overflowing_resolution_fails() {
        let mut never_called = |_: usize, _: Value| -> Vec<Point> { unreachable!() };
        let err = Grid::<Point>::new(usize::MAX, &mut never_called).unwrap_err();
        assert_eq!(err, GraphError::InvalidResolution(usize::MAX));
    }

    #[test]
    fn short_factory_is_rejected() {
        let mut short = |count: usize, _: Value| vec![Point::origin(); count - 1];
        let err = Grid::<Point>::new(3, &mut short).unwrap_err();
        assert_eq!(
            err,
            GraphError::CellCountMismatch {
                expected: 9,
                actual: 8
            }
        );
    }

    #[test]
    fn factory_receives_count_and_scale() {
        let mut requested = None;
        let mut factory = |count: usize, scale: Value| {
            requested = Some((count, scale));
            vec![Point::origin(); count]
        };
        Grid::<Point>::new(4, &mut factory).unwrap();
        assert_eq!(requested, Some((16, 0.5)));
    }

    #[test]
    fn coordinates_are_centred_and_symmetric() {
        let grid = grid(10);
        let (u_min, v_min) = grid.uv(0, 0);
        let (u_max, v_max) = grid.uv(9, 9);
        // step is 0.2, so the outermost centres sit half a step inside the boundary.
        assert!((u_min + 0.9).abs() < EPS, "min u was {u_min}");
        assert!((u_max - 0.9).abs() < EPS, "max u was {u_max}");
        assert_eq!((u_min, u_max), (v_min, v_max));
        for i in 0..grid.len() {
            let (u, v) = grid.uv_at(i);
            assert!(u > -1. && u < 1. && v > -1. && v < 1., "({u}, {v}) at {i}");
        }
    }

    #[test]
    fn single_cell_samples_the_centre() {
        let mut grid = grid(1);
        assert_eq!(grid.uv(0, 0), (0., 0.));
        grid.tick(0.);
        assert_eq!(grid.cell(0, 0), Some(&Point::new(0., 0., 0.)));
    }

    #[test]
    fn tick_writes_row_major() {
        let mut grid = grid(5);
        grid.set_function(FunctionKind::Sine2D);
        grid.tick(0.3);
        for z in 0..5 {
            for x in 0..5 {
                let (u, v) = grid.uv(x, z);
                let expected = FunctionKind::Sine2D.evaluate(u, v, 0.3);
                assert_eq!(grid.cell(x, z), Some(&expected));
                assert_eq!(grid.cell_at(z * 5 + x), Some(&expected));
            }
        }
        assert_eq!(grid.last_time(), Some(0.3));
    }

    #[test]
    fn tick_is_idempotent_for_fixed_time() {
        let mut grid = grid(12);
        grid.set_function(FunctionKind::Torus);
        grid.tick(2.5);
        let first = positions(&grid);
        grid.tick(2.5);
        assert_eq!(first, positions(&grid));
    }

    #[test]
    fn switching_function_changes_output() {
        let mut grid = grid(10);
        let pairs = FunctionKind::ALL
            .into_iter()
            .flat_map(|a| FunctionKind::ALL.into_iter().map(move |b| (a, b)))
            .filter(|(a, b)| a != b);
        for (a, b) in pairs {
            grid.set_function(a);
            grid.tick(0.75);
            let before = positions(&grid);
            grid.set_function(b);
            grid.tick(0.75);
            let after = positions(&grid);
            assert!(
                before
                    .iter()
                    .zip(&after)
                    .any(|(p, q)| (p.y - q.y).abs() > EPS),
                "{a} and {b} produced the same heights"
            );
        }
    }

    #[test]
    fn fan_out_matches_synchronous() {
        for kind in FunctionKind::ALL {
            let mut sequential = grid(17);
            let mut parallel = grid(17);
            sequential.set_function(kind);
            parallel.set_function(kind);
            sequential.tick_with(EvaluationStrategy::Synchronous, 3.2);
            parallel.tick_with(EvaluationStrategy::FanOut, 3.2);
            for (p, q) in positions(&sequential).iter().zip(positions(&parallel).iter()) {
                assert!((*p - *q).norm() < EPS, "{kind}: {p:?} != {q:?}");
            }
        }
    }

    #[test]
    fn every_cell_written_once_per_tick() {
        let mut factory = |count: usize, _: Value| {
            (0..count).map(|_| CountingSink::default()).collect::<Vec<_>>()
        };
        let mut grid = Grid::new(8, &mut factory).unwrap();
        grid.par_tick(1.);
        assert!(grid.cells().iter().all(|c| c.writes == 1));
        grid.tick(2.);
        assert!(grid.cells().iter().all(|c| c.writes == 2));
        assert!(grid.cells().iter().all(|c| c.position.is_some()));
    }

    #[test]
    fn job_snapshots_function_at_creation() {
        let mut grid = grid(6);
        grid.set_function(FunctionKind::Ripple);
        let job = grid.job(1.5);
        grid.set_function(FunctionKind::Cylinder);

        let output = job.run();
        assert_eq!(output.function, FunctionKind::Ripple);
        grid.apply(&output).unwrap();

        let mut reference = self::grid(6);
        reference.set_function(FunctionKind::Ripple);
        reference.tick(1.5);
        assert_eq!(positions(&grid), positions(&reference));
        assert_eq!(grid.last_time(), Some(1.5));
    }

    #[test]
    fn job_carries_the_grid_snapshot() {
        let mut grid = grid(7);
        grid.set_function(FunctionKind::MultiSine2D);
        let job = grid.job(4.25);
        assert_eq!(job.resolution(), 7);
        assert_eq!(job.function(), FunctionKind::MultiSine2D);
        assert_eq!(job.time(), 4.25);
        assert_eq!(job.run().positions.len(), 49);
    }

    #[test]
    fn apply_rejects_wrong_size() {
        let mut grid = grid(4);
        let output = self::grid(3).job(0.).run();
        let err = grid.apply(&output).unwrap_err();
        assert_eq!(
            err,
            GraphError::CellCountMismatch {
                expected: 16,
                actual: 9
            }
        );
        assert_eq!(grid.last_time(), None);
    }

    #[test]
    fn unknown_name_keeps_selection() {
        let mut grid = grid(2);
        assert!(grid.set_function_by_name("Sphere"));
        assert_eq!(grid.function(), FunctionKind::Sphere);
        assert!(!grid.set_function_by_name("Spheroid"));
        assert_eq!(grid.function(), FunctionKind::Sphere);
    }
}
