use bevy::prelude::{Transform, Vec3};

use crate::types::{Point, Value};

/// Something a grid cell can write its evaluated position into.
///
/// The grid never reads a sink back; it only calls [`set_position`](PositionSink::set_position)
/// once per cell per tick.
pub trait PositionSink {
    fn set_position(&mut self, position: Point);
}

impl PositionSink for Point {
    #[inline]
    fn set_position(&mut self, position: Point) {
        *self = position;
    }
}

impl PositionSink for Vec3 {
    #[inline]
    fn set_position(&mut self, position: Point) {
        *self = Vec3::new(position.x, position.y, position.z);
    }
}

/// Writes the local translation only. Scale and rotation are left to whoever spawned the point.
impl PositionSink for Transform {
    #[inline]
    fn set_position(&mut self, position: Point) {
        self.translation.set_position(position);
    }
}

/// Creates the cells of a grid.
///
/// Returns exactly `count` sinks, already sized to `scale`, in the order the grid should
/// index them (row-major).
pub trait CellFactory<S> {
    fn create_cells(&mut self, count: usize, scale: Value) -> Vec<S>;
}

impl<S, F> CellFactory<S> for F
where
    F: FnMut(usize, Value) -> Vec<S>,
{
    fn create_cells(&mut self, count: usize, scale: Value) -> Vec<S> {
        self(count, scale)
    }
}

/// Default factory: plain points at the origin. Points carry no scale.
pub fn point_buffer(count: usize, _scale: Value) -> Vec<Point> {
    vec![Point::origin(); count]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_sink_keeps_scale() {
        let mut transform = Transform::from_scale(Vec3::splat(0.2));
        transform.set_position(Point::new(1., 2., 3.));
        assert_eq!(transform.translation, Vec3::new(1., 2., 3.));
        assert_eq!(transform.scale, Vec3::splat(0.2));
    }

    #[test]
    fn closures_are_factories() {
        let mut seen_scale = None;
        let mut factory = |count: usize, scale: Value| {
            seen_scale = Some(scale);
            vec![Transform::from_scale(Vec3::splat(scale)); count]
        };
        let cells = factory.create_cells(4, 0.5);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[3].scale, Vec3::splat(0.5));
        assert_eq!(seen_scale, Some(0.5));
    }

    #[test]
    fn point_buffer_starts_at_origin() {
        let cells = point_buffer(9, 0.1);
        assert_eq!(cells.len(), 9);
        assert!(cells.iter().all(|p| *p == Point::origin()));
    }
}
