use nalgebra::Point3;

/// Scalar used for parameters, time and coordinates.
pub type Value = f32;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A parametric surface: maps `(u, v, t)` to a [`Point`].
///
/// `u` and `v` are normalized grid coordinates in `(-1, 1)`, `t` is elapsed time.
pub type SurfaceFunction = fn(Value, Value, Value) -> Point;
