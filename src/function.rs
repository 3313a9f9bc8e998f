//! The surface function catalog.
//!
//! Every function maps `(u, v, t)` to a [`Point`]. They are pure, never allocate and are
//! safe to call from any number of threads at once. Trig arguments are expressed in
//! half-turns, so `sin_pi(x, 0., 1.)` is `sin(π·x)`.

use std::{f32::consts::PI, str::FromStr};

use derive_more::Display;

use crate::{
    error::GraphError,
    types::{Point, SurfaceFunction, Value},
};

/// Identifies one entry of the catalog.
///
/// The discriminant order is part of the public contract: callers may select a function by
/// ordinal through [`FunctionKind::from_index`].
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    #[default]
    Sine,
    MultiSine,
    Sine2D,
    MultiSine2D,
    Ripple,
    Cylinder,
    Sphere,
    Torus,
}

/// Catalog functions, in [`FunctionKind`] order.
pub const FUNCTIONS: [SurfaceFunction; FunctionKind::COUNT] = [
    sine,
    multi_sine,
    sine_2d,
    multi_sine_2d,
    ripple,
    cylinder,
    sphere,
    torus,
];

impl FunctionKind {
    pub const COUNT: usize = 8;

    pub const ALL: [FunctionKind; Self::COUNT] = [
        FunctionKind::Sine,
        FunctionKind::MultiSine,
        FunctionKind::Sine2D,
        FunctionKind::MultiSine2D,
        FunctionKind::Ripple,
        FunctionKind::Cylinder,
        FunctionKind::Sphere,
        FunctionKind::Torus,
    ];

    /// Position of this kind in the catalog.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            FunctionKind::Sine => "Sine",
            FunctionKind::MultiSine => "MultiSine",
            FunctionKind::Sine2D => "Sine2D",
            FunctionKind::MultiSine2D => "MultiSine2D",
            FunctionKind::Ripple => "Ripple",
            FunctionKind::Cylinder => "Cylinder",
            FunctionKind::Sphere => "Sphere",
            FunctionKind::Torus => "Torus",
        }
    }

    /// The next kind in catalog order, wrapping back to [`FunctionKind::Sine`].
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::COUNT]
    }

    #[inline]
    pub fn function(self) -> SurfaceFunction {
        FUNCTIONS[self.index()]
    }

    #[inline]
    pub fn evaluate(self, u: Value, v: Value, t: Value) -> Point {
        (self.function())(u, v, t)
    }
}

impl FromStr for FunctionKind {
    type Err = GraphError;

    /// Exact, case-sensitive match against [`FunctionKind::name`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| GraphError::UnknownFunction(s.to_owned()))
    }
}

// sin(k·π·(base + offset))
#[inline]
fn sin_pi(base: Value, offset: Value, k: Value) -> Value {
    (k * PI * (base + offset)).sin()
}

// cos(k·π·(base + offset))
#[inline]
fn cos_pi(base: Value, offset: Value, k: Value) -> Value {
    (k * PI * (base + offset)).cos()
}

/// Single travelling wave along `u`.
pub fn sine(u: Value, v: Value, t: Value) -> Point {
    Point::new(u, sin_pi(u, t, 1.), v)
}

/// Sine wave with a faster, half-amplitude harmonic layered on top.
pub fn multi_sine(u: Value, v: Value, t: Value) -> Point {
    let mut y = sin_pi(u, t, 1.);
    y += sin_pi(u, 2. * t, 2.) / 2.;
    y *= 2. / 3.;
    Point::new(u, y, v)
}

/// Average of two waves, one along each axis.
pub fn sine_2d(u: Value, v: Value, t: Value) -> Point {
    let y = (sin_pi(u, t, 1.) + sin_pi(v, t, 1.)) * 0.5;
    Point::new(u, y, v)
}

/// A slow diagonal wave mixed with two axis-aligned waves.
pub fn multi_sine_2d(u: Value, v: Value, t: Value) -> Point {
    let mut y = 4. * sin_pi(u + v, t / 2., 1.);
    y += sin_pi(u, t, 1.);
    y += sin_pi(v, 2. * t, 2.) * 0.5;
    y *= 1. / 5.5;
    Point::new(u, y, v)
}

/// Concentric wave spreading from the origin, damped with distance.
pub fn ripple(u: Value, v: Value, t: Value) -> Point {
    let d = (u * u + v * v).sqrt();
    let y = sin_pi(4. * d, -t, 1.) / (1. + 10. * d);
    Point::new(u, y, v)
}

/// Cylinder around the Y axis whose radius twists over time.
pub fn cylinder(u: Value, v: Value, t: Value) -> Point {
    let r = 0.8 + sin_pi(6. * u + 2. * v, t, 1.) * 0.2;
    Point::new(r * sin_pi(u, 0., 1.), v, r * cos_pi(u, 0., 1.))
}

/// Pulsing sphere; `v` sweeps pole to pole, `u` around the equator.
pub fn sphere(u: Value, v: Value, t: Value) -> Point {
    let mut r = 0.8 + sin_pi(6. * u, t, 1.) * 0.1;
    r += sin_pi(4. * v, t, 1.) * 0.1;
    let s = r * cos_pi(v, 0., 0.5);
    Point::new(
        s * sin_pi(u, 0., 1.),
        r * sin_pi(v, 0., 0.5),
        s * cos_pi(u, 0., 1.),
    )
}

/// Twisting torus: `r1` is the major radius, `r2` the tube radius.
pub fn torus(u: Value, v: Value, t: Value) -> Point {
    let r1 = 0.65 + sin_pi(6. * u, t, 1.) * 0.1;
    let r2 = 0.2 + sin_pi(4. * v, t, 1.) * 0.05;
    let s = r2 * cos_pi(v, 0., 1.) + r1;
    Point::new(
        s * sin_pi(u, 0., 1.),
        r2 * sin_pi(v, 0., 1.),
        s * cos_pi(u, 0., 1.),
    )
}
