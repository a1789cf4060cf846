// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Easing curves for property animations.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::f64::consts::PI;
use core::fmt;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// Shape of a built-in easing curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EasingFamily {
    /// Constant speed.
    Linear,
    /// `t²`.
    Quad,
    /// `t³`.
    Cubic,
    /// `t⁴`.
    Quart,
    /// `t⁵`.
    Quint,
    /// Quarter sine wave.
    Sine,
    /// Exponential.
    Expo,
    /// Quarter circle.
    Circ,
    /// Damped oscillation.
    Elastic,
    /// Overshoots, then settles.
    Back,
    /// Bounces against the end value.
    Bounce,
}

/// Which end of the curve accelerates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EaseDirection {
    /// Slow start.
    In,
    /// Slow end.
    Out,
    /// Slow start and end.
    InOut,
    /// Fast start and end.
    OutIn,
}

/// Sampled easing curve.
///
/// Values between samples are linearly interpolated. The optional release
/// hook runs when the curve is dropped, which happens exactly once, when the
/// animation that owns it is removed or replaced.
pub struct Curve {
    samples: Vec<f32>,
    release: Option<Box<dyn FnOnce()>>,
}

impl Curve {
    /// Creates a curve from evenly spaced samples over `[0, 1]`.
    #[must_use]
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            release: None,
        }
    }

    /// Attaches a hook that runs when the curve is released.
    #[must_use]
    pub fn with_release(mut self, release: impl FnOnce() + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Returns the samples.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    fn eval(&self, t: f32) -> f32 {
        match self.samples.len() {
            0 => t,
            1 => self.samples[0],
            n => {
                let pos = t.clamp(0.0, 1.0) * (n - 1) as f32;
                let i = (pos as usize).min(n - 2);
                let frac = pos - i as f32;
                let (a, b) = (self.samples[i], self.samples[i + 1]);
                a + (b - a) * frac
            }
        }
    }
}

impl Drop for Curve {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Curve")
            .field("samples", &self.samples.len())
            .field("release", &self.release.is_some())
            .finish()
    }
}

/// An easing curve: built in, or sampled.
#[derive(Debug)]
pub enum Easing {
    /// A closed-form curve.
    Builtin(EasingFamily, EaseDirection),
    /// A sampled curve.
    Curve(Curve),
}

impl Easing {
    /// Constant speed.
    pub const LINEAR: Self = Self::Builtin(EasingFamily::Linear, EaseDirection::In);

    /// Maps normalized time `t` to an interpolation factor.
    ///
    /// Factors start at 0 and end at 1, but may leave `[0, 1]` in between
    /// (elastic and back curves overshoot).
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "curve evaluation is done in f64 and narrowed for the f32 API"
    )]
    pub fn eval(&self, t: f32) -> f32 {
        match self {
            Self::Builtin(family, direction) => {
                let t = f64::from(t);
                let x = match direction {
                    EaseDirection::In => ease_in(*family, t),
                    EaseDirection::Out => ease_out(*family, t),
                    EaseDirection::InOut => {
                        if t < 0.5 {
                            ease_in(*family, 2.0 * t) * 0.5
                        } else {
                            1.0 - ease_in(*family, 2.0 - 2.0 * t) * 0.5
                        }
                    }
                    EaseDirection::OutIn => {
                        if t < 0.5 {
                            ease_out(*family, 2.0 * t) * 0.5
                        } else {
                            0.5 + ease_in(*family, 2.0 * t - 1.0) * 0.5
                        }
                    }
                };
                x as f32
            }
            Self::Curve(curve) => curve.eval(t),
        }
    }

    /// A copy for sibling component animations. A curve's release hook stays
    /// with the original.
    pub(crate) fn share(&self) -> Self {
        match self {
            Self::Builtin(family, dir) => Self::Builtin(*family, *dir),
            Self::Curve(curve) => Self::Curve(Curve::new(curve.samples.clone())),
        }
    }
}

impl Default for Easing {
    fn default() -> Self {
        Self::LINEAR
    }
}

fn ease_out(family: EasingFamily, t: f64) -> f64 {
    match family {
        EasingFamily::Bounce => bounce_out(t),
        _ => 1.0 - ease_in(family, 1.0 - t),
    }
}

fn ease_in(family: EasingFamily, t: f64) -> f64 {
    match family {
        EasingFamily::Linear => t,
        EasingFamily::Quad => t * t,
        EasingFamily::Cubic => t * t * t,
        EasingFamily::Quart => t * t * t * t,
        EasingFamily::Quint => t * t * t * t * t,
        EasingFamily::Sine => 1.0 - (t * PI * 0.5).cos(),
        EasingFamily::Expo => {
            if t <= 0.0 {
                0.0
            } else {
                2.0_f64.powf(10.0 * (t - 1.0))
            }
        }
        EasingFamily::Circ => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        EasingFamily::Elastic => {
            if t <= 0.0 || t >= 1.0 {
                t
            } else {
                let period = 0.3;
                let s = period / 4.0;
                -(2.0_f64.powf(10.0 * (t - 1.0)) * ((t - 1.0 - s) * 2.0 * PI / period).sin())
            }
        }
        EasingFamily::Back => {
            let s = 1.701_58;
            t * t * ((s + 1.0) * t - s)
        }
        EasingFamily::Bounce => 1.0 - bounce_out(1.0 - t),
    }
}

fn bounce_out(t: f64) -> f64 {
    const N: f64 = 7.5625;
    const D: f64 = 2.75;
    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984_375
    }
}
