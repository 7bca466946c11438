//! Parameters and their bindings.
//!
//! Model:
//! - A parameter has one or two axes. Each axis has sorted keypoint positions
//!   in normalized [0,1] space (`axis_points`).
//! - A binding stores one value per keypoint pair, forming an `x × y` grid
//!   (`values[x][y]`). 1D parameters have a single y keypoint.
//! - Evaluation finds the grid cell containing the normalized value and
//!   interpolates the corner values according to the binding's mode.
//!
//! Out-of-range values are clamped to `[min, max]` when set.

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::math::Vec2;
use crate::node::NodeOffsets;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolateMode {
    Nearest,
    #[default]
    Linear,
    /// Holds the left keypoint until the next one.
    Stepped,
    /// Evaluated as `Linear`.
    Cubic,
}

/// Node property a binding drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingTarget {
    TranslateX,
    TranslateY,
    RotateZ,
    ScaleX,
    ScaleY,
    ZSort,
    Opacity,
    Deform,
}

impl BindingTarget {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "transform.t.x" => BindingTarget::TranslateX,
            "transform.t.y" => BindingTarget::TranslateY,
            "transform.r.z" => BindingTarget::RotateZ,
            "transform.s.x" => BindingTarget::ScaleX,
            "transform.s.y" => BindingTarget::ScaleY,
            "zSort" => BindingTarget::ZSort,
            "opacity" => BindingTarget::Opacity,
            "deform" => BindingTarget::Deform,
            _ => return None,
        })
    }

    /// Value that leaves the node untouched.
    pub fn identity(self) -> f32 {
        match self {
            BindingTarget::ScaleX | BindingTarget::ScaleY | BindingTarget::Opacity => 1.0,
            _ => 0.0,
        }
    }
}

/// Keypoint grid of a binding, indexed `[x][y]`.
#[derive(Clone, Debug, PartialEq)]
pub enum BindingValues {
    Scalar(Vec<Vec<f32>>),
    /// One offset per mesh vertex at every keypoint.
    Deform(Vec<Vec<Vec<Vec2>>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub node: NodeId,
    pub target: BindingTarget,
    pub values: BindingValues,
    pub interpolate: InterpolateMode,
}

/// Position of a normalized value on one axis: left keypoint and offset toward the next.
fn locate(axis: &[f32], t: f32) -> (usize, f32) {
    let n = axis.len();
    if n <= 1 || t <= axis[0] {
        return (0, 0.0);
    }
    if t >= axis[n - 1] {
        return (n - 1, 0.0);
    }
    for i in 0..(n - 1) {
        let t0 = axis[i];
        let t1 = axis[i + 1];
        if t >= t0 && t <= t1 {
            let denom = (t1 - t0).max(f32::EPSILON);
            return (i, ((t - t0) / denom).clamp(0.0, 1.0));
        }
    }
    (n - 1, 0.0)
}

fn shape_offset(mode: InterpolateMode, t: f32) -> f32 {
    match mode {
        InterpolateMode::Nearest => {
            if t >= 0.5 {
                1.0
            } else {
                0.0
            }
        }
        InterpolateMode::Stepped => 0.0,
        InterpolateMode::Linear | InterpolateMode::Cubic => t,
    }
}

/// Bilinear sample of `grid` around cell `(ix, iy)` with offsets `(tx, ty)`.
fn sample_grid<T: Clone>(
    grid: &[Vec<T>],
    (ix, tx): (usize, f32),
    (iy, ty): (usize, f32),
    lerp: impl Fn(&T, &T, f32) -> T,
) -> T {
    let ix1 = (ix + 1).min(grid.len() - 1);
    let iy1 = (iy + 1).min(grid[ix].len() - 1);
    let top = lerp(&grid[ix][iy], &grid[ix1][iy], tx);
    if ty == 0.0 || iy1 == iy {
        return top;
    }
    let bottom = lerp(&grid[ix][iy1], &grid[ix1][iy1], tx);
    lerp(&top, &bottom, ty)
}

fn lerp_f32(a: &f32, b: &f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp_deform(a: &Vec<Vec2>, b: &Vec<Vec2>, t: f32) -> Vec<Vec2> {
    a.iter().zip(b).map(|(a, b)| a.lerp(*b, t)).collect()
}

/// Fill unset grid points: along x first, then along y, then with `identity`.
pub(crate) fn fill_unset<T: Clone>(
    grid: &mut [Vec<T>],
    is_set: &mut [Vec<bool>],
    axes: &[Vec<f32>; 2],
    identity: impl Fn() -> T,
    lerp: impl Fn(&T, &T, f32) -> T,
) {
    let nx = grid.len();
    let ny = grid.first().map_or(0, |c| c.len());

    let fill_line = |get: &dyn Fn(usize) -> (T, bool), n: usize, axis: &[f32]| {
        let mut out: Vec<Option<T>> = vec![None; n];
        for i in 0..n {
            if get(i).1 {
                continue;
            }
            let left = (0..i).rev().find(|&k| get(k).1);
            let right = (i + 1..n).find(|&k| get(k).1);
            out[i] = match (left, right) {
                (Some(l), Some(r)) => {
                    let span = (axis[r] - axis[l]).max(f32::EPSILON);
                    Some(lerp(&get(l).0, &get(r).0, (axis[i] - axis[l]) / span))
                }
                (Some(k), None) | (None, Some(k)) => Some(get(k).0),
                (None, None) => None,
            };
        }
        out
    };

    // rows: vary x at fixed y
    for y in 0..ny {
        let filled = fill_line(
            &|x| (grid[x][y].clone(), is_set[x][y]),
            nx,
            &axes[0],
        );
        for (x, v) in filled.into_iter().enumerate() {
            if let Some(v) = v {
                grid[x][y] = v;
                is_set[x][y] = true;
            }
        }
    }
    // columns: vary y at fixed x
    for x in 0..nx {
        let filled = fill_line(
            &|y| (grid[x][y].clone(), is_set[x][y]),
            ny,
            &axes[1],
        );
        for (y, v) in filled.into_iter().enumerate() {
            if let Some(v) = v {
                grid[x][y] = v;
                is_set[x][y] = true;
            }
        }
    }
    for x in 0..nx {
        for y in 0..ny {
            if !is_set[x][y] {
                grid[x][y] = identity();
                is_set[x][y] = true;
            }
        }
    }
}

impl Binding {
    /// Apply this binding at `normalized` onto `offsets`.
    pub fn apply(&self, axes: &[Vec<f32>; 2], normalized: Vec2, offsets: &mut NodeOffsets) {
        let (ix, tx) = locate(&axes[0], normalized.x);
        let (iy, ty) = locate(&axes[1], normalized.y);
        let cx = (ix, shape_offset(self.interpolate, tx));
        let cy = (iy, shape_offset(self.interpolate, ty));

        match &self.values {
            BindingValues::Scalar(grid) => {
                let v = sample_grid(grid, cx, cy, lerp_f32);
                match self.target {
                    BindingTarget::TranslateX => offsets.translation.x += v,
                    BindingTarget::TranslateY => offsets.translation.y += v,
                    BindingTarget::RotateZ => offsets.rotation += v,
                    BindingTarget::ScaleX => offsets.scale.x *= v,
                    BindingTarget::ScaleY => offsets.scale.y *= v,
                    BindingTarget::ZSort => offsets.zsort += v,
                    BindingTarget::Opacity => offsets.opacity *= v,
                    BindingTarget::Deform => {}
                }
            }
            BindingValues::Deform(grid) => {
                let d = sample_grid(grid, cx, cy, lerp_deform);
                if offsets.deform.len() < d.len() {
                    offsets.deform.resize(d.len(), Vec2::ZERO);
                }
                for (acc, v) in offsets.deform.iter_mut().zip(d) {
                    *acc = *acc + v;
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub uuid: u32,
    name: String,
    active: bool,
    is_vec2: bool,
    min: Vec2,
    max: Vec2,
    defaults: Vec2,
    value: Vec2,
    /// Keypoint positions per axis in normalized space. The y axis of a 1D parameter is `[0.0]`.
    pub axis_points: [Vec<f32>; 2],
    pub bindings: Vec<Binding>,
}

impl Parameter {
    /// A parameter with no bindings. `min`/`max` are reordered if swapped.
    pub fn new(uuid: u32, name: impl Into<String>, is_vec2: bool, min: Vec2, max: Vec2) -> Self {
        let lo = Vec2::new(min.x.min(max.x), min.y.min(max.y));
        let hi = Vec2::new(min.x.max(max.x), min.y.max(max.y));
        let mut p = Self {
            uuid,
            name: name.into(),
            active: true,
            is_vec2,
            min: lo,
            max: hi,
            defaults: lo,
            value: lo,
            axis_points: [vec![0.0, 1.0], if is_vec2 { vec![0.0, 1.0] } else { vec![0.0] }],
            bindings: Vec::new(),
        };
        p.set_defaults(Vec2::ZERO);
        p.reset();
        p
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_vec2(&self) -> bool {
        self.is_vec2
    }

    pub fn dimensions(&self) -> u32 {
        if self.is_vec2 {
            2
        } else {
            1
        }
    }

    pub fn min(&self) -> Vec2 {
        self.min
    }

    pub fn max(&self) -> Vec2 {
        self.max
    }

    pub fn defaults(&self) -> Vec2 {
        self.defaults
    }

    /// Set the rest value, clamped like `set_value`.
    pub fn set_defaults(&mut self, defaults: Vec2) {
        self.defaults = self.clamp(defaults, self.min);
    }

    pub fn value(&self) -> Vec2 {
        self.value
    }

    fn clamp(&self, v: Vec2, fallback: Vec2) -> Vec2 {
        let x = if v.x.is_finite() {
            v.x.clamp(self.min.x, self.max.x)
        } else {
            fallback.x
        };
        let y = if !self.is_vec2 {
            self.min.y
        } else if v.y.is_finite() {
            v.y.clamp(self.min.y, self.max.y)
        } else {
            fallback.y
        };
        Vec2::new(x, y)
    }

    /// Set the value, clamping each axis to `[min, max]`.
    /// Non-finite components are ignored; the y axis of a 1D parameter stays at `min.y`.
    pub fn set_value(&mut self, value: Vec2) {
        self.value = self.clamp(value, self.value);
    }

    /// Value mapped into `[0, 1]` per axis. A zero-width axis reports 0.
    pub fn normalized_value(&self) -> Vec2 {
        self.map_value(self.value)
    }

    pub fn map_value(&self, v: Vec2) -> Vec2 {
        let map = |v: f32, lo: f32, hi: f32| {
            let range = hi - lo;
            if range.abs() <= f32::EPSILON {
                0.0
            } else {
                ((v - lo) / range).clamp(0.0, 1.0)
            }
        };
        Vec2::new(
            map(v.x, self.min.x, self.max.x),
            map(v.y, self.min.y, self.max.y),
        )
    }

    pub fn unmap_value(&self, n: Vec2) -> Vec2 {
        let unmap = |n: f32, lo: f32, hi: f32| lo + (hi - lo) * n.clamp(0.0, 1.0);
        Vec2::new(
            unmap(n.x, self.min.x, self.max.x),
            unmap(n.y, self.min.y, self.max.y),
        )
    }

    /// Set the value from normalized `[0, 1]` coordinates (clamped).
    pub fn set_normalized_value(&mut self, n: Vec2) {
        let n = Vec2::new(
            if n.x.is_finite() { n.x } else { self.normalized_value().x },
            if n.y.is_finite() { n.y } else { self.normalized_value().y },
        );
        self.set_value(self.unmap_value(n));
    }

    /// Return to the default value.
    pub fn reset(&mut self) {
        self.value = self.defaults;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_finds_cells_and_edges() {
        let axis = [0.0, 0.5, 1.0];
        assert_eq!(locate(&axis, -1.0), (0, 0.0));
        assert_eq!(locate(&axis, 0.25), (0, 0.5));
        assert_eq!(locate(&axis, 0.75), (1, 0.5));
        assert_eq!(locate(&axis, 1.0), (2, 0.0));
        assert_eq!(locate(&[0.0], 0.3), (0, 0.0));
    }

    #[test]
    fn fill_unset_interpolates_rows() {
        let axes = [vec![0.0, 0.5, 1.0], vec![0.0]];
        let mut grid = vec![vec![0.0], vec![99.0], vec![10.0]];
        let mut set = vec![vec![true], vec![false], vec![true]];
        fill_unset(&mut grid, &mut set, &axes, || 0.0, lerp_f32);
        assert_eq!(grid, vec![vec![0.0], vec![5.0], vec![10.0]]);
    }

    #[test]
    fn fill_unset_falls_back_to_identity() {
        let axes = [vec![0.0, 1.0], vec![0.0]];
        let mut grid = vec![vec![3.0], vec![4.0]];
        let mut set = vec![vec![false], vec![false]];
        fill_unset(&mut grid, &mut set, &axes, || 1.0, lerp_f32);
        assert_eq!(grid, vec![vec![1.0], vec![1.0]]);
    }
}
