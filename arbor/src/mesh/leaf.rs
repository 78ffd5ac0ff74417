//! Leaf template geometry

use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

use super::MeshBuilderUV;
use crate::species::{LeafStyle, LeafTemplate};

/// Generate the shared leaf template mesh
///
/// The blade grows from the origin along +Y, `height` long and `width` wide,
/// facing +Z. Each half is folded up about the midrib by `fold` radians.
/// [`LeafStyle::Cross`] adds a second blade rotated a quarter turn about +Y.
///
/// # UV Mapping
/// U spans the width (0 left edge, 1 right edge), V runs from stem (0) to tip (1).
pub fn generate_leaf<M: MeshBuilderUV>(template: &LeafTemplate) -> M {
    let mut mesh = M::default();
    add_blade(&mut mesh, template, Quat::IDENTITY);
    if template.style == LeafStyle::Cross {
        add_blade(&mut mesh, template, Quat::from_rotation_y(FRAC_PI_2));
    }
    mesh
}

fn add_blade<M: MeshBuilderUV>(mesh: &mut M, template: &LeafTemplate, rotation: Quat) {
    let half = template.width * 0.5;
    let (sin, cos) = template.fold.sin_cos();

    let left = Vec3::new(-cos, 0.0, sin) * half;
    let right = Vec3::new(cos, 0.0, sin) * half;
    let left_normal = Vec3::new(sin, 0.0, cos);
    let right_normal = Vec3::new(-sin, 0.0, cos);
    let mid_normal = (left_normal + right_normal).normalize_or(Vec3::Z);

    let mut row = |y: f32, v: f32| {
        let up = Vec3::new(0.0, y, 0.0);
        [
            mesh.add_vertex_uv(rotation * (up + left), (0.0, v), rotation * left_normal),
            mesh.add_vertex_uv(rotation * up, (0.5, v), rotation * mid_normal),
            mesh.add_vertex_uv(rotation * (up + right), (1.0, v), rotation * right_normal),
        ]
    };
    let [l0, m0, r0] = row(0.0, 0.0);
    let [l1, m1, r1] = row(template.height, 1.0);

    mesh.add_triangle(l0, m0, m1);
    mesh.add_triangle(l0, m1, l1);
    mesh.add_triangle(m0, r0, r1);
    mesh.add_triangle(m0, r1, m1);
}
