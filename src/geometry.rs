//! Bounds and vertex-stream synthesis for shapes.

use cgmath::prelude::*;
use cgmath::{Matrix4, Point3, Vector2, Vector3, Vector4};
use crate::nif::{BoundingSphere, Geometry};

/// The shape's bounding sphere in scene space. The stored sphere is used
/// when it has a radius, otherwise one is fitted to the vertices.
pub fn bounding_sphere(geom: &Geometry, global: &Matrix4<f32>) -> BoundingSphere {
    let local = if geom.bounds.radius > 0.0 {
        geom.bounds
    } else {
        fit_sphere(&geom.vertices)
    };
    let c = *global * Vector4::new(local.center[0], local.center[1], local.center[2], 1.0);
    let scale = (0..3)
        .map(|i| global[i].truncate().magnitude())
        .fold(0.0f32, f32::max);
    BoundingSphere {
        center: [c.x, c.y, c.z],
        radius: local.radius * scale,
    }
}

/// Centre of the bounding box, radius to the farthest vertex.
fn fit_sphere(vertices: &[[f32; 3]]) -> BoundingSphere {
    if vertices.is_empty() {
        return BoundingSphere::default();
    }
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for v in vertices {
        for i in 0..3 {
            min[i] = min[i].min(v[i]);
            max[i] = max[i].max(v[i]);
        }
    }
    let center = Point3::new(
        (min[0] + max[0]) / 2.0,
        (min[1] + max[1]) / 2.0,
        (min[2] + max[2]) / 2.0,
    );
    let radius = vertices
        .iter()
        .map(|&v| center.distance(Point3::from(v)))
        .fold(0.0f32, f32::max);
    BoundingSphere { center: center.into(), radius }
}

/// Fills in whatever streams the shape is missing so every attribute the
/// shaders read has data. Triangles referencing missing vertices are
/// dropped first.
///
/// If any stream is missing, normals and the tangent space are both
/// recomputed from positions and triangles. A complete shape is left
/// untouched.
pub fn complete(geom: &mut Geometry) {
    let n = geom.vertices.len();
    let before = geom.triangles.len();
    geom.triangles.retain(|t| t.iter().all(|&i| (i as usize) < n));
    if geom.triangles.len() != before {
        warn!("dropped {} triangles with out-of-range indices", before - geom.triangles.len());
    }

    let missing_normals = geom.normals.len() != n;
    let missing_uvs = geom.uvs.len() != n;
    let missing_colors = geom.colors.len() != n;
    let missing_tangents = geom.tangents.len() != n || geom.bitangents.len() != n;

    if !(missing_normals || missing_uvs || missing_colors || missing_tangents) {
        return;
    }
    if missing_uvs {
        geom.uvs = vec![[0.0, 0.0]; n];
    }
    if missing_colors {
        geom.colors = vec![[1.0; 4]; n];
    }
    geom.normals = compute_normals(&geom.vertices, &geom.triangles);
    let (tangents, bitangents) =
        compute_tangent_space(&geom.vertices, &geom.normals, &geom.uvs, &geom.triangles);
    geom.tangents = tangents;
    geom.bitangents = bitangents;
}

/// Area-weighted vertex normals. Vertices no triangle touches get +Z.
pub fn compute_normals(positions: &[[f32; 3]], triangles: &[[u16; 3]]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vector3::zero(); positions.len()];
    for t in triangles {
        let p = |k: usize| Vector3::from(positions[t[k] as usize]);
        // The cross product's length is twice the area, giving the weight
        let face = (p(1) - p(0)).cross(p(2) - p(0));
        for &i in t {
            acc[i as usize] += face;
        }
    }
    acc.into_iter()
        .map(|n| {
            if n.magnitude2() > 1e-12 {
                n.normalize().into()
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}

/// Per-vertex tangents and bitangents from position and UV deltas,
/// orthogonalised against the normals.
pub fn compute_tangent_space(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    triangles: &[[u16; 3]],
) -> (Vec<[f32; 3]>, Vec<[f32; 3]>) {
    let n = positions.len();
    let mut tan = vec![Vector3::zero(); n];
    let mut bitan = vec![Vector3::zero(); n];

    for t in triangles {
        let p = |k: usize| Vector3::from(positions[t[k] as usize]);
        let uv = |k: usize| Vector2::from(uvs[t[k] as usize]);
        let e1 = p(1) - p(0);
        let e2 = p(2) - p(0);
        let d1 = uv(1) - uv(0);
        let d2 = uv(2) - uv(0);
        let det = d1.x * d2.y - d1.y * d2.x;
        if det.abs() < 1e-8 {
            continue;
        }
        let r = 1.0 / det;
        let ft = (e1 * d2.y - e2 * d1.y) * r;
        let fb = (e2 * d1.x - e1 * d2.x) * r;
        for &i in t {
            tan[i as usize] += ft;
            bitan[i as usize] += fb;
        }
    }

    let mut tangents = Vec::with_capacity(n);
    let mut bitangents = Vec::with_capacity(n);
    for i in 0..n {
        let normal = normals
            .get(i)
            .map(|&x| Vector3::from(x))
            .filter(|x| x.magnitude2() > 1e-12)
            .map(|x| x.normalize())
            .unwrap_or_else(Vector3::unit_z);

        // Gram-Schmidt
        let t = tan[i] - normal * normal.dot(tan[i]);
        let t = if t.magnitude2() > 1e-12 {
            t.normalize()
        } else {
            any_perpendicular(normal)
        };
        let mut b = normal.cross(t);
        if bitan[i].dot(b) < 0.0 {
            b = -b;
        }
        tangents.push(t.into());
        bitangents.push(b.into());
    }
    (tangents, bitangents)
}

fn any_perpendicular(n: Vector3<f32>) -> Vector3<f32> {
    let up = if n.y.abs() > 0.9 { Vector3::unit_x() } else { Vector3::unit_y() };
    up.cross(n).normalize()
}
