//! CPU-side mesh data and vertex deduplication.
//!
//! # Overview
//!
//! Asset loaders and primitive generators produce [`MeshData`]: a flat vertex
//! array plus a triangle index list. Source data (OBJ files in particular)
//! repeats vertices per face, so [`MeshData::deduplicate`] collapses exact
//! duplicates and rewrites the index list. Two vertices are considered equal
//! only when position, normal, color, and texture coordinate are all
//! bit-identical; near-equal vertices stay separate on purpose, since merging
//! them would change shading.
//!
//! # Example
//!
//! ```
//! use deferred_resources::mesh::MeshData;
//!
//! let cube = MeshData::cube();
//! assert_eq!(cube.indices.len(), 36);
//! ```

use std::collections::HashMap;

use glam::{Vec2, Vec3};

/// One vertex as produced by asset loading, before GPU upload.
///
/// Field order and meaning match the vertex layout the pipelines declare.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshVertex {
    /// Position in object space.
    pub position: Vec3,
    /// Surface normal.
    pub normal: Vec3,
    /// Vertex color.
    pub color: Vec3,
    /// Texture coordinate.
    pub tex_coord: Vec2,
}

impl MeshVertex {
    /// Bit-exact identity key for deduplication.
    ///
    /// Floats are compared by bit pattern, so -0.0 and 0.0 (and any NaN
    /// payloads) are distinct. Dedup must not merge vertices that the source
    /// data distinguishes.
    fn dedup_key(&self) -> [u32; 11] {
        [
            self.position.x.to_bits(),
            self.position.y.to_bits(),
            self.position.z.to_bits(),
            self.normal.x.to_bits(),
            self.normal.y.to_bits(),
            self.normal.z.to_bits(),
            self.color.x.to_bits(),
            self.color.y.to_bits(),
            self.color.z.to_bits(),
            self.tex_coord.x.to_bits(),
            self.tex_coord.y.to_bits(),
        ]
    }
}

/// A mesh as flat vertex and triangle index arrays.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    /// Unique vertices in first-seen order.
    pub vertices: Vec<MeshVertex>,
    /// Triangle list indexing into `vertices`.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of unique vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices (3 per triangle).
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Build an indexed mesh from an unindexed vertex stream.
    ///
    /// Each group of three input vertices is one triangle. Duplicate vertices
    /// receive the index assigned at their first occurrence, so the output
    /// triangle list reproduces the input geometry exactly.
    pub fn deduplicate(raw_vertices: &[MeshVertex]) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(raw_vertices.len());
        let mut seen: HashMap<[u32; 11], u32> = HashMap::new();

        for vertex in raw_vertices {
            let index = *seen.entry(vertex.dedup_key()).or_insert_with(|| {
                vertices.push(*vertex);
                (vertices.len() - 1) as u32
            });
            indices.push(index);
        }

        Self { vertices, indices }
    }

    /// Axis-aligned bounding box as (min, max), or None for an empty mesh.
    pub fn aabb(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?;
        let mut min = first.position;
        let mut max = first.position;
        for vertex in &self.vertices[1..] {
            min = min.min(vertex.position);
            max = max.max(vertex.position);
        }
        Some((min, max))
    }

    /// A unit cube centered at the origin, 24 vertices (4 per face, so each
    /// face keeps its own normal) and 36 indices.
    pub fn cube() -> Self {
        const H: f32 = 0.5;

        // (normal, four corners in CCW winding seen from outside)
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (
                Vec3::Z,
                [
                    Vec3::new(-H, -H, H),
                    Vec3::new(H, -H, H),
                    Vec3::new(H, H, H),
                    Vec3::new(-H, H, H),
                ],
            ),
            (
                Vec3::NEG_Z,
                [
                    Vec3::new(H, -H, -H),
                    Vec3::new(-H, -H, -H),
                    Vec3::new(-H, H, -H),
                    Vec3::new(H, H, -H),
                ],
            ),
            (
                Vec3::X,
                [
                    Vec3::new(H, -H, H),
                    Vec3::new(H, -H, -H),
                    Vec3::new(H, H, -H),
                    Vec3::new(H, H, H),
                ],
            ),
            (
                Vec3::NEG_X,
                [
                    Vec3::new(-H, -H, -H),
                    Vec3::new(-H, -H, H),
                    Vec3::new(-H, H, H),
                    Vec3::new(-H, H, -H),
                ],
            ),
            (
                Vec3::Y,
                [
                    Vec3::new(-H, H, H),
                    Vec3::new(H, H, H),
                    Vec3::new(H, H, -H),
                    Vec3::new(-H, H, -H),
                ],
            ),
            (
                Vec3::NEG_Y,
                [
                    Vec3::new(-H, -H, -H),
                    Vec3::new(H, -H, -H),
                    Vec3::new(H, -H, H),
                    Vec3::new(-H, -H, H),
                ],
            ),
        ];

        let uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.into_iter().zip(uvs) {
                vertices.push(MeshVertex {
                    position: corner,
                    normal,
                    color: Vec3::ONE,
                    tex_coord: uv,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }

    /// A latitude/longitude sphere of diameter 1, wound to be visible from
    /// the inside.
    ///
    /// Meant for sky domes: normals point toward the center and triangles
    /// are counter-clockwise when seen from within, so a back-face-culling
    /// pipeline keeps the far half of the dome and drops the near half.
    /// Texture coordinates are equirectangular: `u` wraps around the
    /// longitude (with a duplicated seam column), `v` runs from the top
    /// pole (0) to the bottom pole (1).
    ///
    /// `stacks` must be at least 2 and `slices` at least 3.
    pub fn uv_sphere(stacks: u32, slices: u32) -> Self {
        assert!(stacks >= 2 && slices >= 3, "degenerate sphere resolution");

        const R: f32 = 0.5;

        let mut vertices = Vec::with_capacity(((stacks + 1) * (slices + 1)) as usize);
        for i in 0..=stacks {
            let v = i as f32 / stacks as f32;
            let theta = v * std::f32::consts::PI;
            let (sin_theta, cos_theta) = theta.sin_cos();
            for j in 0..=slices {
                let u = j as f32 / slices as f32;
                let phi = u * std::f32::consts::TAU;
                let (sin_phi, cos_phi) = phi.sin_cos();

                let direction = Vec3::new(sin_theta * cos_phi, cos_theta, sin_theta * sin_phi);
                vertices.push(MeshVertex {
                    position: direction * R,
                    normal: -direction,
                    color: Vec3::ONE,
                    tex_coord: Vec2::new(u, v),
                });
            }
        }

        // Pole rows collapse one triangle of each quad to zero area; those
        // are skipped rather than emitted.
        let mut indices = Vec::with_capacity((6 * slices * (stacks - 1)) as usize);
        for i in 0..stacks {
            for j in 0..slices {
                let a = i * (slices + 1) + j;
                let b = a + 1;
                let d = a + slices + 1;
                let c = d + 1;
                if i + 1 < stacks {
                    indices.extend_from_slice(&[a, d, c]);
                }
                if i > 0 {
                    indices.extend_from_slice(&[a, c, b]);
                }
            }
        }

        Self { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(position: Vec3) -> MeshVertex {
        MeshVertex {
            position,
            normal: Vec3::Y,
            color: Vec3::ONE,
            tex_coord: Vec2::ZERO,
        }
    }

    #[test]
    fn test_dedup_collapses_exact_duplicates() {
        // Two triangles sharing an edge: 6 input vertices, 4 unique.
        let a = vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = vertex(Vec3::new(0.0, 1.0, 0.0));
        let d = vertex(Vec3::new(1.0, 1.0, 0.0));
        let raw = [a, b, c, b, d, c];

        let mesh = MeshData::deduplicate(&raw);

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 1, 3, 2]);
    }

    #[test]
    fn test_dedup_preserves_triangles() {
        let raw: Vec<MeshVertex> = (0..9)
            .map(|i| vertex(Vec3::new((i % 4) as f32, (i % 3) as f32, 0.0)))
            .collect();

        let mesh = MeshData::deduplicate(&raw);

        // Reconstructing through the index list must reproduce the input
        // position stream exactly.
        let rebuilt: Vec<Vec3> = mesh
            .indices
            .iter()
            .map(|&i| mesh.vertices[i as usize].position)
            .collect();
        let original: Vec<Vec3> = raw.iter().map(|v| v.position).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_dedup_keeps_differing_normals_apart() {
        let position = Vec3::ZERO;
        let mut flat = vertex(position);
        flat.normal = Vec3::Y;
        let mut steep = vertex(position);
        steep.normal = Vec3::X;

        let mesh = MeshData::deduplicate(&[flat, steep, flat]);

        // Same position but different normals: both survive.
        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_dedup_first_seen_order() {
        let a = vertex(Vec3::new(5.0, 0.0, 0.0));
        let b = vertex(Vec3::new(1.0, 0.0, 0.0));

        let mesh = MeshData::deduplicate(&[a, b, a]);

        assert_eq!(mesh.vertices[0].position, a.position);
        assert_eq!(mesh.vertices[1].position, b.position);
    }

    #[test]
    fn test_cube_shape() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);

        let (min, max) = cube.aabb().unwrap();
        assert_eq!(min, Vec3::splat(-0.5));
        assert_eq!(max, Vec3::splat(0.5));
    }

    #[test]
    fn test_cube_indices_in_range() {
        let cube = MeshData::cube();
        assert!(
            cube.indices
                .iter()
                .all(|&i| (i as usize) < cube.vertex_count())
        );
    }

    #[test]
    fn test_uv_sphere_shape() {
        let sphere = MeshData::uv_sphere(8, 16);
        assert_eq!(sphere.vertex_count(), 9 * 17);
        assert_eq!(sphere.triangle_count(), (2 * 16 * 7) as usize);

        for v in &sphere.vertices {
            assert!((v.position.length() - 0.5).abs() < 1e-5);
            assert!((0.0..=1.0).contains(&v.tex_coord.x));
            assert!((0.0..=1.0).contains(&v.tex_coord.y));
        }
        assert!(
            sphere
                .indices
                .iter()
                .all(|&i| (i as usize) < sphere.vertex_count())
        );
    }

    #[test]
    fn test_uv_sphere_faces_inward() {
        let sphere = MeshData::uv_sphere(6, 12);
        for tri in sphere.indices.chunks_exact(3) {
            let p0 = sphere.vertices[tri[0] as usize].position;
            let p1 = sphere.vertices[tri[1] as usize].position;
            let p2 = sphere.vertices[tri[2] as usize].position;

            // Counter-clockwise from the center: the winding normal points
            // back toward the viewer inside the dome.
            let winding = (p1 - p0).cross(p2 - p0);
            let centroid = (p0 + p1 + p2) / 3.0;
            assert!(winding.length() > 1e-7, "degenerate triangle emitted");
            assert!(winding.dot(centroid) < 0.0);
        }
        for v in &sphere.vertices {
            assert!(v.normal.dot(v.position) <= 0.0);
        }
    }
}
