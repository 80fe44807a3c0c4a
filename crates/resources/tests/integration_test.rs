//! Integration tests for model loading.

use std::io::Cursor;

use deferred_resources::Model;

/// A unit cube with per-face normals and texture coordinates, exactly as a
/// modeling tool would export it: every face repeats its corner vertices.
const CUBE_OBJ: &str = "\
v -0.5 -0.5 0.5
v 0.5 -0.5 0.5
v 0.5 0.5 0.5
v -0.5 0.5 0.5
v -0.5 -0.5 -0.5
v 0.5 -0.5 -0.5
v 0.5 0.5 -0.5
v -0.5 0.5 -0.5
vn 0.0 0.0 1.0
vn 0.0 0.0 -1.0
vn 1.0 0.0 0.0
vn -1.0 0.0 0.0
vn 0.0 1.0 0.0
vn 0.0 -1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
f 6/1/2 5/2/2 8/3/2 7/4/2
f 2/1/3 6/2/3 7/3/3 3/4/3
f 5/1/4 1/2/4 4/3/4 8/4/4
f 4/1/5 3/2/5 7/3/5 8/4/5
f 5/1/6 6/2/6 2/3/6 1/4/6
";

#[test]
fn test_load_cube_model() {
    let mut reader = Cursor::new(CUBE_OBJ.as_bytes());
    let model = Model::from_obj_buf(&mut reader).expect("Failed to load OBJ cube");

    assert_eq!(model.meshes.len(), 1);
    let mesh = &model.meshes[0];

    // 6 quads triangulated: 12 triangles, 36 indices. Each face's four
    // corners are unique (per-face normal and UV), so 24 vertices survive
    // deduplication of the 36 raw ones.
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.vertex_count(), 24);

    for &index in &mesh.indices {
        assert!((index as usize) < mesh.vertex_count());
    }
}

#[test]
fn test_cube_aabb() {
    let mut reader = Cursor::new(CUBE_OBJ.as_bytes());
    let model = Model::from_obj_buf(&mut reader).expect("Failed to load OBJ cube");

    assert_eq!(model.aabb_min, glam::Vec3::splat(-0.5));
    assert_eq!(model.aabb_max, glam::Vec3::splat(0.5));
}

#[test]
fn test_dedup_preserves_geometry() {
    let mut reader = Cursor::new(CUBE_OBJ.as_bytes());
    let model = Model::from_obj_buf(&mut reader).expect("Failed to load OBJ cube");
    let mesh = &model.meshes[0];

    // Every triangle reconstructed through the index list must have three
    // distinct corner positions.
    for triangle in mesh.indices.chunks_exact(3) {
        let a = mesh.vertices[triangle[0] as usize].position;
        let b = mesh.vertices[triangle[1] as usize].position;
        let c = mesh.vertices[triangle[2] as usize].position;
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
