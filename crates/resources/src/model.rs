//! Model loading from Wavefront OBJ files.

use std::io::BufRead;
use std::path::Path;

use glam::{Vec2, Vec3};
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::{MeshData, MeshVertex};

/// Load options used for every OBJ load: triangulated faces and one index
/// stream across positions/normals/texcoords.
const LOAD_OPTIONS: tobj::LoadOptions = tobj::LoadOptions {
    single_index: true,
    triangulate: true,
    ignore_points: true,
    ignore_lines: true,
};

/// A model containing one or more meshes.
#[derive(Debug, Default)]
pub struct Model {
    /// Meshes in this model, one per OBJ object/group.
    pub meshes: Vec<MeshData>,
    /// Axis-aligned bounding box minimum across all meshes.
    pub aabb_min: Vec3,
    /// Axis-aligned bounding box maximum across all meshes.
    pub aabb_max: Vec3,
}

impl Model {
    /// Load a model from an OBJ file.
    ///
    /// Vertices are deduplicated per mesh: source faces that repeat a vertex
    /// (identical position, normal, color, and texture coordinate) share one
    /// entry in the output vertex array.
    ///
    /// # Arguments
    /// * `path` - Path to the .obj file
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let (models, _materials) =
            tobj::load_obj(path, &LOAD_OPTIONS).map_err(|e| ResourceError::ObjLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let model = Self::from_tobj_models(models)
            .ok_or_else(|| ResourceError::NoMeshes(path.to_path_buf()))?;

        info!(
            "Loaded model {:?}: {} meshes, {} vertices, {} triangles",
            path,
            model.meshes.len(),
            model.total_vertex_count(),
            model.total_triangle_count()
        );

        Ok(model)
    }

    /// Load a model from an in-memory OBJ buffer.
    ///
    /// Material library references are not resolved; only geometry is read.
    pub fn from_obj_buf(reader: &mut impl BufRead) -> ResourceResult<Self> {
        let (models, _materials) =
            tobj::load_obj_buf(reader, &LOAD_OPTIONS, |_mtl_path| {
                Err(tobj::LoadError::OpenFileFailed)
            })
            .map_err(|e| ResourceError::ObjLoad {
                path: "<buffer>".into(),
                message: e.to_string(),
            })?;

        Self::from_tobj_models(models).ok_or_else(|| ResourceError::NoMeshes("<buffer>".into()))
    }

    fn from_tobj_models(models: Vec<tobj::Model>) -> Option<Self> {
        let mut meshes = Vec::with_capacity(models.len());
        for model in &models {
            let mesh = &model.mesh;
            if mesh.positions.is_empty() {
                continue;
            }

            // Expand the single index stream into a raw vertex list, then
            // rebuild indices by exact-equality dedup.
            let raw: Vec<MeshVertex> = mesh
                .indices
                .iter()
                .map(|&i| {
                    let i = i as usize;
                    MeshVertex {
                        position: read_vec3(&mesh.positions, i),
                        normal: read_vec3(&mesh.normals, i),
                        color: if mesh.vertex_color.is_empty() {
                            Vec3::ONE
                        } else {
                            read_vec3(&mesh.vertex_color, i)
                        },
                        tex_coord: read_vec2(&mesh.texcoords, i),
                    }
                })
                .collect();

            let deduped = MeshData::deduplicate(&raw);
            debug!(
                "Mesh '{}': {} raw vertices deduplicated to {}",
                model.name,
                raw.len(),
                deduped.vertex_count()
            );
            meshes.push(deduped);
        }

        if meshes.is_empty() {
            return None;
        }

        let mut aabb_min = Vec3::splat(f32::MAX);
        let mut aabb_max = Vec3::splat(f32::MIN);
        for mesh in &meshes {
            if let Some((min, max)) = mesh.aabb() {
                aabb_min = aabb_min.min(min);
                aabb_max = aabb_max.max(max);
            }
        }

        Some(Self {
            meshes,
            aabb_min,
            aabb_max,
        })
    }

    /// Total vertex count across all meshes.
    pub fn total_vertex_count(&self) -> usize {
        self.meshes.iter().map(MeshData::vertex_count).sum()
    }

    /// Total triangle count across all meshes.
    pub fn total_triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshData::triangle_count).sum()
    }
}

fn read_vec3(data: &[f32], index: usize) -> Vec3 {
    let base = index * 3;
    if base + 2 < data.len() {
        Vec3::new(data[base], data[base + 1], data[base + 2])
    } else {
        Vec3::ZERO
    }
}

fn read_vec2(data: &[f32], index: usize) -> Vec2 {
    let base = index * 2;
    if base + 1 < data.len() {
        Vec2::new(data[base], data[base + 1])
    } else {
        Vec2::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD_OBJ: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
vt 0.0 0.0
f 1/1/1 2/1/1 3/1/1
f 1/1/1 3/1/1 4/1/1
";

    #[test]
    fn test_load_quad_from_buffer() {
        let mut reader = Cursor::new(QUAD_OBJ.as_bytes());
        let model = Model::from_obj_buf(&mut reader).unwrap();

        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        // Two triangles sharing two vertices: 6 raw, 4 unique.
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_aabb_spans_geometry() {
        let mut reader = Cursor::new(QUAD_OBJ.as_bytes());
        let model = Model::from_obj_buf(&mut reader).unwrap();

        assert_eq!(model.aabb_min, Vec3::ZERO);
        assert_eq!(model.aabb_max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_missing_file_errors() {
        let err = Model::load(Path::new("does/not/exist.obj")).unwrap_err();
        assert!(matches!(err, ResourceError::FileNotFound(_)));
    }
}
