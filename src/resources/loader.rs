//! Model import
//!
//! A [`ModelLoader`] turns a file into [`ModelData`]: flat vertex buffers,
//! index ranges, material descriptions and a node tree. [`ObjLoader`] reads
//! Wavefront OBJ/MTL through `tobj`.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use thiserror::Error;

use super::material::Material;

/// Errors raised while importing models and images
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to parse model {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("Failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Model {0} contains no meshes")]
    Empty(PathBuf),
}

/// MTL illumination models the Blinn-Phong shader can reproduce.
pub const SUPPORTED_ILLUMINATION_MODELS: [u8; 4] = [0, 1, 2, 4];

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub alpha: f32,
    pub diffuse_texture: Option<PathBuf>,
}

impl MaterialData {
    /// Description of a preset material, optionally textured from a file.
    pub fn from_material(material: &Material, diffuse_texture: Option<PathBuf>) -> Self {
        Self {
            name: material.name.clone(),
            ambient: material.ambient,
            diffuse: material.diffuse,
            specular: material.specular,
            shininess: material.shininess,
            alpha: material.alpha,
            diffuse_texture,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub index_offset: u32,
    pub index_count: u32,
    /// Index into [`ModelData::materials`]; `None` selects the default material.
    pub material: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub name: String,
    pub transform: Mat4,
    /// Indices into [`ModelData::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn leaf(name: &str, transform: Mat4, meshes: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            transform,
            meshes,
            children: Vec::new(),
        }
    }
}

/// Imported model in host memory. Vertex attributes are flat `f32` arrays
/// with one entry per vertex: 3 floats for positions and normals, 2 for UVs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
    pub materials: Vec<MaterialData>,
    pub meshes: Vec<MeshData>,
    pub root: NodeData,
}

impl ModelData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

pub trait ModelLoader {
    fn load(&self, path: &Path) -> Result<ModelData, LoadError>;
}

/// OBJ/MTL import. Faces are kept as authored; anything that is not a
/// triangle is dropped with a warning.
#[derive(Debug, Clone)]
pub struct ObjLoader {
    root_transform: Mat4,
}

impl Default for ObjLoader {
    fn default() -> Self {
        Self {
            root_transform: Mat4::IDENTITY,
        }
    }
}

impl ObjLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform applied to the model's root node.
    pub fn with_root_transform(mut self, transform: Mat4) -> Self {
        self.root_transform = transform;
        self
    }

    /// Convert Y-up authoring space to the Z-up world.
    pub fn y_up() -> Self {
        Self::new().with_root_transform(Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2))
    }

    fn convert_material(material: &tobj::Material, base_dir: &Path) -> Option<MaterialData> {
        if let Some(illum) = material.illumination_model {
            if !SUPPORTED_ILLUMINATION_MODELS.contains(&illum) {
                log::warn!(
                    "Material '{}' uses unsupported illumination model {}; using default material",
                    material.name,
                    illum
                );
                return None;
            }
        }

        let color = |c: Option<[f32; 3]>, fallback: f32| c.map(Vec3::from).unwrap_or(Vec3::splat(fallback));
        Some(MaterialData {
            name: material.name.clone(),
            ambient: color(material.ambient, 0.2),
            diffuse: color(material.diffuse, 0.8),
            specular: color(material.specular, 0.0),
            shininess: material.shininess.unwrap_or(1.0),
            alpha: material.dissolve.unwrap_or(1.0),
            diffuse_texture: material
                .diffuse_texture
                .as_ref()
                .filter(|t| !t.is_empty())
                .map(|t| base_dir.join(t.replace('\\', "/"))),
        })
    }
}

impl ModelLoader for ObjLoader {
    fn load(&self, path: &Path) -> Result<ModelData, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj(path, &options).map_err(|source| LoadError::Obj {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let materials = match materials {
            Ok(materials) => materials,
            Err(e) => {
                log::warn!("{}: no usable material library ({})", path.display(), e);
                Vec::new()
            }
        };

        // Unsupported materials map to `None` and fall back to the default.
        let mut converted = Vec::new();
        let mut material_slots = Vec::with_capacity(materials.len());
        for material in &materials {
            material_slots.push(Self::convert_material(material, base_dir).map(|m| {
                converted.push(m);
                converted.len() - 1
            }));
        }

        let mut data = ModelData {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            materials: converted,
            meshes: Vec::new(),
            root: NodeData::leaf("root", self.root_transform, Vec::new()),
        };
        let mut skipped_faces = 0usize;

        for model in &models {
            let mesh = &model.mesh;
            let base_vertex = data.vertex_count() as u32;
            let vertex_count = mesh.positions.len() / 3;

            data.positions.extend_from_slice(&mesh.positions);
            if mesh.normals.len() == mesh.positions.len() {
                data.normals.extend_from_slice(&mesh.normals);
            } else {
                data.normals.extend(std::iter::repeat(0.0).take(vertex_count * 3));
            }
            if mesh.texcoords.len() == vertex_count * 2 {
                // OBJ texture space has V pointing up.
                data.uvs.extend(
                    mesh.texcoords
                        .chunks_exact(2)
                        .flat_map(|uv| [uv[0], 1.0 - uv[1]]),
                );
            } else {
                data.uvs.extend(std::iter::repeat(0.0).take(vertex_count * 2));
            }

            let index_offset = data.indices.len() as u32;
            if mesh.face_arities.is_empty() {
                data.indices.extend(mesh.indices.iter().map(|i| i + base_vertex));
            } else {
                let mut cursor = 0usize;
                for &arity in &mesh.face_arities {
                    let arity = arity as usize;
                    if arity == 3 {
                        data.indices.extend(
                            mesh.indices[cursor..cursor + 3].iter().map(|i| i + base_vertex),
                        );
                    } else {
                        skipped_faces += 1;
                    }
                    cursor += arity;
                }
            }
            let index_count = data.indices.len() as u32 - index_offset;
            if index_count == 0 {
                continue;
            }

            let material = mesh.material_id.and_then(|id| material_slots.get(id).copied().flatten());
            let mesh_index = data.meshes.len();
            data.meshes.push(MeshData {
                name: model.name.clone(),
                index_offset,
                index_count,
                material,
            });
            data.root
                .children
                .push(NodeData::leaf(&model.name, Mat4::IDENTITY, vec![mesh_index]));
        }

        if skipped_faces > 0 {
            log::warn!(
                "{}: skipped {} non-triangle faces",
                path.display(),
                skipped_faces
            );
        }
        if data.meshes.is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }

        compute_missing_normals(&mut data);
        log::info!(
            "Loaded model {} ({} meshes, {} vertices)",
            path.display(),
            data.meshes.len(),
            data.vertex_count()
        );
        Ok(data)
    }
}

/// Fill zero normals with area-weighted face normals.
fn compute_missing_normals(data: &mut ModelData) {
    let vertex = |positions: &[f32], i: u32| {
        let i = i as usize * 3;
        Vec3::new(positions[i], positions[i + 1], positions[i + 2])
    };
    let missing: Vec<bool> = data
        .normals
        .chunks_exact(3)
        .map(|n| n == [0.0, 0.0, 0.0])
        .collect();
    if !missing.contains(&true) {
        return;
    }

    let mut accumulated = vec![Vec3::ZERO; missing.len()];
    for tri in data.indices.chunks_exact(3) {
        let (a, b, c) = (
            vertex(&data.positions, tri[0]),
            vertex(&data.positions, tri[1]),
            vertex(&data.positions, tri[2]),
        );
        let face = (b - a).cross(c - a);
        for &i in tri {
            accumulated[i as usize] += face;
        }
    }
    for (i, normal) in accumulated.into_iter().enumerate() {
        if missing[i] {
            let n = normal.normalize_or_zero();
            data.normals[i * 3..i * 3 + 3].copy_from_slice(&n.to_array());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file() {
        let result = ObjLoader::new().load(Path::new("/nonexistent/model.obj"));
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_non_triangle_faces_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let obj = write_file(
            dir.path(),
            "quad.obj",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             o shape\n\
             f 1 2 3\n\
             f 1 2 3 4\n\
             f 1 3 4\n",
        );
        let model = ObjLoader::new().load(&obj).unwrap();
        assert_eq!(model.indices.len(), 6);
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].index_count, 6);
        // Normals were absent and are computed from the faces.
        assert_eq!(&model.normals[0..3], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unsupported_illumination_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "mats.mtl",
            "newmtl good\nKd 1 0 0\nillum 2\nmap_Kd paint.png\n\
             newmtl weird\nKd 0 1 0\nillum 7\n\
             newmtl glass\nKd 0 0 1\nd 0.4\nillum 4\n",
        );
        let obj = write_file(
            dir.path(),
            "car.obj",
            "mtllib mats.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\n\
             o body\nusemtl good\nf 1//1 2//1 3//1\n\
             o trim\nusemtl weird\nf 1//1 2//1 3//1\n\
             o window\nusemtl glass\nf 1//1 2//1 3//1\n",
        );
        let model = ObjLoader::new().load(&obj).unwrap();

        assert_eq!(model.meshes.len(), 3);
        assert_eq!(model.materials.len(), 2);
        let body = &model.materials[model.meshes[0].material.unwrap()];
        assert_eq!(body.diffuse, Vec3::X);
        assert_eq!(body.diffuse_texture, Some(dir.path().join("paint.png")));
        assert_eq!(model.meshes[1].material, None);
        let glass = &model.materials[model.meshes[2].material.unwrap()];
        assert!((glass.alpha - 0.4).abs() < 1e-6);
        assert_eq!(model.root.children.len(), 3);
    }

    #[test]
    fn test_file_without_faces_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let obj = write_file(dir.path(), "points.obj", "v 0 0 0\nv 1 0 0\n");
        assert!(matches!(ObjLoader::new().load(&obj), Err(LoadError::Empty(_))));
    }
}
