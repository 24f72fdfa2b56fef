//! Procedural geometry for built-in objects
//!
//! Every generator returns a single-mesh [`ModelData`] so built-in shapes go
//! through the same [`Object`](super::Object) path as imported models.

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec2, Vec3};

use super::loader::{MaterialData, MeshData, ModelData, NodeData};

/// Accumulates vertices and triangles into flat buffers.
#[derive(Debug, Default)]
pub struct GeometryBuilder {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    indices: Vec<u32>,
}

impl GeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> u32 {
        (self.positions.len() / 3) as u32
    }

    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) -> u32 {
        let index = self.vertex_count();
        self.positions.extend_from_slice(&position.to_array());
        self.normals.extend_from_slice(&normal.to_array());
        self.uvs.extend_from_slice(&uv.to_array());
        index
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Append another builder's geometry, transformed.
    pub fn append(&mut self, other: &GeometryBuilder, transform: Mat4) {
        let base = self.vertex_count();
        for i in 0..other.vertex_count() as usize {
            let p = Vec3::from_slice(&other.positions[i * 3..]);
            let n = Vec3::from_slice(&other.normals[i * 3..]);
            let uv = Vec2::from_slice(&other.uvs[i * 2..]);
            self.push_vertex(
                transform.transform_point3(p),
                transform.transform_vector3(n).normalize_or_zero(),
                uv,
            );
        }
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Finish as a one-mesh model using `material`.
    pub fn into_model(self, name: &str, material: MaterialData) -> ModelData {
        let index_count = self.indices.len() as u32;
        ModelData {
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            indices: self.indices,
            materials: vec![material],
            meshes: vec![MeshData {
                name: name.to_string(),
                index_offset: 0,
                index_count,
                material: Some(0),
            }],
            root: NodeData::leaf(name, Mat4::IDENTITY, vec![0]),
        }
    }

    /// Flat XY plane centered at the origin, facing +Z. UVs repeat
    /// `uv_repeat` times across each side.
    pub fn plane(width: f32, depth: f32, uv_repeat: f32) -> Self {
        let mut geometry = Self::new();
        let (hw, hd) = (width / 2.0, depth / 2.0);
        let corners = [(-hw, -hd, 0.0, 0.0), (hw, -hd, 1.0, 0.0), (hw, hd, 1.0, 1.0), (-hw, hd, 0.0, 1.0)];
        for (x, y, u, v) in corners {
            geometry.push_vertex(Vec3::new(x, y, 0.0), Vec3::Z, Vec2::new(u, v) * uv_repeat);
        }
        geometry.push_triangle(0, 1, 2);
        geometry.push_triangle(0, 2, 3);
        geometry
    }

    /// Axis-aligned box centered at the origin.
    pub fn cuboid(size: Vec3) -> Self {
        let mut geometry = Self::new();
        let h = size / 2.0;

        for normal in [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z] {
            // Two in-face axes forming a right-handed frame with the normal.
            let u = if normal.z.abs() > 0.5 { Vec3::X } else { Vec3::Z.cross(normal) };
            let v = normal.cross(u);
            let base = geometry.vertex_count();
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = (normal + u * su + v * sv) * h;
                let uv = Vec2::new((su + 1.0) / 2.0, (1.0 - sv) / 2.0);
                geometry.push_vertex(position, normal, uv);
            }
            geometry.push_triangle(base, base + 1, base + 2);
            geometry.push_triangle(base, base + 2, base + 3);
        }

        geometry
    }

    /// Capped cylinder along the Y axis (a wheel's axle).
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let mut geometry = Self::new();
        let segments = segments.max(3);
        let half = height / 2.0;
        let step = TAU / segments as f32;

        // Side
        for i in 0..=segments {
            let angle = i as f32 * step;
            let (s, c) = angle.sin_cos();
            let normal = Vec3::new(c, 0.0, s);
            let u = i as f32 / segments as f32;
            geometry.push_vertex(Vec3::new(c * radius, -half, s * radius), normal, Vec2::new(u, 1.0));
            geometry.push_vertex(Vec3::new(c * radius, half, s * radius), normal, Vec2::new(u, 0.0));
        }
        for i in 0..segments {
            let base = i * 2;
            geometry.push_triangle(base, base + 1, base + 2);
            geometry.push_triangle(base + 1, base + 3, base + 2);
        }

        // Caps
        for (y, normal) in [(half, Vec3::Y), (-half, -Vec3::Y)] {
            let center = geometry.push_vertex(Vec3::new(0.0, y, 0.0), normal, Vec2::splat(0.5));
            let first = geometry.vertex_count();
            for i in 0..=segments {
                let (s, c) = (i as f32 * step).sin_cos();
                geometry.push_vertex(
                    Vec3::new(c * radius, y, s * radius),
                    normal,
                    Vec2::new(0.5 + c * 0.5, 0.5 + s * 0.5),
                );
            }
            for i in 0..segments {
                let (a, b) = (first + i, first + i + 1);
                if normal.y > 0.0 {
                    geometry.push_triangle(center, b, a);
                } else {
                    geometry.push_triangle(center, a, b);
                }
            }
        }

        geometry
    }

    /// Cone along +Z with its base at z = 0 and tip at z = `height`.
    pub fn cone(radius: f32, height: f32, segments: u32) -> Self {
        let mut geometry = Self::new();
        let segments = segments.max(3);
        let step = TAU / segments as f32;
        let slope = radius / height;

        for i in 0..segments {
            let (a0, a1) = (i as f32 * step, (i + 1) as f32 * step);
            let mid = (a0 + a1) / 2.0;
            let rim = |a: f32| Vec3::new(a.cos() * radius, a.sin() * radius, 0.0);
            let side = |a: f32| Vec3::new(a.cos(), a.sin(), slope).normalize();

            let p0 = geometry.push_vertex(rim(a0), side(a0), Vec2::new(0.0, 1.0));
            let p1 = geometry.push_vertex(rim(a1), side(a1), Vec2::new(1.0, 1.0));
            let tip = geometry.push_vertex(Vec3::new(0.0, 0.0, height), side(mid), Vec2::new(0.5, 0.0));
            geometry.push_triangle(p0, p1, tip);
        }

        let center = geometry.push_vertex(Vec3::ZERO, -Vec3::Z, Vec2::splat(0.5));
        let first = geometry.vertex_count();
        for i in 0..=segments {
            let (s, c) = (i as f32 * step).sin_cos();
            geometry.push_vertex(Vec3::new(c * radius, s * radius, 0.0), -Vec3::Z, Vec2::new(0.5 + c * 0.5, 0.5 + s * 0.5));
        }
        for i in 0..segments {
            geometry.push_triangle(center, first + i + 1, first + i);
        }

        geometry
    }

    /// Unit-length arrow along +Z: a shaft with a cone head.
    pub fn arrow(shaft_radius: f32, head_radius: f32, head_length: f32) -> Self {
        let mut geometry = Self::new();
        let shaft_length = (1.0 - head_length).max(0.0);
        let shaft = Self::cylinder(shaft_radius, shaft_length, 12);
        // Cylinders run along Y; tip them onto +Z and lift so the base sits at 0.
        let to_z = Mat4::from_translation(Vec3::new(0.0, 0.0, shaft_length / 2.0))
            * Mat4::from_quat(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        geometry.append(&shaft, to_z);
        geometry.append(
            &Self::cone(head_radius, head_length, 16),
            Mat4::from_translation(Vec3::new(0.0, 0.0, shaft_length)),
        );
        geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(geometry: &GeometryBuilder) -> (Vec3, Vec3) {
        geometry
            .positions
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), p| {
                (lo.min(p), hi.max(p))
            })
    }

    /// Every triangle's winding agrees with its vertex normals.
    fn assert_outward(geometry: &GeometryBuilder) {
        for tri in geometry.indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri.iter().map(|&i| Vec3::from_slice(&geometry.positions[i as usize * 3..])).collect();
            let n: Vec3 = tri
                .iter()
                .map(|&i| Vec3::from_slice(&geometry.normals[i as usize * 3..]))
                .sum();
            let face = (p[1] - p[0]).cross(p[2] - p[0]);
            assert!(face.dot(n) > 0.0, "triangle {:?} faces inward", tri);
        }
    }

    #[test]
    fn test_cuboid_extent_and_winding() {
        let cuboid = GeometryBuilder::cuboid(Vec3::new(4.0, 2.0, 1.0));
        assert_eq!(cuboid.vertex_count(), 24);
        assert_eq!(cuboid.indices.len(), 36);
        let (lo, hi) = bounds(&cuboid);
        assert!(lo.abs_diff_eq(Vec3::new(-2.0, -1.0, -0.5), 1e-6));
        assert!(hi.abs_diff_eq(Vec3::new(2.0, 1.0, 0.5), 1e-6));
        assert_outward(&cuboid);
    }

    #[test]
    fn test_cylinder_runs_along_y() {
        let cylinder = GeometryBuilder::cylinder(0.5, 0.3, 16);
        let (lo, hi) = bounds(&cylinder);
        assert!((hi.y - 0.15).abs() < 1e-6 && (lo.y + 0.15).abs() < 1e-6);
        assert!((hi.x - 0.5).abs() < 1e-5);
        assert_outward(&cylinder);
    }

    #[test]
    fn test_arrow_spans_unit_z() {
        let arrow = GeometryBuilder::arrow(0.02, 0.06, 0.25);
        let (lo, hi) = bounds(&arrow);
        assert!(lo.z.abs() < 1e-5);
        assert!((hi.z - 1.0).abs() < 1e-5);
        assert_outward(&arrow);
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = GeometryBuilder::plane(10.0, 10.0, 4.0);
        assert_outward(&plane);
        let model = plane.into_model("ground", MaterialData {
            name: "ground".into(),
            ambient: Vec3::ONE,
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            shininess: 1.0,
            alpha: 1.0,
            diffuse_texture: None,
        });
        assert_eq!(model.meshes[0].index_count, 6);
        assert_eq!(model.uvs[4], 4.0);
    }
}
