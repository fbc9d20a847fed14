//! Transformation data for GPU rendering.
//!
//! Position, rotation and scale of a scene node are combined with the node's mesh
//! transforms and stored in small per-mesh vertex buffers stepped per instance.

use cgmath::{Matrix, Matrix3, Matrix4, One, SquareMatrix};

use crate::data_structures::model;

/// Local transformation: position, rotation (as quaternion) and scale.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Raw data for a mesh whose own world transform is `mesh_world`.
    pub fn to_raw(&self, mesh_world: &Matrix4<f32>) -> InstanceRaw {
        InstanceRaw::from_matrix(self.to_matrix() * mesh_world)
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
}

impl InstanceRaw {
    pub fn from_matrix(world: Matrix4<f32>) -> Self {
        let linear = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
        let det = linear.determinant();
        // Normals use the inverse transpose so non-uniform scale keeps them perpendicular.
        let normal = linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix3::identity);
        Self {
            model: world.into(),
            normal: normal.into(),
            handedness: if det < 0.0 { -1.0 } else { 1.0 },
        }
    }

    pub fn model(&self) -> Matrix4<f32> {
        self.model.into()
    }

    /// `-1` when the transform mirrors geometry, `1` otherwise.
    pub fn handedness(&self) -> f32 {
        self.handedness
    }
}

/**
 * Stride layout: the model matrix as four vec4s, the normal matrix as three vec3s
 * and the handedness of the transform.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance instead of once per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}
