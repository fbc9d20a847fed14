//! Meshes, PBR materials and the GPU representation of a loaded glTF scene.
//!
//! A glTF node hierarchy is flattened on upload: every mesh keeps the world
//! transform of the node it belongs to, and the [`ModelNode`] as a whole gets one
//! local transform on top.

use std::collections::HashMap;

use anyhow::Context;
use cgmath::{InnerSpace, Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::Instance,
        scene::SceneNode,
        texture::{self, Texture},
    },
    resources::GltfAsset,
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 11]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/**
 * Accumulate per-triangle tangents and bitangents for primitives that don't ship
 * their own, then average them per vertex.
 */
pub fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];

    for c in indices.chunks_exact(3) {
        let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let v0 = vertices[i0];
        let v1 = vertices[i1];
        let v2 = vertices[i2];

        let pos0: cgmath::Vector3<f32> = v0.position.into();
        let pos1: cgmath::Vector3<f32> = v1.position.into();
        let pos2: cgmath::Vector3<f32> = v2.position.into();

        let uv0: cgmath::Vector2<f32> = v0.tex_coords.into();
        let uv1: cgmath::Vector2<f32> = v1.tex_coords.into();
        let uv2: cgmath::Vector2<f32> = v2.tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let denom = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if denom.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / denom;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // Flipped for right-handed normal maps in wgpu texture space
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for &i in &[i0, i1, i2] {
            vertices[i].tangent = (tangent + cgmath::Vector3::from(vertices[i].tangent)).into();
            vertices[i].bitangent =
                (bitangent + cgmath::Vector3::from(vertices[i].bitangent)).into();
            triangles_included[i] += 1;
        }
    }

    for (i, n) in triangles_included.into_iter().enumerate() {
        if n == 0 {
            continue;
        }
        let denom = 1.0 / n as f32;
        let v = &mut vertices[i];
        v.tangent = (cgmath::Vector3::from(v.tangent) * denom).into();
        v.bitangent = (cgmath::Vector3::from(v.bitangent) * denom).into();
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color_factor: [f32; 4],
    // w unused
    emissive_factor: [f32; 4],
    // metallic, roughness, normal scale, occlusion strength
    params: [f32; 4],
}

impl Default for MaterialUniform {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            emissive_factor: [0.0; 4],
            params: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl MaterialUniform {
    pub fn from_gltf(material: &gltf::Material) -> Self {
        let pbr = material.pbr_metallic_roughness();
        let emissive = material.emissive_factor();
        Self {
            base_color_factor: pbr.base_color_factor(),
            emissive_factor: [emissive[0], emissive[1], emissive[2], 0.0],
            params: [
                pbr.metallic_factor(),
                pbr.roughness_factor(),
                material.normal_texture().map_or(1.0, |t| t.scale()),
                material.occlusion_texture().map_or(1.0, |t| t.strength()),
            ],
        }
    }
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture_entry(0),
            texture_entry(1),
            texture_entry(2),
            texture_entry(3),
            texture_entry(4),
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 6,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("Material bind_group_layout"),
    })
}

/// Metallic-roughness material textures and factors.
#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub uniform: MaterialUniform,
    pub bind_group: wgpu::BindGroup,
}

/// Texture slots of a [`Material`], in binding order.
pub struct MaterialTextures<'a> {
    pub base_color: &'a Texture,
    pub metallic_roughness: &'a Texture,
    pub normal: &'a Texture,
    pub occlusion: &'a Texture,
    pub emissive: &'a Texture,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        textures: MaterialTextures,
        uniform: MaterialUniform,
        sampler: &wgpu::Sampler,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} material buffer")),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&textures.base_color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        &textures.metallic_roughness.view,
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&textures.normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&textures.occlusion.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&textures.emissive.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: buffer.as_entire_binding(),
                },
            ],
            label: Some(name),
        });
        Self {
            name: name.to_string(),
            uniform,
            bind_group,
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub instance_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: usize,
    /// Transform of the glTF node the mesh belongs to.
    pub world: Matrix4<f32>,
}

/// A loaded model subtree as it lives in the scene.
#[derive(Debug)]
pub struct ModelNode {
    pub name: String,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    local: Instance,
    dirty: bool,
}

/// White, flat fallbacks for material slots the asset leaves empty.
struct Fallbacks {
    white_srgb: Texture,
    white_linear: Texture,
    black_srgb: Texture,
    normal: Texture,
}

impl Fallbacks {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            white_srgb: Texture::create_solid(device, queue, [255; 4], true, "white srgb"),
            white_linear: Texture::create_solid(device, queue, [255; 4], false, "white linear"),
            black_srgb: Texture::create_solid(device, queue, [0, 0, 0, 255], true, "black srgb"),
            normal: Texture::create_default_normal_map(device, queue),
        }
    }
}

impl ModelNode {
    /// Upload a fetched glTF asset. Uses the default scene, or the first one.
    pub fn from_asset(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        asset: &GltfAsset,
        layout: &wgpu::BindGroupLayout,
    ) -> anyhow::Result<Self> {
        let fallbacks = Fallbacks::new(device, queue);
        let sampler = texture::create_default_sampler(device);

        // One GPU texture per (image, colour space) pair
        let mut textures: HashMap<(usize, bool), Texture> = HashMap::new();
        let mut texture_for = |info: Option<gltf::texture::Texture>, srgb: bool| -> Option<(usize, bool)> {
            let texture = info?;
            let index = texture.source().index();
            let rgba = asset.images.get(index)?;
            textures.entry((index, srgb)).or_insert_with(|| {
                Texture::from_rgba(
                    device,
                    queue,
                    rgba,
                    Some(&format!("{} image {}", asset.name, index)),
                    srgb,
                )
            });
            Some((index, srgb))
        };

        let mut slots = Vec::new();
        for material in asset.document.materials() {
            let pbr = material.pbr_metallic_roughness();
            slots.push((
                material.name().unwrap_or("material").to_string(),
                MaterialUniform::from_gltf(&material),
                [
                    texture_for(pbr.base_color_texture().map(|t| t.texture()), true),
                    texture_for(pbr.metallic_roughness_texture().map(|t| t.texture()), false),
                    texture_for(material.normal_texture().map(|t| t.texture()), false),
                    texture_for(material.occlusion_texture().map(|t| t.texture()), false),
                    texture_for(material.emissive_texture().map(|t| t.texture()), true),
                ],
            ));
        }

        let mut materials: Vec<Material> = slots
            .into_iter()
            .map(|(name, uniform, keys)| {
                let pick = |key: Option<(usize, bool)>, fallback: &Texture| -> Texture {
                    key.and_then(|key| textures.get(&key))
                        .unwrap_or(fallback)
                        .clone()
                };
                let base_color = pick(keys[0], &fallbacks.white_srgb);
                let metallic_roughness = pick(keys[1], &fallbacks.white_linear);
                let normal = pick(keys[2], &fallbacks.normal);
                let occlusion = pick(keys[3], &fallbacks.white_linear);
                let emissive = pick(keys[4], &fallbacks.black_srgb);
                Material::new(
                    device,
                    &name,
                    MaterialTextures {
                        base_color: &base_color,
                        metallic_roughness: &metallic_roughness,
                        normal: &normal,
                        occlusion: &occlusion,
                        emissive: &emissive,
                    },
                    uniform,
                    &sampler,
                    layout,
                )
            })
            .collect();

        let default_material = materials.len();
        materials.push(Material::new(
            device,
            "default material",
            MaterialTextures {
                base_color: &fallbacks.white_srgb,
                metallic_roughness: &fallbacks.white_linear,
                normal: &fallbacks.normal,
                occlusion: &fallbacks.white_linear,
                emissive: &fallbacks.black_srgb,
            },
            MaterialUniform::default(),
            &sampler,
            layout,
        ));

        let scene = asset
            .document
            .default_scene()
            .or_else(|| asset.document.scenes().next())
            .context("model contains no scene")?;

        let local = Instance::new();
        let mut meshes = Vec::new();
        for node in scene.nodes() {
            collect_meshes(
                device,
                asset,
                node,
                Matrix4::identity(),
                &local,
                default_material,
                &mut meshes,
            )?;
        }
        if meshes.is_empty() {
            log::warn!("Model {} contains no triangle meshes", asset.name);
        }

        Ok(Self {
            name: asset.name.clone(),
            meshes,
            materials,
            local,
            dirty: false,
        })
    }

    /// Push a changed local transform to the per-mesh instance buffers.
    pub fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        if !self.dirty {
            return;
        }
        for mesh in &self.meshes {
            let raw = self.local.to_raw(&mesh.world);
            queue.write_buffer(&mesh.instance_buffer, 0, bytemuck::cast_slice(&[raw]));
        }
        self.dirty = false;
    }
}

impl SceneNode for ModelNode {
    fn local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
        self.dirty = true;
    }
}

fn collect_meshes(
    device: &wgpu::Device,
    asset: &GltfAsset,
    node: gltf::Node,
    parent: Matrix4<f32>,
    local: &Instance,
    default_material: usize,
    meshes: &mut Vec<Mesh>,
) -> anyhow::Result<()> {
    let world = parent * Matrix4::from(node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or("unknown_mesh");
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping primitive {} of mesh {}: mode {:?} is not supported",
                    primitive.index(),
                    mesh_name,
                    primitive.mode()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| asset.buffers.get(buffer.index()).map(|b| &b[..]));

            let mut vertices: Vec<ModelVertex> = reader
                .read_positions()
                .with_context(|| format!("mesh {mesh_name} has a primitive without positions"))?
                .map(|position| ModelVertex {
                    position,
                    normal: [0.0, 0.0, 1.0],
                    ..Default::default()
                })
                .collect();
            if let Some(normals) = reader.read_normals() {
                vertices
                    .iter_mut()
                    .zip(normals)
                    .for_each(|(vertex, normal)| vertex.normal = normal);
            }
            if let Some(tex_coords) = reader.read_tex_coords(0) {
                vertices
                    .iter_mut()
                    .zip(tex_coords.into_f32())
                    .for_each(|(vertex, uv)| vertex.tex_coords = uv);
            }
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            match reader.read_tangents() {
                Some(tangents) => {
                    vertices.iter_mut().zip(tangents).for_each(|(vertex, tangent)| {
                        // vec4 tangents carry the bitangent sign in w
                        let tangent: cgmath::Vector4<f32> = tangent.into();
                        let normal: cgmath::Vector3<f32> = vertex.normal.into();
                        vertex.tangent = tangent.truncate().into();
                        vertex.bitangent =
                            (normal.cross(tangent.truncate()).normalize() * tangent.w).into();
                    });
                }
                None => compute_tangents(&mut vertices, &indices),
            }

            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Vertex Buffer", mesh_name)),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Index Buffer", mesh_name)),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Instance Buffer", mesh_name)),
                contents: bytemuck::cast_slice(&[local.to_raw(&world)]),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });

            meshes.push(Mesh {
                name: mesh_name.to_string(),
                vertex_buffer,
                index_buffer,
                instance_buffer,
                num_elements: indices.len() as u32,
                material: primitive.material().index().unwrap_or(default_material),
                world,
            });
        }
    }

    for child in node.children() {
        collect_meshes(device, asset, child, world, local, default_material, meshes)?;
    }
    Ok(())
}

pub trait DrawModel {
    fn draw_mesh(
        &mut self,
        mesh: &Mesh,
        material: &Material,
        camera_bind_group: &wgpu::BindGroup,
        environment_bind_group: &wgpu::BindGroup,
    );

    fn draw_model(
        &mut self,
        model: &ModelNode,
        camera_bind_group: &wgpu::BindGroup,
        environment_bind_group: &wgpu::BindGroup,
    );
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_mesh(
        &mut self,
        mesh: &Mesh,
        material: &Material,
        camera_bind_group: &wgpu::BindGroup,
        environment_bind_group: &wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_vertex_buffer(1, mesh.instance_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, environment_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, 0..1);
    }

    fn draw_model(
        &mut self,
        model: &ModelNode,
        camera_bind_group: &wgpu::BindGroup,
        environment_bind_group: &wgpu::BindGroup,
    ) {
        for mesh in &model.meshes {
            let Some(material) = model.materials.get(mesh.material) else {
                continue;
            };
            self.draw_mesh(mesh, material, camera_bind_group, environment_bind_group);
        }
    }
}
