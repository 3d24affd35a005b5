//! Z-buffered perspective rasterizer for batch agent views.
//!
//! One call renders one (world, agent) view: instances are transformed into
//! the agent's eye space, clipped against the near plane, projected, and
//! scan-converted with edge functions against a per-view depth buffer.
//! Shading is a lambertian term over the configured directional lights with
//! perspective-correct texture lookup where the material carries one.

use crate::assets::{Material, RenderAssets, Texture};
use crate::render::{InstanceXform, LightConfig, RasterDevice};

/// Background color for pixels no geometry covers.
pub(crate) const CLEAR_COLOR: [u8; 4] = [13, 16, 26, 255];

/// Ambient fraction of the shading term.
const AMBIENT: f32 = 0.25;

pub struct ViewTarget<'a> {
    /// RGBA8, row-major, `width * height * 4` bytes.
    pub rgb: &'a mut [u8],
    /// Camera-space hit distance per pixel, `width * height` floats.
    pub depth: &'a mut [f32],
    pub width: u32,
    pub height: u32,
}

/// One camera-space vertex with its interpolated attributes.
#[derive(Clone, Copy)]
struct ClipVert {
    cam: [f32; 3],
    shade: f32,
    uv: [f32; 2],
}

/// Render every instance of one world into a single agent view.
pub fn render_view(
    target: &mut ViewTarget<'_>,
    device: &RasterDevice,
    eye: [f32; 3],
    yaw: f32,
    instances: &[InstanceXform],
    assets: &RenderAssets,
    lights: &[LightConfig],
) {
    let (w, h) = (target.width as usize, target.height as usize);
    debug_assert_eq!(target.rgb.len(), w * h * 4);
    debug_assert_eq!(target.depth.len(), w * h);

    for px in target.rgb.chunks_exact_mut(4) {
        px.copy_from_slice(&CLEAR_COLOR);
    }
    target.depth.fill(device.far);

    // Camera basis: forward along the agent heading, Z up.
    let fwd = [yaw.sin(), yaw.cos(), 0.0];
    let right = [yaw.cos(), -yaw.sin(), 0.0];
    let up = [0.0, 0.0, 1.0];
    let focal = 1.0 / (device.fov_y_degrees.to_radians() * 0.5).tan();
    let aspect = w as f32 / h as f32;

    let mut clipped: Vec<ClipVert> = Vec::with_capacity(4);
    for instance in instances {
        if !instance.visible {
            continue;
        }
        let object = &assets.objects[instance.kind.index()];
        let (sin_i, cos_i) = instance.yaw.sin_cos();
        for mesh in &object.meshes {
            let material = assets.materials[mesh.material_idx as usize];
            let texture =
                (material.texture >= 0).then(|| &assets.textures[material.texture as usize]);
            for tri in 0..mesh.positions.len() / 3 {
                let mut verts = [ClipVert {
                    cam: [0.0; 3],
                    shade: 0.0,
                    uv: [0.0; 2],
                }; 3];
                for corner in 0..3 {
                    let i = tri * 3 + corner;
                    // Model -> world: per-axis scale, yaw, translate.
                    let p = mesh.positions[i];
                    let scaled = [
                        p[0] * instance.scale[0],
                        p[1] * instance.scale[1],
                        p[2] * instance.scale[2],
                    ];
                    let world = [
                        scaled[0] * cos_i + scaled[1] * sin_i + instance.pos[0],
                        -scaled[0] * sin_i + scaled[1] * cos_i + instance.pos[1],
                        scaled[2] + instance.pos[2],
                    ];
                    let rel = [world[0] - eye[0], world[1] - eye[1], world[2] - eye[2]];

                    let n = mesh.normals[i];
                    let world_n = [
                        n[0] * cos_i + n[1] * sin_i,
                        -n[0] * sin_i + n[1] * cos_i,
                        n[2],
                    ];
                    verts[corner] = ClipVert {
                        cam: [dot(rel, right), dot(rel, up), dot(rel, fwd)],
                        shade: lambert(world_n, lights),
                        uv: mesh.uvs[i],
                    };
                }

                clip_near(&verts, device.near, &mut clipped);
                for i in 1..clipped.len().saturating_sub(1) {
                    fill_triangle(
                        target,
                        w,
                        h,
                        focal,
                        aspect,
                        [clipped[0], clipped[i], clipped[i + 1]],
                        &material,
                        texture,
                    );
                }
            }
        }
    }
}

/// Sutherland-Hodgman clip of one triangle against the `cam.z == near`
/// plane. Yields 0, 3, or 4 vertices.
fn clip_near(tri: &[ClipVert; 3], near: f32, out: &mut Vec<ClipVert>) {
    out.clear();
    for i in 0..3 {
        let a = tri[i];
        let b = tri[(i + 1) % 3];
        let a_in = a.cam[2] > near;
        let b_in = b.cam[2] > near;
        if a_in {
            out.push(a);
        }
        if a_in != b_in {
            let t = (near - a.cam[2]) / (b.cam[2] - a.cam[2]);
            out.push(lerp_vert(a, b, t));
        }
    }
}

fn lerp_vert(a: ClipVert, b: ClipVert, t: f32) -> ClipVert {
    let l = |x: f32, y: f32| x + (y - x) * t;
    ClipVert {
        cam: [
            l(a.cam[0], b.cam[0]),
            l(a.cam[1], b.cam[1]),
            l(a.cam[2], b.cam[2]),
        ],
        shade: l(a.shade, b.shade),
        uv: [l(a.uv[0], b.uv[0]), l(a.uv[1], b.uv[1])],
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_triangle(
    target: &mut ViewTarget<'_>,
    w: usize,
    h: usize,
    focal: f32,
    aspect: f32,
    verts: [ClipVert; 3],
    material: &Material,
    texture: Option<&Texture>,
) {
    let mut screen = [[0.0f32; 2]; 3];
    let mut inv_z = [0.0f32; 3];
    for (i, v) in verts.iter().enumerate() {
        let z = v.cam[2];
        screen[i] = [
            (v.cam[0] * focal / (z * aspect) + 1.0) * 0.5 * w as f32,
            (1.0 - v.cam[1] * focal / z) * 0.5 * h as f32,
        ];
        inv_z[i] = 1.0 / z;
    }

    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() < 1e-6 {
        return;
    }

    let min_x = screen.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min).max(0.0) as usize;
    let max_x = (screen.iter().map(|p| p[0]).fold(0.0f32, f32::max).ceil() as usize)
        .min(w.saturating_sub(1));
    let min_y = screen.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min).max(0.0) as usize;
    let max_y = (screen.iter().map(|p| p[1]).fold(0.0f32, f32::max).ceil() as usize)
        .min(h.saturating_sub(1));

    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let p = [px as f32 + 0.5, py as f32 + 0.5];
            // Signed areas normalize to positive barycentrics for either
            // winding; back faces are handled by the depth test.
            let b0 = edge(screen[1], screen[2], p) / area;
            let b1 = edge(screen[2], screen[0], p) / area;
            let b2 = edge(screen[0], screen[1], p) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }

            // Perspective-correct interpolation via 1/z.
            let iz = b0 * inv_z[0] + b1 * inv_z[1] + b2 * inv_z[2];
            let z = 1.0 / iz;
            let idx = py * w + px;
            if z >= target.depth[idx] {
                continue;
            }
            target.depth[idx] = z;

            let persp = |a0: f32, a1: f32, a2: f32| {
                (b0 * a0 * inv_z[0] + b1 * a1 * inv_z[1] + b2 * a2 * inv_z[2]) * z
            };
            let shade = persp(verts[0].shade, verts[1].shade, verts[2].shade);
            let light = AMBIENT + (1.0 - AMBIENT) * shade.clamp(0.0, 1.0);

            let mut color = material.base_color;
            if let Some(tex) = texture {
                let u = persp(verts[0].uv[0], verts[1].uv[0], verts[2].uv[0]);
                let v = persp(verts[0].uv[1], verts[1].uv[1], verts[2].uv[1]);
                let texel = sample_texture(tex, u, v);
                for c in 0..3 {
                    color[c] *= texel[c];
                }
            }
            let out = &mut target.rgb[idx * 4..idx * 4 + 4];
            for c in 0..3 {
                out[c] = ((color[c] * light).clamp(0.0, 1.0) * 255.0) as u8;
            }
            out[3] = 255;
        }
    }
}

fn lambert(normal: [f32; 3], lights: &[LightConfig]) -> f32 {
    let mut total = 0.0;
    for light in lights {
        if !light.active {
            continue;
        }
        let d = normalize(light.direction);
        // Two-sided shading keeps interior walls lit regardless of winding.
        let lum = (light.color[0] + light.color[1] + light.color[2]) / 3.0;
        total += dot(normal, [-d[0], -d[1], -d[2]]).abs() * lum;
    }
    total.clamp(0.0, 1.0)
}

fn sample_texture(tex: &Texture, u: f32, v: f32) -> [f32; 3] {
    let x = ((u.rem_euclid(1.0) * tex.width as f32) as u32).min(tex.width - 1);
    let y = (((1.0 - v.rem_euclid(1.0)) * tex.height as f32) as u32).min(tex.height - 1);
    let idx = ((y * tex.width + x) * 4) as usize;
    [
        tex.rgba[idx] as f32 / 255.0,
        tex.rgba[idx + 1] as f32 / 255.0,
        tex.rgba[idx + 2] as f32 / 255.0,
    ]
}

#[inline]
fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

#[inline]
fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = dot(v, v).sqrt();
    if len > 1e-12 {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 0.0, -1.0]
    }
}
