//! Asset conversion pipeline.
//!
//! Reads the fixed static asset set (one collision mesh and one render mesh
//! per [`SimObject`], plus material textures) from a data directory and
//! converts it into the two immutable tables the backends consume: a
//! physics collision-asset table (convex hulls, plus an implicit infinite
//! plane for the ground kind) and a render-asset table (triangle meshes
//! with material and texture data).
//!
//! A missing or malformed file is a fatal load error; there is no
//! partial-load mode. Per-kind physical parameters come from the policy
//! tables below rather than from the mesh files.

pub mod obj;

use std::path::Path;

use vivarium_core::{
    ObjectTable, Result, RigidBodyMetadata, RotationConstraint, SimObject, VivariumError,
};

use obj::{import_obj, ObjMesh};

// ============================================================================
// Physics assets
// ============================================================================

/// One convex hull extracted from a collision mesh.
#[derive(Clone, Debug)]
pub struct SourceHull {
    pub points: Vec<[f32; 3]>,
}

/// The physics collision-asset table: per-kind hull lists plus the derived
/// rigid-body metadata registered with the active backend.
#[derive(Clone, Debug)]
pub struct PhysicsAssets {
    /// Hulls per object kind; the plane kind has none.
    pub hulls: Vec<Vec<SourceHull>>,
    pub table: ObjectTable,
}

/// Load-time mass/friction policy, indexed by object kind. Static scenery
/// gets zero inverse mass; dynamic props get positive inverse mass.
const BODY_POLICY: [(SimObject, f32, f32, f32); 8] = [
    // (kind, inv_mass, mu_s, mu_d)
    (SimObject::Cube, 0.075, 0.5, 0.75),
    (SimObject::Wall, 0.0, 0.5, 0.5),
    (SimObject::Door, 0.0, 0.5, 0.5),
    (SimObject::Agent, 1.0, 0.5, 0.5),
    (SimObject::Button, 1.0, 0.5, 0.5),
    (SimObject::BasketballHoop, 0.0, 0.5, 0.5),
    (SimObject::Basketball, 0.5, 0.4, 0.4),
    (SimObject::BasketballCourt, 0.0, 0.5, 0.5),
];

/// Per-kind rotational freedom, applied after generic inertia computation.
/// Agents keep policies controllable by only rotating about Z.
const ROTATION_CONSTRAINTS: [(SimObject, RotationConstraint); 1] =
    [(SimObject::Agent, RotationConstraint::YawOnly)];

/// Collision mesh file per non-plane kind.
fn collision_file(obj: SimObject) -> &'static str {
    match obj {
        SimObject::Cube => "cube_collision.obj",
        SimObject::Wall => "wall_collision.obj",
        SimObject::Door => "wall_collision.obj",
        SimObject::Agent => "agent_collision_simplified.obj",
        SimObject::Button => "cube_collision.obj",
        SimObject::BasketballHoop => "cube_collision.obj",
        SimObject::Basketball => "cube_collision.obj",
        SimObject::BasketballCourt => "cube_collision.obj",
        SimObject::Plane => unreachable!("the plane kind has no collision mesh"),
    }
}

/// Load and convert the physics collision-asset table.
pub fn load_physics_assets(data_dir: &Path) -> Result<PhysicsAssets> {
    let mut hulls: Vec<Vec<SourceHull>> = vec![Vec::new(); SimObject::COUNT];
    let mut table = ObjectTable {
        metadata: [RigidBodyMetadata::fixed(); SimObject::COUNT],
    };

    for &(kind, inv_mass, mu_s, mu_d) in &BODY_POLICY {
        let path = data_dir.join(collision_file(kind));
        let imported = import_obj(&path)?;
        let kind_hulls: Vec<SourceHull> = imported
            .meshes
            .into_iter()
            .map(|mesh| SourceHull {
                points: mesh.hull_points,
            })
            .collect();
        if kind_hulls.is_empty() || kind_hulls.iter().any(|h| h.points.len() < 4) {
            return Err(VivariumError::Asset {
                path: path.display().to_string(),
                message: format!("invalid collision hull input for {kind:?}"),
            });
        }

        let half_extents = combined_half_extents(&kind_hulls);
        table.metadata[kind.index()] = RigidBodyMetadata {
            inv_mass,
            mu_s,
            mu_d,
            inv_inertia: box_inv_inertia(inv_mass, half_extents),
            half_extents,
        };
        hulls[kind.index()] = kind_hulls;
    }

    // The ground kind is a single implicit infinite plane; it takes part in
    // collision as a primitive, never as a hull.
    table.metadata[SimObject::Plane.index()] = RigidBodyMetadata::fixed();

    for &(kind, constraint) in &ROTATION_CONSTRAINTS {
        let meta = &mut table.metadata[kind.index()];
        match constraint {
            RotationConstraint::Full => {}
            RotationConstraint::YawOnly => {
                meta.inv_inertia[0] = 0.0;
                meta.inv_inertia[1] = 0.0;
            }
        }
    }

    Ok(PhysicsAssets { hulls, table })
}

/// Axis-aligned half extents covering every hull of a kind.
fn combined_half_extents(hulls: &[SourceHull]) -> [f32; 3] {
    let mut he = [0.0f32; 3];
    for hull in hulls {
        for p in &hull.points {
            for axis in 0..3 {
                he[axis] = he[axis].max(p[axis].abs());
            }
        }
    }
    he
}

/// Inverse inertia of a uniform-density box with the given half extents.
fn box_inv_inertia(inv_mass: f32, he: [f32; 3]) -> [f32; 3] {
    if inv_mass == 0.0 {
        return [0.0; 3];
    }
    let mass = 1.0 / inv_mass;
    let i = [
        mass * (he[1] * he[1] + he[2] * he[2]) / 3.0,
        mass * (he[0] * he[0] + he[2] * he[2]) / 3.0,
        mass * (he[0] * he[0] + he[1] * he[1]) / 3.0,
    ];
    [1.0 / i[0], 1.0 / i[1], 1.0 / i[2]]
}

// ============================================================================
// Render assets
// ============================================================================

#[derive(Clone, Debug)]
pub struct RenderMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub material_idx: i32,
}

#[derive(Clone, Debug)]
pub struct RenderObject {
    pub meshes: Vec<RenderMesh>,
}

/// Source material: base color, optional texture index, PBR-ish scalars.
#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub base_color: [f32; 4],
    pub texture: i32,
    pub metalness: f32,
    pub roughness: f32,
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// The render-asset table consumed by the render manager.
#[derive(Clone, Debug)]
pub struct RenderAssets {
    /// Indexed by [`SimObject`].
    pub objects: Vec<RenderObject>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
}

fn render_file(obj: SimObject) -> &'static str {
    match obj {
        SimObject::Cube => "cube_render.obj",
        SimObject::Wall => "wall_render.obj",
        SimObject::Door => "wall_render.obj",
        SimObject::Agent => "agent_render.obj",
        SimObject::Button => "cube_render.obj",
        SimObject::Plane => "plane.obj",
        SimObject::BasketballHoop => "hoop.obj",
        SimObject::Basketball => "basketball.obj",
        SimObject::BasketballCourt => "court.obj",
    }
}

const TEXTURE_FILES: [&str; 3] = ["green_grid.png", "smile.png", "hoop_texture.png"];

fn rgb8(r: u8, g: u8, b: u8) -> [f32; 4] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

fn material_palette() -> Vec<Material> {
    let m = |base_color: [f32; 4], texture: i32, metalness: f32, roughness: f32| Material {
        base_color,
        texture,
        metalness,
        roughness,
    };
    vec![
        m(rgb8(191, 108, 10), -1, 0.8, 0.2),          // 0: cube
        m([0.4, 0.4, 0.4, 1.0], -1, 0.8, 0.2),        // 1: wall
        m([1.0, 1.0, 1.0, 1.0], 1, 0.5, 1.0),         // 2: agent face
        m(rgb8(230, 230, 230), -1, 0.8, 1.0),         // 3: agent body
        m([0.5, 0.3, 0.3, 1.0], 0, 0.8, 0.2),         // 4: ground grid
        m(rgb8(230, 20, 20), -1, 0.8, 1.0),           // 5: door
        m(rgb8(230, 230, 20), -1, 0.8, 1.0),          // 6: button
        m([1.0, 1.0, 1.0, 1.0], 2, 0.5, 1.0),         // 7: hoop
        m([0.8, 0.106, 0.005, 1.0], -1, 0.8, 0.4),    // 8: basketball
        m([0.05, 0.05, 0.05, 1.0], -1, 0.8, 0.2),     // 9: court
    ]
}

/// (kind, sub-mesh index) -> material index overrides.
const MATERIAL_OVERRIDES: [(SimObject, usize, i32); 11] = [
    (SimObject::Cube, 0, 0),
    (SimObject::Wall, 0, 1),
    (SimObject::Door, 0, 5),
    (SimObject::Agent, 0, 2),
    (SimObject::Agent, 1, 3),
    (SimObject::Agent, 2, 3),
    (SimObject::Button, 0, 6),
    (SimObject::Plane, 0, 4),
    (SimObject::BasketballHoop, 0, 7),
    (SimObject::Basketball, 0, 8),
    (SimObject::BasketballCourt, 0, 9),
];

/// Load and convert the render-asset table.
pub fn load_render_assets(data_dir: &Path) -> Result<RenderAssets> {
    let mut objects = Vec::with_capacity(SimObject::COUNT);
    for kind in SimObject::ALL {
        let path = data_dir.join(render_file(kind));
        let imported = import_obj(&path)?;
        objects.push(RenderObject {
            meshes: imported.meshes.into_iter().map(to_render_mesh).collect(),
        });
    }

    for &(kind, mesh_idx, material_idx) in &MATERIAL_OVERRIDES {
        let meshes = &mut objects[kind.index()].meshes;
        let mesh = meshes.get_mut(mesh_idx).ok_or_else(|| VivariumError::Asset {
            path: data_dir.join(render_file(kind)).display().to_string(),
            message: format!("{kind:?} is missing expected sub-mesh {mesh_idx}"),
        })?;
        mesh.material_idx = material_idx;
    }

    let mut textures = Vec::with_capacity(TEXTURE_FILES.len());
    for file in TEXTURE_FILES {
        let path = data_dir.join(file);
        let img = image::open(&path)
            .map_err(|e| VivariumError::Asset {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
            .to_rgba8();
        textures.push(Texture {
            width: img.width(),
            height: img.height(),
            rgba: img.into_raw(),
        });
    }

    Ok(RenderAssets {
        objects,
        materials: material_palette(),
        textures,
    })
}

fn to_render_mesh(mesh: ObjMesh) -> RenderMesh {
    RenderMesh {
        positions: mesh.positions,
        normals: mesh.normals,
        uvs: mesh.uvs,
        material_idx: 0,
    }
}
