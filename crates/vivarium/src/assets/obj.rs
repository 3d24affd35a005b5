//! Minimal Wavefront OBJ importer.
//!
//! Handles the subset the shipped asset set uses: `v`, `vn`, `vt`, `f`
//! (any face arity, fan-triangulated), and `o` sub-mesh delimiters. OBJ
//! vertex indices are file-global and 1-based; faces may reference
//! positions alone (`f 1 2 3`), positions+uvs (`1/2`), positions+normals
//! (`1//3`), or all three (`1/2/3`).
//!
//! Render consumers get de-indexed triangle soup (one position/normal/uv
//! per corner); collision consumers get the deduplicated point set each
//! sub-mesh references, which is the convex-hull input.

use std::fs;
use std::path::Path;

use vivarium_core::{Result, VivariumError};

/// One `o`-delimited sub-mesh of an OBJ file.
#[derive(Clone, Debug, Default)]
pub struct ObjMesh {
    pub name: String,
    /// Corner positions, three per triangle.
    pub positions: Vec<[f32; 3]>,
    /// Corner normals, three per triangle. Face normals are derived when
    /// the file carries none.
    pub normals: Vec<[f32; 3]>,
    /// Corner texture coordinates, three per triangle; zero when absent.
    pub uvs: Vec<[f32; 2]>,
    /// Deduplicated positions referenced by this sub-mesh's faces.
    pub hull_points: Vec<[f32; 3]>,
}

impl ObjMesh {
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.positions.len() / 3
    }
}

/// All sub-meshes of one OBJ file.
#[derive(Clone, Debug, Default)]
pub struct ImportedObject {
    pub meshes: Vec<ObjMesh>,
}

/// Import one OBJ file from disk.
pub fn import_obj(path: &Path) -> Result<ImportedObject> {
    let text = fs::read_to_string(path).map_err(|e| VivariumError::Asset {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_obj(&text).map_err(|(line, message)| VivariumError::Asset {
        path: path.display().to_string(),
        message: format!("line {line}: {message}"),
    })
}

fn parse_obj(text: &str) -> std::result::Result<ImportedObject, (usize, String)> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();

    let mut meshes: Vec<ObjMesh> = Vec::new();
    let mut current: Option<ObjMesh> = None;
    // Maps file-global position indices to hull-point slots per mesh.
    let mut hull_seen: Vec<i64> = Vec::new();

    for (line_no, raw) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let tag = fields.next().unwrap();
        match tag {
            "v" => positions.push(parse_vec3(&mut fields).map_err(|m| (line_no, m))?),
            "vn" => normals.push(parse_vec3(&mut fields).map_err(|m| (line_no, m))?),
            "vt" => {
                let v = parse_vec3_partial(&mut fields, 2).map_err(|m| (line_no, m))?;
                uvs.push([v[0], v[1]]);
            }
            "o" | "g" => {
                if let Some(mesh) = current.take() {
                    if !mesh.positions.is_empty() {
                        meshes.push(mesh);
                    }
                }
                current = Some(ObjMesh {
                    name: fields.next().unwrap_or("").to_string(),
                    ..Default::default()
                });
                hull_seen.clear();
                hull_seen.resize(positions.len(), -1);
                // Later `v` records extend the file-global list; the map
                // grows lazily in the face handler.
            }
            "f" => {
                let mesh = current.get_or_insert_with(ObjMesh::default);
                if hull_seen.len() < positions.len() {
                    hull_seen.resize(positions.len(), -1);
                }
                let mut corners: Vec<(usize, Option<usize>, Option<usize>)> = Vec::new();
                for field in fields {
                    corners.push(parse_face_corner(
                        field,
                        positions.len(),
                        uvs.len(),
                        normals.len(),
                    )
                    .map_err(|m| (line_no, m))?);
                }
                if corners.len() < 3 {
                    return Err((line_no, format!("face with {} corners", corners.len())));
                }
                for i in 1..corners.len() - 1 {
                    for &(pi, ti, ni) in &[corners[0], corners[i], corners[i + 1]] {
                        mesh.positions.push(positions[pi]);
                        mesh.uvs.push(ti.map_or([0.0; 2], |t| uvs[t]));
                        mesh.normals.push(ni.map_or([0.0; 3], |n| normals[n]));
                        if hull_seen[pi] < 0 {
                            hull_seen[pi] = mesh.hull_points.len() as i64;
                            mesh.hull_points.push(positions[pi]);
                        }
                    }
                    // Derive a face normal when the file carries none.
                    let n = mesh.positions.len();
                    if mesh.normals[n - 3] == [0.0; 3] {
                        let fnorm = face_normal(
                            mesh.positions[n - 3],
                            mesh.positions[n - 2],
                            mesh.positions[n - 1],
                        );
                        mesh.normals[n - 3] = fnorm;
                        mesh.normals[n - 2] = fnorm;
                        mesh.normals[n - 1] = fnorm;
                    }
                }
            }
            // Material/library statements are handled by the material
            // override tables, not the importer.
            "mtllib" | "usemtl" | "s" => {}
            _ => return Err((line_no, format!("unsupported OBJ statement '{tag}'"))),
        }
    }
    if let Some(mesh) = current {
        if !mesh.positions.is_empty() {
            meshes.push(mesh);
        }
    }
    if meshes.is_empty() {
        return Err((0, "no geometry".to_string()));
    }
    Ok(ImportedObject { meshes })
}

fn parse_vec3(fields: &mut dyn Iterator<Item = &str>) -> std::result::Result<[f32; 3], String> {
    parse_vec3_partial(fields, 3)
}

fn parse_vec3_partial(
    fields: &mut dyn Iterator<Item = &str>,
    required: usize,
) -> std::result::Result<[f32; 3], String> {
    let mut out = [0.0f32; 3];
    for (i, slot) in out.iter_mut().enumerate().take(required.max(1)) {
        let field = fields
            .next()
            .ok_or_else(|| format!("expected {required} components"))?;
        *slot = field
            .parse::<f32>()
            .map_err(|_| format!("bad float '{field}'"))?;
        if i + 1 == required {
            break;
        }
    }
    Ok(out)
}

fn parse_face_corner(
    field: &str,
    num_pos: usize,
    num_uv: usize,
    num_norm: usize,
) -> std::result::Result<(usize, Option<usize>, Option<usize>), String> {
    let mut parts = field.split('/');
    let pos = resolve_index(parts.next().unwrap_or(""), num_pos)?
        .ok_or_else(|| format!("face corner '{field}' missing position index"))?;
    let uv = resolve_index(parts.next().unwrap_or(""), num_uv)?;
    let norm = resolve_index(parts.next().unwrap_or(""), num_norm)?;
    Ok((pos, uv, norm))
}

fn resolve_index(field: &str, len: usize) -> std::result::Result<Option<usize>, String> {
    if field.is_empty() {
        return Ok(None);
    }
    let idx = field
        .parse::<i64>()
        .map_err(|_| format!("bad index '{field}'"))?;
    let resolved = if idx > 0 {
        idx - 1
    } else {
        len as i64 + idx
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(format!("index {idx} out of range (have {len})"));
    }
    Ok(Some(resolved as usize))
}

fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}
