use engine_core::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Default)]
pub struct SubMesh {
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub submeshes: Vec<SubMesh>,
}

/// Parses the on-disk OBJ text contract (spec.md "obj_parser" module):
/// `v`/`vn`/`vt` accumulate per-submesh position/normal/uv pools that reset
/// on every `o` token; `f` is triangulated-only and resolves 1-based or
/// negative-relative indices against the *current* submesh's pools;
/// `mtllib`/`usemtl` are recognized and discarded; `g` is ignored.
/// Grounded in `original_source/engine/rendering/geometry/mesh.cpp`'s
/// `load_mesh_from_obj`.
pub fn parse_obj(text: &str) -> EngineResult<Mesh> {
    let mut mesh = Mesh::default();
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("v ") {
            positions.push(parse_floats3(rest)?);
        } else if let Some(rest) = line.strip_prefix("vn ") {
            normals.push(parse_floats3(rest)?);
        } else if let Some(rest) = line.strip_prefix("vt ") {
            uvs.push(parse_floats2(rest)?);
        } else if let Some(rest) = line.strip_prefix("f ") {
            let submesh = mesh
                .submeshes
                .last_mut()
                .ok_or_else(|| EngineError::Parse("face token with no active submesh".into()))?;
            parse_face(rest, &positions, &normals, &uvs, submesh)?;
        } else if let Some(rest) = line.strip_prefix("o ") {
            finalize_triangle_winding(mesh.submeshes.last_mut());
            mesh.submeshes.push(SubMesh { name: rest.trim().to_string(), ..SubMesh::default() });
            positions.clear();
            normals.clear();
            uvs.clear();
        } else if line.starts_with("g ") || line.starts_with("mtllib ") || line.starts_with("usemtl ") {
            // Groups and materials are recognized and discarded; see
            // Open Question 3 in the obj_parser module.
        }
    }
    finalize_triangle_winding(mesh.submeshes.last_mut());
    Ok(mesh)
}

/// Derives `[2, 1, 0, 5, 4, 3, ...]` from the packed-in-order vertex stream:
/// every triangle's three indices are emitted in reverse, matching the
/// renderer's front-face winding. Runs once per submesh, at the point its
/// vertex stream is complete — on the next `o` token, or at end of file for
/// the final submesh (the original only finalizes on the next `o` token,
/// which leaves the last submesh in a file with no trailing `o` indexless;
/// that's a corner the port does not reproduce, see DESIGN.md).
fn finalize_triangle_winding(submesh: Option<&mut SubMesh>) {
    let Some(submesh) = submesh else { return };
    if !submesh.indices.is_empty() || submesh.vertices.is_empty() {
        return;
    }
    for triangle in 0..submesh.vertices.len() / 3 {
        let base = triangle * 3;
        submesh.indices.push((base + 2) as u32);
        submesh.indices.push((base + 1) as u32);
        submesh.indices.push(base as u32);
    }
}

fn parse_face(
    rest: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    submesh: &mut SubMesh,
) -> EngineResult<()> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(EngineError::Parse("only triangulated faces are supported".into()));
    }
    for token in tokens {
        let mut parts = token.split('/');
        let position = resolve_index(parts.next().unwrap_or(""), positions.len())?;
        let uv = match parts.next().filter(|s| !s.is_empty()) {
            Some(s) if !uvs.is_empty() => resolve_index(s, uvs.len())?,
            _ => 0,
        };
        let normal = match parts.next().filter(|s| !s.is_empty()) {
            Some(s) if !normals.is_empty() => resolve_index(s, normals.len())?,
            _ => 0,
        };
        submesh.vertices.push(MeshVertex {
            position: *positions.get(position).ok_or_else(|| EngineError::Parse("face position index out of range".into()))?,
            normal: normals.get(normal).copied().unwrap_or([0.0, 0.0, 0.0]),
            uv: uvs.get(uv).copied().unwrap_or([0.0, 0.0]),
        });
    }
    Ok(())
}

/// Resolves an OBJ face index: positive values are 1-based, negative values
/// are relative to the end of the pool. Zero is invalid per the OBJ format.
fn resolve_index(token: &str, pool_len: usize) -> EngineResult<usize> {
    let value: i64 = token.parse().map_err(|_| EngineError::Parse(format!("invalid face index token: {token}")))?;
    if value == 0 {
        return Err(EngineError::Parse("face index of zero is invalid".into()));
    }
    if value > 0 {
        Ok(value as usize - 1)
    } else {
        let resolved = pool_len as i64 + value;
        if resolved < 0 {
            return Err(EngineError::Parse("negative face index out of range".into()));
        }
        Ok(resolved as usize)
    }
}

fn parse_floats3(rest: &str) -> EngineResult<[f32; 3]> {
    let mut it = rest.split_whitespace();
    let mut next = || -> EngineResult<f32> {
        it.next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| EngineError::Parse("expected 3 floats".into()))
    };
    Ok([next()?, next()?, next()?])
}

fn parse_floats2(rest: &str) -> EngineResult<[f32; 2]> {
    let mut it = rest.split_whitespace();
    let mut next = || -> EngineResult<f32> {
        it.next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| EngineError::Parse("expected 2 floats".into()))
    };
    Ok([next()?, next()?])
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_FACE: &str = "\
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
f 1//1 2//1 3//1
f 1//1 3//1 4//1
";

    #[test]
    fn parses_vertices_and_reverses_triangle_winding() {
        let mesh = parse_obj(CUBE_FACE).unwrap();
        assert_eq!(mesh.submeshes.len(), 1);
        let submesh = &mesh.submeshes[0];
        assert_eq!(submesh.name, "quad");
        assert_eq!(submesh.vertices.len(), 6);
        assert_eq!(submesh.indices, vec![2, 1, 0, 5, 4, 3]);
    }

    #[test]
    fn negative_relative_indices_resolve_against_current_submesh_pool() {
        let text = "\
o tri
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f -3 -2 -1
";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.submeshes[0].vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.submeshes[0].vertices[2].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn rejects_non_triangulated_faces() {
        let text = "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        assert!(parse_obj(text).is_err());
    }

    #[test]
    fn vertex_pools_reset_between_submeshes() {
        let text = "\
o first
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
o second
v 5.0 5.0 5.0
v 6.0 5.0 5.0
v 5.0 6.0 5.0
f 1 2 3
";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.submeshes.len(), 2);
        assert_eq!(mesh.submeshes[1].vertices[0].position, [5.0, 5.0, 5.0]);
    }
}
