//! Wavefront OBJ export

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use arbor::{LeafGeometry, MeshBuffer, TreeGeometry};

/// Write bark and leaves as two OBJ objects
///
/// Instanced leaves are baked into a single mesh for export.
pub fn write_obj(tree: &TreeGeometry, path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_tree(tree, &mut writer)?;
    writer.flush()
}

pub fn write_tree<W: Write>(tree: &TreeGeometry, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "# arbor tree")?;
    writeln!(out)?;

    let offset = write_object(out, "bark", &tree.bark.material, &tree.bark.mesh, 0)?;

    let leaves = match &tree.leaves.geometry {
        LeafGeometry::Merged(merged) => Cow::Borrowed(&merged.mesh),
        LeafGeometry::Instanced(instanced) => {
            let mut mesh = MeshBuffer::new();
            for leaf in &instanced.instances {
                mesh.append(&instanced.template.transformed(leaf.transform));
            }
            Cow::Owned(mesh)
        }
    };
    write_object(out, "leaves", &tree.leaves.material, &leaves, offset)?;
    Ok(())
}

/// Emit one object; `offset` is the number of vertices already written
fn write_object<W: Write>(
    out: &mut W,
    name: &str,
    material: &str,
    mesh: &MeshBuffer,
    offset: usize,
) -> std::io::Result<usize> {
    if mesh.is_empty() {
        return Ok(0);
    }

    writeln!(out, "o {}", name)?;
    writeln!(out, "usemtl {}", material)?;

    for [x, y, z] in &mesh.positions {
        writeln!(out, "v {} {} {}", x, y, z)?;
    }
    // OBJ needs one vt per vertex for the v/vt/vn face form
    for i in 0..mesh.vertex_count() {
        let [u, v] = mesh.uvs.get(i).copied().unwrap_or([0.0, 0.0]);
        writeln!(out, "vt {} {}", u, v)?;
    }
    for [x, y, z] in &mesh.normals {
        writeln!(out, "vn {} {} {}", x, y, z)?;
    }

    // Faces (1-based)
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize + offset + 1);
        writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
    }
    writeln!(out)?;

    Ok(mesh.vertex_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor::{LeafMode, Preset, TreeBuilder, seeded_rng};

    fn tree(mode: LeafMode) -> TreeGeometry {
        let builder = TreeBuilder::new(Preset::Osmanthus.species())
            .unwrap()
            .with_leaf_mode(mode);
        builder.build(&mut seeded_rng(1)).1
    }

    fn count_prefix(text: &str, prefix: &str) -> usize {
        text.lines().filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    fn test_face_and_vertex_counts() {
        let tree = tree(LeafMode::Merged);
        let mut buf = Vec::new();
        write_tree(&tree, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let LeafGeometry::Merged(leaves) = &tree.leaves.geometry else {
            panic!("expected merged leaves");
        };
        let verts = tree.bark.mesh.vertex_count() + leaves.mesh.vertex_count();
        let faces = tree.bark.mesh.triangle_count() + leaves.mesh.triangle_count();

        assert_eq!(count_prefix(&text, "v "), verts);
        assert_eq!(count_prefix(&text, "vt "), verts);
        assert_eq!(count_prefix(&text, "vn "), verts);
        assert_eq!(count_prefix(&text, "f "), faces);
        assert_eq!(count_prefix(&text, "o "), 2);
    }

    #[test]
    fn test_instanced_leaves_are_baked() {
        let merged = tree(LeafMode::Merged);
        let instanced = tree(LeafMode::Instanced);

        let mut a = Vec::new();
        let mut b = Vec::new();
        write_tree(&merged, &mut a).unwrap();
        write_tree(&instanced, &mut b).unwrap();
        let (a, b) = (String::from_utf8(a).unwrap(), String::from_utf8(b).unwrap());

        assert_eq!(count_prefix(&a, "f "), count_prefix(&b, "f "));
        assert_eq!(count_prefix(&a, "v "), count_prefix(&b, "v "));
    }

    #[test]
    fn test_face_indices_in_range() {
        let tree = tree(LeafMode::Instanced);
        let mut buf = Vec::new();
        write_tree(&tree, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let verts = count_prefix(&text, "v ");
        for line in text.lines().filter(|l| l.starts_with("f ")) {
            for corner in line.split_whitespace().skip(1) {
                let index: usize = corner.split('/').next().unwrap().parse().unwrap();
                assert!(index >= 1 && index <= verts);
            }
        }
    }

    #[test]
    fn test_write_obj_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.obj");
        write_obj(&tree(LeafMode::Merged), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("usemtl tree_base_standard"));
        assert!(text.contains("o leaves"));
    }
}
