mod common;

use std::io::{BufReader, Cursor};

use hair_splat_editor::{
    AvatarScene, EditorSession, Error, Gaussian, Gaussians, PlyHeader, SH_COEFF_COUNT,
    StrandLayout, glam::*,
};

use common::given;

fn to_bytes(gaussians: &Gaussians, strands: StrandLayout) -> Vec<u8> {
    let mut bytes = Vec::new();
    gaussians.write_ply(&mut bytes, strands).expect("write");
    bytes
}

fn from_bytes(bytes: &[u8]) -> Result<(Gaussians, StrandLayout), Error> {
    Gaussians::read_ply(&mut BufReader::new(Cursor::new(bytes)))
}

/// A float only PLY file with the given properties and rows.
fn custom_ply(format: &str, properties: &[&str], rows: &[Vec<f32>]) -> Vec<u8> {
    let mut bytes = format!("ply\nformat {format} 1.0\nelement vertex {}\n", rows.len());
    for property in properties {
        bytes.push_str(&format!("property float {property}\n"));
    }
    bytes.push_str("end_header\n");

    let mut bytes = bytes.into_bytes();
    for row in rows {
        bytes.extend(row.iter().flat_map(|value| value.to_le_bytes()));
    }
    bytes
}

fn required_row() -> Vec<f32> {
    // x y z opacity, scale, rot (w x y z), f_dc
    vec![
        1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3,
    ]
}

#[test]
fn test_ply_round_trip_should_keep_gaussians_and_strands() {
    let gaussians = given::hair_gaussians(Vec3::ZERO);

    let (read, strands) = from_bytes(&to_bytes(&gaussians, given::strands())).expect("read");

    assert_eq!(strands, given::strands());
    assert_eq!(read.len(), gaussians.len());
    for (read, expected) in read.iter().zip(gaussians.iter()) {
        assert_eq!(read.pos, expected.pos);
        given::assert_quat_near(read.rot, expected.rot);
        assert!(read.scale.abs_diff_eq(expected.scale, 1e-6));
        assert!((read.opacity - expected.opacity).abs() < 1e-6);
        assert_eq!(read.sh, expected.sh);
    }
}

#[test]
fn test_gaussian_to_ply_should_store_log_and_logit_values() {
    let gaussian = given::hair_gaussian(Vec3::ZERO, 0, 0);

    let pod = gaussian.to_ply(given::strands());

    assert!((pod.opacity - 4.0f32.ln()).abs() < 1e-5);
    assert!((pod.scale[0] - given::SEGMENT.ln()).abs() < 1e-6);
    assert!((pod.scale[1] - 0.005f32.ln()).abs() < 1e-6);
    assert_eq!(pod.rot[0], gaussian.rot.w);
    assert_eq!(pod.rot[3], gaussian.rot.z);
    assert_eq!(pod.strand_count, given::STRAND_COUNT as i32);
    assert_eq!(pod.gaussians_per_strand, given::GAUSSIANS_PER_STRAND as i32);
}

#[test]
fn test_gaussian_to_ply_should_group_higher_bands_by_channel() {
    let gaussian = given::hair_gaussian(Vec3::ZERO, 0, 0);

    let pod = gaussian.to_ply(StrandLayout::NONE);

    // In memory the bands are interleaved, r g b per coefficient.
    assert_eq!(pod.sh[0], gaussian.sh[3]);
    assert_eq!(pod.sh[1], gaussian.sh[6]);
    assert_eq!(pod.sh[15], gaussian.sh[4]);
    assert_eq!(pod.sh[30], gaussian.sh[5]);
    assert_eq!(Gaussian::from_ply(&pod).sh, gaussian.sh);
}

#[test]
fn test_ply_round_trip_with_extreme_opacity_should_be_exact() {
    let mut gaussians = Gaussians::default();
    for opacity in [0.0, 1.0] {
        gaussians.push(Gaussian {
            opacity,
            ..given::head_gaussian(Vec3::ZERO, 0)
        });
    }

    let (read, _) = from_bytes(&to_bytes(&gaussians, StrandLayout::NONE)).expect("read");

    assert_eq!(read.opacity, vec![0.0, 1.0]);
}

#[test]
fn test_ply_read_without_strand_metadata_should_have_no_strands() {
    let bytes = custom_ply(
        "binary_little_endian",
        &PlyHeader::REQUIRED_PROPERTIES,
        &[required_row(), required_row()],
    );

    let (gaussians, strands) = from_bytes(&bytes).expect("read");

    assert_eq!(strands, StrandLayout::NONE);
    assert_eq!(gaussians.len(), 2);
    assert_eq!(gaussians.pos[1], Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(gaussians.opacity[0], 0.5);
    assert_eq!(gaussians.scale[0], Vec3::ONE);
    assert_eq!(gaussians.rot[0], Quat::IDENTITY);
    assert_eq!(&gaussians.sh[0][..3], &[0.1, 0.2, 0.3]);
    assert!(gaussians.sh[0][3..].iter().all(|c| *c == 0.0));
    assert_eq!(gaussians.sh[0].len(), SH_COEFF_COUNT);
}

#[test]
fn test_ply_read_with_unknown_property_should_ignore_it() {
    let mut properties = PlyHeader::REQUIRED_PROPERTIES.to_vec();
    properties.insert(3, "nx");
    let mut row = required_row();
    row.insert(3, 42.0);

    let (gaussians, _) =
        from_bytes(&custom_ply("binary_little_endian", &properties, &[row])).expect("read");

    assert_eq!(gaussians.pos[0], Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(gaussians.opacity[0], 0.5);
    assert_eq!(&gaussians.sh[0][..3], &[0.1, 0.2, 0.3]);
}

#[test]
fn test_ply_read_without_required_property_should_fail() {
    let properties = PlyHeader::REQUIRED_PROPERTIES
        .into_iter()
        .filter(|name| *name != "rot_3")
        .collect::<Vec<_>>();
    let mut row = required_row();
    row.remove(10);

    let result = from_bytes(&custom_ply("binary_little_endian", &properties, &[row]));

    assert!(matches!(result, Err(Error::PlyMissingProperty("rot_3"))));
}

#[test]
fn test_ply_read_with_ascii_format_should_fail() {
    let bytes = custom_ply("ascii", &PlyHeader::REQUIRED_PROPERTIES, &[]);

    assert!(matches!(
        from_bytes(&bytes),
        Err(Error::PlyUnsupportedFormat(format)) if format == "ascii"
    ));
}

#[test]
fn test_ply_read_when_not_ply_should_fail() {
    assert!(matches!(from_bytes(b"obj\n"), Err(Error::NotPly)));
    assert!(matches!(
        from_bytes(b"ply\nformat binary_little_endian 1.0\n"),
        Err(Error::PlyHeaderNotFound)
    ));
}

#[test]
fn test_ply_read_when_truncated_should_fail() {
    let mut bytes = custom_ply(
        "binary_little_endian",
        &PlyHeader::REQUIRED_PROPERTIES,
        &[required_row(), required_row()],
    );
    bytes.truncate(bytes.len() - 4);

    assert!(matches!(from_bytes(&bytes), Err(Error::Io(_))));
}

#[test]
fn test_ply_read_when_vertex_count_exceeds_file_should_fail() {
    let header = custom_ply(
        "binary_little_endian",
        &PlyHeader::REQUIRED_PROPERTIES,
        &[],
    );
    let mut bytes = String::from_utf8_lossy(&header)
        .replacen("element vertex 0\n", "element vertex 100000000000000000\n", 1)
        .into_bytes();
    bytes.extend(required_row().iter().flat_map(|value| value.to_le_bytes()));

    assert!(matches!(from_bytes(&bytes), Err(Error::Io(_))));
}

#[test]
fn test_scene_export_after_root_cut_should_prune_strand() {
    let mut scene = given::scene(1);
    let session = EditorSession {
        selected: Some(0),
        cutting_radius: 0.02,
        ..Default::default()
    };
    scene
        .cut(&session, &given::ray_through(given::hair_pos(Vec3::ZERO, 2, 0)))
        .expect("cut");

    let exported = scene.export(0).expect("export");

    assert_eq!(exported.pruned_strands, 1);
    assert_eq!(
        exported.strands,
        StrandLayout::new(given::STRAND_COUNT - 1, given::GAUSSIANS_PER_STRAND)
    );
    assert_eq!(
        exported.gaussians.len(),
        given::GAUSSIAN_COUNT - given::GAUSSIANS_PER_STRAND
    );
    // Strand 3 moves into the slot of strand 2.
    assert_eq!(
        exported.gaussians.pos[16],
        given::hair_pos(Vec3::ZERO, 3, 0)
    );
}

#[test]
fn test_scene_export_of_displaced_avatar_should_be_in_local_space() {
    let scene = given::scene(2);
    assert!(scene.displacement(1) > 0.0);

    let exported = scene.export(1).expect("export");

    for (exported, local) in exported
        .gaussians
        .pos
        .iter()
        .zip(&scene.avatars()[1].gaussians.pos)
    {
        given::assert_vec3_near(*exported, *local);
    }
}

#[test]
fn test_scene_export_to_file_should_load_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("edited.ply");
    let mut scene = given::scene(1);
    let session = EditorSession {
        selected: Some(0),
        cutting_radius: 0.02,
        ..Default::default()
    };
    scene
        .cut(&session, &given::ray_through(given::hair_pos(Vec3::ZERO, 0, 0)))
        .expect("cut");
    scene
        .cut(&session, &given::ray_through(given::hair_pos(Vec3::ZERO, 1, 6)))
        .expect("cut");

    scene.export_to_file(0, &path).expect("export");

    let mut loaded = AvatarScene::new();
    let index = loaded.load_avatar(&path).expect("load");
    let record = loaded.avatar(index).expect("avatar");
    assert_eq!(record.name, "edited");
    assert_eq!(
        record.strands,
        StrandLayout::new(given::STRAND_COUNT - 1, given::GAUSSIANS_PER_STRAND)
    );
    assert_eq!(
        record.len(),
        given::GAUSSIAN_COUNT - given::GAUSSIANS_PER_STRAND
    );
    let strand = record.strands.strand(0);
    assert!(record.gaussians.opacity[strand.start..strand.start + 6]
        .iter()
        .all(|o| (*o - 0.8).abs() < 1e-6));
    assert!(record.gaussians.opacity[strand.start + 6..strand.end]
        .iter()
        .all(|o| *o == 0.0));
}
