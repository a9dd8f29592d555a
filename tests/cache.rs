mod common;

use std::{f32::consts::FRAC_PI_2, fs, path::Path};

use hair_splat_editor::{
    Error, FrameFolderCache, FramePacker, FramePose, KeyedCache, MemoryFrameCache,
    MemoryOrientationCache, NpyArray, OrientationFolderCache, OrientationGrid, RotationFormat,
    StrandLayout, WaveKey, glam::*, nearest_key, unpack_point,
};

use common::given;

/// Stored rows whose columns are the tangent -Y, normal +X and binormal +Z.
const DOWN_BASIS: [f32; 9] = [0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0];

const IDENTITY_BASIS: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

fn write_frame(folder: &Path, frame: u32, points: &[Vec3], bases: &[[f32; 9]]) {
    given::write_npy(
        &FrameFolderCache::frame_file(folder, frame, "mean"),
        vec![points.len(), 3],
        points.iter().flat_map(|p| p.to_array()).collect(),
    );
    given::write_npy(
        &FrameFolderCache::frame_file(folder, frame, "rot"),
        vec![bases.len(), 3, 3],
        bases.concat(),
    );
}

fn write_scale(folder: &Path, frame: u32, scales: &[Vec3]) {
    given::write_npy(
        &FrameFolderCache::frame_file(folder, frame, "scale"),
        vec![scales.len(), 3],
        scales.iter().flat_map(|s| s.to_array()).collect(),
    );
}

fn grid_array(strand_count: usize, gaussians_per_strand: usize) -> NpyArray {
    // Rotation i is stored as w = i, z = 1 before normalization.
    let data = (0..strand_count * gaussians_per_strand)
        .flat_map(|i| [i as f32, 0.0, 0.0, 1.0])
        .collect();
    NpyArray::new(vec![strand_count, gaussians_per_strand, 4], data).expect("array")
}

#[test]
fn test_nearest_key_when_tied_should_pick_first() {
    let candidates = vec![(1.0, "low"), (3.0, "high"), (5.0, "far")];

    assert_eq!(nearest_key(candidates.clone(), 2.0), Some((1.0, "low")));
    assert_eq!(nearest_key(candidates.clone(), 2.9), Some((3.0, "high")));
    assert_eq!(nearest_key(candidates, 100.0), Some((5.0, "far")));
    assert_eq!(nearest_key(Vec::<(f32, ())>::new(), 0.0), None);
}

#[test]
fn test_frame_folder_cache_should_read_positions_and_bases() {
    let dir = tempfile::tempdir().expect("tempdir");
    let points = [Vec3::new(0.0, 1.0, 2.0), Vec3::new(3.0, 4.0, 5.0)];
    write_frame(dir.path(), 1, &points, &[DOWN_BASIS, IDENTITY_BASIS]);

    let pose = FrameFolderCache::new(dir.path()).lookup(&1).expect("frame");

    assert_eq!(pose.pos, points.to_vec());
    given::assert_quat_near(pose.rot[0], Quat::from_rotation_z(-FRAC_PI_2));
    given::assert_vec3_near(pose.rot[0] * Vec3::X, Vec3::NEG_Y);
    given::assert_quat_near(pose.rot[1], Quat::IDENTITY);
}

#[test]
fn test_frame_folder_cache_when_frame_is_missing_should_fail() {
    let dir = tempfile::tempdir().expect("tempdir");

    let result = FrameFolderCache::new(dir.path()).lookup(&9);

    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_frame_folder_cache_when_counts_differ_should_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_frame(dir.path(), 2, &[Vec3::ZERO, Vec3::ONE], &[IDENTITY_BASIS]);

    let result = FrameFolderCache::new(dir.path()).lookup(&2);

    assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
}

#[test]
fn test_memory_frame_cache_should_miss_unknown_frames() {
    let mut cache = MemoryFrameCache::new();
    let pose = FramePose {
        pos: vec![Vec3::ONE],
        rot: vec![Quat::IDENTITY],
    };
    cache.insert(4, pose.clone());

    assert_eq!(cache.lookup(&4).expect("frame"), pose);
    assert!(matches!(cache.lookup(&5), Err(Error::CacheMiss(_))));
}

#[test]
fn test_orientation_grid_from_array_should_read_wxyz() {
    let grid = OrientationGrid::from_array(&grid_array(2, 3)).expect("grid");

    assert_eq!(grid.strand_count, 2);
    assert_eq!(grid.gaussians_per_strand, 3);
    given::assert_quat_near(grid.rot[0], Quat::from_rotation_z(std::f32::consts::PI));
    given::assert_quat_near(grid.rot[1], Quat::from_xyzw(0.0, 0.0, 1.0, 1.0).normalize());
}

#[test]
fn test_orientation_grid_from_array_with_wrong_shape_should_fail() {
    let array = NpyArray::zeros(vec![2, 3, 3]);

    assert!(matches!(
        OrientationGrid::from_array(&array),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_orientation_grid_crop_should_take_leading_strands_and_gaussians() {
    let grid = OrientationGrid::from_array(&grid_array(3, 4)).expect("grid");

    let cropped = grid.crop(StrandLayout::new(2, 2)).expect("crop");

    assert_eq!(cropped, vec![grid.rot[0], grid.rot[1], grid.rot[4], grid.rot[5]]);
    assert_eq!(grid.crop(StrandLayout::new(4, 1)), None);
    assert_eq!(grid.crop(StrandLayout::new(1, 5)), None);
}

#[test]
fn test_orientation_grid_crop_when_rotations_are_short_should_be_none() {
    let grid = OrientationGrid {
        strand_count: 3,
        gaussians_per_strand: 4,
        rot: vec![Quat::IDENTITY; 5],
    };

    assert_eq!(grid.crop(StrandLayout::new(1, 4)), Some(vec![Quat::IDENTITY; 4]));
    assert_eq!(grid.crop(StrandLayout::new(2, 4)), None);
}

#[test]
fn test_orientation_folder_cache_should_resolve_nearest_amplitude_then_frequency() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (amplitude, frequency) in [("0.1", "1.0"), ("0.1", "3.0"), ("0.5", "2.5")] {
        let folder = dir.path().join(amplitude);
        fs::create_dir_all(&folder).expect("mkdir");
        grid_array(1, 1)
            .save(folder.join(format!("{frequency}.npy")))
            .expect("save");
    }
    fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

    let cache = OrientationFolderCache::new(dir.path());

    assert_eq!(
        cache.resolve(&WaveKey::new(0.2, 2.5)).expect("resolve"),
        dir.path().join("0.1").join("3.0.npy")
    );
    assert_eq!(
        cache.resolve(&WaveKey::new(0.4, 0.0)).expect("resolve"),
        dir.path().join("0.5").join("2.5.npy")
    );
    assert_eq!(
        cache
            .lookup(&WaveKey::new(0.1, 1.0))
            .expect("lookup")
            .strand_count,
        1
    );
}

#[test]
fn test_orientation_folder_cache_when_root_is_empty_should_miss() {
    let dir = tempfile::tempdir().expect("tempdir");

    let result = OrientationFolderCache::new(dir.path()).lookup(&WaveKey::new(0.1, 1.0));

    assert!(matches!(result, Err(Error::CacheMiss(_))));
}

#[test]
fn test_memory_orientation_cache_should_resolve_nearest_key() {
    let mut cache = MemoryOrientationCache::new();
    cache.insert(
        WaveKey::new(0.1, 1.0),
        OrientationGrid::from_array(&grid_array(1, 1)).expect("grid"),
    );
    cache.insert(
        WaveKey::new(0.1, 4.0),
        OrientationGrid::from_array(&grid_array(2, 1)).expect("grid"),
    );
    cache.insert(
        WaveKey::new(0.9, 1.0),
        OrientationGrid::from_array(&grid_array(3, 1)).expect("grid"),
    );

    let grid = cache.lookup(&WaveKey::new(0.3, 3.0)).expect("lookup");

    assert_eq!(grid.strand_count, 2);
    assert!(matches!(
        MemoryOrientationCache::new().lookup(&WaveKey::default()),
        Err(Error::CacheMiss(_))
    ));
}

#[test]
fn test_frame_packer_should_pack_frames_next_to_avatar_folder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let folder = dir.path().join("avatar").join("320_to_320");
    fs::create_dir_all(&folder).expect("mkdir");

    let points = [Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)];
    for frame in 1..=2 {
        let moved = points.map(|p| p + Vec3::Z * frame as f32);
        write_frame(&folder, frame, &moved, &[DOWN_BASIS, IDENTITY_BASIS]);
        write_scale(&folder, frame, &[Vec3::new(0.5, 0.1, 0.1), Vec3::splat(0.25)]);
    }

    let packer = FramePacker::new(&folder, RotationFormat::Matrix);
    assert_eq!(packer.frame_count().expect("count"), 2);

    let path = packer.pack_to_file().expect("pack");

    assert_eq!(path, dir.path().join(FramePacker::OUTPUT_FILE));
    let packed = NpyArray::open(&path).expect("open");
    assert_eq!(packed.shape, vec![2, 2, FramePacker::POINT_LEN]);

    let row = |frame: usize, point: usize| {
        let start = (frame * 2 + point) * FramePacker::POINT_LEN;
        unpack_point(&packed.data[start..start + FramePacker::POINT_LEN]).expect("point")
    };
    let (pos, rot, scale) = row(1, 0);
    given::assert_vec3_near(pos, points[0] + Vec3::Z * 2.0);
    given::assert_quat_near(rot, Quat::from_rotation_z(-FRAC_PI_2));
    assert_eq!(scale, 0.5);
    let (_, rot, scale) = row(0, 1);
    given::assert_quat_near(rot, Quat::IDENTITY);
    assert_eq!(scale, 0.25);
}

#[test]
fn test_frame_packer_with_quaternions_should_copy_them() {
    let dir = tempfile::tempdir().expect("tempdir");
    let folder = dir.path().join("avatar").join("frames");
    fs::create_dir_all(&folder).expect("mkdir");
    given::write_npy(
        &FrameFolderCache::frame_file(&folder, 1, "mean"),
        vec![1, 3],
        vec![0.0, 1.0, 2.0],
    );
    given::write_npy(
        &FrameFolderCache::frame_file(&folder, 1, "rot"),
        vec![1, 4],
        vec![0.5, 0.5, 0.5, 0.5],
    );
    given::write_npy(
        &FrameFolderCache::frame_file(&folder, 1, "scale"),
        vec![1, 1],
        vec![0.3],
    );

    let packed = FramePacker::new(&folder, RotationFormat::Quaternion)
        .pack()
        .expect("pack");

    assert_eq!(packed.shape, vec![1, 1, FramePacker::POINT_LEN]);
    assert_eq!(
        packed.data,
        vec![0.0, 1.0, 2.0, 0.5, 0.5, 0.5, 0.5, 0.3]
    );
}

#[test]
fn test_frame_packer_with_wrong_rotation_format_should_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    let folder = dir.path().join("avatar").join("frames");
    fs::create_dir_all(&folder).expect("mkdir");
    write_frame(&folder, 1, &[Vec3::ZERO], &[IDENTITY_BASIS]);
    write_scale(&folder, 1, &[Vec3::ONE]);

    let result = FramePacker::new(&folder, RotationFormat::Quaternion).pack();

    assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
}

#[test]
fn test_unpack_point_with_wrong_length_should_fail() {
    assert_eq!(unpack_point(&[0.0; 7]), None);
}
