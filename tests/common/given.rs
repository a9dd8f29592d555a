use std::{f32::consts::FRAC_PI_2, path::Path, path::PathBuf};

use hair_splat_editor::{
    AvatarCaches, AvatarRecord, AvatarScene, ColorBand, Gaussian, Gaussians, MemoryFrameCache,
    MemoryOrientationCache, NpyArray, Ray, SH_COEFF_COUNT, StrandLayout, glam::*,
};

pub const STRAND_COUNT: usize = 4;
pub const GAUSSIANS_PER_STRAND: usize = 8;
pub const HAIR_COUNT: usize = STRAND_COUNT * GAUSSIANS_PER_STRAND;
pub const HEAD_COUNT: usize = 6;
pub const GAUSSIAN_COUNT: usize = HAIR_COUNT + HEAD_COUNT;

/// The length of a hair Gaussian along its strand.
pub const SEGMENT: f32 = 0.05;

/// The X distance between strand roots.
pub const STRAND_SPACING: f32 = 0.1;

pub fn strands() -> StrandLayout {
    StrandLayout::new(STRAND_COUNT, GAUSSIANS_PER_STRAND)
}

pub fn color_band(dc: Vec3) -> ColorBand {
    let mut sh = [0.0; SH_COEFF_COUNT];
    sh[..3].copy_from_slice(&dc.to_array());
    for (i, coefficient) in sh[3..].iter_mut().enumerate() {
        *coefficient = 0.001 * (i + 1) as f32;
    }
    sh
}

pub fn strand_color(strand: usize) -> Vec3 {
    Vec3::new(0.1 + strand as f32 * 0.01, 0.2, 0.3)
}

pub fn head_color() -> Vec3 {
    Vec3::new(0.9, 0.8, 0.7)
}

/// The center of a hair Gaussian, strands hang straight down from `origin` along -Y.
pub fn hair_pos(origin: Vec3, strand: usize, index: usize) -> Vec3 {
    origin
        + Vec3::new(
            strand as f32 * STRAND_SPACING,
            -(index as f32 + 0.5) * SEGMENT,
            0.0,
        )
}

pub fn head_pos(origin: Vec3, index: usize) -> Vec3 {
    origin + Vec3::new(0.15, 0.1 + 0.02 * index as f32, 0.0)
}

pub fn hair_gaussian(origin: Vec3, strand: usize, index: usize) -> Gaussian {
    Gaussian {
        pos: hair_pos(origin, strand, index),
        // Local X points down the strand.
        rot: Quat::from_rotation_z(-FRAC_PI_2),
        scale: Vec3::new(SEGMENT, 0.005, 0.005),
        opacity: 0.8,
        sh: color_band(strand_color(strand)),
    }
}

pub fn head_gaussian(origin: Vec3, index: usize) -> Gaussian {
    Gaussian {
        pos: head_pos(origin, index),
        rot: Quat::IDENTITY,
        scale: Vec3::splat(0.01),
        opacity: 0.9,
        sh: color_band(head_color()),
    }
}

pub fn hair_gaussians(origin: Vec3) -> Gaussians {
    let mut gaussians = Gaussians::with_capacity(GAUSSIAN_COUNT);
    for strand in 0..STRAND_COUNT {
        for index in 0..GAUSSIANS_PER_STRAND {
            gaussians.push(hair_gaussian(origin, strand, index));
        }
    }
    for index in 0..HEAD_COUNT {
        gaussians.push(head_gaussian(origin, index));
    }
    gaussians
}

/// Gaussians without strands spread evenly along X over `[min_x, max_x]`.
pub fn point_cloud(count: usize, min_x: f32, max_x: f32) -> Gaussians {
    let mut gaussians = Gaussians::with_capacity(count);
    for i in 0..count {
        let t = match count {
            1 => 0.0,
            _ => i as f32 / (count - 1) as f32,
        };
        gaussians.push(Gaussian {
            pos: Vec3::new(min_x + (max_x - min_x) * t, 0.0, 0.0),
            ..head_gaussian(Vec3::ZERO, 0)
        });
    }
    gaussians
}

pub fn avatar(name: &str, origin: Vec3) -> AvatarRecord {
    AvatarRecord::new(
        name,
        hair_gaussians(origin),
        strands(),
        PathBuf::new(),
        PathBuf::new(),
    )
    .expect("avatar")
}

pub fn point_cloud_avatar(name: &str, count: usize, min_x: f32, max_x: f32) -> AvatarRecord {
    AvatarRecord::new(
        name,
        point_cloud(count, min_x, max_x),
        StrandLayout::NONE,
        PathBuf::new(),
        PathBuf::new(),
    )
    .expect("avatar")
}

pub fn empty_caches() -> AvatarCaches {
    AvatarCaches::new(MemoryFrameCache::new(), MemoryOrientationCache::new())
}

/// A scene of hair avatars at the origin, without animation caches.
pub fn scene(avatar_count: usize) -> AvatarScene {
    let mut scene = AvatarScene::new();
    for i in 0..avatar_count {
        scene
            .insert_avatar_with(avatar(&format!("avatar {i}"), Vec3::ZERO), empty_caches())
            .expect("insert");
    }
    scene
}

/// A ray looking down -Z through a point.
pub fn ray_through(point: Vec3) -> Ray {
    Ray::new(point + Vec3::Z * 5.0, Vec3::NEG_Z)
}

pub fn write_npy(path: &Path, shape: Vec<usize>, data: Vec<f32>) {
    NpyArray::new(shape, data)
        .expect("array")
        .save(path)
        .expect("save");
}

pub fn write_avatar_file(path: &Path, gaussians: &Gaussians, strands: StrandLayout) {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path).expect("create"));
    gaussians.write_ply(&mut file, strands).expect("write ply");
    std::io::Write::flush(&mut file).expect("flush");
}

pub fn assert_vec3_near(actual: Vec3, expected: Vec3) {
    assert!(
        actual.abs_diff_eq(expected, 1e-5),
        "expected {expected:?}, got {actual:?}"
    );
}

pub fn assert_quat_near(actual: Quat, expected: Quat) {
    assert!(
        actual.dot(expected).abs() > 1.0 - 1e-5,
        "expected {expected:?}, got {actual:?}"
    );
}
