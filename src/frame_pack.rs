use std::{
    fs,
    path::{Path, PathBuf},
};

use glam::*;

use crate::{Error, FrameFolderCache, NpyArray, stored_basis_to_quat};

/// How rotations are stored in a frame folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RotationFormat {
    /// 3x3 tangent, normal and binormal bases.
    #[default]
    Matrix,
    /// `w, x, y, z` quaternions.
    Quaternion,
}

/// Packs a frame folder into a single array of shape `(frames, points, 8)`.
///
/// Each point is its position, its `w, x, y, z` rotation and its primary scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePacker {
    pub folder: PathBuf,
    pub format: RotationFormat,
}

impl FramePacker {
    /// The number of values per point.
    pub const POINT_LEN: usize = 3 + 4 + 1;

    /// The name of the packed file.
    pub const OUTPUT_FILE: &'static str = "frames.npy";

    /// Create a new frame packer.
    pub fn new(folder: impl Into<PathBuf>, format: RotationFormat) -> Self {
        Self {
            folder: folder.into(),
            format,
        }
    }

    /// Count the frames, the highest `F` of the `frame_<F>_*.npy` files.
    pub fn frame_count(&self) -> Result<u32, Error> {
        let count = fs::read_dir(&self.folder)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".npy")?
                    .strip_prefix("frame_")?
                    .split('_')
                    .next()?
                    .parse::<u32>()
                    .ok()
            })
            .max()
            .unwrap_or(0);

        Ok(count)
    }

    /// Get the path of the packed file, two folders above the frame folder.
    pub fn output_path(&self) -> PathBuf {
        self.folder
            .parent()
            .and_then(Path::parent)
            .unwrap_or(Path::new(""))
            .join(Self::OUTPUT_FILE)
    }

    /// Pack frames `1..=frame_count`.
    pub fn pack(&self) -> Result<NpyArray, Error> {
        let frame_count = self.frame_count()?;

        log::debug!("Packing {frame_count} frames of {}", self.folder.display());

        let mut data = Vec::new();
        let mut point_count = None;
        for frame in 1..=frame_count {
            let packed = self.pack_frame(frame)?;
            let points = packed.len() / Self::POINT_LEN;
            match point_count {
                Some(expected) if expected != points => {
                    return Err(Error::ShapeMismatch {
                        expected: vec![expected, Self::POINT_LEN],
                        actual: vec![points, Self::POINT_LEN],
                    });
                }
                _ => point_count = Some(points),
            }
            data.extend(packed);
        }

        NpyArray::new(
            vec![
                frame_count as usize,
                point_count.unwrap_or(0),
                Self::POINT_LEN,
            ],
            data,
        )
    }

    /// Pack and save to [`FramePacker::output_path`].
    pub fn pack_to_file(&self) -> Result<PathBuf, Error> {
        let array = self.pack()?;
        let path = self.output_path();
        array.save(&path)?;

        log::info!("Packed {:?} frames to {}", array.shape, path.display());

        Ok(path)
    }

    fn pack_frame(&self, frame: u32) -> Result<Vec<f32>, Error> {
        let load = |kind| NpyArray::open(FrameFolderCache::frame_file(&self.folder, frame, kind));

        let mean = load("mean")?;
        let rot = load("rot")?;
        let scale = load("scale")?;

        let points = mean.len() / 3;
        let mismatch = |array: &NpyArray, per_point: usize| Error::ShapeMismatch {
            expected: vec![points, per_point],
            actual: array.shape.clone(),
        };

        let rot = match self.format {
            RotationFormat::Matrix if rot.len() == points * 9 => rot
                .data
                .chunks_exact(9)
                .filter_map(|basis| <&[f32; 9]>::try_from(basis).ok())
                .map(stored_basis_to_quat)
                .map(|q| [q.w, q.x, q.y, q.z])
                .collect::<Vec<_>>(),
            RotationFormat::Quaternion if rot.len() == points * 4 => rot
                .data
                .chunks_exact(4)
                .map(|q| [q[0], q[1], q[2], q[3]])
                .collect::<Vec<_>>(),
            RotationFormat::Matrix => return Err(mismatch(&rot, 9)),
            RotationFormat::Quaternion => return Err(mismatch(&rot, 4)),
        };

        if points == 0 || scale.len() % points != 0 {
            return Err(mismatch(&scale, 1));
        }
        let scale_stride = scale.len() / points;

        let mut data = Vec::with_capacity(points * Self::POINT_LEN);
        for (i, (pos, rot)) in mean.data.chunks_exact(3).zip(rot).enumerate() {
            data.extend_from_slice(pos);
            data.extend_from_slice(&rot);
            data.push(scale.data[i * scale_stride]);
        }

        Ok(data)
    }
}

/// Convert a packed frame row back to its position, rotation and primary scale.
pub fn unpack_point(row: &[f32]) -> Option<(Vec3, Quat, f32)> {
    let [x, y, z, w, qx, qy, qz, scale] = *<&[f32; FramePacker::POINT_LEN]>::try_from(row).ok()?;
    Some((
        Vec3::new(x, y, z),
        Quat::from_xyzw(qx, qy, qz, w),
        scale,
    ))
}
