use std::f32::consts::{PI, TAU};

use glam::*;
use rand::{Rng, SeedableRng, distributions::Uniform, rngs::StdRng};
use rand_distr::Normal;

use crate::{
    AvatarRecord, FramePose, GaussiansViewMut, KeyedCache, OrientationGrid, StrandLayout,
    WaveKey, WaveParams, polyline_frames, repair_window,
};

/// The control polylines of the strands of an avatar.
///
/// Each strand of `G` Gaussians has `G + 1` control points, and a normal and binormal
/// perpendicular to its mean direction which curls are applied along.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrandGuides {
    /// The number of control points per strand.
    pub points_per_strand: usize,
    /// The control points of all strands, strand after strand.
    pub control_points: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub binormals: Vec<Vec3>,
}

impl StrandGuides {
    /// Build the guides from the hair region of an avatar.
    ///
    /// Each Gaussian spans half its X scale along its local X axis on both sides of its center,
    /// so the ends of consecutive Gaussians are the control points.
    pub fn new(strands: StrandLayout, pos: &[Vec3], rot: &[Quat], scale: &[Vec3]) -> Self {
        if strands.is_empty() {
            return Self::default();
        }

        let gaussians_per_strand = strands.gaussians_per_strand;
        let mut guides = Self {
            points_per_strand: gaussians_per_strand + 1,
            control_points: Vec::with_capacity(strands.strand_count * (gaussians_per_strand + 1)),
            normals: Vec::with_capacity(strands.strand_count),
            binormals: Vec::with_capacity(strands.strand_count),
        };

        for strand in strands.strands() {
            let directions = rot[strand.clone()]
                .iter()
                .map(|rot| *rot * Vec3::X)
                .collect::<Vec<_>>();
            let offsets = directions
                .iter()
                .zip(&scale[strand.clone()])
                .map(|(direction, scale)| *direction * 0.5 * scale.x)
                .collect::<Vec<_>>();

            guides
                .control_points
                .push(pos[strand.start] - offsets[0]);
            guides.control_points.extend(
                pos[strand.clone()]
                    .iter()
                    .zip(&offsets)
                    .map(|(pos, offset)| *pos + *offset),
            );

            // Skip the root where hair bends off the scalp.
            let tip = &directions[gaussians_per_strand / 10..];
            let mean = tip.iter().copied().sum::<Vec3>() / tip.len() as f32;

            let normal = Vec3::new(mean.y, -mean.x, 0.0);
            guides.binormals.push(mean.cross(normal).normalize_or_zero());
            guides.normals.push(normal.normalize_or_zero());
        }

        guides
    }

    /// Get the number of strands.
    pub fn strand_count(&self) -> usize {
        self.normals.len()
    }

    /// Check if there are no strands.
    pub fn is_empty(&self) -> bool {
        self.normals.is_empty()
    }

    /// Get the control points of a strand.
    pub fn strand(&self, strand: usize) -> &[Vec3] {
        let start = strand * self.points_per_strand;
        &self.control_points[start..start + self.points_per_strand]
    }
}

/// Compute the curl offset of every control point.
///
/// The same `seed` always gives the same curls. Each strand gets a random phase and turning
/// direction, and the offset grows quadratically from the root so roots stay in place.
pub fn curl_offsets(guides: &StrandGuides, wave: WaveParams, seed: u64) -> Vec<Vec3> {
    let strand_count = guides.strand_count();
    let points_per_strand = guides.points_per_strand;
    let count = strand_count * points_per_strand;

    let mut rng = StdRng::seed_from_u64(seed);

    let phase = Uniform::new(0.0, TAU);
    let phases = (0..strand_count)
        .map(|_| rng.sample(phase))
        .collect::<Vec<f32>>();
    let chiralities = (0..strand_count)
        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
        .collect::<Vec<f32>>();

    let (sin_noise, cos_noise) = match Normal::new(0.0, wave.amplitude.abs() / 30.0) {
        Ok(noise) if wave.amplitude != 0.0 => {
            let sin_noise = (0..count).map(|_| rng.sample(noise)).collect::<Vec<f32>>();
            let cos_noise = (0..count).map(|_| rng.sample(noise)).collect::<Vec<f32>>();
            (sin_noise, cos_noise)
        }
        _ => (vec![0.0; count], vec![0.0; count]),
    };

    let t_step = match points_per_strand {
        0 | 1 => 0.0,
        n => 2.0 / (n - 1) as f32,
    };

    let mut offsets = Vec::with_capacity(count);
    for s in 0..strand_count {
        for j in 0..points_per_strand {
            let i = s * points_per_strand + j;
            let t = j as f32 * t_step;
            let magnitude = wave.amplitude * t * t;
            let angle = chiralities[s] * (PI * wave.frequency * t + phases[s]);

            let sin = magnitude * angle.sin() + sin_noise[i];
            let cos = magnitude * angle.cos() + cos_noise[i];
            offsets.push(sin * guides.normals[s] + cos * guides.binormals[s]);
        }
    }

    offsets
}

/// Poses the hair of avatars from animation frames and procedural curls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HairAnimator {
    /// The seed of the curl randomness.
    pub seed: u64,
}

impl HairAnimator {
    /// Create a new hair animator.
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Write the pose of an avatar to its window.
    ///
    /// The base hair pose is the current frame of `frames`, or the rest pose when the frame is
    /// unavailable. Curls are applied on top when the wave of the avatar is active, with
    /// rotations from `orientations` when available. The whole window is offset by
    /// `displacement` along X, and the hair is repaired against the cuts of the record.
    pub fn pose(
        &self,
        record: &mut AvatarRecord,
        window: &mut GaussiansViewMut<'_>,
        frames: &dyn KeyedCache<u32, FramePose>,
        orientations: &dyn KeyedCache<WaveKey, OrientationGrid>,
        displacement: f32,
    ) {
        let offset = Vec3::new(displacement, 0.0, 0.0);
        let hair = record.hair();

        window
            .pos
            .iter_mut()
            .zip(&record.gaussians.pos)
            .for_each(|(target, source)| *target = *source + offset);
        window.rot.copy_from_slice(&record.gaussians.rot);
        window.scale.copy_from_slice(&record.gaussians.scale);

        if !hair.is_empty() {
            let frame = match frames.lookup(&record.current_frame) {
                Ok(frame) if frame.len() >= hair.len() && frame.rot.len() >= hair.len() => {
                    Some(frame)
                }
                Ok(frame) => {
                    log::debug!(
                        "Frame {} has {} points, expected {}",
                        record.current_frame,
                        frame.len(),
                        hair.len()
                    );
                    None
                }
                Err(e) => {
                    log::debug!("Frame {} unavailable: {e}", record.current_frame);
                    None
                }
            };

            let base_pos = match &frame {
                Some(frame) => {
                    window.rot[hair.clone()].copy_from_slice(&frame.rot[hair.clone()]);
                    &frame.pos[hair.clone()]
                }
                None => &record.gaussians.pos[hair.clone()],
            };
            window.pos[hair.clone()]
                .iter_mut()
                .zip(base_pos)
                .for_each(|(target, source)| *target = *source + offset);

            record.guides = StrandGuides::new(
                record.strands,
                base_pos,
                &window.rot[hair.clone()],
                &record.gaussians.scale[hair.clone()],
            );

            if record.wave.is_active() {
                self.curl(record, window, orientations, offset);
            }

            window.scale[hair]
                .iter_mut()
                .for_each(|scale| *scale *= record.hair_scale);
        }

        repair_window(record, window);

        record.centroid = window.as_view().centroid();
    }

    /// Apply the curl of the record to the hair of the window.
    fn curl(
        &self,
        record: &AvatarRecord,
        window: &mut GaussiansViewMut<'_>,
        orientations: &dyn KeyedCache<WaveKey, OrientationGrid>,
        offset: Vec3,
    ) {
        let strands = record.strands;
        let guides = &record.guides;
        let wave = record.wave;

        let points = guides
            .control_points
            .iter()
            .zip(curl_offsets(guides, wave, self.seed))
            .map(|(point, curl)| *point + offset + curl)
            .collect::<Vec<_>>();

        let cached = match orientations.lookup(&WaveKey::new(wave.amplitude, wave.frequency)) {
            Ok(grid) => grid.crop(strands).or_else(|| {
                log::debug!("Orientation grid is smaller than {strands:?}");
                None
            }),
            Err(e) => {
                log::debug!("Orientations unavailable: {e}");
                None
            }
        };

        let per_strand = guides.points_per_strand;
        for (s, strand) in strands.strands().enumerate() {
            let strand_points = &points[s * per_strand..(s + 1) * per_strand];
            let rot = match &cached {
                Some(rot) => rot[strand.clone()].to_vec(),
                None => polyline_frames(strand_points, guides.normals[s]),
            };

            for (g, i) in strand.enumerate() {
                let (a, b) = (strand_points[g], strand_points[g + 1]);
                let rest = record.gaussians.scale[i];

                window.pos[i] = (a + b) * 0.5;
                window.scale[i] = Vec3::new(a.distance(b) * 0.5, rest.y, rest.z);
                window.rot[i] = rot[g];
            }
        }
    }
}
