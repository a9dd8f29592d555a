use glam::*;

use crate::{AvatarRecord, CameraTrait, ClipPlanes, GaussiansView, StrandLayout, Viewport};

/// A picking ray.
///
/// A ray with zero direction is degenerate and never hits anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray, normalizing the direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Create a degenerate ray.
    pub const fn degenerate(origin: Vec3) -> Self {
        Self {
            origin,
            direction: Vec3::ZERO,
        }
    }

    /// Cast a ray from the camera through a cursor position in window pixels.
    pub fn from_cursor(camera: &impl CameraTrait, cursor: Vec2, viewport: &Viewport) -> Self {
        let view = camera.view();
        let projection = camera.projection(viewport.aspect_ratio());
        Self::from_matrices(cursor, view, projection, viewport, camera.position())
    }

    /// Cast a ray through a cursor position given the camera matrices.
    ///
    /// The cursor is unprojected onto the far plane. Returns a degenerate ray when
    /// `projection * view` is not invertible.
    pub fn from_matrices(
        cursor: Vec2,
        view: Mat4,
        projection: Mat4,
        viewport: &Viewport,
        origin: Vec3,
    ) -> Self {
        let view_projection = projection * view;
        let det = view_projection.determinant();
        if det == 0.0 || !det.is_finite() {
            log::debug!("View projection matrix is not invertible");
            return Self::degenerate(origin);
        }

        let ndc = (cursor - viewport.pos) / viewport.size * 2.0 - 1.0;
        let clip = Vec4::new(ndc.x, -ndc.y, 1.0, 1.0);
        let world = view_projection.inverse() * clip;
        if world.w == 0.0 {
            return Self::degenerate(origin);
        }

        Self::new(origin, world.truncate() / world.w - origin)
    }

    /// Check if the ray has no direction.
    pub fn is_degenerate(&self) -> bool {
        self.direction == Vec3::ZERO
    }

    /// Get the point on the ray line closest to `point`.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        self.origin + self.direction * (point - self.origin).dot(self.direction)
    }

    /// Get the distance from `point` to the ray line.
    pub fn distance_to(&self, point: Vec3) -> f32 {
        point.distance(self.closest_point(point))
    }
}

/// Find the visible avatar whose centroid is closest to the ray.
///
/// Fails when that distance is not within the avatar's bounding radius.
pub fn nearest_avatar(avatars: &[AvatarRecord], ray: &Ray) -> Option<usize> {
    if ray.is_degenerate() {
        return None;
    }

    let (index, distance) = avatars
        .iter()
        .enumerate()
        .filter(|(_, avatar)| avatar.is_visible())
        .map(|(i, avatar)| (i, ray.distance_to(avatar.centroid)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))?;

    if distance >= avatars[index].bounding_radius {
        log::debug!("Nearest avatar {index} is {distance} away, outside its bounding radius");
        return None;
    }

    Some(index)
}

/// The Gaussian candidate filter for [`nearest_gaussian`].
#[derive(Debug, Clone, Copy)]
pub struct GaussianQuery<'a> {
    /// Only candidates closer than this to the ray are kept.
    pub radius: f32,
    /// Clip planes and the X offset to apply them with, only set when coloring.
    pub clip: Option<(&'a ClipPlanes, f32)>,
    /// The number of camera-nearest candidates to average the colour over.
    pub pool_size: usize,
}

/// A Gaussian hit of [`nearest_gaussian`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianHit {
    /// The index in the queried view.
    pub local_index: usize,
    /// The mean DC colour of the pool.
    pub averaged_color: Vec3,
}

/// Find the Gaussian of a window the ray points at.
///
/// Candidates are the visible Gaussians within the query radius of the ray. The hit is the
/// candidate nearest to the ray origin, and the colour is averaged over the pool of candidates
/// nearest to the ray origin.
pub fn nearest_gaussian(
    view: GaussiansView<'_>,
    ray: &Ray,
    query: &GaussianQuery<'_>,
) -> Option<GaussianHit> {
    if ray.is_degenerate() {
        return None;
    }

    let mut candidates = view
        .pos
        .iter()
        .zip(view.opacity)
        .enumerate()
        .filter(|(_, (_, opacity))| **opacity != 0.0)
        .filter(|(_, (pos, _))| {
            query
                .clip
                .is_none_or(|(planes, offset)| planes.contains(**pos, offset))
        })
        .filter(|(_, (pos, _))| ray.distance_to(**pos) < query.radius)
        .map(|(i, (pos, _))| (i, pos.distance(ray.origin)))
        .collect::<Vec<_>>();

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|(_, a), (_, b)| a.total_cmp(b));
    candidates.truncate(query.pool_size.max(1));

    // The hit is mapped back through its position so duplicates resolve to the first match.
    let nearest = view.pos[candidates[0].0];
    let local_index = view.pos.iter().position(|p| *p == nearest)?;

    let averaged_color = candidates
        .iter()
        .map(|(i, _)| Vec3::from_slice(&view.sh[*i][..3]))
        .sum::<Vec3>()
        / candidates.len() as f32;

    Some(GaussianHit {
        local_index,
        averaged_color,
    })
}

/// A resolved pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickResult {
    /// The avatar picked.
    pub avatar: usize,
    /// The index of the Gaussian relative to the avatar's window.
    pub local_index: usize,
    /// The strand, [`None`] for head Gaussians.
    pub strand_index: Option<usize>,
    /// The index within the strand, [`None`] for head Gaussians.
    pub index_within_strand: Option<usize>,
    /// The mean DC colour around the hit.
    pub averaged_color: Vec3,
}

impl PickResult {
    /// Create a new pick result from a hit in an avatar window.
    pub fn new(avatar: usize, hit: GaussianHit, strands: StrandLayout) -> Self {
        let located = strands.locate(hit.local_index);
        Self {
            avatar,
            local_index: hit.local_index,
            strand_index: located.map(|(strand, _)| strand),
            index_within_strand: located.map(|(_, index)| index),
            averaged_color: hit.averaged_color,
        }
    }
}
