use glam::*;

use crate::{AvatarFlags, AvatarRecord, ColorBand, GaussiansViewMut, Ray, StrandLayout};

/// Find the first zero opacity index of every strand.
pub fn strand_cuts(strands: StrandLayout, opacity: &[f32]) -> Vec<Option<usize>> {
    strands
        .strands()
        .map(|strand| opacity[strand].iter().position(|o| *o == 0.0))
        .collect()
}

/// Zero the opacity of every strand after its cut, and pin the cut tail to the last live point.
///
/// `cuts` are the first zero opacity index of every strand as given by [`strand_cuts`].
pub fn repair_strands(
    strands: StrandLayout,
    cuts: &[Option<usize>],
    opacity: &mut [f32],
    pos: &mut [Vec3],
) {
    for (strand, cut) in strands.strands().zip(cuts) {
        let Some(k) = *cut else {
            continue;
        };

        let tail = strand.start + k..strand.end;
        opacity[tail.clone()].fill(0.0);

        if k > 0 {
            let anchor = pos[strand.start + k - 1];
            pos[tail].fill(anchor);
        }
    }
}

/// Repair the strands with cuts derived from `opacity` itself.
pub fn repair(strands: StrandLayout, opacity: &mut [f32], pos: &mut [Vec3]) {
    let cuts = strand_cuts(strands, opacity);
    repair_strands(strands, &cuts, opacity, pos);
}

/// Cut the hair Gaussians within `radius` of the ray, then repair every strand.
///
/// `window` is the avatar's composite buffer window, the ray is tested against its positions.
/// Both the record and the window are cut. Returns the number of Gaussians newly cut.
pub fn cut_hair(
    record: &mut AvatarRecord,
    window: &mut GaussiansViewMut<'_>,
    ray: &Ray,
    radius: f32,
) -> usize {
    if ray.is_degenerate() {
        return 0;
    }

    let hair = record.hair();
    let mut cut = 0;
    for i in hair.clone() {
        if ray.distance_to(window.pos[i]) >= radius {
            continue;
        }

        if record.gaussians.opacity[i] != 0.0 {
            cut += 1;
        }
        record.gaussians.opacity[i] = 0.0;
        window.opacity[i] = 0.0;
    }

    log::debug!("Cut {cut} gaussians of {}", record.name);

    let strands = record.strands;
    let cuts = strand_cuts(strands, &record.gaussians.opacity[hair.clone()]);
    repair_strands(
        strands,
        &cuts,
        &mut record.gaussians.opacity[hair.clone()],
        &mut record.gaussians.pos[hair.clone()],
    );
    repair_strands(
        strands,
        &cuts,
        &mut window.opacity[hair.clone()],
        &mut window.pos[hair],
    );

    cut
}

/// Repair the window with the cuts of the record.
pub fn repair_window(record: &AvatarRecord, window: &mut GaussiansViewMut<'_>) {
    let hair = record.hair();
    let cuts = strand_cuts(record.strands, &record.gaussians.opacity[hair.clone()]);
    repair_strands(
        record.strands,
        &cuts,
        &mut window.opacity[hair.clone()],
        &mut window.pos[hair],
    );
}

/// A paint stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintStroke {
    /// The max ray distance.
    pub radius: f32,
    /// The DC colour to paint.
    pub color: Vec3,
    /// Keep the higher colour bands of painted Gaussians instead of zeroing them.
    pub keep_higher_bands: bool,
}

/// Paint the visible, unclipped Gaussians within the stroke radius of the ray.
///
/// `x_offset` is the layout displacement of the avatar. Returns the number of Gaussians painted.
pub fn paint(
    record: &mut AvatarRecord,
    window: &mut GaussiansViewMut<'_>,
    ray: &Ray,
    stroke: &PaintStroke,
    x_offset: f32,
) -> usize {
    if ray.is_degenerate() {
        return 0;
    }

    let planes = record.clip_planes;
    let mut painted = 0;
    for i in 0..window.len() {
        let pos = window.pos[i];
        if window.opacity[i] == 0.0
            || !planes.contains(pos, x_offset)
            || ray.distance_to(pos) >= stroke.radius
        {
            continue;
        }

        paint_band(&mut window.sh[i], stroke);
        paint_band(&mut record.gaussians.sh[i], stroke);
        painted += 1;
    }

    log::debug!("Painted {painted} gaussians of {}", record.name);

    painted
}

fn paint_band(sh: &mut ColorBand, stroke: &PaintStroke) {
    sh[..3].copy_from_slice(&stroke.color.to_array());
    if !stroke.keep_higher_bands {
        sh[3..].fill(0.0);
    }
}

/// Write the opacity of the record to the window, zeroing hidden regions.
pub fn apply_visibility(record: &AvatarRecord, window: &mut GaussiansViewMut<'_>) {
    let regions = [
        (record.hair(), AvatarFlags::SHOW_HAIR),
        (record.head(), AvatarFlags::SHOW_HEAD),
    ];

    for (region, flag) in regions {
        let target = &mut window.opacity[region.clone()];
        if record.is_visible() && record.flags.contains(flag) {
            target.copy_from_slice(&record.gaussians.opacity[region]);
        } else {
            target.fill(0.0);
        }
    }
}

/// Write the colour band of the record to the window, applying the colour overrides.
pub fn apply_colors(record: &AvatarRecord, window: &mut GaussiansViewMut<'_>) {
    let regions = [
        (
            record.hair(),
            AvatarFlags::OVERRIDE_HAIR_COLOR,
            record.hair_color,
        ),
        (
            record.head(),
            AvatarFlags::OVERRIDE_HEAD_COLOR,
            record.head_color,
        ),
    ];

    for (region, flag, color) in regions {
        apply_region_color(
            &record.gaussians.sh[region.clone()],
            &mut window.sh[region],
            record.flags.contains(flag).then_some(color),
        );
    }
}

fn apply_region_color(source: &[ColorBand], target: &mut [ColorBand], color: Option<Vec3>) {
    target.copy_from_slice(source);
    if let Some(color) = color {
        target
            .iter_mut()
            .for_each(|sh| sh[..3].copy_from_slice(&color.to_array()));
    }
}
