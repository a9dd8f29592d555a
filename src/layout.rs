use crate::AvatarRecord;

/// Compute the X displacement of avatar `index`.
///
/// Visible avatars are packed left to right in registration order, starting at the first visible
/// avatar which stays in place, with `separation` between neighbours. Hidden avatars take no space.
/// Hidden avatars before the first visible one are placed right after it.
/// Returns 0 when no avatar is visible or `index` is out of range.
pub fn displacement(avatars: &[AvatarRecord], index: usize, separation: f32) -> f32 {
    let Some(first) = avatars.iter().position(AvatarRecord::is_visible) else {
        return 0.0;
    };

    if index == first || index >= avatars.len() {
        return 0.0;
    }

    let between = avatars
        .iter()
        .take(index)
        .skip(first + 1)
        .filter(|avatar| avatar.is_visible())
        .map(|avatar| avatar.width() + separation)
        .sum::<f32>();

    between + avatars[first].bounds_max.x - avatars[index].bounds_min.x + separation
}

/// Compute the X displacement of every avatar.
pub fn displacements(avatars: &[AvatarRecord], separation: f32) -> Vec<f32> {
    (0..avatars.len())
        .map(|i| displacement(avatars, i, separation))
        .collect()
}
