use glam::*;

/// Convert a tangent, normal and binormal basis to a rotation.
///
/// The basis vectors become the columns of the rotation matrix, so the local X, Y and Z axes of
/// the Gaussian are the tangent, normal and binormal.
pub fn basis_to_quat(tangent: Vec3, normal: Vec3, binormal: Vec3) -> Quat {
    Quat::from_mat3(&Mat3::from_cols(tangent, normal, binormal)).normalize()
}

/// Convert a row major 3x3 basis as stored in a frame cache to a rotation.
///
/// The columns of the stored matrix are the tangent, normal and binormal.
pub fn stored_basis_to_quat(rows: &[f32; 9]) -> Quat {
    // Column major load of a row major matrix yields its transpose.
    let basis = Mat3::from_cols_array(rows).transpose();
    basis_to_quat(basis.x_axis, basis.y_axis, basis.z_axis)
}

/// Compute one rotation per segment of a polyline.
///
/// The tangent follows the segment, and the normal is `reference` made orthogonal to it. When
/// `reference` is parallel to the tangent any orthogonal normal is used.
pub fn polyline_frames(points: &[Vec3], reference: Vec3) -> Vec<Quat> {
    points
        .windows(2)
        .map(|segment| {
            let tangent = (segment[1] - segment[0]).normalize_or(Vec3::X);
            let normal = (reference - tangent * reference.dot(tangent))
                .try_normalize()
                .unwrap_or_else(|| tangent.any_orthonormal_vector());
            basis_to_quat(tangent, normal, tangent.cross(normal))
        })
        .collect()
}
