use std::{
    collections::HashSet,
    io::{BufRead, Write},
    ops::Range,
};

use bytemuck::Zeroable;
use glam::*;

use crate::{Error, PlyHairGaussianPod, PlyHeader, StrandLayout};

/// The colour band degree.
pub const SH_DEGREE: usize = 3;

/// The number of colour band coefficients per channel.
pub const SH_COEFF_COUNT_PER_CHANNEL: usize = (SH_DEGREE + 1) * (SH_DEGREE + 1);

/// The number of colour band coefficients, DC included.
pub const SH_COEFF_COUNT: usize = 3 * SH_COEFF_COUNT_PER_CHANNEL;

/// The number of colour band coefficients after the DC term.
pub const SH_REST_COUNT: usize = SH_COEFF_COUNT - 3;

/// The colour band of a Gaussian.
///
/// The first 3 coefficients are the DC colour, the rest are interleaved by channel,
/// i.e. `[dc_r, dc_g, dc_b, c1_r, c1_g, c1_b, c2_r, ...]`.
pub type ColorBand = [f32; SH_COEFF_COUNT];

/// A single Gaussian in live domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    pub pos: Vec3,
    pub rot: Quat,
    /// Linear scale.
    pub scale: Vec3,
    /// Linear opacity in \[0, 1\].
    pub opacity: f32,
    pub sh: ColorBand,
}

impl Gaussian {
    /// Convert from PLY Gaussian to Gaussian.
    pub fn from_ply(ply: &PlyHairGaussianPod) -> Self {
        // Rotation
        let rot = Quat::from_xyzw(ply.rot[1], ply.rot[2], ply.rot[3], ply.rot[0]).normalize();

        // Scale
        let scale = Vec3::from_array(ply.scale).map(f32::exp);

        // Opacity
        let opacity = 1.0 / (1.0 + (-ply.opacity).exp());

        // Colour band, planar to interleaved
        let mut sh = [0.0; SH_COEFF_COUNT];
        sh[..3].copy_from_slice(&ply.color);
        let per_channel = SH_COEFF_COUNT_PER_CHANNEL - 1;
        for (i, value) in ply.sh.iter().enumerate() {
            let channel = i / per_channel;
            let coefficient = i % per_channel;
            sh[3 + coefficient * 3 + channel] = *value;
        }

        Self {
            pos: Vec3::from_array(ply.pos),
            rot,
            scale,
            opacity,
            sh,
        }
    }

    /// Convert to PLY Gaussian.
    pub fn to_ply(&self, strands: StrandLayout) -> PlyHairGaussianPod {
        let rot = self.rot.normalize();

        // Opacity of exactly 0 or 1 maps to -inf or +inf, which the sigmoid maps back exactly.
        let opacity = (self.opacity / (1.0 - self.opacity)).ln();

        let mut color = [0.0; 3];
        color.copy_from_slice(&self.sh[..3]);

        let per_channel = SH_COEFF_COUNT_PER_CHANNEL - 1;
        let mut sh = [0.0; SH_REST_COUNT];
        for (i, value) in sh.iter_mut().enumerate() {
            let channel = i / per_channel;
            let coefficient = i % per_channel;
            *value = self.sh[3 + coefficient * 3 + channel];
        }

        PlyHairGaussianPod {
            pos: self.pos.to_array(),
            opacity,
            scale: self.scale.map(f32::ln).to_array(),
            rot: [rot.w, rot.x, rot.y, rot.z],
            color,
            sh,
            strand_count: strands.strand_count as i32,
            gaussians_per_strand: strands.gaussians_per_strand as i32,
        }
    }
}

impl From<PlyHairGaussianPod> for Gaussian {
    fn from(ply: PlyHairGaussianPod) -> Self {
        Self::from_ply(&ply)
    }
}

impl From<&PlyHairGaussianPod> for Gaussian {
    fn from(ply: &PlyHairGaussianPod) -> Self {
        Self::from_ply(ply)
    }
}

/// A set of Gaussians stored as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gaussians {
    pub pos: Vec<Vec3>,
    pub rot: Vec<Quat>,
    pub scale: Vec<Vec3>,
    pub opacity: Vec<f32>,
    pub sh: Vec<ColorBand>,
}

impl Gaussians {
    /// The most rows reserved up front when reading a file.
    const PREALLOCATE_LIMIT: usize = 1 << 16;

    /// Create an empty set with the capacity for `count` Gaussians.
    pub fn with_capacity(count: usize) -> Self {
        Self {
            pos: Vec::with_capacity(count),
            rot: Vec::with_capacity(count),
            scale: Vec::with_capacity(count),
            opacity: Vec::with_capacity(count),
            sh: Vec::with_capacity(count),
        }
    }

    /// Get the number of Gaussians.
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every column has the same number of rows.
    pub fn validate(&self) -> Result<usize, Error> {
        let expected = self.pos.len();
        [
            ("rot", self.rot.len()),
            ("scale", self.scale.len()),
            ("opacity", self.opacity.len()),
            ("sh", self.sh.len()),
        ]
        .into_iter()
        .find(|(_, actual)| *actual != expected)
        .map_or(Ok(expected), |(column, actual)| {
            Err(Error::RowCountMismatch {
                column,
                expected,
                actual,
            })
        })
    }

    /// Append a Gaussian.
    pub fn push(&mut self, gaussian: Gaussian) {
        self.pos.push(gaussian.pos);
        self.rot.push(gaussian.rot);
        self.scale.push(gaussian.scale);
        self.opacity.push(gaussian.opacity);
        self.sh.push(gaussian.sh);
    }

    /// Append all Gaussians of `other`.
    pub fn extend_from(&mut self, other: &Gaussians) {
        self.pos.extend_from_slice(&other.pos);
        self.rot.extend_from_slice(&other.rot);
        self.scale.extend_from_slice(&other.scale);
        self.opacity.extend_from_slice(&other.opacity);
        self.sh.extend_from_slice(&other.sh);
    }

    /// Get a Gaussian.
    pub fn get(&self, index: usize) -> Option<Gaussian> {
        Some(Gaussian {
            pos: *self.pos.get(index)?,
            rot: *self.rot.get(index)?,
            scale: *self.scale.get(index)?,
            opacity: *self.opacity.get(index)?,
            sh: *self.sh.get(index)?,
        })
    }

    /// Iterate over the Gaussians.
    pub fn iter(&self) -> impl Iterator<Item = Gaussian> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Keep only the rows where `keep` is true.
    pub fn filtered(&self, keep: &[bool]) -> Self {
        let mut gaussians = Self::with_capacity(keep.iter().filter(|k| **k).count());
        self.iter()
            .zip(keep)
            .filter(|(_, keep)| **keep)
            .for_each(|(gaussian, _)| gaussians.push(gaussian));
        gaussians
    }

    /// Get a view of a range.
    pub fn view(&self, range: Range<usize>) -> GaussiansView<'_> {
        GaussiansView {
            pos: &self.pos[range.clone()],
            rot: &self.rot[range.clone()],
            scale: &self.scale[range.clone()],
            opacity: &self.opacity[range.clone()],
            sh: &self.sh[range],
        }
    }

    /// Get a mutable view of a range.
    pub fn view_mut(&mut self, range: Range<usize>) -> GaussiansViewMut<'_> {
        GaussiansViewMut {
            pos: &mut self.pos[range.clone()],
            rot: &mut self.rot[range.clone()],
            scale: &mut self.scale[range.clone()],
            opacity: &mut self.opacity[range.clone()],
            sh: &mut self.sh[range],
        }
    }

    /// Get a view of all Gaussians.
    pub fn as_view(&self) -> GaussiansView<'_> {
        self.view(0..self.len())
    }

    /// Read a hair splat PLY file.
    ///
    /// Files without the strand metadata are read as plain point clouds with no strands.
    pub fn read_ply(reader: &mut impl BufRead) -> Result<(Self, StrandLayout), Error> {
        let header = PlyHeader::read(reader)?;
        header.check_required()?;

        let unknown = header
            .properties
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| !PlyHairGaussianPod::is_known_property(name))
            .collect::<HashSet<_>>();
        for name in unknown {
            log::warn!("Unknown property: {name}");
        }

        let pods = Self::read_ply_gaussians(reader, &header)?;

        let strands = match (header.has_strand_metadata(), pods.first()) {
            (true, Some(pod)) => StrandLayout::new(
                pod.strand_count.max(0) as usize,
                pod.gaussians_per_strand.max(0) as usize,
            ),
            _ => StrandLayout::NONE,
        };

        let mut gaussians = Self::with_capacity(pods.len());
        pods.iter()
            .map(Gaussian::from_ply)
            .for_each(|gaussian| gaussians.push(gaussian));

        Ok((gaussians, strands))
    }

    /// Read the splat PLY Gaussians into [`PlyHairGaussianPod`].
    fn read_ply_gaussians(
        reader: &mut impl BufRead,
        header: &PlyHeader,
    ) -> Result<Vec<PlyHairGaussianPod>, Error> {
        // The count is untrusted, a short file must fail on read rather than allocate.
        let mut pods = Vec::with_capacity(header.vertex_count.min(Self::PREALLOCATE_LIMIT));
        let mut row = vec![0u32; header.properties.len()];
        for _ in 0..header.vertex_count {
            reader.read_exact(bytemuck::cast_slice_mut(&mut row))?;

            let mut pod = PlyHairGaussianPod::zeroed();
            for (property, word) in header.properties.iter().zip(row.iter()) {
                pod.set_value(&property.name, property.ty, u32::from_le(*word));
            }
            pods.push(pod);
        }

        Ok(pods)
    }

    /// Write the Gaussians to a hair splat PLY file.
    ///
    /// The strand metadata is replicated on every row.
    pub fn write_ply(&self, writer: &mut impl Write, strands: StrandLayout) -> Result<(), Error> {
        PlyHeader::hair(self.len()).write(writer)?;

        self.iter()
            .map(|gaussian| gaussian.to_ply(strands))
            .try_for_each(|pod| writer.write_all(bytemuck::bytes_of(&pod)))?;

        Ok(())
    }
}

/// A borrowed view of a range of [`Gaussians`].
#[derive(Debug, Clone, Copy)]
pub struct GaussiansView<'a> {
    pub pos: &'a [Vec3],
    pub rot: &'a [Quat],
    pub scale: &'a [Vec3],
    pub opacity: &'a [f32],
    pub sh: &'a [ColorBand],
}

impl GaussiansView<'_> {
    /// Get the number of Gaussians.
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the view into owned [`Gaussians`].
    pub fn to_gaussians(&self) -> Gaussians {
        Gaussians {
            pos: self.pos.to_vec(),
            rot: self.rot.to_vec(),
            scale: self.scale.to_vec(),
            opacity: self.opacity.to_vec(),
            sh: self.sh.to_vec(),
        }
    }

    /// The mean position.
    pub fn centroid(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.pos.iter().copied().sum::<Vec3>() / self.len() as f32
    }
}

/// A mutable borrowed view of a range of [`Gaussians`].
#[derive(Debug)]
pub struct GaussiansViewMut<'a> {
    pub pos: &'a mut [Vec3],
    pub rot: &'a mut [Quat],
    pub scale: &'a mut [Vec3],
    pub opacity: &'a mut [f32],
    pub sh: &'a mut [ColorBand],
}

impl GaussiansViewMut<'_> {
    /// Get the number of Gaussians.
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> GaussiansView<'_> {
        GaussiansView {
            pos: &self.pos[..],
            rot: &self.rot[..],
            scale: &self.scale[..],
            opacity: &self.opacity[..],
            sh: &self.sh[..],
        }
    }
}
