use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use glam::*;

use crate::{Error, Gaussians, GaussiansView, StrandLayout};

/// An avatar ready to be written back to a hair splat PLY file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedAvatar {
    /// The Gaussians in local space.
    pub gaussians: Gaussians,
    /// The strand layout after pruning.
    pub strands: StrandLayout,
    /// The number of fully cut strands removed.
    pub pruned_strands: usize,
}

impl ExportedAvatar {
    /// Export an avatar window, removing the layout displacement and fully cut strands.
    pub fn from_window(window: GaussiansView<'_>, strands: StrandLayout, displacement: f32) -> Self {
        let mut gaussians = window.to_gaussians();
        let offset = Vec3::new(displacement, 0.0, 0.0);
        gaussians.pos.iter_mut().for_each(|pos| *pos -= offset);

        Self::pruned(gaussians, strands)
    }

    /// Remove the strands whose total opacity is exactly 0.
    pub fn pruned(gaussians: Gaussians, strands: StrandLayout) -> Self {
        let mut keep = vec![true; gaussians.len()];
        let mut pruned_strands = 0;
        for strand in strands.strands().filter(|strand| !strand.is_empty()) {
            if gaussians.opacity[strand.clone()].iter().sum::<f32>() == 0.0 {
                keep[strand].fill(false);
                pruned_strands += 1;
            }
        }

        let strands = StrandLayout::new(
            strands.strand_count - pruned_strands,
            strands.gaussians_per_strand,
        );

        log::debug!("Pruned {pruned_strands} fully cut strands");

        Self {
            gaussians: gaussians.filtered(&keep),
            strands,
            pruned_strands,
        }
    }

    /// Write to a hair splat PLY writer.
    pub fn write_ply(&self, writer: &mut impl Write) -> Result<(), Error> {
        self.gaussians.write_ply(writer, self.strands)
    }

    /// Save to a hair splat PLY file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_ply(&mut writer)?;
        writer.flush()?;

        log::info!(
            "Exported {} gaussians in {} strands to {}",
            self.gaussians.len(),
            self.strands.strand_count,
            path.display()
        );

        Ok(())
    }
}
