use std::{
    fs::File,
    io::BufReader,
    ops::Range,
    path::{Path, PathBuf},
};

use glam::*;

use crate::{Error, Gaussians, StrandGuides};

/// How the hair region of an avatar is split into strands.
///
/// The hair region is the first `strand_count * gaussians_per_strand` Gaussians of the avatar,
/// everything after it is the head region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrandLayout {
    pub strand_count: usize,
    pub gaussians_per_strand: usize,
}

impl StrandLayout {
    /// No strands, the whole avatar is head.
    pub const NONE: Self = Self::new(0, 0);

    /// Create a new strand layout.
    pub const fn new(strand_count: usize, gaussians_per_strand: usize) -> Self {
        Self {
            strand_count,
            gaussians_per_strand,
        }
    }

    /// Get the number of hair Gaussians.
    pub const fn hair_count(&self) -> usize {
        self.strand_count * self.gaussians_per_strand
    }

    /// Check if there are no hair Gaussians.
    pub const fn is_empty(&self) -> bool {
        self.hair_count() == 0
    }

    /// Get the range of a strand relative to the start of the avatar.
    pub const fn strand(&self, strand: usize) -> Range<usize> {
        let start = strand * self.gaussians_per_strand;
        start..start + self.gaussians_per_strand
    }

    /// Iterate the ranges of all strands.
    pub fn strands(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.strand_count).map(|s| self.strand(s))
    }

    /// Split a local index into its strand and index within the strand.
    ///
    /// Returns [`None`] for head Gaussians.
    pub fn locate(&self, local_index: usize) -> Option<(usize, usize)> {
        (local_index < self.hair_count()).then(|| {
            (
                local_index / self.gaussians_per_strand,
                local_index % self.gaussians_per_strand,
            )
        })
    }

    /// Shrink the layout so it fits in `gaussian_count` Gaussians.
    pub fn fit(self, gaussian_count: usize) -> Self {
        if self.hair_count() <= gaussian_count {
            return self;
        }

        let fitted = Self::new(
            gaussian_count / self.gaussians_per_strand,
            self.gaussians_per_strand,
        );
        log::warn!(
            "Strand layout {self:?} exceeds {gaussian_count} gaussians, using {} strands",
            fitted.strand_count
        );
        fitted
    }
}

/// A clip plane on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    /// The plane position.
    pub value: f32,
    /// The lower bound of the avatar on this axis.
    pub min: f32,
    /// The upper bound of the avatar on this axis.
    pub max: f32,
    /// Keep the side above the plane instead of below.
    pub inverted: bool,
}

impl ClipPlane {
    /// Create a clip plane keeping everything between `min` and `max`.
    pub const fn new(min: f32, max: f32) -> Self {
        Self {
            value: max,
            min,
            max,
            inverted: false,
        }
    }

    /// Check if a coordinate passes the plane, with the plane moved by `offset`.
    pub fn contains(&self, coord: f32, offset: f32) -> bool {
        let value = self.value + offset;
        if self.inverted {
            coord >= value
        } else {
            coord <= value
        }
    }

    /// Set the plane position, clamped to the bounds.
    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(self.min, self.max);
    }
}

/// The clip planes of an avatar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes {
    pub x: ClipPlane,
    pub y: ClipPlane,
    pub z: ClipPlane,
}

impl ClipPlanes {
    /// Create clip planes that keep the whole bounding box.
    pub fn from_bounds(min: Vec3, max: Vec3) -> Self {
        Self {
            x: ClipPlane::new(min.x, max.x),
            y: ClipPlane::new(min.y, max.y),
            z: ClipPlane::new(min.z, max.z),
        }
    }

    /// Check if a point passes all three planes.
    ///
    /// `x_offset` is the layout displacement of the avatar, only the X plane moves with it.
    pub fn contains(&self, pos: Vec3, x_offset: f32) -> bool {
        self.x.contains(pos.x, x_offset)
            && self.y.contains(pos.y, 0.0)
            && self.z.contains(pos.z, 0.0)
    }

    /// Get a plane by axis index.
    pub fn axis_mut(&mut self, axis: usize) -> Option<&mut ClipPlane> {
        match axis {
            0 => Some(&mut self.x),
            1 => Some(&mut self.y),
            2 => Some(&mut self.z),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// The display flags of an avatar.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AvatarFlags: u8 {
        const VISIBLE = 1 << 0;
        const SHOW_HAIR = 1 << 1;
        const SHOW_HEAD = 1 << 2;
        const OVERRIDE_HAIR_COLOR = 1 << 3;
        const OVERRIDE_HEAD_COLOR = 1 << 4;
    }
}

impl Default for AvatarFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::SHOW_HAIR | Self::SHOW_HEAD
    }
}

/// The procedural curl parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveParams {
    pub frequency: f32,
    pub amplitude: f32,
}

impl WaveParams {
    /// Create new wave parameters.
    pub const fn new(frequency: f32, amplitude: f32) -> Self {
        Self {
            frequency,
            amplitude,
        }
    }

    /// Check if the curl changes anything.
    pub fn is_active(&self) -> bool {
        self.frequency * self.amplitude != 0.0
    }
}

/// A loaded avatar.
///
/// [`AvatarRecord::gaussians`] is the edited state in local space, i.e. without the layout
/// displacement. The composite buffer window of the avatar is derived from it.
#[derive(Debug, Clone)]
pub struct AvatarRecord {
    /// The display name.
    pub name: String,
    /// The edited Gaussians.
    pub gaussians: Gaussians,
    /// The strand layout of the hair region.
    pub strands: StrandLayout,
    /// The mean position in world space.
    pub centroid: Vec3,
    /// The max distance from the centroid computed at load.
    pub bounding_radius: f32,
    /// The local space lower bounds.
    pub bounds_min: Vec3,
    /// The local space upper bounds.
    pub bounds_max: Vec3,
    /// The clip planes.
    pub clip_planes: ClipPlanes,
    /// The display flags.
    pub flags: AvatarFlags,
    /// The file the avatar was loaded from.
    pub source_path: PathBuf,
    /// The folder holding the animation frame cache.
    pub frame_folder: PathBuf,
    /// The current animation frame.
    pub current_frame: u32,
    /// The hair override colour.
    pub hair_color: Vec3,
    /// The head override colour.
    pub head_color: Vec3,
    /// The hair scale multiplier.
    pub hair_scale: f32,
    /// The curl parameters.
    pub wave: WaveParams,
    /// The control polylines of the strands.
    pub guides: StrandGuides,
}

impl AvatarRecord {
    /// Create a new avatar record, deriving the bounds and strand guides.
    pub fn new(
        name: impl Into<String>,
        gaussians: Gaussians,
        strands: StrandLayout,
        source_path: PathBuf,
        frame_folder: PathBuf,
    ) -> Result<Self, Error> {
        let count = gaussians.validate()?;
        let strands = strands.fit(count);

        let view = gaussians.as_view();
        let centroid = view.centroid();
        let bounding_radius = gaussians
            .pos
            .iter()
            .map(|p| p.distance(centroid))
            .fold(0.0, f32::max);
        let (bounds_min, bounds_max) = match count {
            0 => (Vec3::ZERO, Vec3::ZERO),
            _ => gaussians.pos.iter().fold(
                (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
                |(min, max), p| (min.min(*p), max.max(*p)),
            ),
        };

        let hair = 0..strands.hair_count();
        let guides = StrandGuides::new(
            strands,
            &gaussians.pos[hair.clone()],
            &gaussians.rot[hair.clone()],
            &gaussians.scale[hair],
        );

        Ok(Self {
            name: name.into(),
            gaussians,
            strands,
            centroid,
            bounding_radius,
            bounds_min,
            bounds_max,
            clip_planes: ClipPlanes::from_bounds(bounds_min, bounds_max),
            flags: AvatarFlags::default(),
            source_path,
            frame_folder,
            current_frame: 0,
            hair_color: Vec3::new(1.0, 0.0, 0.0),
            head_color: Vec3::ONE,
            hair_scale: 1.0,
            wave: WaveParams::default(),
            guides,
        })
    }

    /// Load an avatar from a hair splat PLY file.
    ///
    /// The frame cache is expected in `frame_subfolder` next to the file.
    pub fn load(path: impl AsRef<Path>, frame_subfolder: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        log::debug!("Loading avatar from {}", path.display());

        let (gaussians, strands) = read_ply_file(path)?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let frame_folder = path
            .parent()
            .unwrap_or(Path::new(""))
            .join(frame_subfolder);

        Self::new(name, gaussians, strands, path.to_path_buf(), frame_folder)
    }

    /// Reload the Gaussians of the source file.
    pub fn read_source(&self) -> Result<Gaussians, Error> {
        let (gaussians, _) = read_ply_file(&self.source_path)?;
        if gaussians.len() != self.gaussians.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.gaussians.len()],
                actual: vec![gaussians.len()],
            });
        }
        Ok(gaussians)
    }

    /// Get the number of Gaussians.
    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    /// Get the range of the hair region.
    pub fn hair(&self) -> Range<usize> {
        0..self.strands.hair_count()
    }

    /// Get the range of the head region.
    pub fn head(&self) -> Range<usize> {
        self.strands.hair_count()..self.len()
    }

    /// Get the width along X.
    pub fn width(&self) -> f32 {
        self.bounds_max.x - self.bounds_min.x
    }

    /// Check if the avatar is visible.
    pub fn is_visible(&self) -> bool {
        self.flags.contains(AvatarFlags::VISIBLE)
    }
}

fn read_ply_file(path: &Path) -> Result<(Gaussians, StrandLayout), Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    Gaussians::read_ply(&mut reader)
}
