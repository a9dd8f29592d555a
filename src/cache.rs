use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use glam::*;

use crate::{Error, NpyArray, StrandLayout, stored_basis_to_quat};

/// A cache of values looked up by key.
pub trait KeyedCache<K, V> {
    /// Look up the value of a key.
    fn lookup(&self, key: &K) -> Result<V, Error>;
}

/// Find the candidate with the key nearest to `target`.
///
/// Ties resolve to the first candidate.
pub fn nearest_key<T>(
    candidates: impl IntoIterator<Item = (f32, T)>,
    target: f32,
) -> Option<(f32, T)> {
    let mut nearest: Option<(f32, T)> = None;
    for (key, value) in candidates {
        if nearest
            .as_ref()
            .is_none_or(|(best, _)| (key - target).abs() < (best - target).abs())
        {
            nearest = Some((key, value));
        }
    }
    nearest
}

/// The base hair pose of an animation frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FramePose {
    pub pos: Vec<Vec3>,
    pub rot: Vec<Quat>,
}

impl FramePose {
    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    /// Check if there are no points.
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }
}

/// The frame cache stored as array files in a folder.
///
/// Frame `F` is made of `frame_<F>_mean_frenet.npy`, the positions, and
/// `frame_<F>_rot_frenet.npy`, the 3x3 tangent, normal and binormal bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFolderCache {
    folder: PathBuf,
}

impl FrameFolderCache {
    /// Create a new frame folder cache.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Get the folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Get the path of a frame file.
    pub fn frame_file(folder: &Path, frame: u32, kind: &str) -> PathBuf {
        folder.join(format!("frame_{frame}_{kind}_frenet.npy"))
    }
}

impl KeyedCache<u32, FramePose> for FrameFolderCache {
    fn lookup(&self, frame: &u32) -> Result<FramePose, Error> {
        log::debug!("Loading frame {frame} from {}", self.folder.display());

        let mean = NpyArray::open(Self::frame_file(&self.folder, *frame, "mean"))?;
        let rot = NpyArray::open(Self::frame_file(&self.folder, *frame, "rot"))?;

        let pos = points(&mean)?;
        if rot.len() != pos.len() * 9 {
            return Err(Error::ShapeMismatch {
                expected: vec![pos.len(), 3, 3],
                actual: rot.shape,
            });
        }

        let rot = rot
            .data
            .chunks_exact(9)
            .filter_map(|basis| <&[f32; 9]>::try_from(basis).ok())
            .map(stored_basis_to_quat)
            .collect();

        Ok(FramePose { pos, rot })
    }
}

/// The frame cache held in memory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemoryFrameCache {
    frames: BTreeMap<u32, FramePose>,
}

impl MemoryFrameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a frame.
    pub fn insert(&mut self, frame: u32, pose: FramePose) {
        self.frames.insert(frame, pose);
    }
}

impl KeyedCache<u32, FramePose> for MemoryFrameCache {
    fn lookup(&self, frame: &u32) -> Result<FramePose, Error> {
        self.frames
            .get(frame)
            .cloned()
            .ok_or_else(|| Error::CacheMiss(format!("frame {frame}")))
    }
}

/// The key of a procedural curl.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveKey {
    pub amplitude: f32,
    pub frequency: f32,
}

impl WaveKey {
    /// Create a new wave key.
    pub const fn new(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
        }
    }
}

/// Precomputed hair rotations of a procedural curl.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrientationGrid {
    pub strand_count: usize,
    pub gaussians_per_strand: usize,
    pub rot: Vec<Quat>,
}

impl OrientationGrid {
    /// Create from an array of shape `(strands, per_strand, 4)` in `w, x, y, z` order.
    pub fn from_array(array: &NpyArray) -> Result<Self, Error> {
        let [strand_count, gaussians_per_strand, 4] = array.shape[..] else {
            return Err(Error::ShapeMismatch {
                expected: vec![0, 0, 4],
                actual: array.shape.clone(),
            });
        };

        let rot = array
            .data
            .chunks_exact(4)
            .map(|q| Quat::from_xyzw(q[1], q[2], q[3], q[0]).normalize())
            .collect();

        Ok(Self {
            strand_count,
            gaussians_per_strand,
            rot,
        })
    }

    /// Take the rotations of the first strands and Gaussians matching `strands`.
    ///
    /// Returns [`None`] if the grid or its rotations are smaller than the layout.
    pub fn crop(&self, strands: StrandLayout) -> Option<Vec<Quat>> {
        if self.strand_count < strands.strand_count
            || self.gaussians_per_strand < strands.gaussians_per_strand
        {
            return None;
        }

        let rot = (0..strands.strand_count)
            .map(|s| {
                let start = s * self.gaussians_per_strand;
                self.rot.get(start..start + strands.gaussians_per_strand)
            })
            .collect::<Option<Vec<_>>>()?
            .concat();
        Some(rot)
    }
}

/// The orientation cache stored as `<root>/<amplitude>/<frequency>.npy`.
///
/// Lookups resolve the nearest amplitude folder, then the nearest frequency file in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientationFolderCache {
    root: PathBuf,
}

impl OrientationFolderCache {
    /// Create a new orientation folder cache.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the file of the nearest key.
    pub fn resolve(&self, key: &WaveKey) -> Result<PathBuf, Error> {
        let amplitudes = numeric_entries(&self.root, |path| path.is_dir())?;
        let (_, amplitude_dir) = nearest_key(amplitudes, key.amplitude).ok_or_else(|| {
            Error::CacheMiss(format!("no amplitude in {}", self.root.display()))
        })?;

        let frequencies = numeric_entries(&amplitude_dir, |path| {
            path.extension().is_some_and(|ext| ext == "npy")
        })?;
        let (_, file) = nearest_key(frequencies, key.frequency).ok_or_else(|| {
            Error::CacheMiss(format!("no frequency in {}", amplitude_dir.display()))
        })?;

        Ok(file)
    }
}

impl KeyedCache<WaveKey, OrientationGrid> for OrientationFolderCache {
    fn lookup(&self, key: &WaveKey) -> Result<OrientationGrid, Error> {
        let file = self.resolve(key)?;

        log::debug!("Loading orientations from {}", file.display());

        OrientationGrid::from_array(&NpyArray::open(file)?)
    }
}

/// The orientation cache held in memory, resolved the same way as [`OrientationFolderCache`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemoryOrientationCache {
    amplitudes: Vec<(f32, Vec<(f32, OrientationGrid)>)>,
}

impl MemoryOrientationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the orientations of a key.
    pub fn insert(&mut self, key: WaveKey, grid: OrientationGrid) {
        let frequencies = match self
            .amplitudes
            .iter()
            .position(|(amplitude, _)| *amplitude == key.amplitude)
        {
            Some(i) => &mut self.amplitudes[i].1,
            None => {
                self.amplitudes.push((key.amplitude, Vec::new()));
                let last = self.amplitudes.len() - 1;
                &mut self.amplitudes[last].1
            }
        };

        match frequencies
            .iter_mut()
            .find(|(frequency, _)| *frequency == key.frequency)
        {
            Some((_, existing)) => *existing = grid,
            None => frequencies.push((key.frequency, grid)),
        }
    }
}

impl KeyedCache<WaveKey, OrientationGrid> for MemoryOrientationCache {
    fn lookup(&self, key: &WaveKey) -> Result<OrientationGrid, Error> {
        nearest_key(
            self.amplitudes.iter().map(|(a, f)| (*a, f)),
            key.amplitude,
        )
        .and_then(|(_, frequencies)| {
            nearest_key(frequencies.iter().map(|(f, g)| (*f, g)), key.frequency)
        })
        .map(|(_, grid)| grid.clone())
        .ok_or_else(|| Error::CacheMiss(format!("orientations {key:?}")))
    }
}

/// List the entries of a folder whose name, without `.npy`, is a number.
fn numeric_entries(
    folder: &Path,
    accept: impl Fn(&Path) -> bool,
) -> Result<Vec<(f32, PathBuf)>, Error> {
    let mut entries = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| accept(path.as_path()))
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let value = name.strip_suffix(".npy").unwrap_or(name).parse::<f32>().ok()?;
            Some((value, path))
        })
        .collect::<Vec<_>>();

    // Directory order is unspecified, sort so ties resolve the same on every platform.
    entries.sort_by(|(_, a), (_, b)| a.cmp(b));

    Ok(entries)
}

/// Read an array of 3D points.
fn points(array: &NpyArray) -> Result<Vec<Vec3>, Error> {
    if array.len() % 3 != 0 {
        return Err(Error::ShapeMismatch {
            expected: vec![array.len() / 3, 3],
            actual: array.shape.clone(),
        });
    }

    Ok(array.data.chunks_exact(3).map(Vec3::from_slice).collect())
}
