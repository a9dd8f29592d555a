use std::{
    fmt,
    ops::Range,
    path::{Path, PathBuf},
};

use glam::*;

use crate::{
    AvatarFlags, AvatarRecord, ClipPlanes, CompositeBuffer, EditMode, EditorSession, Error,
    ExportedAvatar, FrameFolderCache, FramePose, GaussianQuery, HairAnimator, KeyedCache,
    OrientationFolderCache, OrientationGrid, PaintStroke, PickResult, Ray, WaveKey, WaveParams,
    apply_colors, apply_visibility, cut_hair, displacement, nearest_avatar, nearest_gaussian,
    paint,
};

/// The configuration of an [`AvatarScene`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// The X gap between visible avatars.
    pub separation: f32,
    /// The number of camera-nearest Gaussians a pick averages its colour over.
    pub pool_size: usize,
    /// The seed of the curl randomness.
    pub seed: u64,
    /// The frame cache folder, relative to the avatar file's folder.
    pub frame_subfolder: PathBuf,
    /// The orientation cache folder, relative to the avatar file's folder.
    pub orientation_subfolder: PathBuf,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            separation: 0.1,
            pool_size: 20,
            seed: 0,
            frame_subfolder: PathBuf::from("320_to_320"),
            orientation_subfolder: PathBuf::from("rots"),
        }
    }
}

/// The animation caches of an avatar.
pub struct AvatarCaches {
    pub frames: Box<dyn KeyedCache<u32, FramePose>>,
    pub orientations: Box<dyn KeyedCache<WaveKey, OrientationGrid>>,
}

impl AvatarCaches {
    /// Create new avatar caches.
    pub fn new(
        frames: impl KeyedCache<u32, FramePose> + 'static,
        orientations: impl KeyedCache<WaveKey, OrientationGrid> + 'static,
    ) -> Self {
        Self {
            frames: Box::new(frames),
            orientations: Box::new(orientations),
        }
    }

    /// Create the folder caches next to the source file of an avatar.
    pub fn from_folders(record: &AvatarRecord, config: &SceneConfig) -> Self {
        let folder = record.source_path.parent().unwrap_or(Path::new(""));
        Self::new(
            FrameFolderCache::new(&record.frame_folder),
            OrientationFolderCache::new(folder.join(&config.orientation_subfolder)),
        )
    }
}

impl fmt::Debug for AvatarCaches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarCaches").finish_non_exhaustive()
    }
}

/// What a renderer needs to highlight the selected avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSelection {
    /// The window of the avatar in the composite buffer.
    pub window: Range<usize>,
    /// The number of hair Gaussians at the start of the window.
    pub hair_count: usize,
    /// The clip planes in world space.
    pub clip_planes: ClipPlanes,
    /// The interaction mode.
    pub mode: EditMode,
    /// The brush radius of the mode.
    pub radius: f32,
    /// The paint colour.
    pub color: Vec3,
}

/// The loaded avatars and the composite buffer they are rendered from.
///
/// Every operation that changes an avatar rewrites its window, so the buffer is always ready to
/// be rendered between calls.
#[derive(Debug)]
pub struct AvatarScene {
    config: SceneConfig,
    buffer: CompositeBuffer,
    avatars: Vec<AvatarRecord>,
    caches: Vec<AvatarCaches>,
    animator: HairAnimator,
}

impl AvatarScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::new_with(SceneConfig::default())
    }

    /// Create an empty scene with a configuration.
    pub fn new_with(config: SceneConfig) -> Self {
        Self {
            animator: HairAnimator::new(config.seed),
            config,
            buffer: CompositeBuffer::new(),
            avatars: Vec::new(),
            caches: Vec::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Get the composite buffer.
    pub fn buffer(&self) -> &CompositeBuffer {
        &self.buffer
    }

    /// Get the avatars in registration order.
    pub fn avatars(&self) -> &[AvatarRecord] {
        &self.avatars
    }

    /// Get an avatar.
    pub fn avatar(&self, index: usize) -> Result<&AvatarRecord, Error> {
        self.avatars.get(index).ok_or(Error::AvatarNotFound(index))
    }

    /// Get the X displacement of an avatar.
    pub fn displacement(&self, index: usize) -> f32 {
        displacement(&self.avatars, index, self.config.separation)
    }

    /// Load an avatar from a hair splat PLY file.
    pub fn load_avatar(&mut self, path: impl AsRef<Path>) -> Result<usize, Error> {
        let record = AvatarRecord::load(path, &self.config.frame_subfolder)?;
        self.insert_avatar(record)
    }

    /// Add an avatar with the folder caches next to its source file.
    pub fn insert_avatar(&mut self, record: AvatarRecord) -> Result<usize, Error> {
        let caches = AvatarCaches::from_folders(&record, &self.config);
        self.insert_avatar_with(record, caches)
    }

    /// Add an avatar with its animation caches.
    pub fn insert_avatar_with(
        &mut self,
        record: AvatarRecord,
        caches: AvatarCaches,
    ) -> Result<usize, Error> {
        log::debug!("Registering avatar {}", record.name);

        let index = self.buffer.register(&record.gaussians)?;
        self.avatars.push(record);
        self.caches.push(caches);

        self.refresh_all()?;

        log::info!(
            "Avatar {} loaded with {} gaussians in {} strands",
            self.avatars[index].name,
            self.avatars[index].len(),
            self.avatars[index].strands.strand_count,
        );

        Ok(index)
    }

    /// Replace the animation caches of an avatar.
    pub fn set_caches(&mut self, index: usize, caches: AvatarCaches) -> Result<(), Error> {
        let slot = self
            .caches
            .get_mut(index)
            .ok_or(Error::AvatarNotFound(index))?;
        *slot = caches;
        self.refresh_avatar(index)
    }

    /// Rewrite the window of an avatar from its record.
    pub fn refresh_avatar(&mut self, index: usize) -> Result<(), Error> {
        let displacement = self.displacement(index);

        let Self {
            buffer,
            avatars,
            caches,
            animator,
            ..
        } = self;
        let record = avatars
            .get_mut(index)
            .ok_or(Error::AvatarNotFound(index))?;
        let caches = caches.get(index).ok_or(Error::AvatarNotFound(index))?;
        let mut window = buffer.view_mut(index)?;

        apply_visibility(record, &mut window);
        apply_colors(record, &mut window);
        animator.pose(
            record,
            &mut window,
            caches.frames.as_ref(),
            caches.orientations.as_ref(),
            displacement,
        );

        Ok(())
    }

    /// Rewrite the windows of all avatars.
    pub fn refresh_all(&mut self) -> Result<(), Error> {
        (0..self.avatars.len()).try_for_each(|i| self.refresh_avatar(i))
    }

    /// Show or hide an avatar, which moves every avatar after it.
    ///
    /// Hiding the selected avatar deselects it and showing an avatar selects it.
    pub fn set_visible(
        &mut self,
        session: &mut EditorSession,
        index: usize,
        visible: bool,
    ) -> Result<(), Error> {
        self.avatar_mut(index)?
            .flags
            .set(AvatarFlags::VISIBLE, visible);

        match visible {
            true => session.selected = Some(index),
            false if session.selected == Some(index) => session.selected = None,
            false => {}
        }

        self.refresh_all()
    }

    /// Show or hide the hair of an avatar.
    pub fn set_show_hair(&mut self, index: usize, show: bool) -> Result<(), Error> {
        self.set_flag(index, AvatarFlags::SHOW_HAIR, show)
    }

    /// Show or hide the head of an avatar.
    pub fn set_show_head(&mut self, index: usize, show: bool) -> Result<(), Error> {
        self.set_flag(index, AvatarFlags::SHOW_HEAD, show)
    }

    /// Override the hair colour of an avatar, or restore it with [`None`].
    pub fn set_hair_color(&mut self, index: usize, color: Option<Vec3>) -> Result<(), Error> {
        if let Some(color) = color {
            self.avatar_mut(index)?.hair_color = color;
        }
        self.set_flag(index, AvatarFlags::OVERRIDE_HAIR_COLOR, color.is_some())
    }

    /// Override the head colour of an avatar, or restore it with [`None`].
    pub fn set_head_color(&mut self, index: usize, color: Option<Vec3>) -> Result<(), Error> {
        if let Some(color) = color {
            self.avatar_mut(index)?.head_color = color;
        }
        self.set_flag(index, AvatarFlags::OVERRIDE_HEAD_COLOR, color.is_some())
    }

    /// Scale the hair Gaussians of an avatar.
    pub fn set_hair_scale(&mut self, index: usize, scale: f32) -> Result<(), Error> {
        self.avatar_mut(index)?.hair_scale = scale;
        self.refresh_avatar(index)
    }

    /// Move a clip plane of an avatar.
    ///
    /// `axis` is 0, 1 or 2 for X, Y or Z. The value is clamped to the avatar's bounds.
    pub fn set_clip_plane(
        &mut self,
        index: usize,
        axis: usize,
        value: f32,
        inverted: bool,
    ) -> Result<(), Error> {
        let Some(plane) = self.avatar_mut(index)?.clip_planes.axis_mut(axis) else {
            log::warn!("Invalid clip plane axis {axis}");
            return Ok(());
        };
        plane.set_value(value);
        plane.inverted = inverted;
        Ok(())
    }

    /// Select the avatar and Gaussian under the ray.
    ///
    /// A failed pick deselects. In coloring mode the averaged colour of a hit becomes the
    /// session's paint colour.
    pub fn pick(&self, session: &mut EditorSession, ray: &Ray) -> Option<PickResult> {
        let result = self.pick_gaussian(session, ray);

        match result {
            Some(result) => {
                if session.is_coloring() {
                    session.selected_color = result.averaged_color;
                }
            }
            None => session.selected = None,
        }

        result
    }

    fn pick_gaussian(&self, session: &mut EditorSession, ray: &Ray) -> Option<PickResult> {
        let index = nearest_avatar(&self.avatars, ray)?;
        session.selected = Some(index);

        let record = &self.avatars[index];
        let window = self.buffer.view(index).ok()?;
        let displacement = self.displacement(index);
        let query = GaussianQuery {
            radius: session.selection_radius,
            clip: session
                .is_coloring()
                .then_some((&record.clip_planes, displacement)),
            pool_size: self.config.pool_size,
        };

        let hit = nearest_gaussian(window, ray, &query)?;
        Some(PickResult::new(index, hit, record.strands))
    }

    /// Cut the hair of the selected avatar along the ray.
    ///
    /// Returns the number of Gaussians newly cut.
    pub fn cut(&mut self, session: &EditorSession, ray: &Ray) -> Result<usize, Error> {
        let index = session.require_selected()?;
        let (record, mut window) = self.record_and_window(index)?;
        Ok(cut_hair(record, &mut window, ray, session.cutting_radius))
    }

    /// Restore the hair of the selected avatar from its source file.
    ///
    /// On failure the avatar is left unchanged.
    pub fn reset_cut(&mut self, session: &EditorSession) -> Result<(), Error> {
        let index = session.require_selected()?;
        let source = self.read_source(index)?;

        let record = self.avatar_mut(index)?;
        let hair = record.hair();
        record.gaussians.opacity[hair.clone()].copy_from_slice(&source.opacity[hair]);
        record.gaussians.pos = source.pos;

        log::info!("Reset cuts of {}", record.name);

        self.refresh_avatar(index)
    }

    /// Paint the selected avatar along the ray with the session's colour.
    ///
    /// Returns the number of Gaussians painted.
    pub fn color(&mut self, session: &EditorSession, ray: &Ray) -> Result<usize, Error> {
        let index = session.require_selected()?;
        let displacement = self.displacement(index);
        let stroke = PaintStroke {
            radius: session.coloring_radius,
            color: session.selected_color,
            keep_higher_bands: session.keep_higher_bands,
        };

        let (record, mut window) = self.record_and_window(index)?;
        Ok(paint(record, &mut window, ray, &stroke, displacement))
    }

    /// Restore the colours of the selected avatar from its source file.
    ///
    /// On failure the avatar is left unchanged.
    pub fn reset_color(&mut self, session: &EditorSession) -> Result<(), Error> {
        let index = session.require_selected()?;
        let source = self.read_source(index)?;

        let record = self.avatar_mut(index)?;
        record.gaussians.sh = source.sh;

        log::info!("Reset colours of {}", record.name);

        self.refresh_avatar(index)
    }

    /// Set the animation frame of the selected avatar.
    pub fn set_frame(&mut self, session: &EditorSession, frame: u32) -> Result<(), Error> {
        let index = session.require_selected()?;
        self.avatar_mut(index)?.current_frame = frame;
        self.refresh_avatar(index)
    }

    /// Set the curl of the selected avatar.
    pub fn set_wave(&mut self, session: &EditorSession, wave: WaveParams) -> Result<(), Error> {
        let index = session.require_selected()?;
        self.avatar_mut(index)?.wave = wave;
        self.refresh_avatar(index)
    }

    /// Export an avatar as it is currently edited and posed.
    pub fn export(&self, index: usize) -> Result<ExportedAvatar, Error> {
        let record = self.avatar(index)?;
        let mut window = self.buffer.view(index)?.to_gaussians();

        // The buffer holds display opacity and colour overrides, export the edited values.
        window.opacity.copy_from_slice(&record.gaussians.opacity);
        window.sh.copy_from_slice(&record.gaussians.sh);

        Ok(ExportedAvatar::from_window(
            window.as_view(),
            record.strands,
            self.displacement(index),
        ))
    }

    /// Export an avatar to a hair splat PLY file.
    pub fn export_to_file(&self, index: usize, path: impl AsRef<Path>) -> Result<(), Error> {
        self.export(index)?.save(path)
    }

    /// Get the render state of the selected avatar.
    pub fn render_selection(&self, session: &EditorSession) -> Option<RenderSelection> {
        let index = session.selected?;
        let record = self.avatars.get(index)?;

        let mut clip_planes = record.clip_planes;
        clip_planes.x.value += self.displacement(index);

        let radius = match session.mode {
            EditMode::View => session.selection_radius,
            EditMode::Cutting => session.cutting_radius,
            EditMode::Coloring => session.coloring_radius,
        };

        Some(RenderSelection {
            window: self.buffer.window(index)?,
            hair_count: record.strands.hair_count(),
            clip_planes,
            mode: session.mode,
            radius,
            color: session.selected_color,
        })
    }

    fn avatar_mut(&mut self, index: usize) -> Result<&mut AvatarRecord, Error> {
        self.avatars
            .get_mut(index)
            .ok_or(Error::AvatarNotFound(index))
    }

    fn set_flag(&mut self, index: usize, flag: AvatarFlags, value: bool) -> Result<(), Error> {
        self.avatar_mut(index)?.flags.set(flag, value);
        self.refresh_avatar(index)
    }

    fn record_and_window(
        &mut self,
        index: usize,
    ) -> Result<(&mut AvatarRecord, crate::GaussiansViewMut<'_>), Error> {
        let record = self
            .avatars
            .get_mut(index)
            .ok_or(Error::AvatarNotFound(index))?;
        let window = self.buffer.view_mut(index)?;
        Ok((record, window))
    }

    fn read_source(&self, index: usize) -> Result<crate::Gaussians, Error> {
        self.avatar(index)?.read_source().inspect_err(|e| {
            log::warn!("Failed to reload avatar {index}: {e}");
        })
    }
}

impl Default for AvatarScene {
    fn default() -> Self {
        Self::new()
    }
}
