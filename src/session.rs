use glam::*;

/// The interaction mode of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EditMode {
    #[default]
    View,
    Cutting,
    Coloring,
}

/// The editing state shared by every operation of an [`AvatarScene`](crate::AvatarScene).
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSession {
    /// The selected avatar.
    pub selected: Option<usize>,
    /// The interaction mode.
    pub mode: EditMode,
    /// The max ray distance of a pick.
    pub selection_radius: f32,
    /// The max ray distance of a cut.
    pub cutting_radius: f32,
    /// The max ray distance of a paint stroke.
    pub coloring_radius: f32,
    /// Keep the higher colour bands when painting.
    pub keep_higher_bands: bool,
    /// The paint colour.
    pub selected_color: Vec3,
}

impl EditorSession {
    /// Create a new session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cutting.
    pub fn is_cutting(&self) -> bool {
        self.mode == EditMode::Cutting
    }

    /// Check if coloring.
    pub fn is_coloring(&self) -> bool {
        self.mode == EditMode::Coloring
    }

    /// Get the selected avatar, or an error if none is.
    pub fn require_selected(&self) -> Result<usize, crate::Error> {
        self.selected.ok_or(crate::Error::NoAvatarSelected)
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self {
            selected: None,
            mode: EditMode::View,
            selection_radius: 0.02,
            cutting_radius: 0.2,
            coloring_radius: 0.1,
            keep_higher_bands: true,
            selected_color: Vec3::splat(0.5),
        }
    }
}
