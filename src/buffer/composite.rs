use std::ops::Range;

use crate::{Error, Gaussians, GaussiansView, GaussiansViewMut};

/// The Gaussians of every loaded avatar, concatenated into one contiguous store.
///
/// Each avatar owns a window, a contiguous range of the store assigned at registration.
/// Windows are never resized or moved, so all edits go through [`CompositeBuffer::view_mut`].
#[derive(Debug, Clone, Default)]
pub struct CompositeBuffer {
    gaussians: Gaussians,
    windows: Vec<Range<usize>>,
}

impl CompositeBuffer {
    /// Create an empty composite buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the Gaussians of a new avatar, returning its window index.
    pub fn register(&mut self, gaussians: &Gaussians) -> Result<usize, Error> {
        let count = gaussians.validate()?;

        let start = self.gaussians.len();
        let window = start..start + count;

        log::debug!("Registering window {window:?}");

        self.gaussians.extend_from(gaussians);
        self.windows.push(window);

        Ok(self.windows.len() - 1)
    }

    /// Get the total number of Gaussians.
    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    /// Get the number of windows.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Get the window of an avatar.
    pub fn window(&self, index: usize) -> Option<Range<usize>> {
        self.windows.get(index).cloned()
    }

    /// Get all windows in registration order.
    pub fn windows(&self) -> &[Range<usize>] {
        &self.windows
    }

    /// Get the whole store, as handed to a renderer.
    pub fn gaussians(&self) -> &Gaussians {
        &self.gaussians
    }

    /// Get the view of an avatar window.
    pub fn view(&self, index: usize) -> Result<GaussiansView<'_>, Error> {
        let window = self.window(index).ok_or(Error::AvatarNotFound(index))?;
        Ok(self.gaussians.view(window))
    }

    /// Get the mutable view of an avatar window.
    pub fn view_mut(&mut self, index: usize) -> Result<GaussiansViewMut<'_>, Error> {
        let window = self.window(index).ok_or(Error::AvatarNotFound(index))?;
        Ok(self.gaussians.view_mut(window))
    }
}
