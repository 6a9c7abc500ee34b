use glam::Vec2;

use crate::{AssetStore, FrameState, Result, Texture, TextureId};

/// One textured rectangle, in viewport pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageQuad {
    pub texture: TextureId,
    pub position: Vec2,
    pub size: Vec2,
    pub alpha: f32,
}

/// Host drawing backend.
pub trait DrawTarget {
    fn draw_image(&mut self, quad: ImageQuad);
}

/// Size that covers the whole viewport while keeping the texture's aspect.
pub fn cover_size(viewport: Vec2, texture: Vec2) -> Vec2 {
    if texture.x <= 0.0 || texture.y <= 0.0 {
        return viewport;
    }
    let width = viewport.x;
    let height = texture.y / texture.x * width;
    if height < viewport.y {
        Vec2::new(texture.x / texture.y * viewport.y, viewport.y)
    } else {
        Vec2::new(width, height)
    }
}

/// Covers the viewport with `texture`, scales it by `scale` and centres it.
pub fn centered_quad(viewport: Vec2, texture: &Texture, scale: f32, alpha: f32) -> ImageQuad {
    let size = cover_size(viewport, texture.size()) * scale;
    ImageQuad {
        texture: texture.id,
        position: (viewport - size) / 2.0,
        size,
        alpha,
    }
}

/// Composites the background and the category's foreground for the
/// current frame.
#[derive(Debug, Default)]
pub struct OverlayRenderer {
    assets: AssetStore,
}

impl OverlayRenderer {
    pub fn new(assets: AssetStore) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Draws nothing when `frame` is `None`.
    pub fn draw(
        &self,
        frame: Option<&FrameState>,
        viewport: Vec2,
        target: &mut dyn DrawTarget,
    ) -> Result<()> {
        let Some(frame) = frame else {
            return Ok(());
        };

        let background = self.assets.background()?;
        let foreground = self.assets.foreground(frame.category)?;

        target.draw_image(centered_quad(viewport, &background, 1.0, frame.alpha));
        target.draw_image(centered_quad(viewport, &foreground, frame.scale, frame.alpha));
        Ok(())
    }
}
