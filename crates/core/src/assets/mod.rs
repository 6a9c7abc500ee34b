use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{AnimationCategory, DeathScreenError, Result};

/// Opaque handle the host's renderer uses to find an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u64);

/// A texture the host has already decoded and uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// The images making up the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayImage {
    Background,
    Foreground(AnimationCategory),
}

impl OverlayImage {
    pub const ALL: [OverlayImage; 4] = [
        OverlayImage::Background,
        OverlayImage::Foreground(AnimationCategory::PlayerDeath),
        OverlayImage::Foreground(AnimationCategory::CraftFailure),
        OverlayImage::Foreground(AnimationCategory::EnemyDefeated),
    ];

    /// File name the host loads the image from.
    pub fn file_name(self) -> &'static str {
        match self {
            OverlayImage::Background => "er_death_bg.png",
            OverlayImage::Foreground(AnimationCategory::PlayerDeath) => "er_normal_death.png",
            OverlayImage::Foreground(AnimationCategory::CraftFailure) => "er_craft_failed.png",
            OverlayImage::Foreground(AnimationCategory::EnemyDefeated) => "er_enemy_felled.png",
        }
    }
}

/// Registry for all textures the overlay composites.
#[derive(Debug, Default)]
pub struct AssetStore {
    textures: HashMap<OverlayImage, Texture>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
        }
    }

    pub fn register(&mut self, image: OverlayImage, texture: Texture) {
        self.textures.insert(image, texture);
    }

    pub fn texture(&self, image: OverlayImage) -> Result<Texture> {
        self.textures
            .get(&image)
            .copied()
            .ok_or_else(|| DeathScreenError::MissingTexture(image.file_name().to_string()))
    }

    pub fn background(&self) -> Result<Texture> {
        self.texture(OverlayImage::Background)
    }

    pub fn foreground(&self, category: AnimationCategory) -> Result<Texture> {
        self.texture(OverlayImage::Foreground(category))
    }

    /// Checks that every overlay image is present.
    pub fn ensure_complete(&self) -> Result<()> {
        for image in OverlayImage::ALL {
            self.texture(image)?;
        }
        Ok(())
    }
}
