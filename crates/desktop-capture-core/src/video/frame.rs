use crate::config::Resolution;

use image::{
    DynamicImage, RgbImage, RgbaImage,
    imageops::{self, FilterType},
};

/// One desktop image, RGB, owned by the capture thread until written.
#[derive(Debug, Clone)]
pub struct RawFrame {
    image: RgbImage,
}

impl RawFrame {
    /// Wrap an RGB image as-is.
    pub fn from_rgb(image: RgbImage) -> Self {
        Self { image }
    }

    /// Drop the alpha channel and scale to `target` with a linear filter.
    pub fn normalized(rgba: RgbaImage, target: Resolution) -> Self {
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
        Self { image: rgb }.resized_to(target)
    }

    /// Scale to `target` unless the frame already has that size.
    pub fn resized_to(self, target: Resolution) -> Self {
        if self.resolution() == target {
            return self;
        }
        let image = imageops::resize(&self.image, target.width, target.height, FilterType::Triangle);
        Self { image }
    }

    /// Current dimensions.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    /// Borrow the pixel buffer.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}
