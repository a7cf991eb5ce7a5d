use crate::{RawFrame, Resolution};

use image::{Rgba, RgbaImage};

/// WHAT: RGBA desktop images become RGB at the target resolution
/// WHY: The writer expects normalized frames regardless of monitor size
#[test]
fn given_rgba_capture_when_normalizing_then_rgb_at_target_size() {
    // Given: A 40x30 opaque red RGBA capture
    let rgba = RgbaImage::from_pixel(40, 30, Rgba([200, 10, 10, 255]));

    // When: Normalizing to 20x16
    let frame = RawFrame::normalized(rgba, Resolution::new(20, 16));

    // Then: Dimensions match and colour survives without alpha
    assert_eq!(frame.resolution(), Resolution::new(20, 16));
    let [r, g, b] = frame.image().get_pixel(10, 8).0;
    assert!(r.abs_diff(200) <= 1 && g.abs_diff(10) <= 1 && b.abs_diff(10) <= 1);
}

/// WHAT: Frames already at the target size are left untouched
/// WHY: Avoids a needless resample on every tick
#[test]
fn given_frame_at_target_size_when_resizing_then_pixels_identical() {
    // Given: A frame already at 16x16
    let frame = crate::tests::support::solid_frame(Resolution::new(16, 16), 77);
    let before = frame.image().clone();

    // When: Resizing to the same size
    let after = frame.resized_to(Resolution::new(16, 16));

    // Then: Same buffer contents
    assert_eq!(after.image(), &before);
}
