//! Pixel decoders for CARLA camera buffers
//!
//! Channels are numbered in buffer order: channel 0 is the first byte of each
//! pixel, whatever the declared format. CARLA cameras deliver 4-byte pixels,
//! so channel 3 (alpha) is never read here.

use contracts::{ImageData, ImageFormat};

use crate::error::{RecorderError, Result};

/// Largest value a 24-bit depth encoding can hold (256^3 - 1)
pub const DEPTH_ENCODING_MAX: f64 = 16_777_215.0;

/// Channel holding the semantic tag in segmentation buffers
pub const CLASS_ID_CHANNEL: usize = 2;

/// CityScapes palette, indexed by CARLA semantic tag (0.9.14 tags 0..=28)
const CITYSCAPES_PALETTE: [[u8; 3]; 29] = [
    [0, 0, 0],       // unlabeled
    [128, 64, 128],  // road
    [244, 35, 232],  // sidewalk
    [70, 70, 70],    // building
    [102, 102, 156], // wall
    [190, 153, 153], // fence
    [153, 153, 153], // pole
    [250, 170, 30],  // traffic light
    [220, 220, 0],   // traffic sign
    [107, 142, 35],  // vegetation
    [152, 251, 152], // terrain
    [70, 130, 180],  // sky
    [220, 20, 60],   // pedestrian
    [255, 0, 0],     // rider
    [0, 0, 142],     // car
    [0, 0, 70],      // truck
    [0, 60, 100],    // bus
    [0, 80, 100],    // train
    [0, 0, 230],     // motorcycle
    [119, 11, 32],   // bicycle
    [110, 190, 160], // static
    [170, 120, 50],  // dynamic
    [55, 90, 80],    // other
    [45, 60, 150],   // water
    [157, 234, 50],  // road line
    [81, 0, 81],     // ground
    [150, 100, 100], // bridge
    [230, 150, 140], // rail track
    [180, 165, 180], // guard rail
];

fn check(image: &ImageData) -> Result<()> {
    if image.is_well_formed() {
        Ok(())
    } else {
        Err(RecorderError::MalformedImage {
            width: image.width,
            height: image.height,
            len: image.data.len(),
        })
    }
}

/// Normalized depth of one pixel: `(c0 + c1 * 256 + c2 * 65536) / (256^3 - 1)`
#[inline]
pub fn depth_from_channels(c0: u8, c1: u8, c2: u8) -> f64 {
    let encoded = u32::from(c0) + u32::from(c1) * 256 + u32::from(c2) * 65_536;
    f64::from(encoded) / DEPTH_ENCODING_MAX
}

/// Decode a depth image into row-major normalized depth in `[0, 1]`
pub fn decode_depth(image: &ImageData) -> Result<Vec<f64>> {
    check(image)?;
    Ok(image
        .data
        .chunks_exact(image.bytes_per_pixel())
        .map(|px| depth_from_channels(px[0], px[1], px[2]))
        .collect())
}

/// Row-major semantic class ids, taken unchanged from channel 2
pub fn class_ids(image: &ImageData) -> Result<Vec<u8>> {
    check(image)?;
    Ok(image
        .data
        .chunks_exact(image.bytes_per_pixel())
        .map(|px| px[CLASS_ID_CHANNEL])
        .collect())
}

/// CityScapes colour of a semantic tag; unknown tags map to black
pub fn cityscapes_color(tag: u8) -> [u8; 3] {
    CITYSCAPES_PALETTE
        .get(usize::from(tag))
        .copied()
        .unwrap_or([0, 0, 0])
}

/// Palette-mapped RGB buffer of a segmentation image
pub fn cityscapes_rgb(image: &ImageData) -> Result<Vec<u8>> {
    Ok(class_ids(image)?
        .into_iter()
        .flat_map(cityscapes_color)
        .collect())
}

/// Packed RGB8 buffer (alpha dropped, BGRA swapped)
pub fn to_rgb(image: &ImageData) -> Result<Vec<u8>> {
    check(image)?;
    let bpp = image.bytes_per_pixel();
    let mut out = Vec::with_capacity(image.data.len() / bpp * 3);
    for px in image.data.chunks_exact(bpp) {
        match image.format {
            ImageFormat::Bgra8 => out.extend_from_slice(&[px[2], px[1], px[0]]),
            ImageFormat::Rgb8 | ImageFormat::Rgba8 => out.extend_from_slice(&px[..3]),
        }
    }
    Ok(out)
}

/// Packed RGBA8 buffer (BGRA swapped, RGB gets opaque alpha)
pub fn to_rgba(image: &ImageData) -> Result<Vec<u8>> {
    check(image)?;
    match image.format {
        ImageFormat::Rgba8 => Ok(image.data.to_vec()),
        ImageFormat::Bgra8 => {
            let mut rgba = image.data.to_vec();
            for chunk in rgba.chunks_exact_mut(4) {
                chunk.swap(0, 2); // Swap B and R
            }
            Ok(rgba)
        }
        ImageFormat::Rgb8 => Ok(image
            .data
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect()),
    }
}
