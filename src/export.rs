//! Before/after composition and output naming for exported renders.

use image::{Rgba, RgbaImage};

const DIVIDER_WIDTH: u32 = 4;
const DIVIDER_OPACITY: f32 = 0.8;

/// Left half from `before`, right half from `after`, with a light divider on the seam.
pub fn compose_split(before: &RgbaImage, after: &RgbaImage) -> Option<RgbaImage> {
    if before.dimensions() != after.dimensions() {
        return None;
    }
    let (width, height) = before.dimensions();
    let half = width / 2;
    let divider = half.saturating_sub(DIVIDER_WIDTH / 2)..(half + DIVIDER_WIDTH / 2).min(width);
    Some(RgbaImage::from_fn(width, height, |x, y| {
        let px = if x < half {
            *before.get_pixel(x, y)
        } else {
            *after.get_pixel(x, y)
        };
        if divider.contains(&x) {
            let blend = |c: u8| (f32::from(c) * (1.0 - DIVIDER_OPACITY) + 255.0 * DIVIDER_OPACITY).round() as u8;
            Rgba([blend(px[0]), blend(px[1]), blend(px[2]), px[3]])
        } else {
            px
        }
    }))
}

/// Profile name reduced to `[A-Za-z0-9_-]`, at most 64 characters.
pub fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    if out.is_empty() {
        out.push_str("lens");
    }
    out.chars().take(64).collect()
}

pub fn default_output_name(profile: Option<&str>, split: bool) -> String {
    let name = safe_name(profile.unwrap_or("lens"));
    if split {
        format!("LensEmulator_SPLIT_{name}.png")
    } else {
        format!("LensEmulator_{name}.png")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_takes_halves_and_draws_divider() {
        let before = RgbaImage::from_pixel(20, 4, Rgba([0, 0, 0, 255]));
        let after = RgbaImage::from_pixel(20, 4, Rgba([100, 100, 100, 255]));
        let split = compose_split(&before, &after).expect("same size");
        assert_eq!(split.get_pixel(0, 0)[0], 0);
        assert_eq!(split.get_pixel(19, 3)[0], 100);
        assert_eq!(split.get_pixel(8, 0)[0], 204);
        assert_eq!(split.get_pixel(11, 0)[0], 224);
        assert_eq!(split.get_pixel(12, 0)[0], 100);
        assert_eq!(split.get_pixel(10, 0)[3], 255);
    }

    #[test]
    fn split_rejects_mismatched_sizes() {
        let a = RgbaImage::new(4, 4);
        let b = RgbaImage::new(5, 4);
        assert!(compose_split(&a, &b).is_none());
    }

    #[test]
    fn safe_name_collapses_runs_and_truncates() {
        assert_eq!(safe_name("Helios 44-2 (58mm)"), "Helios_44-2_58mm_");
        assert_eq!(safe_name(""), "lens");
        assert_eq!(safe_name(&"x".repeat(100)).len(), 64);
        assert_eq!(default_output_name(Some("Zeiss Planar"), true), "LensEmulator_SPLIT_Zeiss_Planar.png");
        assert_eq!(default_output_name(None, false), "LensEmulator_lens.png");
    }
}
