//! Aspect-preserving render-size policy.
//!
//! Pure and deterministic: derives the output geometry from the input size
//! and a resolved scale target.  Never downscales: a source already larger
//! than the target passes through at its own size.

/// Compute the render output size for a given input and target.
///
/// Width-first fit: scale to the target width, then clamp to the target
/// height (rescaling the width) when the fitted height overflows.
pub fn render_size(input_w: u32, input_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if input_w > target_w || input_h > target_h {
        return (input_w, input_h);
    }

    let aspect = f64::from(input_w) / f64::from(input_h);
    let mut out_w = target_w;
    let mut out_h = (f64::from(target_w) / aspect).round() as u32;

    if out_h > target_h {
        out_h = target_h;
        out_w = (f64::from(target_h) * aspect).round() as u32;
    }

    (out_w, out_h)
}

#[cfg(test)]
mod tests {
    use super::render_size;

    #[test]
    fn exact_aspect_match_fills_target() {
        assert_eq!(render_size(1280, 720, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn input_above_target_is_never_downscaled() {
        assert_eq!(render_size(1920, 1080, 1280, 720), (1920, 1080));
        assert_eq!(render_size(3840, 2160, 1920, 1080), (3840, 2160));
        // one axis above the target is enough
        assert_eq!(render_size(2000, 500, 1920, 1080), (2000, 500));
    }

    #[test]
    fn small_input_upscales_to_fill() {
        assert_eq!(render_size(640, 360, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn tall_aspect_clamps_to_height_and_rescales_width() {
        // 720x480 is 3:2, so the width-first fit gives 1920x1280 and
        // overflows the 1080 target height.
        assert_eq!(render_size(720, 480, 1920, 1080), (1620, 1080));
    }

    #[test]
    fn idempotent_for_identical_arguments() {
        for &(w, h, tw, th) in &[
            (1280u32, 720u32, 1920u32, 1080u32),
            (720, 480, 1920, 1080),
            (1921, 1081, 1920, 1080),
            (16, 16, 3840, 2160),
        ] {
            assert_eq!(render_size(w, h, tw, th), render_size(w, h, tw, th));
        }
    }

    #[test]
    fn square_input_fits_by_height() {
        assert_eq!(render_size(512, 512, 1920, 1080), (1080, 1080));
    }
}
