//! Real desktop host: `enigo` input, `arboard` clipboard, `xcap` capture.

use std::cell::RefCell;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use image::RgbaImage;
use tracing::{debug, trace};

use crate::core::types::Point;
use crate::io::host::{Host, Key};

/// Drives the local desktop session.
pub struct Desktop {
    enigo: RefCell<Enigo>,
}

impl Desktop {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|err| anyhow!("initialize input simulation: {err}"))?;
        Ok(Self {
            enigo: RefCell::new(enigo),
        })
    }

    fn key(&self, key: Key, direction: Direction) -> Result<()> {
        self.enigo
            .borrow_mut()
            .key(enigo_key(key), direction)
            .map_err(|err| anyhow!("send key {key:?}: {err}"))
    }
}

fn enigo_key(key: Key) -> enigo::Key {
    match key {
        Key::Tab => enigo::Key::Tab,
        Key::Control => enigo::Key::Control,
        Key::Char(ch) => enigo::Key::Unicode(ch),
    }
}

impl Host for Desktop {
    fn click(&self, at: Point) -> Result<()> {
        let mut enigo = self.enigo.borrow_mut();
        enigo
            .move_mouse(at.x, at.y, Coordinate::Abs)
            .map_err(|err| anyhow!("move pointer to {at}: {err}"))?;
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(|err| anyhow!("click at {at}: {err}"))
    }

    fn press(&self, key: Key) -> Result<()> {
        self.key(key, Direction::Click)
    }

    fn chord(&self, modifier: Key, key: Key) -> Result<()> {
        self.key(modifier, Direction::Press)?;
        let pressed = self.key(key, Direction::Click);
        self.key(modifier, Direction::Release)?;
        pressed
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.enigo
            .borrow_mut()
            .text(text)
            .map_err(|err| anyhow!("type text: {err}"))
    }

    fn set_clipboard(&self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("open clipboard")?;
        clipboard.set_text(text).context("write clipboard")
    }

    fn locate(&self, template: &Path, confidence: Option<f32>) -> Result<Option<Point>> {
        let needle = image::open(template)
            .with_context(|| format!("decode template {}", template.display()))?
            .to_rgba8();
        let monitors = xcap::Monitor::all()
            .map_err(|err| anyhow!("enumerate monitors: {err}"))?;

        for monitor in &monitors {
            let origin_x = monitor
                .x()
                .map_err(|err| anyhow!("read monitor x: {err}"))?;
            let origin_y = monitor
                .y()
                .map_err(|err| anyhow!("read monitor y: {err}"))?;
            let screen = monitor
                .capture_image()
                .map_err(|err| anyhow!("capture screen: {err}"))?;
            trace!(
                width = screen.width(),
                height = screen.height(),
                "captured monitor"
            );
            if let Some((x, y)) = find_template(&screen, &needle, confidence) {
                let center = center_of(origin_x, origin_y, x, y, &needle);
                debug!(template = %template.display(), %center, "template matched");
                return Ok(Some(center));
            }
        }
        Ok(None)
    }

    fn supports_confidence(&self) -> bool {
        cfg!(feature = "confidence-matching")
    }

    fn pointer(&self) -> Result<Point> {
        let (x, y) = self
            .enigo
            .borrow()
            .location()
            .map_err(|err| anyhow!("read pointer location: {err}"))?;
        Ok(Point::new(x, y))
    }
}

#[allow(clippy::cast_possible_wrap)]
fn center_of(origin_x: i32, origin_y: i32, x: u32, y: u32, needle: &RgbaImage) -> Point {
    Point::new(
        origin_x + (x + needle.width() / 2) as i32,
        origin_y + (y + needle.height() / 2) as i32,
    )
}

/// Top-left corner of the best match of `needle` in `screen`.
///
/// With a confidence the score is normalized cross-correlation on grayscale;
/// without one every pixel must match exactly.
pub fn find_template(
    screen: &RgbaImage,
    needle: &RgbaImage,
    confidence: Option<f32>,
) -> Option<(u32, u32)> {
    if needle.width() == 0
        || needle.height() == 0
        || needle.width() > screen.width()
        || needle.height() > screen.height()
    {
        return None;
    }
    match confidence {
        #[cfg(feature = "confidence-matching")]
        Some(threshold) => correlate(screen, needle, threshold),
        _ => exact_match(screen, needle),
    }
}

/// Coarse candidates kept for the full-resolution pass.
#[cfg(feature = "confidence-matching")]
const CANDIDATES: usize = 8;

/// Downscale factor for the coarse pass; small templates need fewer steps.
#[cfg(feature = "confidence-matching")]
fn coarse_factor(needle: &RgbaImage) -> u32 {
    (needle.width().min(needle.height()) / 6).clamp(1, 4)
}

/// Normalized cross-correlation, searched coarse-to-fine.
///
/// A downscaled pass ranks positions by normalized squared error, then the
/// best few are re-scored at full resolution in small windows around them.
#[cfg(feature = "confidence-matching")]
fn correlate(screen: &RgbaImage, needle: &RgbaImage, threshold: f32) -> Option<(u32, u32)> {
    use image::GrayImage;
    use image::imageops::{FilterType, crop_imm, grayscale, resize};
    use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};

    let screen = grayscale(screen);
    let needle_gray = grayscale(needle);
    let factor = coarse_factor(needle);
    if factor == 1 {
        let scores = match_template(
            &screen,
            &needle_gray,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&scores);
        trace!(best = extremes.max_value, threshold, "correlation score");
        return (extremes.max_value >= threshold).then_some(extremes.max_value_location);
    }

    let shrink = |image: &GrayImage| {
        let width = (image.width() / factor).max(1);
        let height = (image.height() / factor).max(1);
        resize(image, width, height, FilterType::Triangle)
    };
    let coarse_needle = shrink(&needle_gray);
    let errors = match_template(
        &shrink(&screen),
        &coarse_needle,
        MatchTemplateMethod::SumOfSquaredErrorsNormalized,
    );
    let candidates = best_positions(
        &errors,
        (coarse_needle.width() / 2).max(1),
        (coarse_needle.height() / 2).max(1),
    );

    let (width, height) = needle.dimensions();
    let margin = 2 * factor;
    let mut best: Option<(f32, (u32, u32))> = None;
    for (cx, cy) in candidates {
        let x = (cx * factor).min(screen.width() - width);
        let y = (cy * factor).min(screen.height() - height);
        let left = x.saturating_sub(margin);
        let top = y.saturating_sub(margin);
        let right = (x + width + margin).min(screen.width());
        let bottom = (y + height + margin).min(screen.height());
        let window = crop_imm(&screen, left, top, right - left, bottom - top).to_image();
        let scores = match_template(
            &window,
            &needle_gray,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&scores);
        let (dx, dy) = extremes.max_value_location;
        if best.is_none_or(|(score, _)| extremes.max_value > score) {
            best = Some((extremes.max_value, (left + dx, top + dy)));
        }
    }

    let (score, at) = best?;
    trace!(best = score, threshold, factor, "correlation score");
    (score >= threshold).then_some(at)
}

/// Lowest-error coarse positions, at most one per template-sized neighborhood.
#[cfg(feature = "confidence-matching")]
fn best_positions(
    errors: &imageproc::definitions::Image<image::Luma<f32>>,
    radius_x: u32,
    radius_y: u32,
) -> Vec<(u32, u32)> {
    const SHORTLIST: usize = 512;

    let mut ranked: Vec<(f32, u32, u32)> = errors
        .enumerate_pixels()
        .filter(|(_, _, error)| error.0[0].is_finite())
        .map(|(x, y, error)| (error.0[0], x, y))
        .collect();
    if ranked.len() > SHORTLIST {
        ranked.select_nth_unstable_by(SHORTLIST, |a, b| a.0.total_cmp(&b.0));
        ranked.truncate(SHORTLIST);
    }
    ranked.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut picked: Vec<(u32, u32)> = Vec::with_capacity(CANDIDATES);
    for (_, x, y) in ranked {
        let near = picked
            .iter()
            .any(|&(px, py)| x.abs_diff(px) <= radius_x && y.abs_diff(py) <= radius_y);
        if !near {
            picked.push((x, y));
            if picked.len() == CANDIDATES {
                break;
            }
        }
    }
    picked
}

fn exact_match(screen: &RgbaImage, needle: &RgbaImage) -> Option<(u32, u32)> {
    let last_x = screen.width() - needle.width();
    let last_y = screen.height() - needle.height();
    (0..=last_y)
        .flat_map(|y| (0..=last_x).map(move |x| (x, y)))
        .find(|&(x, y)| {
            needle.enumerate_pixels().all(|(dx, dy, pixel)| {
                let found = screen.get_pixel(x + dx, y + dy);
                found.0[..3] == pixel.0[..3]
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use image::imageops::crop_imm;

    fn textured(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let value = ((x * 37 + y * 91 + x * y * 13) % 251) as u8;
            Rgba([value, value.wrapping_mul(3), value.wrapping_add(40), 255])
        })
    }

    #[test]
    fn exact_match_finds_cropped_region() {
        let screen = textured(40, 30);
        let needle = crop_imm(&screen, 11, 6, 5, 4).to_image();
        assert_eq!(find_template(&screen, &needle, None), Some((11, 6)));
    }

    #[test]
    fn exact_match_misses_altered_region() {
        let screen = textured(20, 20);
        let mut needle = crop_imm(&screen, 3, 3, 4, 4).to_image();
        needle.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        needle.put_pixel(1, 0, Rgba([250, 2, 3, 255]));
        assert_eq!(find_template(&screen, &needle, None), None);
    }

    #[test]
    fn oversized_template_never_matches() {
        let screen = textured(8, 8);
        let needle = textured(9, 2);
        assert_eq!(find_template(&screen, &needle, Some(0.5)), None);
    }

    #[test]
    fn center_includes_monitor_origin() {
        let needle = textured(10, 4);
        assert_eq!(center_of(1920, 0, 100, 50, &needle), Point::new(2025, 52));
    }

    /// Low-frequency pattern that survives downscaling without repeating.
    #[cfg(feature = "confidence-matching")]
    fn smooth(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let (fx, fy) = (x as f32, y as f32);
            let value = 128.0
                + 60.0 * (fx / 23.0).sin()
                + 50.0 * (fy / 17.0).cos()
                + 30.0 * ((fx + fy) / 41.0).sin()
                + 20.0 * ((fx * fx + 3.0 * fy * fy) / 9000.0).sin();
            let gray = value.clamp(0.0, 255.0) as u8;
            Rgba([gray, gray, gray, 255])
        })
    }

    #[cfg(feature = "confidence-matching")]
    #[test]
    fn coarse_pass_finds_unaligned_region() {
        let screen = smooth(400, 300);
        let needle = crop_imm(&screen, 211, 123, 64, 32).to_image();
        assert_eq!(coarse_factor(&needle), 4);
        assert_eq!(find_template(&screen, &needle, Some(0.9)), Some((211, 123)));
    }

    #[cfg(feature = "confidence-matching")]
    #[test]
    fn coarse_pass_finds_region_at_screen_edge() {
        let screen = smooth(301, 203);
        let needle = crop_imm(&screen, 241, 171, 60, 32).to_image();
        assert_eq!(find_template(&screen, &needle, Some(0.9)), Some((241, 171)));
    }

    #[cfg(feature = "confidence-matching")]
    #[test]
    fn candidates_are_spread_out() {
        let errors = imageproc::definitions::Image::from_fn(20, 20, |x, y| {
            image::Luma([(x.abs_diff(5) + y.abs_diff(5)) as f32])
        });
        let picked = best_positions(&errors, 3, 3);
        assert_eq!(picked[0], (5, 5));
        assert_eq!(picked.len(), CANDIDATES);
        for (index, &(x, y)) in picked.iter().enumerate() {
            for &(px, py) in &picked[..index] {
                assert!(x.abs_diff(px) > 3 || y.abs_diff(py) > 3);
            }
        }
    }

    #[cfg(all(feature = "confidence-matching", not(debug_assertions)))]
    #[test]
    fn full_hd_lookup_fits_in_a_poll_interval() {
        use std::time::{Duration, Instant};

        let screen = smooth(1920, 1080);
        let needle = crop_imm(&screen, 1337, 742, 120, 48).to_image();

        let started = Instant::now();
        let found = find_template(&screen, &needle, Some(0.9));
        let took = started.elapsed();

        assert_eq!(found, Some((1337, 742)));
        assert!(took < Duration::from_millis(300), "lookup took {took:?}");
    }

    #[cfg(feature = "confidence-matching")]
    #[test]
    fn correlation_finds_region_above_threshold() {
        let screen = textured(48, 32);
        let needle = crop_imm(&screen, 20, 9, 8, 6).to_image();
        assert_eq!(find_template(&screen, &needle, Some(0.99)), Some((20, 9)));
    }
}
