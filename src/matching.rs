//! Scale-aware template matching
//!
//! Instances render at different effective resolutions, so the template
//! is rescaled by the ratio between the captured frame and the base
//! resolution the templates were authored at before correlation.
//! Without that correction, matching degrades whenever a window's
//! rendered size differs from the template's origin size.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use crate::capture::Frame;
use crate::template::Template;

/// A confidence-scored match location in capture space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateHit {
    /// Center of the matched template, not its top-left corner
    pub point: (u32, u32),
    /// Normalized correlation score; [0, 1] in practice
    pub confidence: f32,
}

/// Per-attempt diagnostics handed to an injected observer
#[derive(Debug)]
pub struct MatchReport<'a> {
    pub template: &'a str,
    pub scale: f32,
    pub confidence: f32,
    /// Top-left corner of the best placement
    pub location: (u32, u32),
}

/// Optional side-channel for match diagnostics (score dumps, debug
/// imagery). Injected so the match path itself stays pure.
pub type MatchObserver = Box<dyn Fn(&MatchReport<'_>) + Send + Sync>;

/// Normalized cross-correlation matcher with resolution correction
pub struct MatchEngine {
    base_width: u32,
    base_height: u32,
    observer: Option<MatchObserver>,
}

impl MatchEngine {
    /// `base_width`/`base_height` is the canonical capture size the
    /// templates were authored at.
    pub fn new(base_width: u32, base_height: u32) -> Self {
        Self {
            base_width,
            base_height,
            observer: None,
        }
    }

    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: Fn(&MatchReport<'_>) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Find the template in the frame.
    ///
    /// Returns the best placement's center and score when the score
    /// reaches `threshold` (inclusive), `None` otherwise. A template
    /// larger than the frame in either axis returns `None` without
    /// running any correlation.
    pub fn find(&self, frame: &Frame, template: &Template, threshold: f32) -> Option<TemplateHit> {
        let frame_gray = DynamicImage::ImageRgb8(frame.to_rgb_image()).to_luma8();
        let template_gray = DynamicImage::ImageRgb8(template.image.clone()).to_luma8();

        // No valid placement exists; skip the correlation entirely.
        if template_gray.width() > frame_gray.width()
            || template_gray.height() > frame_gray.height()
        {
            log::debug!(
                "template '{}' ({}x{}) larger than frame ({}x{}), skipping",
                template.name,
                template_gray.width(),
                template_gray.height(),
                frame_gray.width(),
                frame_gray.height()
            );
            return None;
        }

        let scale = (frame_gray.width() as f32 / self.base_width as f32)
            .min(frame_gray.height() as f32 / self.base_height as f32);

        let new_width = ((template_gray.width() as f32 * scale) as u32).max(1);
        let new_height = ((template_gray.height() as f32 * scale) as u32).max(1);

        // Area interpolation when shrinking, linear when enlarging
        let scaled = if scale < 1.0 {
            imageops::thumbnail(&template_gray, new_width, new_height)
        } else {
            imageops::resize(&template_gray, new_width, new_height, FilterType::Triangle)
        };

        // Rescaling can push the template past the frame bounds
        if scaled.width() > frame_gray.width() || scaled.height() > frame_gray.height() {
            log::debug!(
                "template '{}' exceeds frame after x{:.3} rescale, skipping",
                template.name,
                scale
            );
            return None;
        }

        let frame_norm = stretch_contrast(&frame_gray);
        let scaled_norm = stretch_contrast(&scaled);

        let scores = match_template(
            &frame_norm,
            &scaled_norm,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let (confidence, location) = best_score(&scores);

        if let Some(observer) = &self.observer {
            observer(&MatchReport {
                template: &template.name,
                scale,
                confidence,
                location,
            });
        }

        if confidence >= threshold {
            Some(TemplateHit {
                point: (location.0 + scaled.width() / 2, location.1 + scaled.height() / 2),
                confidence,
            })
        } else {
            None
        }
    }
}

/// Best finite score and its top-left placement.
///
/// A fully dark patch makes the normalized correlation 0/0, so those
/// placements score NaN and must be skipped rather than compared.
fn best_score(scores: &ImageBuffer<Luma<f32>, Vec<f32>>) -> (f32, (u32, u32)) {
    let mut best = f32::NEG_INFINITY;
    let mut location = (0, 0);
    for (x, y, p) in scores.enumerate_pixels() {
        let v = p.0[0];
        if v.is_finite() && v > best {
            best = v;
            location = (x, y);
        }
    }
    (best, location)
}

/// Stretch intensities to the full [0, 255] range, reducing sensitivity
/// to brightness/contrast drift between captures.
fn stretch_contrast(img: &GrayImage) -> GrayImage {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for p in img.pixels() {
        min = min.min(p.0[0]);
        max = max.max(p.0[0]);
    }

    if min == 0 && max == 255 || min >= max {
        return img.clone();
    }

    let range = (max - min) as u32;
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = ((p.0[0] - min) as u32 * 255 / range) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateRole;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn frame_with_square(w: u32, h: u32, x: u32, y: u32, size: u32) -> Frame {
        let mut img = RgbImage::from_pixel(w, h, Rgb([0, 0, 0]));
        for dy in 0..size {
            for dx in 0..size {
                img.put_pixel(x + dx, y + dy, Rgb([255, 255, 255]));
            }
        }
        Frame::from(img)
    }

    fn white_template(size: u32) -> Template {
        Template {
            name: "white".to_string(),
            role: TemplateRole::Action,
            image: RgbImage::from_pixel(size, size, Rgb([255, 255, 255])),
        }
    }

    #[test]
    fn test_oversized_template_skips_correlation() {
        // The observer fires once per correlation attempt, so a zero
        // count shows the guard short-circuited.
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut engine = MatchEngine::new(10, 10);
        let a = attempts.clone();
        engine.set_observer(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        let frame = frame_with_square(10, 10, 0, 0, 2);
        let template = white_template(20);
        assert!(engine.find(&frame, &template, 0.0).is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scale_scenario_960x540_to_1920x1080() {
        // 64x64 template at base 960x540, frame 1920x1080: scale 2.0,
        // resized template 128x128, match at (800,400) centers at (864,464).
        let engine = MatchEngine::new(960, 540);
        let frame = frame_with_square(1920, 1080, 800, 400, 128);
        let template = white_template(64);

        let hit = engine.find(&frame, &template, 0.8).expect("should match");
        assert_eq!(hit.point, (864, 464));
        assert!(hit.confidence > 0.99, "confidence {}", hit.confidence);
    }

    #[test]
    fn test_shrinking_scale() {
        // Frame at half the base resolution: 64x64 template becomes 32x32
        let engine = MatchEngine::new(960, 540);
        let frame = frame_with_square(480, 270, 100, 50, 32);
        let template = white_template(64);

        let hit = engine.find(&frame, &template, 0.8).expect("should match");
        assert_eq!(hit.point, (116, 66));
    }

    #[test]
    fn test_threshold_is_inclusive_and_monotonic() {
        let engine = MatchEngine::new(160, 90);
        let frame = frame_with_square(320, 180, 80, 40, 32);
        let template = white_template(16);

        let strict = engine.find(&frame, &template, 0.9).expect("match at 0.9");
        let relaxed = engine.find(&frame, &template, 0.1).expect("match at 0.1");
        assert_eq!(strict.point, relaxed.point);
        assert_eq!(strict.confidence, relaxed.confidence);

        // Exactly at the winning score still matches (>=, not >)
        let at_score = engine.find(&frame, &template, strict.confidence);
        assert!(at_score.is_some());
    }

    #[test]
    fn test_template_equal_to_frame_single_placement() {
        let engine = MatchEngine::new(32, 32);
        let mut img = RgbImage::new(32, 32);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let v = (((x / 4) + (y / 4)) % 2 * 255) as u8;
            *p = Rgb([v, v, v]);
        }
        let frame = Frame::from(img.clone());
        let template = Template {
            name: "full".to_string(),
            role: TemplateRole::Terminal,
            image: img,
        };

        let hit = engine.find(&frame, &template, 0.95).expect("should match");
        assert_eq!(hit.point, (16, 16));
        assert!(hit.confidence > 0.99);

        // Still subject to the threshold
        assert!(engine.find(&frame, &template, 1.1).is_none());
    }

    #[test]
    fn test_no_match_below_threshold() {
        let engine = MatchEngine::new(100, 100);
        // Smooth horizontal ramp, template is a fine checkerboard
        let mut ramp = RgbImage::new(100, 100);
        for (x, _, p) in ramp.enumerate_pixels_mut() {
            let v = (x * 255 / 99) as u8;
            *p = Rgb([v, v, v]);
        }
        let frame = Frame::from(ramp);
        let mut img = RgbImage::new(16, 16);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let v = ((x + y) % 2 * 255) as u8;
            *p = Rgb([v, v, v]);
        }
        let template = Template {
            name: "checker".to_string(),
            role: TemplateRole::Action,
            image: img,
        };

        assert!(engine.find(&frame, &template, 0.8).is_none());
    }

    #[test]
    fn test_observer_receives_report() {
        let mut engine = MatchEngine::new(160, 90);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        engine.set_observer(move |report| {
            s.lock().push((report.template.to_string(), report.scale, report.confidence));
        });

        let frame = frame_with_square(320, 180, 100, 60, 32);
        let template = white_template(16);
        engine.find(&frame, &template, 0.8);

        let reports = seen.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "white");
        assert_eq!(reports[0].1, 2.0);
    }

    #[test]
    fn test_best_score_skips_nan() {
        // (0,0) scoring NaN must not shadow the real maximum
        let mut scores = ImageBuffer::from_pixel(2, 1, Luma([f32::NAN]));
        scores.put_pixel(1, 0, Luma([0.5f32]));
        assert_eq!(best_score(&scores), (0.5, (1, 0)));
    }

    #[test]
    fn test_stretch_contrast() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, image::Luma([100]));
        img.put_pixel(1, 0, image::Luma([150]));
        img.put_pixel(0, 1, image::Luma([200]));
        img.put_pixel(1, 1, image::Luma([100]));

        let stretched = stretch_contrast(&img);
        assert_eq!(stretched.get_pixel(0, 0).0[0], 0);
        assert_eq!(stretched.get_pixel(0, 1).0[0], 255);
        assert_eq!(stretched.get_pixel(1, 0).0[0], 127);

        // Flat image is left alone
        let flat = GrayImage::from_pixel(2, 2, image::Luma([77]));
        assert_eq!(stretch_contrast(&flat).get_pixel(0, 0).0[0], 77);
    }
}
