use image::{DynamicImage, GenericImageView};
use image::imageops::FilterType;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub const FALLBACK_GREEN: Rgb = Rgb::new(0x1d, 0xb9, 0x54);

const SAMPLE_SIZE: u32 = 50;
const BUCKET_WIDTH: u8 = 10;
const MIN_BRIGHTNESS: f64 = 0.15;
const MAX_BRIGHTNESS: f64 = 0.9;
const MIN_SATURATION: f64 = 0.3;
const SATURATION_BOOST: f64 = 1.3;
const MIN_VALUE: f64 = 0.5;
const MAX_VALUE: f64 = 0.7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("color must look like #rrggbb, got {0:?}")]
    InvalidHex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(value: &str) -> Result<Self, ColorError> {
        let digits = value.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(value.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ColorError::InvalidHex(value.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn brightness(self) -> f64 {
        (0.299 * f64::from(self.r) + 0.587 * f64::from(self.g) + 0.114 * f64::from(self.b))
            / 255.0
    }

    pub fn to_hsv(self) -> (f64, f64, f64) {
        rgb_to_hsv(
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        )
    }

    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let (r, g, b) = hsv_to_rgb(h, s, v);
        Self::new(unit_to_channel(r), unit_to_channel(g), unit_to_channel(b))
    }

    /// Lightens by `factor` percent the way Qt's `QColor::lighter` does:
    /// value is scaled, and any overflow past full value is taken out of
    /// saturation instead.
    pub fn lighter(self, factor: u32) -> Self {
        let (h, s, v) = self.to_hsv();
        let mut sat = (s * 255.0).round() as i64;
        let mut val = ((v * 255.0).round() as i64 * i64::from(factor)) / 100;
        if val > 255 {
            sat -= val - 255;
            sat = sat.max(0);
            val = 255;
        }
        Self::from_hsv(h, sat as f64 / 255.0, val as f64 / 255.0)
    }

    pub fn scaled(self, factor: f64) -> Self {
        let scale = |channel: u8| (f64::from(channel) * factor).clamp(0.0, 255.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorVariants {
    pub hover: Rgb,
    pub pressed: Rgb,
    pub light: Rgb,
    pub dark: Rgb,
}

pub fn color_variants(base: Rgb) -> ColorVariants {
    ColorVariants {
        hover: base.scaled(1.2),
        pressed: base.scaled(0.8),
        light: base.scaled(1.4),
        dark: base.scaled(0.6),
    }
}

pub fn dominant_color(image: Option<&DynamicImage>) -> Rgb {
    let Some(image) = image else {
        log::debug!("no album art for color extraction, using fallback");
        return FALLBACK_GREEN;
    };

    if image.width() == 0 || image.height() == 0 {
        return FALLBACK_GREEN;
    }

    let sample = image
        .resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
        .to_rgb8();

    let mut counts: HashMap<Rgb, (usize, usize)> = HashMap::new();
    for (order, pixel) in sample.pixels().enumerate() {
        let color = Rgb::new(pixel.0[0], pixel.0[1], pixel.0[2]);
        if !qualifies(color) {
            continue;
        }
        let bucket = Rgb::new(
            color.r / BUCKET_WIDTH * BUCKET_WIDTH,
            color.g / BUCKET_WIDTH * BUCKET_WIDTH,
            color.b / BUCKET_WIDTH * BUCKET_WIDTH,
        );
        counts.entry(bucket).or_insert((0, order)).0 += 1;
    }

    let Some(winner) = counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(bucket, _)| bucket)
    else {
        log::debug!("album art has no vivid pixels, using fallback");
        return FALLBACK_GREEN;
    };

    boost_for_ui(winner)
}

fn qualifies(color: Rgb) -> bool {
    let brightness = color.brightness();
    let (_, saturation, _) = color.to_hsv();
    brightness > MIN_BRIGHTNESS && brightness < MAX_BRIGHTNESS && saturation > MIN_SATURATION
}

fn boost_for_ui(color: Rgb) -> Rgb {
    let (h, s, v) = color.to_hsv();
    let s = (s * SATURATION_BOOST).min(1.0);
    let v = v.clamp(MIN_VALUE, MAX_VALUE);
    Rgb::from_hsv(h, s, v)
}

fn unit_to_channel(value: f64) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}

pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    if max == min {
        return (0.0, 0.0, v);
    }

    let delta = max - min;
    let s = delta / max;
    let rc = (max - r) / delta;
    let gc = (max - g) / delta;
    let bc = (max - b) / delta;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), s, v)
}

pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s <= 0.0 {
        return (v, v, v);
    }

    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
