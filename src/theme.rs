use crate::color::{self, ColorError, ColorVariants, Rgb};
use crate::model::{DEFAULT_ACCENT_HEX, DEFAULT_HOVER_HEX, DEFAULT_PRIMARY_HEX, Settings};
use image::DynamicImage;

pub const PRESETS: &[(&str, &str)] = &[
    ("#4caf50", "Default Green"),
    ("#2e7d32", "Dark Green"),
    ("#81c784", "Light Green"),
    ("#2196f3", "Blue"),
    ("#1976d2", "Dark Blue"),
    ("#64b5f6", "Light Blue"),
    ("#9c27b0", "Purple"),
    ("#7b1fa2", "Dark Purple"),
    ("#ba68c8", "Light Purple"),
    ("#f44336", "Red"),
    ("#d32f2f", "Dark Red"),
    ("#ef5350", "Light Red"),
    ("#ff9800", "Orange"),
    ("#f57c00", "Dark Orange"),
    ("#ffb74d", "Light Orange"),
    ("#607d8b", "Blue Gray"),
    ("#455a64", "Dark Gray"),
    ("#90a4ae", "Light Gray"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTheme {
    pub primary: Rgb,
    pub hover: Rgb,
    pub accent: Rgb,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            primary: hex_or(DEFAULT_PRIMARY_HEX, color::FALLBACK_GREEN),
            hover: hex_or(DEFAULT_HOVER_HEX, color::FALLBACK_GREEN),
            accent: hex_or(DEFAULT_ACCENT_HEX, color::FALLBACK_GREEN),
        }
    }
}

impl ColorTheme {
    pub fn from_primary(primary: Rgb) -> Self {
        Self {
            primary,
            hover: primary.lighter(120),
            accent: primary.lighter(140),
        }
    }

    pub fn variants(&self) -> ColorVariants {
        color::color_variants(self.primary)
    }
}

fn hex_or(value: &str, fallback: Rgb) -> Rgb {
    Rgb::from_hex(value).unwrap_or_else(|err| {
        log::warn!("ignoring stored color: {err}");
        fallback
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeState {
    pub theme: ColorTheme,
    pub auto_from_album: bool,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self {
            theme: ColorTheme::default(),
            auto_from_album: true,
        }
    }
}

impl ThemeState {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = ColorTheme::default();
        Self {
            theme: ColorTheme {
                primary: hex_or(&settings.primary_color, defaults.primary),
                hover: hex_or(&settings.hover_color, defaults.hover),
                accent: hex_or(&settings.accent_color, defaults.accent),
            },
            auto_from_album: settings.auto_color_from_album,
        }
    }

    pub fn write_to(&self, settings: &mut Settings) {
        settings.primary_color = self.theme.primary.to_hex();
        settings.hover_color = self.theme.hover.to_hex();
        settings.accent_color = self.theme.accent.to_hex();
        settings.auto_color_from_album = self.auto_from_album;
    }

    pub fn apply_album_art(&mut self, image: Option<&DynamicImage>) -> bool {
        if !self.auto_from_album {
            return false;
        }
        let next = ColorTheme::from_primary(color::dominant_color(image));
        let changed = next != self.theme;
        self.theme = next;
        changed
    }

    pub fn set_auto(&mut self, enabled: bool, current_art: Option<&DynamicImage>) {
        self.auto_from_album = enabled;
        if enabled {
            self.apply_album_art(current_art);
        }
    }

    pub fn set_custom(&mut self, primary: Rgb) {
        self.auto_from_album = false;
        self.theme = ColorTheme::from_primary(primary);
    }

    pub fn set_custom_hex(&mut self, value: &str) -> Result<Rgb, ColorError> {
        let primary = Rgb::from_hex(value)?;
        self.set_custom(primary);
        Ok(primary)
    }

    pub fn apply_preset(&mut self, index: usize) -> Option<&'static str> {
        let (hex, name) = PRESETS.get(index.checked_sub(1)?)?;
        let primary = Rgb::from_hex(hex).ok()?;
        self.set_custom(primary);
        Some(*name)
    }

    pub fn reset(&mut self) {
        self.auto_from_album = false;
        self.theme = ColorTheme::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn solid(rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(60, 60, image::Rgb(rgb)))
    }

    #[test]
    fn presets_parse() {
        assert_eq!(PRESETS.len(), 18);
        for (hex, _) in PRESETS {
            assert!(Rgb::from_hex(hex).is_ok(), "bad preset {hex}");
        }
    }

    #[test]
    fn derived_theme_is_lighter() {
        let base = Rgb::new(0x20, 0x40, 0x80);
        let theme = ColorTheme::from_primary(base);
        assert_eq!(theme.primary, base);
        assert!(theme.hover.brightness() > base.brightness());
        assert!(theme.accent.brightness() > theme.hover.brightness());
    }

    #[test]
    fn album_art_only_applies_in_auto_mode() {
        let mut state = ThemeState::default();
        assert!(state.apply_album_art(Some(&solid([150, 0, 0]))));
        let reddish = state.theme.primary;
        assert!(reddish.r > reddish.g && reddish.r > reddish.b);

        state.set_custom(Rgb::new(0, 0, 200));
        assert!(!state.auto_from_album);
        assert!(!state.apply_album_art(Some(&solid([0, 150, 0]))));
        assert_eq!(state.theme.primary, Rgb::new(0, 0, 200));
    }

    #[test]
    fn missing_art_falls_back_to_green() {
        let mut state = ThemeState::default();
        state.apply_album_art(None);
        assert_eq!(state.theme.primary, color::FALLBACK_GREEN);
    }

    #[test]
    fn enabling_auto_recolors_from_current_art() {
        let mut state = ThemeState::default();
        state.reset();
        state.set_auto(true, Some(&solid([150, 0, 0])));
        assert!(state.auto_from_album);
        assert_ne!(state.theme, ColorTheme::default());
    }

    #[test]
    fn presets_are_one_based() {
        let mut state = ThemeState::default();
        assert_eq!(state.apply_preset(0), None);
        assert_eq!(state.apply_preset(19), None);
        assert_eq!(state.apply_preset(4), Some("Blue"));
        assert_eq!(state.theme.primary.to_hex(), "#2196f3");
    }

    #[test]
    fn settings_round_trip_and_bad_hex() {
        let mut state = ThemeState::default();
        assert!(state.set_custom_hex("nope").is_err());
        state.set_custom_hex("#ff6b6b").expect("valid hex");

        let mut settings = Settings::default();
        state.write_to(&mut settings);
        assert_eq!(settings.primary_color, "#ff6b6b");
        assert!(!settings.auto_color_from_album);
        assert_eq!(ThemeState::from_settings(&settings), state);

        settings.hover_color = String::from("garbage");
        let restored = ThemeState::from_settings(&settings);
        assert_eq!(restored.theme.hover, ColorTheme::default().hover);
    }

    #[test]
    fn reset_restores_default_palette() {
        let mut state = ThemeState::default();
        state.set_custom(Rgb::new(1, 2, 3));
        state.reset();
        assert_eq!(state.theme.primary.to_hex(), DEFAULT_PRIMARY_HEX);
        assert_eq!(state.theme.hover.to_hex(), DEFAULT_HOVER_HEX);
        assert_eq!(state.theme.accent.to_hex(), DEFAULT_ACCENT_HEX);
    }
}
