use barscope::{GradientOptions, Options};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analyzer: Options,
    /// Extra gradients, registered before `analyzer.gradient` is applied.
    #[serde(default)]
    pub gradients: BTreeMap<String, GradientOptions>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
        }
    }
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 540 }
fn default_fps() -> u32 { 30 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// `barscope.toml` in the working directory, then the per-user config file.
pub fn discover() -> Option<std::path::PathBuf> {
    let local = std::path::PathBuf::from("barscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("barscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("barscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.output.width, 1280);
        assert_eq!(config.analyzer, Options::default());
        assert!(config.gradients.is_empty());
    }

    #[test]
    fn sections_are_parsed() {
        let config: Config = toml::from_str(
            r##"
            [output]
            fps = 60

            [analyzer]
            mode = 3
            gradient = "sunset"
            show_leds = true

            [gradients.sunset]
            bgColor = "#201"
            colorStops = ["#f80", { pos = 0.7, color = "#f08" }, "#408"]
            "##,
        )
        .unwrap();
        assert_eq!(config.output.fps, 60);
        assert_eq!(config.output.codec, "libx264");
        assert_eq!(config.analyzer.mode, 3);
        assert!(config.analyzer.show_leds);
        let sunset = &config.gradients["sunset"];
        assert_eq!(sunset.color_stops.len(), 3);
    }
}
