//! Configuration file support.
//!
//! Loads settings from ~/.config/bramble/config.toml if it exists,
//! otherwise uses built-in defaults.
//!
//! Also provides `RuntimeConfig` - the resolved configuration record the
//! window manager consults on every operation, with hex color strings
//! turned into pixel values and modifier names turned into masks.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::types::{Strut, WindowType};

// =============================================================================
// Runtime Configuration (resolved values)
// =============================================================================

/// Resolved configuration record.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Outer border width of the frame window
    pub border_width: u32,
    /// Inner border between the frame edge and the client
    pub inner_width: u32,
    /// Title strip height
    pub title_height: u32,
    /// Bottom strip height (doubles as a resize handle)
    pub bottom_height: u32,
    /// Screen-edge gaps; rewritten whenever struts change
    pub gaps: Strut,
    /// Pointer button that moves a window when combined with `move_mask`
    pub move_button: u8,
    pub move_mask: u16,
    /// Pointer button that resizes a window when combined with `resize_mask`
    pub resize_button: u8,
    pub resize_mask: u16,
    /// Minimum milliseconds between processed drag motion events
    pub pointer_interval: u32,
    /// Maximum milliseconds between releases counting as a double-click
    pub double_click_interval: u32,
    /// Frame border colors
    pub border_focused: u32,
    pub border_unfocused: u32,
    /// Frame interior (title strip) colors
    pub inner_focused: u32,
    pub inner_unfocused: u32,
    /// Title text colors
    pub text_focused: u32,
    pub text_unfocused: u32,
    /// Decorate newly admitted windows
    pub decorate_new: bool,
    pub focus_follows_pointer: bool,
    pub warp_pointer: bool,
    /// Destroy decorations while fullscreen, recreate on exit
    pub fullscreen_removes_decorations: bool,
    /// Fill the monitor when entering fullscreen
    pub fullscreen_maximizes: bool,
    /// Occupancy-grid placement for new windows
    pub smart_place: bool,
    pub draw_titles: bool,
    pub title_center: bool,
    /// Which configurable window types are managed
    pub manage: [bool; 6],
    /// Number of workspaces
    pub workspaces: usize,
}

impl RuntimeConfig {
    pub fn manages(&self, kind: WindowType) -> bool {
        self.manage[kind as usize]
    }

    // Decoration metrics. A client's `geom` is always the inner rectangle;
    // these give the offsets and deltas its frame adds around it.

    pub fn left_width(&self, decorated: bool) -> i32 {
        if decorated {
            self.inner_width as i32
        } else {
            0
        }
    }

    pub fn top_height(&self, decorated: bool) -> i32 {
        if decorated {
            (self.title_height + self.inner_width) as i32
        } else {
            0
        }
    }

    pub fn dec_width(&self, decorated: bool) -> i32 {
        if decorated {
            2 * self.inner_width as i32
        } else {
            0
        }
    }

    pub fn dec_height(&self, decorated: bool) -> i32 {
        if decorated {
            (2 * self.inner_width + self.title_height + self.bottom_height) as i32
        } else {
            0
        }
    }

    /// `_NET_FRAME_EXTENTS` values: left, right, top, bottom
    pub fn frame_extents(&self, decorated: bool) -> [u32; 4] {
        if decorated {
            let border = self.border_width + self.inner_width;
            [
                border,
                border,
                border + self.title_height,
                border + self.bottom_height,
            ]
        } else {
            [0; 4]
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Config::default().resolve()
    }
}

/// A runtime-settable configuration field, addressed by a stable index in
/// the private reconfiguration client message (`data[0]` = index,
/// `data[1]` = value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    BorderWidth = 0,
    InnerWidth = 1,
    TitleHeight = 2,
    BottomHeight = 3,
    BorderFocused = 4,
    BorderUnfocused = 5,
    InnerFocused = 6,
    InnerUnfocused = 7,
}

impl ConfigField {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::BorderWidth),
            1 => Some(Self::InnerWidth),
            2 => Some(Self::TitleHeight),
            3 => Some(Self::BottomHeight),
            4 => Some(Self::BorderFocused),
            5 => Some(Self::BorderUnfocused),
            6 => Some(Self::InnerFocused),
            7 => Some(Self::InnerUnfocused),
            _ => None,
        }
    }

    pub fn apply(self, config: &mut RuntimeConfig, value: u32) {
        match self {
            Self::BorderWidth => config.border_width = value,
            Self::InnerWidth => config.inner_width = value,
            Self::TitleHeight => config.title_height = value,
            Self::BottomHeight => config.bottom_height = value,
            Self::BorderFocused => config.border_focused = value,
            Self::BorderUnfocused => config.border_unfocused = value,
            Self::InnerFocused => config.inner_focused = value,
            Self::InnerUnfocused => config.inner_unfocused = value,
        }
    }
}

// =============================================================================
// File-based Configuration (TOML parsing)
// =============================================================================

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub appearance: AppearanceConfig,
    pub colors: ColorConfig,
    pub behavior: BehaviorConfig,
    pub input: InputConfig,
    pub manage: ManageConfig,
    pub exec: ExecConfig,
    pub media: MediaConfig,
}

/// Appearance settings (widths, strips, initial gaps)
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub border_width: u32,
    pub inner_width: u32,
    pub title_height: u32,
    pub bottom_height: u32,
    pub top_gap: u32,
    pub bottom_gap: u32,
    pub left_gap: u32,
    pub right_gap: u32,
    pub draw_titles: bool,
    pub title_center: bool,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            border_width: 0,
            inner_width: 4,
            title_height: 28,
            bottom_height: 8,
            top_gap: 0,
            bottom_gap: 0,
            left_gap: 0,
            right_gap: 0,
            draw_titles: true,
            title_center: true,
        }
    }
}

/// Color settings (hex strings like "#868c22")
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub border_focused: String,
    pub border_unfocused: String,
    pub inner_focused: String,
    pub inner_unfocused: String,
    pub text_focused: String,
    pub text_unfocused: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            border_focused: "#000000".to_string(),
            border_unfocused: "#000000".to_string(),
            inner_focused: "#868c22".to_string(),
            inner_unfocused: "#353b3b".to_string(),
            text_focused: "#000000".to_string(),
            text_unfocused: "#dddddd".to_string(),
        }
    }
}

/// Behavior toggles
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub workspaces: usize,
    /// Workspace index -> monitor index; unlisted workspaces stay on
    /// monitor 0
    pub workspace_monitors: Vec<usize>,
    pub decorate_new: bool,
    pub focus_follows_pointer: bool,
    pub warp_pointer: bool,
    pub fullscreen_removes_decorations: bool,
    pub fullscreen_maximizes: bool,
    pub smart_place: bool,
    pub pointer_interval: u32,
    pub double_click_interval: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            workspaces: 4,
            workspace_monitors: Vec::new(),
            decorate_new: true,
            focus_follows_pointer: true,
            warp_pointer: false,
            fullscreen_removes_decorations: true,
            fullscreen_maximizes: true,
            smart_place: true,
            pointer_interval: 0,
            double_click_interval: 200,
        }
    }
}

/// Pointer bindings for the drag controller
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub move_button: u8,
    pub move_modifier: String,
    pub resize_button: u8,
    pub resize_modifier: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            move_button: 1,
            move_modifier: "mod4".to_string(),
            resize_button: 3,
            resize_modifier: "mod4".to_string(),
        }
    }
}

/// Which configurable window types become clients
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ManageConfig {
    pub dock: bool,
    pub dialog: bool,
    pub toolbar: bool,
    pub menu: bool,
    pub splash: bool,
    pub utility: bool,
}

impl Default for ManageConfig {
    fn default() -> Self {
        Self {
            dock: false,
            dialog: true,
            toolbar: false,
            menu: true,
            splash: false,
            utility: true,
        }
    }
}

/// Exec keybindings (key combo -> command to run)
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecConfig {
    #[serde(flatten)]
    pub bindings: HashMap<String, String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert("Mod4+Return".to_string(), "xterm".to_string());
        Self { bindings }
    }
}

/// Modifier-free launchers (media keys) and the Super-tap launcher
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MediaConfig {
    /// Command run when Super is tapped without any other key
    pub super_tap: Option<String>,
    /// Key name -> command, grabbed with no modifier
    #[serde(flatten)]
    pub bindings: HashMap<String, String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            super_tap: None,
            bindings: HashMap::new(),
        }
    }
}

impl Config {
    /// Load config from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Default config file path (~/.config/bramble/config.toml)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bramble")
            .join("config.toml")
    }

    /// Default autostart script path (~/.config/bramble/autostart)
    pub fn autostart_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bramble")
            .join("autostart")
    }

    /// Load config from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Resolve file values into the runtime record
    pub fn resolve(&self) -> RuntimeConfig {
        RuntimeConfig {
            border_width: self.appearance.border_width,
            inner_width: self.appearance.inner_width,
            title_height: self.appearance.title_height,
            bottom_height: self.appearance.bottom_height,
            gaps: Strut {
                left: self.appearance.left_gap,
                right: self.appearance.right_gap,
                top: self.appearance.top_gap,
                bottom: self.appearance.bottom_gap,
            },
            move_button: self.input.move_button,
            move_mask: parse_modifier(&self.input.move_modifier),
            resize_button: self.input.resize_button,
            resize_mask: parse_modifier(&self.input.resize_modifier),
            pointer_interval: self.behavior.pointer_interval,
            double_click_interval: self.behavior.double_click_interval,
            border_focused: parse_color(&self.colors.border_focused).unwrap_or(0x000000),
            border_unfocused: parse_color(&self.colors.border_unfocused).unwrap_or(0x000000),
            inner_focused: parse_color(&self.colors.inner_focused).unwrap_or(0x868c22),
            inner_unfocused: parse_color(&self.colors.inner_unfocused).unwrap_or(0x353b3b),
            text_focused: parse_color(&self.colors.text_focused).unwrap_or(0x000000),
            text_unfocused: parse_color(&self.colors.text_unfocused).unwrap_or(0xdddddd),
            decorate_new: self.behavior.decorate_new,
            focus_follows_pointer: self.behavior.focus_follows_pointer,
            warp_pointer: self.behavior.warp_pointer,
            fullscreen_removes_decorations: self.behavior.fullscreen_removes_decorations,
            fullscreen_maximizes: self.behavior.fullscreen_maximizes,
            smart_place: self.behavior.smart_place,
            draw_titles: self.appearance.draw_titles,
            title_center: self.appearance.title_center,
            manage: [
                self.manage.dock,
                self.manage.dialog,
                self.manage.toolbar,
                self.manage.menu,
                self.manage.splash,
                self.manage.utility,
            ],
            workspaces: self.behavior.workspaces.max(1),
        }
    }

    /// Parse the `[exec]` bindings into (keysym, modifiers) -> command
    pub fn parse_exec_bindings(&self) -> Vec<(ParsedBinding, String)> {
        let mut out = Vec::new();
        for (combo, command) in &self.exec.bindings {
            match parse_key_binding(combo) {
                Some(parsed) => out.push((parsed, command.clone())),
                None => log::warn!("Failed to parse exec keybinding: {}", combo),
            }
        }
        out
    }

    /// Parse the `[media]` bindings; these are grabbed without modifiers
    pub fn parse_media_bindings(&self) -> Vec<(u32, String)> {
        let mut out = Vec::new();
        for (key, command) in &self.media.bindings {
            match key_to_keysym(key) {
                Some(keysym) => out.push((keysym, command.clone())),
                None => log::warn!("Failed to parse media key: {}", key),
            }
        }
        out
    }
}

/// Parsed keybinding (ready for X11 grab)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedBinding {
    pub keysym: u32,
    pub modifiers: u16,
}

// X11 modifier masks
const SHIFT_MASK: u16 = 1;
const CONTROL_MASK: u16 = 4;
const MOD1_MASK: u16 = 8; // Alt
const MOD4_MASK: u16 = 64; // Super/Win

/// Parse a modifier name like "mod4" into its mask
pub fn parse_modifier(s: &str) -> u16 {
    match s.to_lowercase().as_str() {
        "mod4" | "super" | "win" => MOD4_MASK,
        "mod1" | "alt" => MOD1_MASK,
        "control" | "ctrl" => CONTROL_MASK,
        "shift" => SHIFT_MASK,
        "none" | "" => 0,
        other => {
            log::warn!("Unknown modifier: {}", other);
            0
        }
    }
}

/// Parse a key binding string like "Mod4+Shift+h" into keysym and modifiers
pub fn parse_key_binding(s: &str) -> Option<ParsedBinding> {
    let parts: Vec<&str> = s.split('+').collect();
    let key_part = parts.last()?;

    let mut modifiers: u16 = 0;
    for part in &parts[..parts.len() - 1] {
        modifiers |= parse_modifier(part);
    }

    let keysym = key_to_keysym(key_part)?;
    Some(ParsedBinding { keysym, modifiers })
}

/// Convert key name to X11 keysym
pub fn key_to_keysym(key: &str) -> Option<u32> {
    match key.to_lowercase().as_str() {
        "return" | "enter" => Some(0xff0d),
        "tab" => Some(0xff09),
        "escape" | "esc" => Some(0xff1b),
        "space" => Some(0x20),
        "backspace" => Some(0xff08),
        "delete" => Some(0xffff),
        "left" => Some(0xff51),
        "up" => Some(0xff52),
        "right" => Some(0xff53),
        "down" => Some(0xff54),
        "a" => Some(0x61),
        "b" => Some(0x62),
        "c" => Some(0x63),
        "d" => Some(0x64),
        "e" => Some(0x65),
        "f" => Some(0x66),
        "g" => Some(0x67),
        "h" => Some(0x68),
        "i" => Some(0x69),
        "j" => Some(0x6a),
        "k" => Some(0x6b),
        "l" => Some(0x6c),
        "m" => Some(0x6d),
        "n" => Some(0x6e),
        "o" => Some(0x6f),
        "p" => Some(0x70),
        "q" => Some(0x71),
        "r" => Some(0x72),
        "s" => Some(0x73),
        "t" => Some(0x74),
        "u" => Some(0x75),
        "v" => Some(0x76),
        "w" => Some(0x77),
        "x" => Some(0x78),
        "y" => Some(0x79),
        "z" => Some(0x7a),
        "0" => Some(0x30),
        "1" => Some(0x31),
        "2" => Some(0x32),
        "3" => Some(0x33),
        "4" => Some(0x34),
        "5" => Some(0x35),
        "6" => Some(0x36),
        "7" => Some(0x37),
        "8" => Some(0x38),
        "9" => Some(0x39),
        "f1" => Some(0xffbe),
        "f2" => Some(0xffbf),
        "f3" => Some(0xffc0),
        "f4" => Some(0xffc1),
        "f5" => Some(0xffc2),
        "f6" => Some(0xffc3),
        "f7" => Some(0xffc4),
        "f8" => Some(0xffc5),
        "f9" => Some(0xffc6),
        "f10" => Some(0xffc7),
        "f11" => Some(0xffc8),
        "f12" => Some(0xffc9),
        "xf86audiolowervolume" => Some(0x1008ff11),
        "xf86audiomute" => Some(0x1008ff12),
        "xf86audioraisevolume" => Some(0x1008ff13),
        _ => {
            log::warn!("Unknown key: {}", key);
            None
        }
    }
}

/// Parse hex color string (e.g., "#868c22" or "868c22") to u32
pub fn parse_color(s: &str) -> Option<u32> {
    let s = s.trim_start_matches('#');
    u32::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves() {
        let rc = Config::default().resolve();
        assert_eq!(rc.inner_width, 4);
        assert_eq!(rc.title_height, 28);
        assert!(rc.decorate_new);
        assert!(!rc.manages(WindowType::Dock));
        assert!(rc.manages(WindowType::Dialog));
        assert_eq!(rc.move_mask, 64);
    }

    #[test]
    fn parse_toml_overrides() {
        let toml_str = r##"
            [appearance]
            inner_width = 2
            title_height = 20

            [colors]
            inner_focused = "#ff0000"

            [behavior]
            workspaces = 9
            smart_place = false

            [manage]
            dock = true

            [exec]
            "Mod4+Return" = "kitty"
        "##;
        let config: Config = toml::from_str(toml_str).unwrap();
        let rc = config.resolve();
        assert_eq!(rc.inner_width, 2);
        assert_eq!(rc.title_height, 20);
        assert_eq!(rc.inner_focused, 0xff0000);
        assert_eq!(rc.workspaces, 9);
        assert!(!rc.smart_place);
        assert!(rc.manages(WindowType::Dock));

        let execs = config.parse_exec_bindings();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].0, ParsedBinding { keysym: 0xff0d, modifiers: 64 });
        assert_eq!(execs[0].1, "kitty");
    }

    #[test]
    fn frame_extents_track_decoration() {
        let mut rc = RuntimeConfig::default();
        rc.border_width = 1;
        rc.inner_width = 4;
        rc.title_height = 28;
        rc.bottom_height = 8;
        assert_eq!(rc.frame_extents(true), [5, 5, 33, 13]);
        assert_eq!(rc.frame_extents(false), [0, 0, 0, 0]);
        assert_eq!(rc.left_width(true), 4);
        assert_eq!(rc.top_height(true), 32);
        assert_eq!(rc.dec_width(true), 8);
        assert_eq!(rc.dec_height(true), 44);
        assert_eq!(rc.dec_height(false), 0);
    }

    #[test]
    fn config_field_indices_round_trip() {
        for index in 0..8 {
            let field = ConfigField::from_index(index).unwrap();
            assert_eq!(field as u32, index);
        }
        assert!(ConfigField::from_index(8).is_none());

        let mut rc = RuntimeConfig::default();
        ConfigField::InnerFocused.apply(&mut rc, 0xabcdef);
        assert_eq!(rc.inner_focused, 0xabcdef);
        ConfigField::BorderWidth.apply(&mut rc, 3);
        assert_eq!(rc.border_width, 3);
    }

    #[test]
    fn parse_key_binding_combinations() {
        assert_eq!(
            parse_key_binding("Mod4+Shift+q"),
            Some(ParsedBinding { keysym: 0x71, modifiers: 64 | 1 })
        );
        assert_eq!(
            parse_key_binding("XF86AudioRaiseVolume"),
            Some(ParsedBinding { keysym: 0x1008ff13, modifiers: 0 })
        );
        assert!(parse_key_binding("Mod4+nosuchkey").is_none());
    }
}
