//! Shared types used across multiple modules.

use serde::Deserialize;

/// A rectangle in root coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// The logical inner geometry of a client: the application window's
/// content rectangle in root coordinates, independent of any frame.
pub type Geom = Rect;

/// Reserved screen-edge space advertised by a dock or panel.
///
/// Only the four edge widths matter to the gap calculation; the
/// start/end coordinates of `_NET_WM_STRUT_PARTIAL` are accepted on the
/// wire but not consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Strut {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Strut {
    /// Element-wise maximum, used to combine struts from several advertisers.
    pub fn max(self, other: Strut) -> Strut {
        Strut {
            left: self.left.max(other.left),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// EWMH window types that can be toggled between managed and unmanaged.
///
/// Types outside this set (popup menus, tooltips, notifications, combo,
/// DND) are never managed regardless of configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Dock,
    Dialog,
    Toolbar,
    Menu,
    Splash,
    Utility,
}

impl WindowType {
    pub const ALL: [WindowType; 6] = [
        WindowType::Dock,
        WindowType::Dialog,
        WindowType::Toolbar,
        WindowType::Menu,
        WindowType::Splash,
        WindowType::Utility,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strut_max_is_elementwise() {
        let a = Strut { left: 0, right: 5, top: 30, bottom: 0 };
        let b = Strut { left: 8, right: 2, top: 10, bottom: 4 };
        assert_eq!(
            a.max(b),
            Strut { left: 8, right: 5, top: 30, bottom: 4 }
        );
    }
}
