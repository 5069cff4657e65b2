//! Monitor registry.
//!
//! Monitors are read from Xinerama when the extension is active, with a
//! fallback to the root window geometry. The registry also owns the
//! workspace-to-monitor assignment.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xinerama::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use crate::types::Rect;

/// One physical output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub index: usize,
    pub rect: Rect,
}

/// All monitors plus the workspace assignment
pub struct MonitorSet {
    monitors: Vec<Monitor>,
    /// Workspace index -> monitor index
    ws_monitors: Vec<usize>,
}

impl MonitorSet {
    /// Query Xinerama (or fall back to the root geometry) and build the
    /// registry. Every workspace starts on monitor 0.
    pub fn new(conn: &RustConnection, screen_num: usize, workspaces: usize) -> Result<Self> {
        let monitors = Self::scan(conn, screen_num)?;
        Ok(Self {
            monitors,
            ws_monitors: vec![0; workspaces],
        })
    }

    fn scan(conn: &RustConnection, screen_num: usize) -> Result<Vec<Monitor>> {
        let active = conn
            .xinerama_is_active()
            .ok()
            .and_then(|c| c.reply().ok())
            .map(|r| r.state != 0)
            .unwrap_or(false);

        if active {
            let screens = conn.xinerama_query_screens()?.reply()?.screen_info;
            if !screens.is_empty() {
                let monitors = screens
                    .iter()
                    .enumerate()
                    .map(|(index, s)| Monitor {
                        index,
                        rect: Rect::new(
                            s.x_org as i32,
                            s.y_org as i32,
                            s.width as u32,
                            s.height as u32,
                        ),
                    })
                    .collect::<Vec<_>>();
                log::info!("Found {} Xinerama monitor(s)", monitors.len());
                return Ok(monitors);
            }
        }

        let screen = &conn.setup().roots[screen_num];
        log::info!(
            "Xinerama inactive, using root geometry {}x{}",
            screen.width_in_pixels,
            screen.height_in_pixels
        );
        Ok(vec![Monitor {
            index: 0,
            rect: Rect::new(
                0,
                0,
                screen.width_in_pixels as u32,
                screen.height_in_pixels as u32,
            ),
        }])
    }

    /// Re-scan after the root geometry changed. Workspace assignments are
    /// clamped to the new monitor count.
    pub fn rescan(&mut self, conn: &RustConnection, screen_num: usize) -> Result<()> {
        self.monitors = Self::scan(conn, screen_num)?;
        let max = self.monitors.len().saturating_sub(1);
        for m in &mut self.ws_monitors {
            *m = (*m).min(max);
        }
        Ok(())
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn get(&self, index: usize) -> Monitor {
        self.monitors
            .get(index)
            .copied()
            .unwrap_or(self.monitors[0])
    }

    /// The monitor a workspace is assigned to
    pub fn monitor_for_workspace(&self, ws: usize) -> Monitor {
        let index = self.ws_monitors.get(ws).copied().unwrap_or(0);
        self.get(index)
    }

    pub fn assign_workspace(&mut self, ws: usize, monitor: usize) {
        if ws < self.ws_monitors.len() && monitor < self.monitors.len() {
            self.ws_monitors[ws] = monitor;
        }
    }

    /// Workspaces assigned to the given monitor
    pub fn workspaces_on(&self, monitor: usize) -> Vec<usize> {
        self.ws_monitors
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m == monitor)
            .map(|(ws, _)| ws)
            .collect()
    }

    /// One past the right edge of the rightmost monitor. Hidden clients
    /// are parked beyond this.
    pub fn rightmost_edge(&self) -> i32 {
        self.monitors
            .iter()
            .map(|m| m.rect.x + m.rect.width as i32)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with(rects: &[Rect]) -> MonitorSet {
        MonitorSet {
            monitors: rects
                .iter()
                .enumerate()
                .map(|(index, &rect)| Monitor { index, rect })
                .collect(),
            ws_monitors: vec![0, 0, 1, 1],
        }
    }

    #[test]
    fn rightmost_edge_spans_all_monitors() {
        let set = set_with(&[
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1280, 1024),
        ]);
        assert_eq!(set.rightmost_edge(), 3200);
    }

    #[test]
    fn workspace_assignment() {
        let mut set = set_with(&[
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1280, 1024),
        ]);
        assert_eq!(set.monitor_for_workspace(2).index, 1);
        assert_eq!(set.workspaces_on(0), vec![0, 1]);
        set.assign_workspace(1, 1);
        assert_eq!(set.workspaces_on(1), vec![1, 2, 3]);
        // out-of-range assignment is ignored
        set.assign_workspace(1, 7);
        assert_eq!(set.monitor_for_workspace(1).index, 1);
    }
}
