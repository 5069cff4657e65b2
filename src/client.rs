//! Client records and the per-workspace ordering lists.
//!
//! Every managed window has exactly one `Client` in the arena, and its id
//! appears in exactly one workspace's draw list and the same workspace's
//! focus list. The draw list head is the topmost window, the focus list
//! head is the most recently focused one.

use slotmap::{new_key_type, SlotMap};
use x11rb::protocol::xproto::Window;

use crate::types::Geom;

new_key_type! {
    pub struct ClientId;
}

/// One managed window
#[derive(Debug, Clone)]
pub struct Client {
    /// The application window
    pub window: Window,
    /// The decoration frame, if one currently exists
    pub frame: Option<Window>,
    /// Owning workspace
    pub workspace: usize,
    /// Logical inner geometry in root coordinates. Never includes the
    /// frame, and never changes when decorations come or go.
    pub geom: Geom,
    /// Geometry to restore when leaving monocle or fullscreen
    pub saved_geom: Geom,
    /// x coordinate to restore when the client is shown again
    pub hide_saved_x: i32,
    pub decorated: bool,
    /// Whether the client is currently parked off-screen
    pub hidden: bool,
    /// The hidden flag captured when this client's workspace was swept
    /// off-screen; restored when the workspace becomes visible again.
    pub was_hidden: bool,
    pub fullscreen: bool,
    /// Monocle state (maximized within the usable monitor area)
    pub maximized: bool,
    /// Whether the client was decorated when it entered fullscreen
    pub was_fullscreen_decorated: bool,
    /// Windows without a class hint never get decorations
    pub has_class_hint: bool,
    /// Minimum size from WM_NORMAL_HINTS, floor for interactive resizes
    pub min_width: u32,
    pub min_height: u32,
    /// Title, capped at 512 bytes when read
    pub title: String,
}

impl Client {
    pub fn new(window: Window, workspace: usize, geom: Geom) -> Self {
        Self {
            window,
            frame: None,
            workspace,
            geom,
            saved_geom: geom,
            hide_saved_x: 0,
            decorated: false,
            hidden: false,
            was_hidden: false,
            fullscreen: false,
            maximized: false,
            was_fullscreen_decorated: false,
            has_class_hint: true,
            min_width: 1,
            min_height: 1,
            title: String::new(),
        }
    }

    /// The window the server should receive stacking and move requests on
    pub fn outer_window(&self) -> Window {
        self.frame.unwrap_or(self.window)
    }

    /// Record the transition off-screen, saving the current x for the
    /// return trip. A no-op when already parked, so the saved position
    /// survives repeated sweeps.
    pub fn park(&mut self) -> bool {
        if self.hidden {
            return false;
        }
        self.hide_saved_x = self.geom.x;
        self.hidden = true;
        true
    }

    /// Record the transition back on-screen, yielding the x to restore
    pub fn unpark(&mut self) -> Option<i32> {
        if !self.hidden {
            return None;
        }
        self.hidden = false;
        Some(self.hide_saved_x)
    }
}

/// Arena of all clients plus the per-workspace orders.
pub struct ClientStore {
    clients: SlotMap<ClientId, Client>,
    /// Per workspace, top-to-bottom stacking order
    draw: Vec<Vec<ClientId>>,
    /// Per workspace, most-recently-focused-first order
    focus: Vec<Vec<ClientId>>,
}

impl ClientStore {
    pub fn new(workspaces: usize) -> Self {
        Self {
            clients: SlotMap::with_key(),
            draw: vec![Vec::new(); workspaces],
            focus: vec![Vec::new(); workspaces],
        }
    }

    pub fn workspace_count(&self) -> usize {
        self.draw.len()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Insert a new client at the head of its workspace's orders
    pub fn insert(&mut self, client: Client) -> ClientId {
        let ws = client.workspace;
        let id = self.clients.insert(client);
        self.draw[ws].insert(0, id);
        self.focus[ws].insert(0, id);
        id
    }

    /// Remove a client from the arena and both orders
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        self.draw[client.workspace].retain(|&c| c != id);
        self.focus[client.workspace].retain(|&c| c != id);
        Some(client)
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(id)
    }

    /// Find the client owning a window, matching either the application
    /// window or its frame.
    pub fn find_by_window(&self, window: Window) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, c)| c.window == window || c.frame == Some(window))
            .map(|(id, _)| id)
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().collect()
    }

    /// Draw order of a workspace, head = topmost
    pub fn draw_order(&self, ws: usize) -> &[ClientId] {
        &self.draw[ws]
    }

    /// Focus order of a workspace, head = most recently focused
    pub fn focus_order(&self, ws: usize) -> &[ClientId] {
        &self.focus[ws]
    }

    /// Splice a client to the head of its workspace's draw order
    pub fn raise_to_front(&mut self, id: ClientId) {
        if let Some(ws) = self.clients.get(id).map(|c| c.workspace) {
            let list = &mut self.draw[ws];
            if let Some(pos) = list.iter().position(|&c| c == id) {
                list.remove(pos);
                list.insert(0, id);
            }
        }
    }

    /// Splice a client to the head of its workspace's focus order
    pub fn mark_focused(&mut self, id: ClientId) {
        if let Some(ws) = self.clients.get(id).map(|c| c.workspace) {
            let list = &mut self.focus[ws];
            if let Some(pos) = list.iter().position(|&c| c == id) {
                list.remove(pos);
                list.insert(0, id);
            }
        }
    }

    /// The client after `current` in the focus order, wrapping around.
    /// Used for Alt-Tab cycling.
    pub fn next_in_focus_order(&self, ws: usize, current: ClientId) -> Option<ClientId> {
        let list = &self.focus[ws];
        if list.len() < 2 {
            return None;
        }
        let pos = list.iter().position(|&c| c == current)?;
        Some(list[(pos + 1) % list.len()])
    }

    /// First non-hidden client in a workspace's focus order
    pub fn first_visible(&self, ws: usize) -> Option<ClientId> {
        self.focus[ws]
            .iter()
            .copied()
            .find(|&id| self.clients.get(id).map(|c| !c.hidden).unwrap_or(false))
    }

    /// Move a client between workspaces. It leaves the old orders entirely
    /// and enters the new ones at the head.
    pub fn move_to_workspace(&mut self, id: ClientId, new_ws: usize) {
        let Some(old_ws) = self.clients.get(id).map(|c| c.workspace) else {
            return;
        };
        if old_ws == new_ws {
            return;
        }
        self.draw[old_ws].retain(|&c| c != id);
        self.focus[old_ws].retain(|&c| c != id);
        self.draw[new_ws].insert(0, id);
        self.focus[new_ws].insert(0, id);
        if let Some(client) = self.clients.get_mut(id) {
            client.workspace = new_ws;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;

    fn store_with(n: usize, ws: usize) -> (ClientStore, Vec<ClientId>) {
        let mut store = ClientStore::new(4);
        let mut ids = Vec::new();
        for i in 0..n {
            let c = Client::new(100 + i as Window, ws, Rect::new(0, 0, 100, 100));
            ids.push(store.insert(c));
        }
        (store, ids)
    }

    #[test]
    fn insert_puts_client_at_head_of_both_orders() {
        let (store, ids) = store_with(3, 0);
        assert_eq!(store.draw_order(0), &[ids[2], ids[1], ids[0]]);
        assert_eq!(store.focus_order(0), &[ids[2], ids[1], ids[0]]);
        assert!(store.draw_order(1).is_empty());
    }

    #[test]
    fn remove_clears_both_orders() {
        let (mut store, ids) = store_with(3, 0);
        store.remove(ids[1]);
        assert_eq!(store.draw_order(0), &[ids[2], ids[0]]);
        assert_eq!(store.focus_order(0), &[ids[2], ids[0]]);
        assert!(!store.contains(ids[1]));
    }

    #[test]
    fn find_by_window_matches_frame_too() {
        let (mut store, ids) = store_with(1, 0);
        store.get_mut(ids[0]).unwrap().frame = Some(999);
        assert_eq!(store.find_by_window(100), Some(ids[0]));
        assert_eq!(store.find_by_window(999), Some(ids[0]));
        assert_eq!(store.find_by_window(12345), None);
    }

    #[test]
    fn mark_focused_splices_to_head() {
        let (mut store, ids) = store_with(3, 0);
        store.mark_focused(ids[0]);
        assert_eq!(store.focus_order(0), &[ids[0], ids[2], ids[1]]);
        // draw order unaffected
        assert_eq!(store.draw_order(0), &[ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn focus_cycling_wraps() {
        let (mut store, ids) = store_with(3, 0);
        // focus order is [2, 1, 0]
        assert_eq!(store.next_in_focus_order(0, ids[2]), Some(ids[1]));
        assert_eq!(store.next_in_focus_order(0, ids[0]), Some(ids[2]));
        store.remove(ids[1]);
        store.remove(ids[0]);
        assert_eq!(store.next_in_focus_order(0, ids[2]), None);
    }

    #[test]
    fn first_visible_skips_hidden() {
        let (mut store, ids) = store_with(3, 0);
        store.get_mut(ids[2]).unwrap().hidden = true;
        assert_eq!(store.first_visible(0), Some(ids[1]));
        store.get_mut(ids[1]).unwrap().hidden = true;
        store.get_mut(ids[0]).unwrap().hidden = true;
        assert_eq!(store.first_visible(0), None);
    }

    #[test]
    fn parking_twice_keeps_the_first_saved_position() {
        let mut c = Client::new(100, 0, Rect::new(300, 40, 400, 300));
        assert!(c.park());
        assert!(c.hidden);
        c.geom.x = 3300; // parked past the edge

        // a second sweep must not re-save the parked position
        assert!(!c.park());
        assert_eq!(c.hide_saved_x, 300);

        assert_eq!(c.unpark(), Some(300));
        assert!(!c.hidden);
        assert_eq!(c.unpark(), None);
    }

    #[test]
    fn move_to_workspace_reenters_at_head() {
        let (mut store, ids) = store_with(2, 0);
        let other = store.insert(Client::new(500, 1, Rect::new(0, 0, 50, 50)));
        store.move_to_workspace(ids[0], 1);
        assert_eq!(store.draw_order(0), &[ids[1]]);
        assert_eq!(store.draw_order(1), &[ids[0], other]);
        assert_eq!(store.get(ids[0]).unwrap().workspace, 1);
    }
}
