//! The window manager context and every stateful operation on it.
//!
//! `Wm` owns the connection, the atom registry, the client arena, and the
//! monitor registry. Event handlers in `event.rs` call into the operations
//! here; nothing outside this struct talks to the server about managed
//! windows.

use std::collections::HashMap;

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    AtomEnum, ButtonIndex, ChangeGCAux, ChangeWindowAttributesAux, ClientMessageEvent,
    ConfigureNotifyEvent, ConfigureWindowAux, ConnectionExt, CreateGCAux, CreateWindowAux, Cursor,
    EventMask, Gcontext, GrabMode, InputFocus, Keycode, ModMask, PropMode, Screen, StackMode,
    Timestamp, Window, WindowClass, CONFIGURE_NOTIFY_EVENT,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, CURRENT_TIME, NONE};

use crate::atoms::Atoms;
use crate::client::{Client, ClientId, ClientStore};
use crate::config::{Config, ConfigField, ParsedBinding, RuntimeConfig};
use crate::geometry;
use crate::monitor::MonitorSet;
use crate::types::{Geom, Strut};
use crate::window_query::{self, TypeClass};

pub const WM_NAME: &str = "bramble";

// Keysyms the manager handles directly
pub const XK_SUPER_L: u32 = 0xffeb;
pub const XK_SUPER_R: u32 = 0xffec;
pub const XK_ALT_L: u32 = 0xffe9;
pub const XK_TAB: u32 = 0xff09;

/// Smallest window dimension an interactive resize can reach
const MINIMUM_DIM: u32 = 10;

/// How far past the rightmost display edge hidden clients are parked
const HIDE_OFFSET: i32 = 100;

// ICCCM WM_STATE values
const NORMAL_STATE: u32 = 1;
const ICONIC_STATE: u32 = 3;

/// Width of one title glyph with the core fallback font
const CHAR_WIDTH: u32 = 7;

/// Events selected on every managed client window
fn client_event_mask() -> EventMask {
    EventMask::STRUCTURE_NOTIFY | EventMask::PROPERTY_CHANGE | EventMask::ENTER_WINDOW
}

/// Truncate a title to the frame's text budget: one glyph per
/// `CHAR_WIDTH` of inner width, and never more than the 255 bytes an
/// ImageText8 request can carry.
fn truncate_title(title: &str, width: u32) -> &str {
    let budget = ((width / CHAR_WIDTH) as usize).min(255);
    if title.len() <= budget {
        return title;
    }
    let cut = title
        .char_indices()
        .take_while(|&(i, _)| i <= budget.saturating_sub(1))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    &title[..cut]
}

pub struct Wm {
    pub conn: RustConnection,
    pub screen_num: usize,
    pub root: Window,
    pub atoms: Atoms,
    pub config: RuntimeConfig,
    /// Gaps from the config file; struts only ever widen these
    pub base_gaps: Strut,
    pub clients: ClientStore,
    pub monitors: MonitorSet,
    pub current_workspace: usize,
    pub focused: Option<ClientId>,
    pub last_focused: Option<ClientId>,
    /// `_NET_SUPPORTING_WM_CHECK` window
    pub check_window: Window,
    /// Focus parking spot when no client is focused
    pub nofocus_window: Window,
    pub gc: Gcontext,
    pub normal_cursor: Cursor,
    pub running: bool,
    /// Set during the workspace-switch sweep so shows don't restack
    pub suppress_raise: bool,
    pub alt_tabbing: bool,
    /// True while Super is held with no other key seen yet
    pub super_pressed_alone: bool,
    pub last_left_release: Timestamp,
    pub keysym_to_keycode: HashMap<u32, Keycode>,
    pub keycode_to_keysym: HashMap<Keycode, u32>,
    pub exec_bindings: Vec<(ParsedBinding, String)>,
    pub media_bindings: Vec<(u32, String)>,
    pub super_tap_command: Option<String>,
}

impl Wm {
    pub fn new(file_config: &Config, font: Option<&str>) -> Result<Self> {
        let (conn, screen_num) =
            RustConnection::connect(None).context("failed to connect to X server")?;
        let screen = conn.setup().roots[screen_num].clone();
        let root = screen.root;

        let config = file_config.resolve();
        let base_gaps = config.gaps;

        // Becoming the WM: only one client may select SubstructureRedirect
        // on the root.
        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(
                EventMask::SUBSTRUCTURE_REDIRECT
                    | EventMask::SUBSTRUCTURE_NOTIFY
                    | EventMask::STRUCTURE_NOTIFY
                    | EventMask::BUTTON_PRESS,
            ),
        )?
        .check()
        .context("another window manager is already running")?;

        let normal_cursor = Self::create_cursor(&conn)?;
        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().cursor(normal_cursor),
        )?;

        let atoms = Atoms::new(&conn)?;
        let mut monitors = MonitorSet::new(&conn, screen_num, config.workspaces)?;
        for (ws, &mon) in file_config.behavior.workspace_monitors.iter().enumerate() {
            monitors.assign_workspace(ws, mon);
        }
        let clients = ClientStore::new(config.workspaces);

        let gc = conn.generate_id()?;
        let mut gc_aux = CreateGCAux::new()
            .foreground(screen.black_pixel)
            .background(screen.white_pixel);
        if let Some(name) = font {
            let font_id = conn.generate_id()?;
            if conn.open_font(font_id, name.as_bytes()).is_ok() {
                gc_aux = gc_aux.font(font_id);
            } else {
                log::warn!("Could not open font {:?}, using server default", name);
            }
        }
        conn.create_gc(gc, root, &gc_aux)?;

        let check_window = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            check_window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new(),
        )?;
        let nofocus_window = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            nofocus_window,
            root,
            -10,
            -10,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new().override_redirect(1),
        )?;
        conn.map_window(nofocus_window)?;

        let (keysym_to_keycode, keycode_to_keysym) = Self::keyboard_maps(&conn)?;

        let mut wm = Self {
            conn,
            screen_num,
            root,
            atoms,
            config,
            base_gaps,
            clients,
            monitors,
            current_workspace: 0,
            focused: None,
            last_focused: None,
            check_window,
            nofocus_window,
            gc,
            normal_cursor,
            running: true,
            suppress_raise: false,
            alt_tabbing: false,
            super_pressed_alone: false,
            last_left_release: 0,
            keysym_to_keycode,
            keycode_to_keysym,
            exec_bindings: file_config.parse_exec_bindings(),
            media_bindings: file_config.parse_media_bindings(),
            super_tap_command: file_config.media.super_tap.clone(),
        };

        wm.publish_root_properties()?;
        wm.scan_struts()?;
        wm.grab_keys()?;
        wm.focus(None)?;

        // Start with the pointer on the active monitor
        let mon = wm.monitors.monitor_for_workspace(0).rect;
        wm.conn.warp_pointer(
            NONE,
            root,
            0,
            0,
            0,
            0,
            (mon.x + mon.width as i32 / 2) as i16,
            (mon.y + mon.height as i32 / 2) as i16,
        )?;
        wm.conn.flush()?;
        Ok(wm)
    }

    pub fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    fn create_cursor(conn: &RustConnection) -> Result<Cursor> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"cursor")?;
        let cursor = conn.generate_id()?;
        // glyph 68 is the standard left pointer
        conn.create_glyph_cursor(cursor, font, font, 68, 69, 0, 0, 0, 0xffff, 0xffff, 0xffff)?;
        conn.close_font(font)?;
        Ok(cursor)
    }

    fn keyboard_maps(
        conn: &RustConnection,
    ) -> Result<(HashMap<u32, Keycode>, HashMap<Keycode, u32>)> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let max_keycode = setup.max_keycode;
        let mapping = conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)?
            .reply()?;
        let per = mapping.keysyms_per_keycode as usize;

        let mut forward = HashMap::new();
        let mut backward = HashMap::new();
        for (i, chunk) in mapping.keysyms.chunks(per).enumerate() {
            let keycode = min_keycode + i as u8;
            if let Some(&keysym) = chunk.first() {
                if keysym != 0 {
                    forward.entry(keysym).or_insert(keycode);
                    backward.insert(keycode, keysym);
                }
            }
        }
        Ok((forward, backward))
    }

    pub fn keysym_for_keycode(&self, keycode: Keycode) -> u32 {
        self.keycode_to_keysym.get(&keycode).copied().unwrap_or(0)
    }

    /// Rebuild the keysym tables after a MappingNotify
    pub fn refresh_keyboard_maps(&mut self) -> Result<()> {
        let (forward, backward) = Self::keyboard_maps(&self.conn)?;
        self.keysym_to_keycode = forward;
        self.keycode_to_keysym = backward;
        Ok(())
    }

    // =========================================================================
    // Grabs
    // =========================================================================

    /// Grab a key with and without NumLock/CapsLock
    fn grab_key_variants(&self, keycode: Keycode, modifiers: ModMask, window: Window) -> Result<()> {
        for extra in [
            ModMask::from(0u16),
            ModMask::LOCK,
            ModMask::M2,
            ModMask::LOCK | ModMask::M2,
        ] {
            self.conn.grab_key(
                true,
                window,
                modifiers | extra,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?;
        }
        Ok(())
    }

    fn grab_keysym(&self, keysym: u32, modifiers: ModMask) -> Result<()> {
        if let Some(&keycode) = self.keysym_to_keycode.get(&keysym) {
            self.grab_key_variants(keycode, modifiers, self.root)?;
            self.grab_key_variants(keycode, modifiers, self.nofocus_window)?;
        } else {
            log::warn!("No keycode for keysym 0x{:x}, not grabbing", keysym);
        }
        Ok(())
    }

    pub fn grab_keys(&self) -> Result<()> {
        // Alt and Super are tracked in every modifier state for focus
        // cycling and the Super-tap launcher; Tab only matters with Alt
        // held so bare Tab still reaches clients
        self.grab_keysym(XK_TAB, ModMask::M1)?;
        for keysym in [XK_ALT_L, XK_SUPER_L, XK_SUPER_R] {
            if let Some(&keycode) = self.keysym_to_keycode.get(&keysym) {
                self.conn.grab_key(
                    true,
                    self.root,
                    ModMask::ANY,
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )?;
            }
        }

        for keysym in crate::event::SHORTCUT_KEYSYMS {
            self.grab_keysym(keysym, ModMask::M4)?;
        }
        for i in 0..self.config.workspaces.min(9) as u32 {
            let digit = 0x31 + i; // XK_1 ..
            self.grab_keysym(digit, ModMask::M4)?;
            self.grab_keysym(digit, ModMask::M4 | ModMask::SHIFT)?;
        }
        for (binding, _) in &self.exec_bindings {
            self.grab_keysym(binding.keysym, ModMask::from(binding.modifiers))?;
        }
        for (keysym, _) in &self.media_bindings {
            self.grab_keysym(*keysym, ModMask::from(0u16))?;
        }
        self.conn.flush()?;
        Ok(())
    }

    fn button_index(button: u8) -> ButtonIndex {
        match button {
            1 => ButtonIndex::M1,
            2 => ButtonIndex::M2,
            3 => ButtonIndex::M3,
            4 => ButtonIndex::M4,
            5 => ButtonIndex::M5,
            _ => ButtonIndex::ANY,
        }
    }

    /// Button grabs on a freshly managed window: a synchronous grab on
    /// every unmodified button so content clicks can be replayed, and
    /// asynchronous grabs for the move/resize combos.
    fn grab_buttons(&self, window: Window) -> Result<()> {
        for extra in [
            ModMask::from(0u16),
            ModMask::LOCK,
            ModMask::M2,
            ModMask::LOCK | ModMask::M2,
        ] {
            self.conn.grab_button(
                true,
                window,
                EventMask::BUTTON_PRESS,
                GrabMode::SYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                ButtonIndex::ANY,
                extra,
            )?;
            self.conn.grab_button(
                true,
                window,
                EventMask::BUTTON_PRESS,
                GrabMode::SYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                ButtonIndex::ANY,
                ModMask::from(self.config.move_mask) | extra,
            )?;
        }
        let motion = EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION;
        self.conn.grab_button(
            true,
            window,
            motion,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            Self::button_index(self.config.move_button),
            ModMask::from(self.config.move_mask),
        )?;
        self.conn.grab_button(
            true,
            window,
            motion,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            Self::button_index(self.config.resize_button),
            ModMask::from(self.config.resize_mask),
        )?;
        Ok(())
    }

    // =========================================================================
    // Managing windows
    // =========================================================================

    pub fn manage_window(&mut self, window: Window) -> Result<()> {
        let attrs = match self.conn.get_window_attributes(window)?.reply() {
            Ok(a) => a,
            Err(_) => return Ok(()), // gone already
        };
        if attrs.override_redirect {
            return Ok(());
        }

        match window_query::type_class(&self.conn, &self.atoms, window) {
            TypeClass::Normal => {}
            TypeClass::Configurable(kind) if self.config.manages(kind) => {}
            _ => {
                // Docks, popups and friends are mapped unmanaged; they may
                // advertise struts we have to honor
                log::debug!("Window 0x{:x} is an unmanaged type, mapping as-is", window);
                self.conn.map_window(window)?;
                self.scan_struts()?;
                self.conn.flush()?;
                return Ok(());
            }
        }

        if self.clients.find_by_window(window).is_some() {
            log::warn!("Window 0x{:x} is already managed", window);
            return Ok(());
        }

        let geo = match self.conn.get_geometry(window)?.reply() {
            Ok(g) => g,
            Err(_) => return Ok(()), // gone already
        };
        let mut client = Client::new(
            window,
            self.current_workspace,
            Geom::new(geo.x as i32, geo.y as i32, geo.width as u32, geo.height as u32),
        );
        client.has_class_hint = window_query::has_class_hint(&self.conn, window);
        client.title = window_query::title(&self.conn, &self.atoms, window);
        let (min_w, min_h) = window_query::min_size(&self.conn, window);
        client.min_width = min_w;
        client.min_height = min_h;
        let wants_bare = window_query::wants_no_decorations(&self.conn, &self.atoms, window);
        let decorate = self.config.decorate_new && client.has_class_hint && !wants_bare;

        self.conn
            .configure_window(window, &ConfigureWindowAux::new().border_width(0))?;
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().event_mask(client_event_mask()),
        )?;
        self.grab_buttons(window)?;

        let id = self.clients.insert(client);
        if decorate {
            self.create_frame(id)?;
        }

        // Admission placement
        let mon = self
            .monitors
            .monitor_for_workspace(self.current_workspace)
            .rect;
        let usable = geometry::usable_region(mon, self.config.gaps);
        let (w, h, placed) = {
            let c = self.clients.get(id).context("client vanished")?;
            let occupied: Vec<_> = self
                .clients
                .draw_order(self.current_workspace)
                .iter()
                .filter(|&&other| other != id)
                .filter_map(|&other| self.clients.get(other))
                .filter(|c| !c.hidden)
                .map(|c| self.outer_rect(c))
                .collect();
            let placed = if self.config.smart_place && !occupied.is_empty() {
                geometry::smart_place(
                    c.geom.width + self.config.dec_width(c.decorated) as u32,
                    c.geom.height + self.config.dec_height(c.decorated) as u32,
                    usable,
                    &occupied,
                )
            } else {
                None
            };
            (c.geom.width, c.geom.height, placed)
        };
        match placed {
            Some((fx, fy)) => {
                let c = self.clients.get(id).context("client vanished")?;
                let (lw, th) = (
                    self.config.left_width(c.decorated),
                    self.config.top_height(c.decorated),
                );
                self.move_absolute(id, fx + lw, fy + th)?;
            }
            None => {
                let (cx, cy) = geometry::center_position(w, h, mon, self.config.gaps);
                self.move_absolute(id, cx, cy)?;
            }
        }

        self.apply_geometry(id)?;
        self.conn.map_window(window)?;
        if let Some(frame) = self.clients.get(id).and_then(|c| c.frame) {
            self.conn.map_window(frame)?;
        }

        self.set_net_wm_desktop(window, self.current_workspace)?;
        self.publish_client_list()?;

        // Honor a fullscreen state that was set before mapping
        if window_query::is_fullscreen(&self.conn, &self.atoms, window) {
            self.set_fullscreen(id, false, true, true)?;
        }

        self.last_focused = self.focused;
        self.focus(Some(id))?;
        self.update_wm_state(id)?;
        self.conn.flush()?;
        log::info!("Managed window 0x{:x}", window);
        Ok(())
    }

    /// Release a client: stop listening, reparent back to the root, drop
    /// the frame, and focus whoever is next.
    pub fn unmanage(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id).cloned() else {
            return Ok(());
        };
        let no_events = ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT);
        let _ = self.conn.change_window_attributes(client.window, &no_events);
        if let Some(frame) = client.frame {
            let _ = self.conn.change_window_attributes(frame, &no_events);
            let _ = self.conn.unmap_window(frame);
            let _ = self
                .conn
                .reparent_window(client.window, self.root, client.geom.x as i16, client.geom.y as i16);
            let _ = self.conn.destroy_window(frame);
        }
        self.clients.remove(id);
        if self.focused == Some(id) {
            self.focused = None;
            let next = self.clients.first_visible(self.current_workspace);
            self.focus(next)?;
        }
        if self.last_focused == Some(id) {
            self.last_focused = None;
        }
        self.publish_client_list()?;
        self.scan_struts()?;
        if let Some(focused) = self.focused {
            self.raise(focused)?;
        }
        self.conn.flush()?;
        Ok(())
    }

    /// Soft-close via WM_DELETE_WINDOW, destroy if unsupported
    pub fn close_client(&mut self, id: ClientId) -> Result<()> {
        let Some(window) = self.clients.get(id).map(|c| c.window) else {
            return Ok(());
        };
        if !self.send_protocol(window, self.atoms.wm_delete_window)? {
            self.conn.destroy_window(window)?;
        }
        self.conn.flush()?;
        Ok(())
    }

    /// Send a WM_PROTOCOLS client message if the window supports it
    pub fn send_protocol(&self, window: Window, protocol: u32) -> Result<bool> {
        if !window_query::supports_protocol(&self.conn, &self.atoms, window, protocol) {
            return Ok(false);
        }
        let msg = ClientMessageEvent::new(
            32,
            window,
            self.atoms.wm_protocols,
            [protocol, CURRENT_TIME, 0, 0, 0],
        );
        self.conn
            .send_event(false, window, EventMask::NO_EVENT, msg)?;
        Ok(true)
    }

    // =========================================================================
    // Decorations
    // =========================================================================

    /// The outer rectangle (frame included) of a client
    pub fn outer_rect(&self, client: &Client) -> Geom {
        Geom {
            x: client.geom.x - self.config.left_width(client.decorated),
            y: client.geom.y - self.config.top_height(client.decorated),
            width: client.geom.width + self.config.dec_width(client.decorated) as u32,
            height: client.geom.height + self.config.dec_height(client.decorated) as u32,
        }
    }

    /// Create the frame window and reparent the client into it. `geom` is
    /// untouched; the frame is laid out around it.
    pub fn create_frame(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        client.decorated = true;
        let geom = client.geom;
        let window = client.window;
        let lw = self.config.left_width(true);
        let th = self.config.top_height(true);
        let dw = self.config.dec_width(true);
        let dh = self.config.dec_height(true);

        let frame = self.conn.generate_id()?;
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            frame,
            self.root,
            (geom.x - lw) as i16,
            (geom.y - th) as i16,
            (geom.width as i32 + dw) as u16,
            (geom.height as i32 + dh) as u16,
            self.config.border_width as u16,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(self.config.inner_focused)
                .border_pixel(self.config.border_focused)
                .event_mask(EventMask::EXPOSURE | EventMask::SUBSTRUCTURE_NOTIFY),
        )?;
        // Reparenting a mapped window generates a real UnmapNotify; mute
        // the client so it is not mistaken for a withdrawal
        let mute = ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT);
        self.conn.change_window_attributes(window, &mute)?;
        self.conn
            .reparent_window(window, frame, lw as i16, th as i16)?;
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().event_mask(client_event_mask()),
        )?;
        if let Some(client) = self.clients.get_mut(id) {
            client.frame = Some(frame);
        }
        self.draw_title(id, true)?;
        self.publish_frame_extents(id)?;
        Ok(())
    }

    /// Re-decorate a client that currently has no frame
    pub fn show_decorations(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        if client.decorated {
            return Ok(());
        }
        self.create_frame(id)?;
        if let Some(frame) = self.clients.get(id).and_then(|c| c.frame) {
            self.conn.map_window(frame)?;
        }
        self.apply_geometry(id)?;
        self.publish_frame_extents(id)?;
        self.conn.flush()?;
        Ok(())
    }

    /// Drop a client's frame, leaving `geom` unchanged
    pub fn destroy_decorations(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id).cloned() else {
            return Ok(());
        };
        let Some(frame) = client.frame else {
            return Ok(());
        };
        // The frame selects SubstructureNotify and the client
        // StructureNotify, so the reparent's UnmapNotify would arrive
        // twice; mute both for its duration
        let mute = ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT);
        self.conn.change_window_attributes(client.window, &mute)?;
        self.conn.change_window_attributes(frame, &mute)?;
        self.conn
            .reparent_window(client.window, self.root, client.geom.x as i16, client.geom.y as i16)?;
        self.conn.destroy_window(frame)?;
        self.conn.change_window_attributes(
            client.window,
            &ChangeWindowAttributesAux::new().event_mask(client_event_mask()),
        )?;
        if let Some(c) = self.clients.get_mut(id) {
            c.frame = None;
            c.decorated = false;
        }
        self.apply_geometry(id)?;
        self.publish_frame_extents(id)?;
        self.conn.flush()?;
        Ok(())
    }

    pub fn toggle_decorations(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        if client.decorated {
            self.destroy_decorations(id)?;
        } else if !client.fullscreen {
            self.show_decorations(id)?;
        }
        Ok(())
    }

    /// Push the recorded geometry to the server: frame around the inner
    /// rectangle, client window inside it.
    pub fn apply_geometry(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id).cloned() else {
            return Ok(());
        };
        let geom = client.geom;
        let lw = self.config.left_width(client.decorated);
        let th = self.config.top_height(client.decorated);
        let dw = self.config.dec_width(client.decorated);
        let dh = self.config.dec_height(client.decorated);
        let w = geom.width.max(MINIMUM_DIM);
        let h = geom.height.max(MINIMUM_DIM);

        if let Some(frame) = client.frame {
            self.conn.configure_window(
                frame,
                &ConfigureWindowAux::new()
                    .x(geom.x - lw)
                    .y(geom.y - th)
                    .width((w as i32 + dw) as u32)
                    .height((h as i32 + dh) as u32),
            )?;
            self.conn.configure_window(
                client.window,
                &ConfigureWindowAux::new().x(lw).y(th).width(w).height(h),
            )?;
        } else {
            self.conn.configure_window(
                client.window,
                &ConfigureWindowAux::new().x(geom.x).y(geom.y).width(w).height(h),
            )?;
        }
        self.notify_move(id)?;
        Ok(())
    }

    /// Synthetic ConfigureNotify so the client knows its root coordinates
    fn notify_move(&self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: client.window,
            window: client.window,
            above_sibling: NONE,
            x: client.geom.x as i16,
            y: client.geom.y as i16,
            width: client.geom.width as u16,
            height: client.geom.height as u16,
            border_width: 0,
            override_redirect: false,
        };
        self.conn
            .send_event(false, client.window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    /// Swap the frame's colors between focused and unfocused
    pub fn set_frame_colors(&self, id: ClientId, focused: bool) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let Some(frame) = client.frame else {
            return Ok(());
        };
        let (inner, border) = if focused {
            (self.config.inner_focused, self.config.border_focused)
        } else {
            (self.config.inner_unfocused, self.config.border_unfocused)
        };
        self.conn.change_window_attributes(
            frame,
            &ChangeWindowAttributesAux::new()
                .background_pixel(inner)
                .border_pixel(border),
        )?;
        self.conn.clear_area(false, frame, 0, 0, 0, 0)?;
        Ok(())
    }

    /// Draw the title into the frame's title strip with the core protocol.
    /// The width estimate assumes roughly 7 pixels per character for the
    /// server's default font.
    pub fn draw_title(&self, id: ClientId, focused: bool) -> Result<()> {
        const X_OFFSET: i16 = 8;
        const FONT_ASCENT: u32 = 12;

        if !self.config.draw_titles {
            return Ok(());
        }
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let Some(frame) = client.frame else {
            return Ok(());
        };
        if self.config.title_height < FONT_ASCENT {
            return Ok(());
        }

        let width = client.geom.width;
        let title = truncate_title(client.title.as_str(), width);
        if title.is_empty() {
            return Ok(());
        }

        let text_width = title.len() as u32 * CHAR_WIDTH;
        let x = if self.config.title_center {
            (width.saturating_sub(text_width) / 2) as i16
        } else {
            X_OFFSET
        };
        let y = (self.config.title_height / 2 + FONT_ASCENT / 2) as i16;
        let (fg, bg) = if focused {
            (self.config.text_focused, self.config.inner_focused)
        } else {
            (self.config.text_unfocused, self.config.inner_unfocused)
        };
        self.conn
            .change_gc(self.gc, &ChangeGCAux::new().foreground(fg).background(bg))?;
        self.conn.image_text8(frame, self.gc, x, y, title.as_bytes())?;
        Ok(())
    }

    // =========================================================================
    // Focus and stacking
    // =========================================================================

    /// Give focus to a client, or park it on the no-focus window.
    ///
    /// During Alt-Tab cycling the focus order is left alone; it is spliced
    /// once when the cycle finishes.
    pub fn focus(&mut self, target: Option<ClientId>) -> Result<()> {
        if let Some(id) = target {
            if !self.clients.contains(id) {
                return Ok(());
            }
            if let Some(prev) = self.focused {
                if prev != id {
                    self.set_frame_colors(prev, false)?;
                    self.draw_title(prev, false)?;
                }
            }

            let (window, hidden, ws) = {
                let c = self.clients.get(id).context("focus target vanished")?;
                (c.window, c.hidden, c.workspace)
            };
            if ws != self.current_workspace {
                self.switch_workspace(ws)?;
            }
            self.set_frame_colors(id, true)?;
            self.draw_title(id, true)?;
            self.raise(id)?;
            if hidden {
                self.show(id)?;
            }
            self.conn
                .set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME)?;
            if self.config.warp_pointer {
                self.warp_to(id)?;
            }
            self.publish_active_window(Some(window))?;
            self.send_protocol(window, self.atoms.wm_take_focus)?;

            self.focused = Some(id);
            if !self.alt_tabbing {
                self.clients.mark_focused(id);
            }
        } else {
            self.focused = None;
            self.conn
                .set_input_focus(InputFocus::POINTER_ROOT, self.nofocus_window, CURRENT_TIME)?;
            self.publish_active_window(None)?;
        }
        self.conn.flush()?;
        Ok(())
    }

    /// Raise to the head of the draw order and restack on the server
    pub fn raise(&mut self, id: ClientId) -> Result<()> {
        self.clients.raise_to_front(id);
        if let Some(client) = self.clients.get(id) {
            self.conn.configure_window(
                client.outer_window(),
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )?;
        }
        Ok(())
    }

    /// Focus the next client in the focus order (Alt-Tab step)
    pub fn cycle_focus(&mut self) -> Result<()> {
        let ws = self.current_workspace;
        let next = match self.focused {
            Some(current) => self.clients.next_in_focus_order(ws, current),
            None => self.clients.focus_order(ws).first().copied(),
        };
        if let Some(next) = next {
            self.focus(Some(next))?;
        }
        Ok(())
    }

    /// Called when Alt is released: commit the MRU rotation
    pub fn finish_alt_tab(&mut self) {
        self.alt_tabbing = false;
        if let Some(id) = self.focused {
            self.clients.mark_focused(id);
        }
        self.last_focused = None;
    }

    fn warp_to(&self, id: ClientId) -> Result<()> {
        if let Some(client) = self.clients.get(id) {
            self.conn.warp_pointer(
                NONE,
                client.outer_window(),
                0,
                0,
                0,
                0,
                (client.geom.width / 2) as i16,
                (client.geom.height / 2) as i16,
            )?;
        }
        Ok(())
    }

    // =========================================================================
    // Visibility and workspaces
    // =========================================================================

    /// Hide a client by parking it past the rightmost display edge
    pub fn hide(&mut self, id: ClientId) -> Result<()> {
        let edge = self.monitors.rightmost_edge();
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let y = client.geom.y;
        if client.park() {
            self.move_absolute(id, edge + HIDE_OFFSET, y)?;
            self.set_frame_colors(id, false)?;
        }
        self.update_wm_state(id)?;
        Ok(())
    }

    /// Restore a hidden client to its saved x position
    pub fn show(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let y = client.geom.y;
        if let Some(x) = client.unpark() {
            self.move_absolute(id, x, y)?;
            if !self.suppress_raise {
                self.raise(id)?;
            }
            self.update_wm_state(id)?;
        }
        Ok(())
    }

    /// Switch the visible workspace. Same-monitor workspaces are swept
    /// off-screen with each client's prior hidden flag remembered, then
    /// the target's previously visible clients come back without
    /// restacking.
    pub fn switch_workspace(&mut self, ws: usize) -> Result<()> {
        if ws >= self.clients.workspace_count() || ws == self.current_workspace {
            return Ok(());
        }
        let target_monitor = self.monitors.monitor_for_workspace(ws).index;

        for other in self.monitors.workspaces_on(target_monitor) {
            if other == ws {
                continue;
            }
            for id in self.clients.draw_order(other).to_vec() {
                let was_hidden = self.clients.get(id).map(|c| c.hidden).unwrap_or(true);
                self.hide(id)?;
                if let Some(c) = self.clients.get_mut(id) {
                    c.was_hidden = was_hidden;
                }
            }
        }

        self.suppress_raise = true;
        for id in self.clients.draw_order(ws).to_vec() {
            if self.clients.get(id).map(|c| !c.was_hidden).unwrap_or(false) {
                self.show(id)?;
            }
        }
        self.suppress_raise = false;

        self.current_workspace = ws;
        self.publish_current_desktop(ws)?;
        let next = self.clients.first_visible(ws);
        self.focus(next)?;
        self.conn.flush()?;
        Ok(())
    }

    /// Move a client to another workspace, translating its position onto
    /// the target workspace's monitor.
    pub fn send_to_workspace(&mut self, id: ClientId, ws: usize) -> Result<()> {
        if ws >= self.clients.workspace_count() {
            return Ok(());
        }
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let old_ws = client.workspace;
        if old_ws == ws {
            return Ok(());
        }
        let mon_prev = self.monitors.monitor_for_workspace(old_ws).rect;
        let mon_next = self.monitors.monitor_for_workspace(ws).rect;
        let (x_off, y_off) = (client.geom.x - mon_prev.x, client.geom.y - mon_prev.y);
        let window = client.window;

        self.clients.move_to_workspace(id, ws);
        if self.focused == Some(id) {
            self.focused = None;
            let next = self.clients.first_visible(old_ws);
            self.focus(next)?;
        }
        self.move_absolute(id, mon_next.x + x_off, mon_next.y + y_off)?;

        if self.workspace_is_visible(ws) {
            self.show(id)?;
        } else {
            self.hide(id)?;
            // not user-hidden, so the next switch to `ws` shows it
            if let Some(c) = self.clients.get_mut(id) {
                c.was_hidden = false;
            }
        }
        self.set_net_wm_desktop(window, ws)?;
        self.conn.flush()?;
        Ok(())
    }

    /// A workspace is visible when it is the active one on its monitor
    fn workspace_is_visible(&self, ws: usize) -> bool {
        if ws == self.current_workspace {
            return true;
        }
        if self.monitors.monitors().len() == 1 {
            return false;
        }
        let mon = self.monitors.monitor_for_workspace(ws).index;
        for other in 0..self.clients.workspace_count() {
            if other != ws
                && self.monitors.monitor_for_workspace(other).index == mon
                && self
                    .clients
                    .draw_order(other)
                    .iter()
                    .any(|&c| self.clients.get(c).map(|c| !c.hidden).unwrap_or(false))
            {
                return false;
            }
        }
        true
    }

    /// Hide everything on the current workspace, or show everything if it
    /// was all hidden already
    pub fn toggle_hide_all(&mut self) -> Result<()> {
        let ids = self.clients.draw_order(self.current_workspace).to_vec();
        let mut hid_something = false;
        for &id in &ids {
            if self.clients.get(id).map(|c| !c.hidden).unwrap_or(false) {
                self.hide(id)?;
                hid_something = true;
            }
        }
        if hid_something {
            self.focus(None)?;
        } else {
            for &id in &ids {
                self.show(id)?;
            }
            let next = self.clients.first_visible(self.current_workspace);
            self.focus(next)?;
        }
        Ok(())
    }

    // =========================================================================
    // Geometry operations
    // =========================================================================

    /// Move the inner rectangle to absolute root coordinates. Any move
    /// leaves monocle state.
    pub fn move_absolute(&mut self, id: ClientId, x: i32, y: i32) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        client.geom.x = x;
        client.geom.y = y;
        client.maximized = false;
        self.apply_geometry(id)?;
        self.update_wm_state(id)?;
        Ok(())
    }

    pub fn move_relative(&mut self, id: ClientId, dx: i32, dy: i32) -> Result<()> {
        if let Some(client) = self.clients.get(id) {
            let (x, y) = (client.geom.x + dx, client.geom.y + dy);
            self.move_absolute(id, x, y)?;
        }
        Ok(())
    }

    /// Resize the inner rectangle, clamped to the client's minimum size
    pub fn resize_absolute(&mut self, id: ClientId, w: i32, h: i32) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        client.geom.width = (w.max(0) as u32).max(client.min_width).max(MINIMUM_DIM);
        client.geom.height = (h.max(0) as u32).max(client.min_height).max(MINIMUM_DIM);
        client.maximized = false;
        self.apply_geometry(id)?;
        self.update_wm_state(id)?;
        self.draw_title(id, self.focused == Some(id))?;
        Ok(())
    }

    pub fn resize_relative(&mut self, id: ClientId, dw: i32, dh: i32) -> Result<()> {
        if let Some(client) = self.clients.get(id) {
            let (w, h) = (
                client.geom.width as i32 + dw,
                client.geom.height as i32 + dh,
            );
            self.resize_absolute(id, w, h)?;
        }
        Ok(())
    }

    pub fn center(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let mon = self.monitors.monitor_for_workspace(client.workspace).rect;
        let (x, y) = geometry::center_position(
            client.geom.width,
            client.geom.height,
            mon,
            self.config.gaps,
        );
        self.move_absolute(id, x, y)
    }

    pub fn snap_left(&mut self, id: ClientId) -> Result<()> {
        self.snap(id, true)
    }

    pub fn snap_right(&mut self, id: ClientId) -> Result<()> {
        self.snap(id, false)
    }

    fn snap(&mut self, id: ClientId, left: bool) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let mon = self.monitors.monitor_for_workspace(client.workspace).rect;
        let (lw, th) = (
            self.config.left_width(client.decorated),
            self.config.top_height(client.decorated),
        );
        let (dw, dh) = (
            self.config.dec_width(client.decorated),
            self.config.dec_height(client.decorated),
        );
        let target = if left {
            geometry::snap_left_target(mon, self.config.gaps, lw, th, dw, dh)
        } else {
            geometry::snap_right_target(mon, self.config.gaps, lw, th, dw, dh)
        };
        self.move_absolute(id, target.x, target.y)?;
        self.resize_absolute(id, target.width as i32, target.height as i32)?;
        Ok(())
    }

    /// Toggle monocle: fill the monitor inset by gaps, or restore the
    /// saved geometry.
    pub fn toggle_monocle(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id).cloned() else {
            return Ok(());
        };
        if client.maximized {
            let saved = client.saved_geom;
            self.move_absolute(id, saved.x, saved.y)?;
            self.resize_absolute(id, saved.width as i32, saved.height as i32)?;
        } else {
            let mon = self.monitors.monitor_for_workspace(client.workspace).rect;
            let (lw, th) = (
                self.config.left_width(client.decorated),
                self.config.top_height(client.decorated),
            );
            let (dw, dh) = (
                self.config.dec_width(client.decorated),
                self.config.dec_height(client.decorated),
            );
            let target = geometry::monocle_target(mon, self.config.gaps, lw, th, dw, dh);
            if let Some(c) = self.clients.get_mut(id) {
                c.saved_geom = c.geom;
            }
            self.move_absolute(id, target.x, target.y)?;
            self.resize_absolute(id, target.width as i32, target.height as i32)?;
            if let Some(c) = self.clients.get_mut(id) {
                c.maximized = true;
            }
        }
        self.update_wm_state(id)?;
        self.conn.flush()?;
        Ok(())
    }

    pub fn toggle_fullscreen(&mut self, id: ClientId) -> Result<()> {
        self.set_fullscreen(id, true, true, true)
    }

    /// Enter or leave fullscreen. `max` controls whether geometry is
    /// saved/restored around filling the monitor.
    pub fn set_fullscreen(
        &mut self,
        id: ClientId,
        toggle: bool,
        fullscreen: bool,
        max: bool,
    ) -> Result<()> {
        let Some(client) = self.clients.get(id).cloned() else {
            return Ok(());
        };
        let to_fs = if toggle { !client.fullscreen } else { fullscreen };
        if to_fs == client.fullscreen {
            return Ok(());
        }
        let mon = self.monitors.monitor_for_workspace(client.workspace).rect;

        if to_fs {
            self.publish_fullscreen_state(id, true)?;
            if client.decorated && self.config.fullscreen_removes_decorations {
                self.destroy_decorations(id)?;
                if let Some(c) = self.clients.get_mut(id) {
                    c.was_fullscreen_decorated = true;
                }
            }
            if self.config.fullscreen_maximizes {
                if let Some(c) = self.clients.get_mut(id) {
                    c.saved_geom = c.geom;
                }
                self.move_absolute(id, mon.x, mon.y)?;
                self.resize_absolute(id, mon.width as i32, mon.height as i32)?;
            }
            if let Some(c) = self.clients.get_mut(id) {
                c.fullscreen = true;
            }
        } else {
            self.publish_fullscreen_state(id, false)?;
            if max {
                let saved = client.saved_geom;
                self.move_absolute(id, saved.x, saved.y)?;
                self.resize_absolute(id, saved.width as i32, saved.height as i32)?;
            }
            let redecorate = {
                let c = self.clients.get(id);
                c.map(|c| {
                    !c.decorated
                        && self.config.fullscreen_removes_decorations
                        && c.was_fullscreen_decorated
                })
                .unwrap_or(false)
            };
            if let Some(c) = self.clients.get_mut(id) {
                c.fullscreen = false;
                c.was_fullscreen_decorated = false;
            }
            if redecorate {
                self.show_decorations(id)?;
                self.raise(id)?;
                self.focus(Some(id))?;
            }
            self.apply_geometry(id)?;
        }
        self.conn.flush()?;
        Ok(())
    }

    // =========================================================================
    // Struts
    // =========================================================================

    /// Scan every top-level window for strut advertisements and recompute
    /// the gaps as the element-wise max over all of them, floored by the
    /// configured gaps.
    pub fn scan_struts(&mut self) -> Result<()> {
        let tree = self.conn.query_tree(self.root)?.reply()?;
        let mut max = Strut::default();
        for window in tree.children {
            if let Ok(Some(strut)) = window_query::strut(&self.conn, &self.atoms, window) {
                max = max.max(strut);
            }
        }
        let gaps = self.base_gaps.max(max);
        if gaps != self.config.gaps {
            log::debug!("Gaps changed to {:?}", gaps);
            self.config.gaps = gaps;
        }
        Ok(())
    }

    // =========================================================================
    // EWMH and ICCCM publication
    // =========================================================================

    fn publish_root_properties(&self) -> Result<()> {
        let atoms = &self.atoms;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.check_window,
            atoms.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[self.check_window],
        )?;
        self.conn.change_property8(
            PropMode::REPLACE,
            self.check_window,
            atoms.net_wm_name,
            atoms.utf8_string,
            WM_NAME.as_bytes(),
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            atoms.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[self.check_window],
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            atoms.net_supported,
            AtomEnum::ATOM,
            &atoms.supported(),
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            atoms.net_number_of_desktops,
            AtomEnum::CARDINAL,
            &[self.config.workspaces as u32],
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            atoms.net_current_desktop,
            AtomEnum::CARDINAL,
            &[self.current_workspace as u32],
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            atoms.net_desktop_viewport,
            AtomEnum::CARDINAL,
            &[0, 0],
        )?;
        // Workspaces are named by their index
        let mut names = Vec::new();
        for i in 0..self.config.workspaces {
            names.extend_from_slice(i.to_string().as_bytes());
            names.push(0);
        }
        self.conn.change_property8(
            PropMode::REPLACE,
            self.root,
            atoms.net_desktop_names,
            atoms.utf8_string,
            &names,
        )?;
        Ok(())
    }

    pub fn publish_client_list(&self) -> Result<()> {
        self.conn
            .delete_property(self.root, self.atoms.net_client_list)?;
        for ws in 0..self.clients.workspace_count() {
            for &id in self.clients.draw_order(ws) {
                if let Some(client) = self.clients.get(id) {
                    self.conn.change_property32(
                        PropMode::APPEND,
                        self.root,
                        self.atoms.net_client_list,
                        AtomEnum::WINDOW,
                        &[client.window],
                    )?;
                }
            }
        }
        Ok(())
    }

    fn publish_active_window(&self, window: Option<Window>) -> Result<()> {
        match window {
            Some(window) => self.conn.change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms.net_active_window,
                AtomEnum::WINDOW,
                &[window],
            )?,
            None => self
                .conn
                .delete_property(self.root, self.atoms.net_active_window)?,
        };
        Ok(())
    }

    fn publish_current_desktop(&self, ws: usize) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            self.atoms.net_current_desktop,
            AtomEnum::CARDINAL,
            &[ws as u32],
        )?;
        Ok(())
    }

    fn set_net_wm_desktop(&self, window: Window, ws: usize) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_desktop,
            AtomEnum::CARDINAL,
            &[ws as u32],
        )?;
        Ok(())
    }

    pub fn publish_frame_extents(&self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        self.conn.change_property32(
            PropMode::REPLACE,
            client.window,
            self.atoms.net_frame_extents,
            AtomEnum::CARDINAL,
            &self.config.frame_extents(client.decorated),
        )?;
        Ok(())
    }

    fn publish_fullscreen_state(&self, id: ClientId, fullscreen: bool) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let states: &[u32] = if fullscreen {
            &[self.atoms.net_wm_state_fullscreen]
        } else {
            &[]
        };
        self.conn.change_property32(
            PropMode::REPLACE,
            client.window,
            self.atoms.net_wm_state,
            AtomEnum::ATOM,
            states,
        )?;
        Ok(())
    }

    /// Publish WM_STATE and reconcile the maximized atoms in
    /// `_NET_WM_STATE` with the client's monocle flag. A failed property
    /// read counts as "no states currently set".
    pub fn update_wm_state(&self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let state = if client.hidden { ICONIC_STATE } else { NORMAL_STATE };
        self.conn.change_property32(
            PropMode::REPLACE,
            client.window,
            self.atoms.wm_state,
            self.atoms.wm_state,
            &[state, NONE],
        )?;

        let existing: Vec<u32> = self
            .conn
            .get_property(
                false,
                client.window,
                self.atoms.net_wm_state,
                AtomEnum::ATOM,
                0,
                32,
            )
            .ok()
            .and_then(|c| c.reply().ok())
            .and_then(|r| r.value32().map(|v| v.collect()))
            .unwrap_or_default();

        let maximized_atoms = [
            self.atoms.net_wm_state_maximized_horz,
            self.atoms.net_wm_state_maximized_vert,
        ];
        let mut new_states: Vec<u32> = existing
            .iter()
            .copied()
            .filter(|a| !maximized_atoms.contains(a))
            .collect();
        if client.maximized {
            new_states.extend_from_slice(&maximized_atoms);
        }
        if new_states != existing {
            self.conn.change_property32(
                PropMode::REPLACE,
                client.window,
                self.atoms.net_wm_state,
                AtomEnum::ATOM,
                &new_states,
            )?;
        }
        Ok(())
    }

    // =========================================================================
    // Runtime reconfiguration
    // =========================================================================

    /// Apply a field update from the private reconfiguration message and
    /// refresh every client.
    pub fn update_config(&mut self, index: u32, value: u32) -> Result<()> {
        let Some(field) = ConfigField::from_index(index) else {
            log::warn!("No config field with index {}", index);
            return Ok(());
        };
        log::info!("Runtime config update: {:?} = 0x{:x}", field, value);
        field.apply(&mut self.config, value);
        self.refresh_all_clients()?;
        Ok(())
    }

    /// Reapply border widths, colors, geometry and visibility everywhere
    fn refresh_all_clients(&mut self) -> Result<()> {
        for id in self.clients.ids() {
            let Some(client) = self.clients.get(id).cloned() else {
                continue;
            };
            if let Some(frame) = client.frame {
                self.conn.configure_window(
                    frame,
                    &ConfigureWindowAux::new().border_width(self.config.border_width),
                )?;
            }
            self.set_frame_colors(id, self.focused == Some(id))?;
            self.apply_geometry(id)?;
            self.publish_frame_extents(id)?;
            // Clients on invisible workspaces belong off-screen; parking
            // is a no-op for ones already there, so their saved position
            // survives. Not user-hidden, so the next switch shows them.
            if !self.workspace_is_visible(client.workspace) && !client.hidden {
                self.hide(id)?;
                if let Some(c) = self.clients.get_mut(id) {
                    c.was_hidden = false;
                }
            }
        }
        self.conn.flush()?;
        Ok(())
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    pub fn shutdown(&mut self) -> Result<()> {
        if !self.clients.is_empty() {
            log::info!("Shutting down, releasing {} clients", self.clients.len());
        }
        for id in self.clients.ids() {
            self.unmanage(id)?;
        }
        self.conn
            .delete_property(self.root, self.atoms.net_supported)?;
        self.conn.destroy_window(self.check_window)?;
        self.conn.destroy_window(self.nofocus_window)?;
        self.conn.flush()?;
        Ok(())
    }
}

/// Whether another instance of this window manager already owns the
/// display. Reads `_NET_SUPPORTING_WM_CHECK` on the root, then the check
/// window's `_NET_WM_NAME`.
pub fn already_running(conn: &RustConnection, screen_num: usize) -> Result<bool> {
    let root = conn.setup().roots[screen_num].root;
    let check_atom = conn
        .intern_atom(false, b"_NET_SUPPORTING_WM_CHECK")?
        .reply()?
        .atom;
    let name_atom = conn.intern_atom(false, b"_NET_WM_NAME")?.reply()?.atom;
    let utf8 = conn.intern_atom(false, b"UTF8_STRING")?.reply()?.atom;

    let reply = conn
        .get_property(false, root, check_atom, AtomEnum::WINDOW, 0, 1)?
        .reply()?;
    let Some(check_window) = reply.value32().and_then(|mut v| v.next()) else {
        return Ok(false);
    };
    if check_window == 0 {
        return Ok(false);
    }

    let reply = match conn
        .get_property(false, check_window, name_atom, utf8, 0, 64)?
        .reply()
    {
        Ok(r) => r,
        Err(_) => return Ok(false), // stale check window
    };
    Ok(reply.value == WM_NAME.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::truncate_title;

    #[test]
    fn title_fits_an_image_text_request() {
        let long = "x".repeat(512);
        // Wide frame: the glyph budget alone would exceed the request's
        // 255-byte payload limit
        assert!(truncate_title(&long, 1920).len() <= 255);
        // Narrow frame: truncated to the glyph budget
        assert_eq!(truncate_title(&long, 70).len(), 9);
        assert_eq!(truncate_title("short", 1920), "short");
        assert_eq!(truncate_title("", 1920), "");
    }
}
