//! EWMH, ICCCM, and private atom management.
//!
//! All property names are interned exactly once at startup; the rest of
//! the window manager refers to them through this struct.

use anyhow::Result;
use x11rb::protocol::xproto::{Atom, ConnectionExt};
use x11rb::rust_connection::RustConnection;

/// Every atom the window manager speaks
#[allow(dead_code)]
pub struct Atoms {
    // ICCCM atoms
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub wm_change_state: Atom,
    pub wm_state: Atom,

    // Motif decoration hints
    pub motif_wm_hints: Atom,

    // Core EWMH atoms
    pub net_supported: Atom,
    pub net_client_list: Atom,
    pub net_active_window: Atom,
    pub net_wm_name: Atom,
    pub net_supporting_wm_check: Atom,
    pub utf8_string: Atom,

    // Workspace-related atoms
    pub net_current_desktop: Atom,
    pub net_number_of_desktops: Atom,
    pub net_desktop_names: Atom,
    pub net_desktop_viewport: Atom,
    pub net_wm_desktop: Atom,

    // Per-client state
    pub net_wm_state: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_frame_extents: Atom,
    pub net_wm_moveresize: Atom,

    // Window type atoms, used by the admission filter
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_type_toolbar: Atom,
    pub net_wm_window_type_menu: Atom,
    pub net_wm_window_type_splash: Atom,
    pub net_wm_window_type_dialog: Atom,
    pub net_wm_window_type_utility: Atom,
    pub net_wm_window_type_popup_menu: Atom,
    pub net_wm_window_type_dropdown_menu: Atom,
    pub net_wm_window_type_tooltip: Atom,
    pub net_wm_window_type_notification: Atom,
    pub net_wm_window_type_combo: Atom,
    pub net_wm_window_type_dnd: Atom,

    // Strut reservations
    pub net_wm_strut: Atom,
    pub net_wm_strut_partial: Atom,

    // Private: runtime reconfiguration message
    pub window_config: Atom,
}

impl Atoms {
    /// Create and intern all required atoms
    pub fn new(conn: &RustConnection) -> Result<Self> {
        Ok(Self {
            wm_protocols: Self::intern(conn, b"WM_PROTOCOLS")?,
            wm_delete_window: Self::intern(conn, b"WM_DELETE_WINDOW")?,
            wm_take_focus: Self::intern(conn, b"WM_TAKE_FOCUS")?,
            wm_change_state: Self::intern(conn, b"WM_CHANGE_STATE")?,
            wm_state: Self::intern(conn, b"WM_STATE")?,
            motif_wm_hints: Self::intern(conn, b"_MOTIF_WM_HINTS")?,
            net_supported: Self::intern(conn, b"_NET_SUPPORTED")?,
            net_client_list: Self::intern(conn, b"_NET_CLIENT_LIST")?,
            net_active_window: Self::intern(conn, b"_NET_ACTIVE_WINDOW")?,
            net_wm_name: Self::intern(conn, b"_NET_WM_NAME")?,
            net_supporting_wm_check: Self::intern(conn, b"_NET_SUPPORTING_WM_CHECK")?,
            utf8_string: Self::intern(conn, b"UTF8_STRING")?,
            net_current_desktop: Self::intern(conn, b"_NET_CURRENT_DESKTOP")?,
            net_number_of_desktops: Self::intern(conn, b"_NET_NUMBER_OF_DESKTOPS")?,
            net_desktop_names: Self::intern(conn, b"_NET_DESKTOP_NAMES")?,
            net_desktop_viewport: Self::intern(conn, b"_NET_DESKTOP_VIEWPORT")?,
            net_wm_desktop: Self::intern(conn, b"_NET_WM_DESKTOP")?,
            net_wm_state: Self::intern(conn, b"_NET_WM_STATE")?,
            net_wm_state_fullscreen: Self::intern(conn, b"_NET_WM_STATE_FULLSCREEN")?,
            net_wm_state_maximized_vert: Self::intern(conn, b"_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: Self::intern(conn, b"_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_frame_extents: Self::intern(conn, b"_NET_FRAME_EXTENTS")?,
            net_wm_moveresize: Self::intern(conn, b"_NET_WM_MOVERESIZE")?,
            net_wm_window_type: Self::intern(conn, b"_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_dock: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_type_toolbar: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_TOOLBAR")?,
            net_wm_window_type_menu: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_MENU")?,
            net_wm_window_type_splash: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_SPLASH")?,
            net_wm_window_type_dialog: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_wm_window_type_utility: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_UTILITY")?,
            net_wm_window_type_popup_menu: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_POPUP_MENU")?,
            net_wm_window_type_dropdown_menu: Self::intern(
                conn,
                b"_NET_WM_WINDOW_TYPE_DROPDOWN_MENU",
            )?,
            net_wm_window_type_tooltip: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_TOOLTIP")?,
            net_wm_window_type_notification: Self::intern(
                conn,
                b"_NET_WM_WINDOW_TYPE_NOTIFICATION",
            )?,
            net_wm_window_type_combo: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_COMBO")?,
            net_wm_window_type_dnd: Self::intern(conn, b"_NET_WM_WINDOW_TYPE_DND")?,
            net_wm_strut: Self::intern(conn, b"_NET_WM_STRUT")?,
            net_wm_strut_partial: Self::intern(conn, b"_NET_WM_STRUT_PARTIAL")?,
            window_config: Self::intern(conn, b"BRAMBLE_WINDOW_CONFIG")?,
        })
    }

    /// Intern an atom name
    fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
        Ok(conn.intern_atom(false, name)?.reply()?.atom)
    }

    /// The atom list published as `_NET_SUPPORTED` on the root window
    pub fn supported(&self) -> Vec<Atom> {
        vec![
            self.net_supported,
            self.net_client_list,
            self.net_active_window,
            self.net_wm_name,
            self.net_supporting_wm_check,
            self.net_current_desktop,
            self.net_number_of_desktops,
            self.net_desktop_names,
            self.net_desktop_viewport,
            self.net_wm_desktop,
            self.net_wm_state,
            self.net_wm_state_fullscreen,
            self.net_wm_state_maximized_vert,
            self.net_wm_state_maximized_horz,
            self.net_frame_extents,
            self.net_wm_moveresize,
            self.net_wm_window_type,
            self.net_wm_strut,
            self.net_wm_strut_partial,
        ]
    }

    /// Window types that are never admitted as clients
    pub fn never_managed_types(&self) -> [Atom; 6] {
        [
            self.net_wm_window_type_popup_menu,
            self.net_wm_window_type_dropdown_menu,
            self.net_wm_window_type_tooltip,
            self.net_wm_window_type_notification,
            self.net_wm_window_type_combo,
            self.net_wm_window_type_dnd,
        ]
    }
}
