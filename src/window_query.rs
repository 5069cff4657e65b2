//! Stateless reads of other clients' window properties.
//!
//! These helpers take the connection and return plain data; all of them
//! tolerate the window disappearing mid-query by reporting an error the
//! caller can ignore.

use anyhow::Result;
use x11rb::properties::WmSizeHints;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use crate::atoms::Atoms;
use crate::types::{Strut, WindowType};

/// Longest accepted title, in bytes
const TITLE_MAX: usize = 512;

/// How the admission filter treats a window's EWMH type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// No type, or a normal window: always managed
    Normal,
    /// A type the config's manage mask decides
    Configurable(WindowType),
    /// Popups, tooltips, notifications and friends: never managed
    Never,
}

/// Window title, preferring `_NET_WM_NAME` over `WM_NAME`
pub fn title(conn: &RustConnection, atoms: &Atoms, window: Window) -> String {
    let net = read_text(conn, window, atoms.net_wm_name, atoms.utf8_string);
    if let Some(t) = net {
        if !t.is_empty() {
            return t;
        }
    }
    read_text(conn, window, AtomEnum::WM_NAME.into(), AtomEnum::ANY.into()).unwrap_or_default()
}

fn read_text(conn: &RustConnection, window: Window, prop: Atom, ty: Atom) -> Option<String> {
    let reply = conn
        .get_property(false, window, prop, ty, 0, TITLE_MAX as u32)
        .ok()?
        .reply()
        .ok()?;
    if reply.value.is_empty() {
        return None;
    }
    let mut bytes = reply.value;
    bytes.truncate(TITLE_MAX);
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Classify the window's first `_NET_WM_WINDOW_TYPE` atom
pub fn type_class(conn: &RustConnection, atoms: &Atoms, window: Window) -> TypeClass {
    let reply = match conn
        .get_property(false, window, atoms.net_wm_window_type, AtomEnum::ATOM, 0, 32)
        .ok()
        .and_then(|c| c.reply().ok())
    {
        Some(r) => r,
        None => return TypeClass::Normal,
    };
    let Some(first) = reply.value32().and_then(|mut v| v.next()) else {
        return TypeClass::Normal;
    };

    if atoms.never_managed_types().contains(&first) {
        return TypeClass::Never;
    }
    let configurable = [
        (atoms.net_wm_window_type_dock, WindowType::Dock),
        (atoms.net_wm_window_type_dialog, WindowType::Dialog),
        (atoms.net_wm_window_type_toolbar, WindowType::Toolbar),
        (atoms.net_wm_window_type_menu, WindowType::Menu),
        (atoms.net_wm_window_type_splash, WindowType::Splash),
        (atoms.net_wm_window_type_utility, WindowType::Utility),
    ];
    for (atom, kind) in configurable {
        if first == atom {
            return TypeClass::Configurable(kind);
        }
    }
    TypeClass::Normal
}

/// Whether the Motif hints ask for an undecorated window.
///
/// Field layout: flags, functions, decorations, input_mode, status. The
/// request counts only when the decorations flag bit is set and the
/// decorations field is zero.
pub fn wants_no_decorations(conn: &RustConnection, atoms: &Atoms, window: Window) -> bool {
    const HINTS_DECORATIONS: u32 = 1 << 1;
    let reply = match conn
        .get_property(false, window, atoms.motif_wm_hints, AtomEnum::ANY, 0, 5)
        .ok()
        .and_then(|c| c.reply().ok())
    {
        Some(r) => r,
        None => return false,
    };
    let Some(values) = reply.value32().map(|v| v.collect::<Vec<_>>()) else {
        return false;
    };
    values.len() >= 3 && values[0] & HINTS_DECORATIONS != 0 && values[2] == 0
}

/// Whether the window carries a WM_CLASS hint at all
pub fn has_class_hint(conn: &RustConnection, window: Window) -> bool {
    conn.get_property(
        false,
        window,
        AtomEnum::WM_CLASS,
        AtomEnum::STRING,
        0,
        64,
    )
    .ok()
    .and_then(|c| c.reply().ok())
    .map(|r| !r.value.is_empty())
    .unwrap_or(false)
}

/// Whether WM_PROTOCOLS lists the given protocol atom
pub fn supports_protocol(
    conn: &RustConnection,
    atoms: &Atoms,
    window: Window,
    protocol: Atom,
) -> bool {
    conn.get_property(false, window, atoms.wm_protocols, AtomEnum::ATOM, 0, 32)
        .ok()
        .and_then(|c| c.reply().ok())
        .and_then(|r| r.value32().map(|mut v| v.any(|a| a == protocol)))
        .unwrap_or(false)
}

/// Whether `_NET_WM_STATE` already lists the fullscreen atom
pub fn is_fullscreen(conn: &RustConnection, atoms: &Atoms, window: Window) -> bool {
    conn.get_property(false, window, atoms.net_wm_state, AtomEnum::ATOM, 0, 32)
        .ok()
        .and_then(|c| c.reply().ok())
        .and_then(|r| {
            r.value32()
                .map(|mut v| v.any(|a| a == atoms.net_wm_state_fullscreen))
        })
        .unwrap_or(false)
}

/// Minimum size from WM_NORMAL_HINTS, defaulting to 1x1
pub fn min_size(conn: &RustConnection, window: Window) -> (u32, u32) {
    let hints = WmSizeHints::get_normal_hints(conn, window)
        .ok()
        .and_then(|c| c.reply().ok())
        .flatten();
    match hints.and_then(|h| h.min_size) {
        Some((w, h)) => (w.max(1) as u32, h.max(1) as u32),
        None => (1, 1),
    }
}

/// Strut reservation advertised by a window, if any.
///
/// `_NET_WM_STRUT_PARTIAL` wins over `_NET_WM_STRUT`; only the four edge
/// widths are used.
pub fn strut(conn: &RustConnection, atoms: &Atoms, window: Window) -> Result<Option<Strut>> {
    for prop in [atoms.net_wm_strut_partial, atoms.net_wm_strut] {
        let reply = conn
            .get_property(false, window, prop, AtomEnum::CARDINAL, 0, 12)?
            .reply()?;
        if let Some(values) = reply.value32().map(|v| v.collect::<Vec<_>>()) {
            if values.len() >= 4 {
                return Ok(Some(Strut {
                    left: values[0],
                    right: values[1],
                    top: values[2],
                    bottom: values[3],
                }));
            }
        }
    }
    Ok(None)
}
