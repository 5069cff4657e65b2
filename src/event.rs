//! Event dispatch.
//!
//! One handler per event type, written as free functions over `&mut Wm`.
//! Handlers run to completion and tolerate stale window references; the
//! drag controller below runs its own nested loop that still services a
//! whitelist of events.

use anyhow::{bail, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Allow, ButtonPressEvent, ClientMessageEvent, ConfigureNotifyEvent, ConfigureRequestEvent,
    ConfigureWindowAux, ConnectionExt, EnterNotifyEvent, EventMask, ExposeEvent, GrabMode,
    GrabStatus, KeyPressEvent, KeyReleaseEvent, Mapping, PropertyNotifyEvent, StackMode,
    Timestamp, UnmapNotifyEvent,
};
use x11rb::protocol::{ErrorKind, Event};
use x11rb::x11_utils::X11Error;
use x11rb::{CURRENT_TIME, NONE};

use crate::client::ClientId;
use crate::window_query;
use crate::wm::{Wm, XK_ALT_L, XK_SUPER_L, XK_SUPER_R, XK_TAB};

// Keysyms with a Super+key shortcut bound to them
pub const SHORTCUT_KEYSYMS: [u32; 9] = [
    0x6d,   // m: monocle
    0x63,   // c: center
    0x66,   // f: fullscreen
    0x71,   // q: close
    0x69,   // i: toggle decorations
    0xff51, // Left: snap left
    0xff53, // Right: snap right
    0x64,   // d: hide all
    0xff08, // BackSpace: quit
];

const MOD_SHIFT: u16 = 1;
const MOD_CONTROL: u16 = 4;
const MOD_ALT: u16 = 8;
const MOD_SUPER: u16 = 64;

// _NET_WM_MOVERESIZE directions
const MOVERESIZE_SIZE_RIGHT: u32 = 3;
const MOVERESIZE_SIZE_BOTTOMRIGHT: u32 = 4;
const MOVERESIZE_SIZE_BOTTOM: u32 = 5;
const MOVERESIZE_MOVE: u32 = 8;

// _NET_WM_STATE actions
const STATE_REMOVE: u32 = 0;
const STATE_ADD: u32 = 1;
const STATE_TOGGLE: u32 = 2;

/// Blocking event loop; runs until a shortcut or shutdown clears
/// `wm.running`.
pub fn run(wm: &mut Wm) -> Result<()> {
    wm.conn.flush()?;
    while wm.running {
        let event = wm.conn.wait_for_event()?;
        handle_event(wm, event)?;
    }
    Ok(())
}

pub fn handle_event(wm: &mut Wm, event: Event) -> Result<()> {
    match event {
        Event::MapRequest(e) => wm.manage_window(e.window)?,
        Event::ConfigureRequest(e) => handle_configure_request(wm, e)?,
        Event::ConfigureNotify(e) => handle_configure_notify(wm, e)?,
        Event::DestroyNotify(e) => {
            if let Some(id) = wm.clients.find_by_window(e.window) {
                wm.unmanage(id)?;
            }
        }
        Event::UnmapNotify(e) => handle_unmap_notify(wm, e)?,
        Event::ReparentNotify(e) => {
            // A client pulled out of its frame by someone else is no
            // longer ours to manage. Reparents into our own frame or back
            // to the root are our own doing.
            if let Some(id) = wm.clients.find_by_window(e.window) {
                let ours = wm.clients.get(id).map(|c| {
                    c.window != e.window || c.frame == Some(e.parent) || e.parent == wm.root
                });
                if ours == Some(false) {
                    log::info!("Window 0x{:x} reparented away, releasing it", e.window);
                    wm.unmanage(id)?;
                }
            }
        }
        Event::EnterNotify(e) => handle_enter_notify(wm, e)?,
        Event::Expose(e) => handle_expose(wm, e)?,
        Event::PropertyNotify(e) => handle_property_notify(wm, e)?,
        Event::KeyPress(e) => handle_key_press(wm, e)?,
        Event::KeyRelease(e) => handle_key_release(wm, e)?,
        Event::ButtonPress(e) => handle_button_press(wm, e)?,
        Event::ClientMessage(e) => handle_client_message(wm, e)?,
        Event::MappingNotify(e) => {
            if e.request != Mapping::POINTER {
                log::info!("Keyboard mapping changed, re-grabbing keys");
                wm.refresh_keyboard_maps()?;
                wm.grab_keys()?;
            }
        }
        Event::Error(e) => handle_x11_error(e)?,
        _ => {}
    }
    Ok(())
}

/// Benign protocol errors are expected with short-lived windows and are
/// dropped; anything else brings the manager down.
fn handle_x11_error(error: X11Error) -> Result<()> {
    match error.error_kind {
        ErrorKind::Window | ErrorKind::Drawable | ErrorKind::Match | ErrorKind::Access => {
            log::debug!(
                "Ignoring X error {:?} (request {})",
                error.error_kind,
                error.major_opcode
            );
            Ok(())
        }
        _ => bail!(
            "fatal X error {:?} (request {})",
            error.error_kind,
            error.major_opcode
        ),
    }
}

/// Forward the request, then bring our record in line with it. The
/// request names the client's desired inner geometry.
fn handle_configure_request(wm: &mut Wm, e: ConfigureRequestEvent) -> Result<()> {
    let aux = ConfigureWindowAux::from_configure_request(&e);
    wm.conn.configure_window(e.window, &aux)?;

    let Some(id) = wm.clients.find_by_window(e.window) else {
        wm.conn.flush()?;
        return Ok(());
    };
    if wm.clients.get(id).map(|c| c.fullscreen).unwrap_or(false) {
        return Ok(());
    }

    // Requests name inner coordinates; express them as deltas against the
    // current geometry so the frame math stays in one place.
    if let Some(client) = wm.clients.get(id) {
        let geom = client.geom;
        let dx = aux.x.map(|x| x - geom.x).unwrap_or(0);
        let dy = aux.y.map(|y| y - geom.y).unwrap_or(0);
        let dw = aux.width.map(|w| w as i32 - geom.width as i32).unwrap_or(0);
        let dh = aux
            .height
            .map(|h| h as i32 - geom.height as i32)
            .unwrap_or(0);
        // Apply even for zero deltas: the forward above repositioned the
        // client window inside its frame, and re-applying restores it.
        if aux.x.is_some() || aux.y.is_some() {
            wm.move_relative(id, dx, dy)?;
        }
        if aux.width.is_some() || aux.height.is_some() {
            wm.resize_relative(id, dw, dh)?;
        }
    }
    if aux.stack_mode == Some(StackMode::ABOVE)
        && wm.clients.get(id).map(|c| c.hidden).unwrap_or(false)
    {
        wm.show(id)?;
    }
    wm.conn.flush()?;
    Ok(())
}

fn handle_configure_notify(wm: &mut Wm, e: ConfigureNotifyEvent) -> Result<()> {
    if e.window == wm.root {
        log::info!("Root geometry changed, re-reading monitors");
        wm.monitors.rescan(&wm.conn, wm.screen_num)?;
        return Ok(());
    }

    // Some clients move themselves within the frame; push them back
    if let Some(id) = wm.clients.find_by_window(e.window) {
        let Some(client) = wm.clients.get(id) else {
            return Ok(());
        };
        if client.window == e.window && client.frame.is_some() {
            let lw = wm.config.left_width(client.decorated);
            let th = wm.config.top_height(client.decorated);
            if e.x as i32 != lw || e.y as i32 != th {
                wm.apply_geometry(id)?;
                wm.conn.flush()?;
            }
        }
    }
    Ok(())
}

fn handle_unmap_notify(wm: &mut Wm, e: UnmapNotifyEvent) -> Result<()> {
    let Some(id) = wm.clients.find_by_window(e.window) else {
        // Slow-dying clients can leave the workspace empty without a
        // focus target; park focus so key grabs keep working
        if wm.clients.focus_order(wm.current_workspace).is_empty() {
            wm.focus(None)?;
        }
        wm.scan_struts()?;
        return Ok(());
    };
    if e.event == wm.root {
        log::debug!("Ignoring root unmap for 0x{:x}", e.window);
        return Ok(());
    }
    wm.unmanage(id)
}

fn handle_enter_notify(wm: &mut Wm, e: EnterNotifyEvent) -> Result<()> {
    if !wm.config.focus_follows_pointer {
        return Ok(());
    }
    let Some(id) = wm.clients.find_by_window(e.event) else {
        return Ok(());
    };
    if wm.focused == Some(id) {
        return Ok(());
    }
    // Crossing into a window must not yank the pointer
    let warp = wm.config.warp_pointer;
    wm.config.warp_pointer = false;
    let result = wm.focus(Some(id));
    wm.config.warp_pointer = warp;
    result
}

fn handle_expose(wm: &mut Wm, e: ExposeEvent) -> Result<()> {
    if e.count != 0 {
        return Ok(());
    }
    if let Some(id) = wm.clients.find_by_window(e.window) {
        wm.draw_title(id, wm.focused == Some(id))?;
        wm.conn.flush()?;
    }
    Ok(())
}

fn handle_property_notify(wm: &mut Wm, e: PropertyNotifyEvent) -> Result<()> {
    let Some(id) = wm.clients.find_by_window(e.window) else {
        return Ok(());
    };
    if e.atom == wm.atoms.net_wm_name || e.atom == u32::from(x11rb::protocol::xproto::AtomEnum::WM_NAME) {
        let title = window_query::title(&wm.conn, &wm.atoms, e.window);
        if let Some(client) = wm.clients.get_mut(id) {
            client.title = title;
        }
        wm.draw_title(id, wm.focused == Some(id))?;
        wm.conn.flush()?;
    }
    Ok(())
}

fn clean_mods(state: u16) -> u16 {
    state & (MOD_SHIFT | MOD_CONTROL | MOD_ALT | MOD_SUPER)
}

fn handle_key_press(wm: &mut Wm, e: KeyPressEvent) -> Result<()> {
    let keysym = wm.keysym_for_keycode(e.detail);
    let state = clean_mods(e.state.into());

    if keysym == XK_SUPER_L || keysym == XK_SUPER_R {
        wm.super_pressed_alone = true;
        return Ok(());
    }

    if state & MOD_SUPER != 0 {
        wm.super_pressed_alone = false;

        for (binding, command) in wm.exec_bindings.clone() {
            if binding.keysym == keysym && binding.modifiers == state {
                crate::startup::spawn(&command);
                return Ok(());
            }
        }
        if state == MOD_SUPER && run_shortcut(wm, keysym)? {
            return Ok(());
        }
        if (0x31..=0x39).contains(&keysym) {
            let ws = (keysym - 0x31) as usize;
            if ws < wm.clients.workspace_count() {
                if state & MOD_SHIFT != 0 {
                    if let Some(id) = wm.focused {
                        wm.send_to_workspace(id, ws)?;
                    }
                } else {
                    wm.switch_workspace(ws)?;
                }
            }
            return Ok(());
        }
    } else if keysym == XK_TAB && state & MOD_ALT != 0 {
        if !wm.alt_tabbing {
            wm.alt_tabbing = true;
            wm.last_focused = wm.focused;
        }
        wm.cycle_focus()?;
        return Ok(());
    } else {
        for (bound, command) in wm.media_bindings.clone() {
            if bound == keysym {
                crate::startup::spawn(&command);
                return Ok(());
            }
        }
    }

    // Not ours; pass it on to the focused client
    if let Some(window) = wm.focused.and_then(|id| wm.clients.get(id)).map(|c| c.window) {
        let mut forwarded = e;
        forwarded.event = window;
        wm.conn
            .send_event(false, window, EventMask::KEY_PRESS, forwarded)?;
        wm.conn.flush()?;
    }
    Ok(())
}

fn run_shortcut(wm: &mut Wm, keysym: u32) -> Result<bool> {
    match keysym {
        0x64 => {
            wm.toggle_hide_all()?;
            return Ok(true);
        }
        0xff08 => {
            wm.running = false;
            return Ok(true);
        }
        _ => {}
    }
    let Some(id) = wm.focused else {
        return Ok(SHORTCUT_KEYSYMS.contains(&keysym));
    };
    match keysym {
        0x6d => wm.toggle_monocle(id)?,
        0x63 => wm.center(id)?,
        0x66 => wm.toggle_fullscreen(id)?,
        0x71 => wm.close_client(id)?,
        0x69 => wm.toggle_decorations(id)?,
        0xff51 => wm.snap_left(id)?,
        0xff53 => wm.snap_right(id)?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn handle_key_release(wm: &mut Wm, e: KeyReleaseEvent) -> Result<()> {
    let keysym = wm.keysym_for_keycode(e.detail);
    match keysym {
        XK_ALT_L => {
            if wm.alt_tabbing {
                wm.finish_alt_tab();
            }
        }
        XK_SUPER_L | XK_SUPER_R => {
            if wm.super_pressed_alone {
                wm.super_pressed_alone = false;
                if let Some(command) = wm.super_tap_command.clone() {
                    crate::startup::spawn(&command);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// The drag controller.
///
/// Unmodified clicks landing in the client's content area are replayed to
/// the application. Everything else runs a pointer-grab loop that moves
/// or resizes with the pointer and handles the click gestures on the
/// frame (double-click maximize, middle-click close, right-click hide).
fn handle_button_press(wm: &mut Wm, e: ButtonPressEvent) -> Result<()> {
    let pointer = wm.conn.query_pointer(wm.root)?.reply()?;
    let target = wm
        .clients
        .find_by_window(e.event)
        .or_else(|| wm.clients.find_by_window(pointer.child));
    let Some(id) = target else {
        wm.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
        wm.conn.flush()?;
        return Ok(());
    };

    if e.detail == 1 && wm.focused != Some(id) {
        if let Some(ws) = wm.clients.get(id).map(|c| c.workspace) {
            wm.switch_workspace(ws)?;
        }
        wm.last_focused = wm.focused;
        wm.focus(Some(id))?;
    }

    let state = clean_mods(e.state.into());
    if state & wm.config.move_mask == 0 {
        // No modifier: replay clicks that land in the content area
        let Some(client) = wm.clients.get(id) else {
            wm.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
            return Ok(());
        };
        let Ok(within) = wm.conn.query_pointer(client.window)?.reply() else {
            // Died under the click
            wm.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
            wm.conn.flush()?;
            return Ok(());
        };
        let (wx, wy) = (within.win_x as i32, within.win_y as i32);
        if wx > 0 && wy > 0 && wx < client.geom.width as i32 && wy < client.geom.height as i32 {
            wm.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
            wm.conn.flush()?;
            return Ok(());
        }
    }
    // Past this point the click is ours
    wm.conn.allow_events(Allow::ASYNC_POINTER, CURRENT_TIME)?;

    if wm.clients.get(id).map(|c| c.fullscreen).unwrap_or(true) {
        return Ok(());
    }

    let Some(start) = wm.clients.get(id).map(|c| c.geom) else {
        return Ok(());
    };
    let (px, py) = (pointer.root_x as i32, pointer.root_y as i32);
    // Clicks below the inner bottom edge land on the resize strip
    let lower_click = py > start.y + start.height as i32;
    let frame = wm.clients.get(id).and_then(|c| c.frame);
    let pressed_button = e.detail;

    if !grab_drag_pointer(wm)? {
        return Ok(());
    }

    let mut last_motion: Timestamp = 0;
    let mut drag_happened = false;
    loop {
        let event = wm.conn.wait_for_event()?;
        match event {
            Event::ButtonRelease(rel) => {
                if !drag_happened {
                    match rel.detail {
                        1 => {
                            if rel.time.wrapping_sub(wm.last_left_release)
                                < wm.config.double_click_interval
                            {
                                wm.super_pressed_alone = false;
                                wm.toggle_monocle(id)?;
                                // the pair is spent; a third click starts over
                                wm.last_left_release = 0;
                            } else {
                                wm.last_left_release = rel.time;
                            }
                        }
                        2 => {
                            if frame.is_some() && rel.child == frame.unwrap_or(NONE) {
                                wm.super_pressed_alone = false;
                                wm.close_client(id)?;
                            }
                        }
                        3 => {
                            if frame.is_some() && rel.child == frame.unwrap_or(NONE) {
                                wm.super_pressed_alone = false;
                                wm.hide(id)?;
                                if wm.focused == Some(id) {
                                    wm.focus(None)?;
                                }
                            }
                        }
                        _ => {}
                    }
                }
                break;
            }
            Event::MotionNotify(m) => {
                if m.time.wrapping_sub(last_motion) < wm.config.pointer_interval {
                    continue;
                }
                last_motion = m.time;
                let state = clean_mods(m.state.into());
                let (dx, dy) = (m.root_x as i32 - px, m.root_y as i32 - py);
                let resizing = lower_click
                    || (state & wm.config.resize_mask != 0
                        && pressed_button == wm.config.resize_button);
                if resizing {
                    wm.super_pressed_alone = false;
                    wm.resize_absolute(id, start.width as i32 + dx, start.height as i32 + dy)?;
                    drag_happened = true;
                } else if pressed_button == wm.config.move_button {
                    wm.super_pressed_alone = false;
                    if wm.clients.get(id).map(|c| c.maximized).unwrap_or(false) {
                        // Dragging a maximized window restores its size
                        let saved = wm.clients.get(id).map(|c| c.saved_geom).unwrap_or(start);
                        wm.resize_absolute(id, saved.width as i32, saved.height as i32)?;
                    }
                    wm.move_absolute(id, start.x + dx, start.y + dy)?;
                    drag_happened = true;
                }
                wm.conn.flush()?;
            }
            Event::MapRequest(_)
            | Event::ConfigureRequest(_)
            | Event::Expose(_)
            | Event::FocusIn(_) => handle_event(wm, event)?,
            Event::Error(err) => handle_x11_error(err)?,
            _ => {}
        }
        if !wm.clients.contains(id) {
            break;
        }
    }
    wm.conn.ungrab_pointer(CURRENT_TIME)?;
    wm.conn.flush()?;
    Ok(())
}

fn grab_drag_pointer(wm: &Wm) -> Result<bool> {
    let reply = wm
        .conn
        .grab_pointer(
            false,
            wm.root,
            EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
            NONE,
            wm.normal_cursor,
            CURRENT_TIME,
        )?
        .reply()?;
    Ok(reply.status == GrabStatus::SUCCESS)
}

/// Move/resize initiated by the client via `_NET_WM_MOVERESIZE`
fn drag_client(wm: &mut Wm, id: ClientId, is_move: bool) -> Result<()> {
    let Some(client) = wm.clients.get(id) else {
        return Ok(());
    };
    let start = client.geom;
    let pointer = wm.conn.query_pointer(wm.root)?.reply()?;
    let (px, py) = (pointer.root_x as i32, pointer.root_y as i32);

    if !grab_drag_pointer(wm)? {
        return Ok(());
    }
    loop {
        let event = wm.conn.wait_for_event()?;
        match event {
            Event::ButtonRelease(_) => break,
            Event::MotionNotify(m) => {
                let (dx, dy) = (m.root_x as i32 - px, m.root_y as i32 - py);
                if is_move {
                    wm.move_absolute(id, start.x + dx, start.y + dy)?;
                } else {
                    wm.resize_absolute(id, start.width as i32 + dx, start.height as i32 + dy)?;
                }
                wm.conn.flush()?;
            }
            Event::MapRequest(_)
            | Event::ConfigureRequest(_)
            | Event::Expose(_)
            | Event::FocusIn(_) => handle_event(wm, event)?,
            Event::Error(err) => handle_x11_error(err)?,
            _ => {}
        }
        if !wm.clients.contains(id) {
            break;
        }
    }
    wm.conn.ungrab_pointer(CURRENT_TIME)?;
    wm.conn.flush()?;
    Ok(())
}

fn handle_client_message(wm: &mut Wm, e: ClientMessageEvent) -> Result<()> {
    let data = e.data.as_data32();

    if e.type_ == wm.atoms.net_wm_state {
        let Some(id) = wm.clients.find_by_window(e.window) else {
            return Ok(());
        };
        let maximized = [
            wm.atoms.net_wm_state_maximized_horz,
            wm.atoms.net_wm_state_maximized_vert,
        ];
        if maximized.contains(&data[1]) || maximized.contains(&data[2]) {
            let is_max = wm.clients.get(id).map(|c| c.maximized).unwrap_or(false);
            match data[0] {
                STATE_ADD if !is_max => wm.toggle_monocle(id)?,
                STATE_REMOVE if is_max => wm.toggle_monocle(id)?,
                STATE_TOGGLE => wm.toggle_monocle(id)?,
                _ => {}
            }
        }
        if data[1] == wm.atoms.net_wm_state_fullscreen
            || data[2] == wm.atoms.net_wm_state_fullscreen
        {
            match data[0] {
                STATE_REMOVE => wm.set_fullscreen(id, false, false, true)?,
                STATE_ADD => wm.set_fullscreen(id, false, true, true)?,
                STATE_TOGGLE => wm.set_fullscreen(id, true, true, true)?,
                _ => {}
            }
        }
    } else if e.type_ == wm.atoms.net_active_window {
        if let Some(id) = wm.clients.find_by_window(e.window) {
            wm.last_focused = wm.focused;
            wm.focus(Some(id))?;
        }
    } else if e.type_ == wm.atoms.net_current_desktop {
        wm.switch_workspace(data[0] as usize)?;
    } else if e.type_ == wm.atoms.net_wm_moveresize {
        let Some(id) = wm.clients.find_by_window(e.window) else {
            return Ok(());
        };
        match data[2] {
            MOVERESIZE_MOVE => drag_client(wm, id, true)?,
            MOVERESIZE_SIZE_RIGHT | MOVERESIZE_SIZE_BOTTOM | MOVERESIZE_SIZE_BOTTOMRIGHT => {
                drag_client(wm, id, false)?
            }
            _ => {}
        }
    } else if e.type_ == wm.atoms.wm_change_state {
        let Some(id) = wm.clients.find_by_window(e.window) else {
            return Ok(());
        };
        if wm.clients.get(id).map(|c| c.hidden).unwrap_or(false) {
            wm.show(id)?;
            wm.focus(Some(id))?;
        } else {
            wm.hide(id)?;
        }
    } else if e.type_ == wm.atoms.window_config {
        wm.update_config(data[0], data[1])?;
    }
    Ok(())
}
