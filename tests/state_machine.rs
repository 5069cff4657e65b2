//! Server-free scenario tests.
//!
//! These drive the pure pieces (client store, config metrics, placement
//! math) through the same sequences the event handlers produce, without
//! an X connection.

#![allow(dead_code)]

#[path = "../src/types.rs"]
mod types;
#[path = "../src/client.rs"]
mod client;
#[path = "../src/config.rs"]
mod config;
#[path = "../src/geometry.rs"]
mod geometry;

use client::{Client, ClientId, ClientStore};
use config::{ConfigField, RuntimeConfig};
use types::{Rect, Strut};

const MON: Rect = Rect { x: 0, y: 0, width: 1280, height: 800 };

/// The admission placement decision: occupancy-grid placement against the
/// visible windows of the workspace, falling back to centering.
fn admit(
    store: &mut ClientStore,
    config: &RuntimeConfig,
    window: u32,
    ws: usize,
    width: u32,
    height: u32,
) -> ClientId {
    let id = store.insert(Client::new(window, ws, Rect::new(0, 0, width, height)));
    let usable = geometry::usable_region(MON, config.gaps);
    let occupied: Vec<Rect> = store
        .draw_order(ws)
        .iter()
        .filter(|&&other| other != id)
        .filter_map(|&other| store.get(other))
        .filter(|c| !c.hidden)
        .map(|c| outer_rect(config, c))
        .collect();
    let placed = if config.smart_place && !occupied.is_empty() {
        geometry::smart_place(
            width + config.dec_width(false) as u32,
            height + config.dec_height(false) as u32,
            usable,
            &occupied,
        )
    } else {
        None
    };
    let (x, y) = match placed {
        Some(pos) => pos,
        None => geometry::center_position(width, height, MON, config.gaps),
    };
    let c = store.get_mut(id).unwrap();
    c.geom.x = x;
    c.geom.y = y;
    id
}

fn outer_rect(config: &RuntimeConfig, client: &Client) -> Rect {
    Rect {
        x: client.geom.x - config.left_width(client.decorated),
        y: client.geom.y - config.top_height(client.decorated),
        width: client.geom.width + config.dec_width(client.decorated) as u32,
        height: client.geom.height + config.dec_height(client.decorated) as u32,
    }
}

fn bare_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.decorate_new = false;
    config
}

#[test]
fn successive_windows_avoid_each_other_until_the_screen_fills() {
    let config = bare_config();
    let mut store = ClientStore::new(4);

    // First window: nothing to avoid, centered on the 10px grid
    let a = admit(&mut store, &config, 100, 0, 400, 300);
    assert_eq!(store.get(a).unwrap().geom, Rect::new(440, 250, 400, 300));

    // Second: lowest free strip is left of the first, centered in it
    let b = admit(&mut store, &config, 101, 0, 400, 300);
    assert_eq!(store.get(b).unwrap().geom, Rect::new(20, 500, 400, 300));

    // Third: the only strip left wide enough is on the right
    let c = admit(&mut store, &config, 102, 0, 400, 300);
    assert_eq!(store.get(c).unwrap().geom, Rect::new(860, 500, 400, 300));

    // Fourth is too wide for any remaining strip and falls back to center
    let d = admit(&mut store, &config, 103, 0, 900, 300);
    assert_eq!(store.get(d).unwrap().geom.x, 190);
    assert_eq!(store.get(d).unwrap().geom.y, 250);
}

#[test]
fn hidden_windows_do_not_block_placement() {
    let config = bare_config();
    let mut store = ClientStore::new(4);

    let a = admit(&mut store, &config, 100, 0, 400, 300);
    store.get_mut(a).unwrap().hidden = true;

    // With the only other window hidden there is nothing occupied, so the
    // new window is centered exactly where the first one was.
    let b = admit(&mut store, &config, 101, 0, 400, 300);
    assert_eq!(store.get(b).unwrap().geom, store.get(a).unwrap().geom);
}

#[test]
fn placement_only_sees_the_same_workspace() {
    let config = bare_config();
    let mut store = ClientStore::new(4);

    admit(&mut store, &config, 100, 1, 400, 300);
    let b = admit(&mut store, &config, 101, 0, 400, 300);
    assert_eq!(store.get(b).unwrap().geom, Rect::new(440, 250, 400, 300));
}

#[test]
fn decorations_widen_the_occupied_footprint() {
    let mut config = bare_config();
    config.gaps = Strut::default();
    let mut store = ClientStore::new(4);

    let a = admit(&mut store, &config, 100, 0, 400, 300);
    store.get_mut(a).unwrap().decorated = true;

    let outer = outer_rect(&config, store.get(a).unwrap());
    // inner_width 4, title 28, bottom 8
    assert_eq!(outer, Rect::new(436, 218, 408, 344));
}

/// Alt-Tab model: while the cycle is in flight the focus order is left
/// alone; releasing the modifier commits the final choice to the head.
#[test]
fn focus_cycle_commits_only_on_release() {
    let mut store = ClientStore::new(4);
    let ids: Vec<ClientId> = (0..3)
        .map(|i| store.insert(Client::new(100 + i, 0, Rect::new(0, 0, 100, 100))))
        .collect();
    // focus order is [2, 1, 0]

    let mut current = ids[2];
    current = store.next_in_focus_order(0, current).unwrap();
    assert_eq!(current, ids[1]);
    current = store.next_in_focus_order(0, current).unwrap();
    assert_eq!(current, ids[0]);
    // order unchanged mid-cycle, so a third step wraps back to the head
    assert_eq!(store.focus_order(0), &[ids[2], ids[1], ids[0]]);

    store.mark_focused(current);
    assert_eq!(store.focus_order(0), &[ids[0], ids[2], ids[1]]);
}

/// A runtime reconfiguration sweeps clients on invisible workspaces
/// off-screen again. The sweep must be idempotent: an already-parked
/// client keeps its saved position and its hidden flag, and still comes
/// back on-screen when its workspace returns.
#[test]
fn repeated_offscreen_sweeps_keep_the_saved_position() {
    let mut store = ClientStore::new(4);
    let id = store.insert(Client::new(100, 1, Rect::new(250, 40, 400, 300)));

    // workspace 1 goes invisible
    let c = store.get_mut(id).unwrap();
    assert!(c.park());
    c.geom.x = 3300;
    c.was_hidden = false;

    // reconfiguration: the client is already parked, nothing to re-save
    let c = store.get_mut(id).unwrap();
    assert!(!c.park());
    assert!(c.hidden);
    assert_eq!(c.hide_saved_x, 250);

    // workspace 1 returns; the client was not user-hidden
    let c = store.get_mut(id).unwrap();
    assert!(!c.was_hidden);
    assert_eq!(c.unpark(), Some(250));
    assert!(!c.hidden);
}

#[test]
fn runtime_reconfiguration_changes_frame_metrics() {
    let mut config = RuntimeConfig::default();
    assert_eq!(config.frame_extents(true), [4, 4, 32, 12]);

    ConfigField::from_index(2).unwrap().apply(&mut config, 40);
    assert_eq!(config.title_height, 40);
    assert_eq!(config.top_height(true), 44);
    assert_eq!(config.frame_extents(true), [4, 4, 44, 12]);

    // Out-of-range indices are rejected rather than mapped
    assert_eq!(ConfigField::from_index(99), None);
}

#[test]
fn struts_combine_and_shape_the_monocle_target() {
    let panel_top = Strut { left: 0, right: 0, top: 30, bottom: 0 };
    let panel_side = Strut { left: 48, right: 0, top: 0, bottom: 0 };
    let gaps = panel_top.max(panel_side);
    assert_eq!(gaps, Strut { left: 48, right: 0, top: 30, bottom: 0 });

    let target = geometry::monocle_target(MON, gaps, 0, 0, 0, 0);
    assert_eq!(target, Rect::new(48, 30, 1232, 770));
}
