//! Pure placement math. Nothing in this module touches the connection,
//! so everything here is unit-testable without a server.
//!
//! All rectangles are logical inner geometries; callers apply decoration
//! offsets through the config helpers before talking to the server.

use crate::types::{Rect, Strut};

/// Resolution of the placement occupancy grid, in pixels
pub const PLACE_RES: u32 = 10;

/// Round up to the next multiple of 10
pub fn ceil10(n: i32) -> i32 {
    (n + 9) - (n + 9) % 10
}

/// Center a window of the given size on a monitor, offset by the gap
/// imbalance and snapped to the 10-pixel grid.
pub fn center_position(width: u32, height: u32, mon: Rect, gaps: Strut) -> (i32, i32) {
    let x = ceil10(
        mon.x + (gaps.left as i32 - gaps.right as i32) / 2 + mon.width as i32 / 2
            - width as i32 / 2,
    );
    let y = ceil10(
        mon.y + (gaps.top as i32 - gaps.bottom as i32) / 2 + mon.height as i32 / 2
            - height as i32 / 2,
    );
    (x, y)
}

/// Target inner geometry for the left half of a monitor.
///
/// `left_w`/`top_h` offset the inner rectangle past the frame edge;
/// `dec_w`/`dec_h` are the frame's total size deltas.
pub fn snap_left_target(mon: Rect, gaps: Strut, left_w: i32, top_h: i32, dec_w: i32, dec_h: i32) -> Rect {
    Rect {
        x: mon.x + gaps.left as i32 + left_w,
        y: mon.y + gaps.top as i32 + top_h,
        width: (mon.width as i32 / 2 - gaps.left as i32 - dec_w).max(1) as u32,
        height: (mon.height as i32 - gaps.top as i32 - gaps.bottom as i32 - dec_h).max(1) as u32,
    }
}

/// Target inner geometry for the right half of a monitor
pub fn snap_right_target(mon: Rect, gaps: Strut, left_w: i32, top_h: i32, dec_w: i32, dec_h: i32) -> Rect {
    Rect {
        x: mon.x + mon.width as i32 / 2 + left_w,
        y: mon.y + gaps.top as i32 + top_h,
        width: (mon.width as i32 / 2 - gaps.right as i32 - dec_w).max(1) as u32,
        height: (mon.height as i32 - gaps.top as i32 - gaps.bottom as i32 - dec_h).max(1) as u32,
    }
}

/// Target inner geometry when filling a monitor inset by gaps (monocle)
pub fn monocle_target(mon: Rect, gaps: Strut, left_w: i32, top_h: i32, dec_w: i32, dec_h: i32) -> Rect {
    Rect {
        x: mon.x + gaps.left as i32 + left_w,
        y: mon.y + gaps.top as i32 + top_h,
        width: (mon.width as i32 - gaps.left as i32 - gaps.right as i32 - dec_w).max(1) as u32,
        height: (mon.height as i32 - gaps.top as i32 - gaps.bottom as i32 - dec_h).max(1) as u32,
    }
}

/// The usable region of a monitor after subtracting the gaps
pub fn usable_region(mon: Rect, gaps: Strut) -> Rect {
    Rect {
        x: mon.x + gaps.left as i32,
        y: mon.y + gaps.top as i32,
        width: mon
            .width
            .saturating_sub(gaps.left)
            .saturating_sub(gaps.right),
        height: mon
            .height
            .saturating_sub(gaps.top)
            .saturating_sub(gaps.bottom),
    }
}

/// Occupancy-grid placement for a new window.
///
/// Builds a coarse grid over the usable region, marks the footprints of
/// existing windows, then scans bottom-up for the lowest horizontal strip
/// of free columns tall and wide enough. The window is centered in the
/// strip it lands in. Returns `None` when no free spot exists; the caller
/// falls back to centering.
pub fn smart_place(width: u32, height: u32, usable: Rect, occupied: &[Rect]) -> Option<(i32, i32)> {
    let cols = (usable.width / PLACE_RES) as usize;
    let rows = (usable.height / PLACE_RES) as usize;
    let need_w = width.div_ceil(PLACE_RES) as usize;
    let need_h = height.div_ceil(PLACE_RES) as usize;
    if cols == 0 || rows == 0 || need_w > cols || need_h > rows {
        return None;
    }

    let mut blocked = vec![false; cols * rows];
    for r in occupied {
        let x0 = ((r.x - usable.x) / PLACE_RES as i32).max(0) as usize;
        let y0 = ((r.y - usable.y) / PLACE_RES as i32).max(0) as usize;
        let x1 = (((r.x + r.width as i32 - usable.x) as f64 / PLACE_RES as f64).ceil() as usize)
            .min(cols);
        let y1 = (((r.y + r.height as i32 - usable.y) as f64 / PLACE_RES as f64).ceil() as usize)
            .min(rows);
        if r.x + (r.width as i32) <= usable.x || r.y + (r.height as i32) <= usable.y {
            continue;
        }
        for row in y0..y1 {
            for col in x0..x1 {
                blocked[row * cols + col] = true;
            }
        }
    }

    // For every cell, the length of the free vertical run ending at it
    let mut run = vec![0usize; cols * rows];
    for row in 0..rows {
        for col in 0..cols {
            run[row * cols + col] = if blocked[row * cols + col] {
                0
            } else if row == 0 {
                1
            } else {
                run[(row - 1) * cols + col] + 1
            };
        }
    }

    // Bottom-up, first strip of contiguous tall-enough columns that is
    // wide enough wins
    for row in (need_h - 1..rows).rev() {
        let mut col = 0;
        while col < cols {
            if run[row * cols + col] < need_h {
                col += 1;
                continue;
            }
            let start = col;
            while col < cols && run[row * cols + col] >= need_h {
                col += 1;
            }
            let strip = col - start;
            if strip >= need_w {
                let cell_x = start + (strip - need_w) / 2;
                let cell_y = row + 1 - need_h;
                return Some((
                    usable.x + (cell_x as u32 * PLACE_RES) as i32,
                    usable.y + (cell_y as u32 * PLACE_RES) as i32,
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MON: Rect = Rect { x: 0, y: 0, width: 1920, height: 1080 };

    #[test]
    fn ceil10_rounds_up() {
        assert_eq!(ceil10(560), 560);
        assert_eq!(ceil10(561), 570);
        assert_eq!(ceil10(0), 0);
        assert_eq!(ceil10(-4), 0);
    }

    #[test]
    fn center_without_gaps() {
        assert_eq!(center_position(800, 600, MON, Strut::default()), (560, 240));
    }

    #[test]
    fn center_respects_gap_imbalance() {
        let gaps = Strut { left: 0, right: 0, top: 30, bottom: 0 };
        let (x, y) = center_position(800, 600, MON, gaps);
        assert_eq!(x, 560);
        // midpoint shifts down by 15 and snaps up to the grid
        assert_eq!(y, 260);
    }

    #[test]
    fn snap_targets_split_the_monitor() {
        let gaps = Strut::default();
        let left = snap_left_target(MON, gaps, 4, 32, 8, 44);
        assert_eq!(left, Rect::new(4, 32, 952, 1036));
        let right = snap_right_target(MON, gaps, 4, 32, 8, 44);
        assert_eq!(right, Rect::new(964, 32, 952, 1036));
    }

    #[test]
    fn monocle_fills_minus_gaps_and_frame() {
        let gaps = Strut { left: 0, right: 0, top: 30, bottom: 0 };
        let target = monocle_target(MON, gaps, 4, 32, 8, 44);
        assert_eq!(target, Rect::new(4, 62, 1912, 1006));
    }

    #[test]
    fn smart_place_empty_monitor_goes_bottom_left() {
        let pos = smart_place(800, 600, MON, &[]).unwrap();
        // one full-width strip at the bottom, centered horizontally
        assert_eq!(pos, (560, 480));
    }

    #[test]
    fn smart_place_avoids_occupied_half() {
        let occupied = [Rect::new(0, 0, 960, 1080)];
        let (x, y) = smart_place(800, 600, MON, &occupied).unwrap();
        // free strip is the right half, 96 cells wide; centered in it
        assert_eq!((x, y), (1040, 480));
    }

    #[test]
    fn smart_place_full_monitor_fails() {
        let occupied = [Rect::new(0, 0, 1920, 1080)];
        assert!(smart_place(800, 600, MON, &occupied).is_none());
    }

    #[test]
    fn smart_place_too_big_fails() {
        assert!(smart_place(2000, 600, MON, &[]).is_none());
        let usable = usable_region(MON, Strut { left: 0, right: 0, top: 0, bottom: 600 });
        assert!(smart_place(800, 600, usable, &[]).is_none());
    }

    #[test]
    fn usable_region_subtracts_gaps() {
        let gaps = Strut { left: 10, right: 20, top: 30, bottom: 40 };
        assert_eq!(usable_region(MON, gaps), Rect::new(10, 30, 1890, 1010));
    }
}
