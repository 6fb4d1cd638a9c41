use std::f64::consts::PI;

use crate::surface::Surface;

pub type Rgb = (u8, u8, u8);

pub const PROGRESS_COLOR: Rgb = (250, 0, 0);

/// Bresenham line from `from` to `to`, both ends inclusive. Points off the
/// surface are skipped.
pub fn draw_line<S: Surface + ?Sized>(
    surface: &mut S,
    from: (i32, i32),
    to: (i32, i32),
    rgb: Rgb,
) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = (to.1 - y).abs();
    let sx = if to.0 > x { 1 } else { -1 };
    let sy = if to.1 > y { 1 } else { -1 };

    let mut plot = |x: i32, y: i32| {
        if x >= 0 && y >= 0 {
            surface.write_pixel(x as u32, y as u32, rgb.0, rgb.1, rgb.2);
        }
    };

    if dx > dy {
        let mut err = -dx;
        for _ in 0..=dx {
            plot(x, y);
            x += sx;
            err += 2 * dy;
            if err >= 0 {
                y += sy;
                err -= 2 * dx;
            }
        }
    } else {
        let mut err = -dy;
        for _ in 0..=dy {
            plot(x, y);
            y += sy;
            err += 2 * dx;
            if err >= 0 {
                x += sx;
                err -= 2 * dy;
            }
        }
    }
}

/// Clock-hand indicator in the top right corner. Each tick of a slideshow
/// wait sweeps one more radius, starting at twelve o'clock and turning
/// anticlockwise, so a full disc means the wait is over.
#[derive(Debug, Clone, Copy)]
pub struct ProgressRing {
    center: (i32, i32),
    radius: f64,
    ticks: u32,
}

impl ProgressRing {
    pub fn new(screen_width: u32, screen_height: u32, ticks: u32) -> Self {
        let width = f64::from(screen_width);
        let height = f64::from(screen_height);
        let center_x = (width - width / 48.0) as i32;
        let center_y = (height / 27.0) as i32;
        Self {
            center: (center_x, center_y),
            radius: f64::from(center_y) * 0.3,
            ticks: ticks.max(1),
        }
    }

    pub fn center(&self) -> (i32, i32) {
        self.center
    }

    /// End point of the radius drawn at `tick`.
    pub fn hand(&self, tick: u32) -> (i32, i32) {
        let angle = PI / 2.0 + f64::from(tick) * 2.0 * PI / f64::from(self.ticks);
        let length = self.radius.trunc();
        (
            self.center.0 + (length * angle.cos()) as i32,
            self.center.1 - (length * angle.sin()) as i32,
        )
    }

    pub fn draw_tick<S: Surface + ?Sized>(&self, surface: &mut S, tick: u32) {
        draw_line(surface, self.center, self.hand(tick), PROGRESS_COLOR);
    }
}
