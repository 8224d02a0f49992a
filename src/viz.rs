//! Visualization sink (spec §4.13). Rendering itself is out of scope; this
//! module exists so the outer loop has somewhere to hand its sample points
//! without special-casing "no GUI" at every call site.

/// A sink for `(x, y)` point pairs. Mirrors the original's weak-referenced
/// graph callback; this crate never draws anything, it only logs.
pub trait Surface {
    fn draw_points(&self, points: &[(f64, f64)]);
}

/// The only `Surface` this crate wires up: logs the point count at `debug`
/// level and discards the data.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSurface;

impl Surface for LoggingSurface {
    fn draw_points(&self, points: &[(f64, f64)]) {
        log::debug!("draw_points: {} points", points.len());
    }
}
