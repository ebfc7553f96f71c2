//! Raster-to-polygon conversion of a binary mask
//!
//! The mask is first block-aggregated to the output scale, then every
//! 4-connected group of true cells is traced along pixel edges. Rings are
//! built on the corner lattice, so coordinates are exact multiples of the
//! (aggregated) cell size.

use crate::morphology::{label_components, Components, Connectivity};
use geo::{Area, LineString, Polygon};
use paddyscan_core::raster::{GeoTransform, Raster};
use paddyscan_core::{Error, RasterElement, Result};
use std::collections::HashMap;
use tracing::debug;

/// A corner of the pixel lattice, `(col, row)`
type Vertex = (i64, i64);

/// One traced component
#[derive(Debug, Clone)]
pub struct TracedPolygon {
    /// 1-based component label in row-major order of first cell
    pub component: usize,
    /// Number of aggregated cells in the component
    pub pixels: usize,
    pub polygon: Polygon<f64>,
}

/// Block factor that brings the mask to `scale` meters.
///
/// With `best_effort` the factor keeps growing until the aggregated grid
/// holds at most `max_pixels` cells; without it an oversized grid is a
/// configuration error.
pub fn aggregation_factor(mask: &Raster<u8>, scale: f64, max_pixels: u64, best_effort: bool) -> Result<usize> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::config("vectorize.scale", format!("{scale} must be positive")));
    }
    if max_pixels == 0 {
        return Err(Error::config("vectorize.max_pixels", "must be at least 1"));
    }
    let (dx, _) = mask.ground_cell_size();
    let mut factor = if dx > 0.0 { ((scale / dx).round() as usize).max(1) } else { 1 };
    let (rows, cols) = mask.shape();

    loop {
        let cells = (rows.div_ceil(factor) * cols.div_ceil(factor)) as u64;
        if cells <= max_pixels {
            return Ok(factor);
        }
        if !best_effort {
            return Err(Error::config(
                "vectorize.max_pixels",
                format!("{cells} cells at {scale} m exceed the limit of {max_pixels}"),
            ));
        }
        factor += 1;
    }
}

/// Majority block aggregation.
///
/// A block is true when at least half of its in-grid cells are true.
/// No-data cells count as false. Partial blocks at the right and bottom
/// edges are voted over the cells they cover.
pub fn aggregate(mask: &Raster<u8>, factor: usize) -> Result<Raster<u8>> {
    let factor = factor.max(1);
    let (rows, cols) = mask.shape();
    let nodata = mask.nodata();
    let is_set = |r: usize, c: usize| {
        let v = unsafe { mask.get_unchecked(r, c) };
        v != 0 && !v.is_nodata(nodata)
    };

    let out_rows = rows.div_ceil(factor);
    let out_cols = cols.div_ceil(factor);
    let mut data = Vec::with_capacity(out_rows * out_cols);
    for br in 0..out_rows {
        let r0 = br * factor;
        let r1 = (r0 + factor).min(rows);
        for bc in 0..out_cols {
            let c0 = bc * factor;
            let c1 = (c0 + factor).min(cols);
            let mut ones = 0usize;
            for r in r0..r1 {
                for c in c0..c1 {
                    if is_set(r, c) {
                        ones += 1;
                    }
                }
            }
            let cells = (r1 - r0) * (c1 - c0);
            data.push(u8::from(ones > 0 && 2 * ones >= cells));
        }
    }

    let mut out = Raster::from_vec(data, out_rows, out_cols)?;
    out.set_transform(mask.transform().coarsened(factor));
    out.set_crs(mask.crs().cloned());
    Ok(out)
}

/// Trace every 4-connected group of true cells into a polygon.
///
/// The largest ring of each group is its exterior and the remaining rings
/// are holes. Polygons come out in component order.
pub fn polygonize(mask: &Raster<u8>) -> Vec<TracedPolygon> {
    let (rows, cols) = mask.shape();
    let components = label_components(mask, Connectivity::Four);
    let edges = boundary_edges(&components, rows, cols);
    let transform = mask.transform();

    let polygons: Vec<TracedPolygon> = edges
        .iter()
        .enumerate()
        .filter_map(|(i, component_edges)| {
            let rings = chain_rings(component_edges);
            let polygon = assemble(rings, transform)?;
            Some(TracedPolygon {
                component: i + 1,
                pixels: components.sizes[i],
                polygon,
            })
        })
        .collect();

    debug!("Traced {} polygons from {} components", polygons.len(), components.count());
    polygons
}

// ----------------------------------------------------------------------
// Boundary tracing
// ----------------------------------------------------------------------

/// Directed boundary edges per component, walking each cell clockwise in
/// row-down pixel space so the interior is on the right.
fn boundary_edges(components: &Components, rows: usize, cols: usize) -> Vec<Vec<(Vertex, Vertex)>> {
    let labels = &components.labels;
    let label_at = |r: i64, c: i64| -> u32 {
        if r < 0 || c < 0 || r >= rows as i64 || c >= cols as i64 {
            0
        } else {
            labels[r as usize * cols + c as usize]
        }
    };

    let mut edges = vec![Vec::new(); components.count()];
    for r in 0..rows as i64 {
        for c in 0..cols as i64 {
            let label = label_at(r, c);
            if label == 0 {
                continue;
            }
            let list = &mut edges[(label - 1) as usize];
            if label_at(r - 1, c) != label {
                list.push(((c, r), (c + 1, r)));
            }
            if label_at(r, c + 1) != label {
                list.push(((c + 1, r), (c + 1, r + 1)));
            }
            if label_at(r + 1, c) != label {
                list.push(((c + 1, r + 1), (c, r + 1)));
            }
            if label_at(r, c - 1) != label {
                list.push(((c, r + 1), (c, r)));
            }
        }
    }
    edges
}

/// Preference when several edges leave a vertex: right, straight, left.
///
/// Turning right keeps corner-touching cells in separate rings, which is
/// what 4-connectivity requires.
fn turn_rank(heading: Vertex, next: Vertex) -> u8 {
    if next == (-heading.1, heading.0) {
        0
    } else if next == heading {
        1
    } else if next == (heading.1, -heading.0) {
        2
    } else {
        3
    }
}

fn direction(edge: (Vertex, Vertex)) -> Vertex {
    (edge.1 .0 - edge.0 .0, edge.1 .1 - edge.0 .1)
}

/// Link directed edges into closed rings
fn chain_rings(edges: &[(Vertex, Vertex)]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let mut ring = vec![edges[first].0];
        let mut current = first;

        loop {
            let (_, to) = edges[current];
            ring.push(to);
            let heading = direction(edges[current]);
            let next = outgoing.get(&to).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|&e| !used[e] || e == first)
                    .min_by_key(|&e| turn_rank(heading, direction(edges[e])))
            });
            match next {
                Some(e) if e == first => break,
                Some(e) => {
                    used[e] = true;
                    current = e;
                }
                None => break,
            }
        }

        if ring.len() >= 5 && ring.first() == ring.last() {
            rings.push(merge_collinear(&ring));
        }
    }
    rings
}

/// Drop vertices in the middle of straight runs; keeps the ring closed
fn merge_collinear(ring: &[Vertex]) -> Vec<Vertex> {
    let open = &ring[..ring.len() - 1];
    let n = open.len();
    let mut out: Vec<Vertex> = (0..n)
        .filter(|&i| {
            let prev = open[(i + n - 1) % n];
            let here = open[i];
            let next = open[(i + 1) % n];
            direction((prev, here)) != direction((here, next))
        })
        .map(|i| open[i])
        .collect();
    if let Some(&start) = out.first() {
        out.push(start);
    }
    out
}

fn lattice_area(ring: &[Vertex]) -> i64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum::<i64>()
        .abs()
}

fn to_map(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    ring.iter()
        .map(|&(c, r)| transform.corner_to_geo(c as f64, r as f64))
        .collect::<Vec<_>>()
        .into()
}

/// Exterior = largest ring, everything else becomes a hole
fn assemble(mut rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Option<Polygon<f64>> {
    let outer = rings
        .iter()
        .enumerate()
        .max_by_key(|(_, ring)| lattice_area(ring))
        .map(|(i, _)| i)?;
    let exterior = rings.swap_remove(outer);
    let holes = rings.iter().map(|ring| to_map(ring, transform)).collect();
    let polygon = Polygon::new(to_map(&exterior, transform), holes);
    (polygon.unsigned_area() > 0.0).then_some(polygon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use paddyscan_core::CRS;

    fn mask_from(rows: &[&str]) -> Raster<u8> {
        let data: Vec<u8> = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        let mut m = Raster::from_vec(data, rows.len(), rows[0].len()).unwrap();
        m.set_transform(GeoTransform::new(0.0, rows.len() as f64, 1.0, -1.0));
        m
    }

    #[test]
    fn test_rectangle_traces_to_four_corners() {
        let m = mask_from(&["....", ".##.", ".##.", "...."]);
        let polys = polygonize(&m);
        assert_eq!(polys.len(), 1);
        let p = &polys[0].polygon;
        // 4 corners + closing point
        assert_eq!(p.exterior().0.len(), 5);
        assert!(p.interiors().is_empty());
        assert_relative_eq!(p.unsigned_area(), 4.0);
        assert_eq!(polys[0].pixels, 4);
    }

    #[test]
    fn test_ring_with_hole() {
        let m = mask_from(&["###", "#.#", "###"]);
        let polys = polygonize(&m);
        assert_eq!(polys.len(), 1);
        let p = &polys[0].polygon;
        assert_eq!(p.interiors().len(), 1);
        assert_relative_eq!(p.unsigned_area(), 8.0);
    }

    #[test]
    fn test_diagonal_cells_are_separate_polygons() {
        let m = mask_from(&["#.", ".#"]);
        let polys = polygonize(&m);
        assert_eq!(polys.len(), 2);
        for p in &polys {
            assert_relative_eq!(p.polygon.unsigned_area(), 1.0);
        }
    }

    #[test]
    fn test_l_shape_area_and_vertices() {
        let m = mask_from(&["#..", "#..", "###"]);
        let polys = polygonize(&m);
        assert_eq!(polys.len(), 1);
        assert_relative_eq!(polys[0].polygon.unsigned_area(), 5.0);
        assert_eq!(polys[0].polygon.exterior().0.len(), 7);
    }

    #[test]
    fn test_map_coordinates_follow_transform() {
        let mut m = mask_from(&["#"]);
        m.set_transform(GeoTransform::new(500.0, 1000.0, 10.0, -10.0));
        let polys = polygonize(&m);
        let xs: Vec<f64> = polys[0].polygon.exterior().0.iter().map(|c| c.x).collect();
        let ys: Vec<f64> = polys[0].polygon.exterior().0.iter().map(|c| c.y).collect();
        assert!(xs.iter().all(|x| *x == 500.0 || *x == 510.0));
        assert!(ys.iter().all(|y| *y == 990.0 || *y == 1000.0));
    }

    #[test]
    fn test_aggregate_majority() {
        // Left block 3/4 true, right block 1/4 true
        let m = mask_from(&["##.#", "#..."]);
        let out = aggregate(&m, 2).unwrap();
        assert_eq!(out.shape(), (1, 2));
        assert_eq!(out.get(0, 0).unwrap(), 1);
        assert_eq!(out.get(0, 1).unwrap(), 0);
        assert_relative_eq!(out.transform().pixel_width, 2.0);
    }

    #[test]
    fn test_aggregate_half_is_true() {
        let m = mask_from(&["#.", "#."]);
        let out = aggregate(&m, 2).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 1);
    }

    #[test]
    fn test_factor_from_scale() {
        let mut m = mask_from(&["....", "...."]);
        m.set_transform(GeoTransform::new(0.0, 0.0, 5.0, -5.0));
        assert_eq!(aggregation_factor(&m, 10.0, u64::MAX, true).unwrap(), 2);
        assert_eq!(aggregation_factor(&m, 5.0, u64::MAX, true).unwrap(), 1);
    }

    #[test]
    fn test_factor_best_effort_grows() {
        let m = Raster::<u8>::new(100, 100);
        // factor 1 gives 10000 cells, factor 4 gives 625
        assert_eq!(aggregation_factor(&m, 1.0, 1000, true).unwrap(), 4);
        assert!(matches!(
            aggregation_factor(&m, 1.0, 1000, false),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_geographic_factor_uses_ground_size() {
        let mut m = Raster::<u8>::new(10, 10);
        // ~10 m cells at the equator
        m.set_transform(GeoTransform::new(0.0, 0.0005, 0.0000898, -0.0000898));
        m.set_crs(Some(CRS::wgs84()));
        assert_eq!(aggregation_factor(&m, 10.0, u64::MAX, true).unwrap(), 1);
        assert_eq!(aggregation_factor(&m, 20.0, u64::MAX, true).unwrap(), 2);
    }
}
