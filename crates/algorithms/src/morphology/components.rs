//! Connected-component labelling and size filtering

use paddyscan_core::raster::Raster;
use paddyscan_core::{RasterElement, Result};
use serde::{Deserialize, Serialize};

/// Pixel adjacency used to group true cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbours only
    #[default]
    Four,
    /// Edge and corner neighbours
    Eight,
}

impl Connectivity {
    pub fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Component labels of a binary mask
#[derive(Debug, Clone)]
pub struct Components {
    /// Row-major label per cell, 0 for background, components from 1
    pub labels: Vec<u32>,
    /// Pixel count of component `i + 1`
    pub sizes: Vec<usize>,
}

impl Components {
    pub fn count(&self) -> usize {
        self.sizes.len()
    }
}

/// Label connected groups of true (non-zero, valid) cells.
///
/// Components are numbered in row-major order of their first cell.
pub fn label_components(mask: &Raster<u8>, connectivity: Connectivity) -> Components {
    let (rows, cols) = mask.shape();
    let nodata = mask.nodata();
    let is_set = |r: usize, c: usize| {
        let v = unsafe { mask.get_unchecked(r, c) };
        v != 0 && !v.is_nodata(nodata)
    };

    let mut labels = vec![0u32; rows * cols];
    let mut sizes = Vec::new();
    let mut stack = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            if labels[r * cols + c] != 0 || !is_set(r, c) {
                continue;
            }
            let label = sizes.len() as u32 + 1;
            let mut size = 0usize;
            labels[r * cols + c] = label;
            stack.push((r, c));

            while let Some((cr, cc)) = stack.pop() {
                size += 1;
                for &(dr, dc) in connectivity.offsets() {
                    let nr = cr as isize + dr;
                    let nc = cc as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    let idx = nr * cols + nc;
                    if labels[idx] == 0 && is_set(nr, nc) {
                        labels[idx] = label;
                        stack.push((nr, nc));
                    }
                }
            }
            sizes.push(size);
        }
    }

    Components { labels, sizes }
}

/// Keep only components with more than `min_pixels` cells
pub fn remove_small_components(
    mask: &Raster<u8>,
    min_pixels: usize,
    connectivity: Connectivity,
) -> Result<Raster<u8>> {
    let components = label_components(mask, connectivity);
    let data: Vec<u8> = components
        .labels
        .iter()
        .map(|&label| {
            let keep = label != 0 && components.sizes[(label - 1) as usize] > min_pixels;
            u8::from(keep)
        })
        .collect();
    mask.derive(data, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paddyscan_core::GeoTransform;

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
    fn test_diagonal_cells_split_under_four_connectivity() {
        let m = mask_from(&["#.", ".#"]);
        assert_eq!(label_components(&m, Connectivity::Four).count(), 2);
        assert_eq!(label_components(&m, Connectivity::Eight).count(), 1);
    }

    #[test]
    fn test_sizes_and_order() {
        let m = mask_from(&["##..#", "##..#", ".....", "#...."]);
        let c = label_components(&m, Connectivity::Four);
        assert_eq!(c.sizes, vec![4, 2, 1]);
        assert_eq!(c.labels[4], 2);
        assert_eq!(c.labels[15], 3);
    }

    #[test]
    fn test_size_filter_is_strictly_greater() {
        // 5-pixel L and a 6-pixel bar
        let m = mask_from(&["#......", "#......", "#......", "##.....", ".......", "######."]);
        let out = remove_small_components(&m, 5, Connectivity::Four).unwrap();
        let kept: usize = out.data().iter().map(|v| *v as usize).sum();
        assert_eq!(kept, 6);
        assert_eq!(out.get(0, 0).unwrap(), 0);
        assert_eq!(out.get(5, 0).unwrap(), 1);
    }
}
