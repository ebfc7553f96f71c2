//! Focal mode (majority) filter for binary masks

use super::element::Kernel;
use crate::maybe_rayon::*;
use paddyscan_core::raster::Raster;
use paddyscan_core::{RasterElement, Result};

/// Majority filter over `kernel`, intersected with the input.
///
/// The mode is taken over the valid (non-nodata, in-grid) cells of each
/// window, and a tie resolves to 0. Because the result is ANDed with the
/// input, smoothing can only remove isolated 1 cells, never add new ones.
/// No-data input cells become 0.
pub fn mode_filter(mask: &Raster<u8>, kernel: &Kernel) -> Result<Raster<u8>> {
    let (rows, cols) = mask.shape();
    let offsets = kernel.offsets();
    let nodata = mask.nodata();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { mask.get_unchecked(row, col) };
                if center == 0 || center.is_nodata(nodata) {
                    continue;
                }

                let (mut ones, mut zeros) = (0usize, 0usize);
                for &(dr, dc) in &offsets {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        continue;
                    }
                    let v = unsafe { mask.get_unchecked(r as usize, c as usize) };
                    if v.is_nodata(nodata) {
                        continue;
                    }
                    if v != 0 {
                        ones += 1;
                    } else {
                        zeros += 1;
                    }
                }
                *out = u8::from(ones > zeros);
            }
            row_data
        })
        .collect();

    mask.derive(data, None)
}
