//! Logical-to-physical LED index maps for strips folded into panels.

/// Maps logical pixel positions to physical LED positions.
///
/// Entry `i` holds the physical LED that logical pixel `i` lands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMap {
    physical: Vec<usize>,
}

impl IndexMap {
    pub fn identity(len: usize) -> Self {
        Self {
            physical: (0..len).collect(),
        }
    }

    /// Serpentine panel: even rows run left to right, odd rows right to left.
    pub fn alternating_matrix(width: usize, height: usize) -> Self {
        let physical = (0..width * height)
            .map(|i| {
                let (row, col) = (i / width, i % width);
                if row % 2 == 0 {
                    i
                } else {
                    (row + 1) * width - (col + 1)
                }
            })
            .collect();
        Self { physical }
    }

    /// Panel wired with every row running right to left.
    pub fn mirror_matrix_x(rows: usize, cols: usize) -> Self {
        let physical = (0..rows * cols)
            .map(|i| {
                let (row, col) = (i / cols, i % cols);
                row * cols + (cols - col - 1)
            })
            .collect();
        Self { physical }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.physical.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.physical.is_empty()
    }

    #[inline]
    pub fn physical(&self, logical: usize) -> Option<usize> {
        self.physical.get(logical).copied()
    }

    /// Reorders a logical frame into physical LED order.
    ///
    /// The result always has [`len`](Self::len) words. Pixels missing from
    /// `frame` stay dark.
    pub fn remap(&self, frame: &[u32]) -> Vec<u32> {
        let mut out = vec![0; self.physical.len()];
        for (&target, &word) in self.physical.iter().zip(frame) {
            if let Some(slot) = out.get_mut(target) {
                *slot = word;
            }
        }
        out
    }
}
