use crate::error::ScannerClosed;
use crate::scan::{Cell, Scan};
use crate::scanner::RegionScanner;
use anyhow::ensure;
use std::collections::VecDeque;


/// Region scanner over an in-memory set of cells.
///
/// Honors the row bounds, direction and time range of the scan it was opened for.
pub struct MemScanner {
    rows: VecDeque<Vec<Cell>>,
    closed: bool
}


impl MemScanner {
    pub fn open(cells: impl IntoIterator<Item = Cell>, scan: &Scan) -> Self {
        let time_range = scan.time_range();

        let mut cells: Vec<Cell> = cells.into_iter()
            .filter(|cell| scan.contains_row(&cell.row) && time_range.contains(cell.timestamp))
            .collect();

        cells.sort_by(|a, b| {
            a.row.cmp(&b.row)
                .then_with(|| a.family.cmp(&b.family))
                .then_with(|| a.qualifier.cmp(&b.qualifier))
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });

        let mut rows: VecDeque<Vec<Cell>> = VecDeque::new();
        for cell in cells {
            match rows.back_mut() {
                Some(row) if row[0].row == cell.row => row.push(cell),
                _ => rows.push_back(vec![cell])
            }
        }

        if scan.is_reversed() {
            rows.make_contiguous().reverse();
        }

        Self {
            rows,
            closed: false
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}


impl RegionScanner for MemScanner {
    fn next(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        ensure!(!self.closed, ScannerClosed);
        if let Some(row) = self.rows.pop_front() {
            result.extend(row);
        }
        Ok(!self.rows.is_empty())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }
}
