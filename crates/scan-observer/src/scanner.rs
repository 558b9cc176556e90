use crate::scan::Cell;


/// Row iterator over a region, as opened by the storage engine or wrapped on top of it.
///
/// Every fetch method appends the cells of the next row(s) to `result`
/// and returns `false` once there is nothing left.
pub trait RegionScanner: Send {
    fn next(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool>;

    fn next_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        for _ in 0..max_rows {
            if !self.next(result)? {
                return Ok(false)
            }
        }
        Ok(true)
    }

    /// Fetch without the host's per-call region bookkeeping.
    fn next_raw(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.next(result)
    }

    fn next_raw_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        for _ in 0..max_rows {
            if !self.next_raw(result)? {
                return Ok(false)
            }
        }
        Ok(true)
    }

    fn close(&mut self) -> anyhow::Result<()>;
}


impl<S: RegionScanner + ?Sized> RegionScanner for Box<S> {
    fn next(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        (**self).next(result)
    }

    fn next_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        (**self).next_batch(result, max_rows)
    }

    fn next_raw(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        (**self).next_raw(result)
    }

    fn next_raw_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        (**self).next_raw_batch(result, max_rows)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }
}
