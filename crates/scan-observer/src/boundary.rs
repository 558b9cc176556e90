use crate::attrs::ScanAttributes;
use crate::error::StaleRegionBoundary;
use crate::region::RegionInfo;
use crate::scan::Scan;
use anyhow::bail;


#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BoundaryCheck {
    Ok,
    /// Local index scan matching the region, to be narrowed to exactly the region range
    Clip,
    Stale
}


/// Compares the row range of `scan` against the region it was routed to.
///
/// Local index scans always cover a whole region, so the only thing that matters for them
/// is whether the client still knows the right region end key.
/// Primary table scans must fit inside the region. A bounded region with an unbounded scan stop
/// is treated as stale as well.
pub fn check_scan_boundaries(
    scan: &Scan,
    attrs: &ScanAttributes,
    region: &RegionInfo
) -> BoundaryCheck
{
    if attrs.local_index {
        return if attrs.expected_upper_region_key(scan) == region.end_key() {
            BoundaryCheck::Clip
        } else {
            BoundaryCheck::Stale
        }
    }

    if attrs.skip_region_boundary_check {
        return BoundaryCheck::Ok
    }

    let start_row = scan.start_row();
    let stop_row = scan.stop_row();
    let region_end = region.end_key();

    let is_stale = start_row < region.start_key() || (
        !region_end.is_empty() && (stop_row.is_empty() || stop_row > region_end)
    );

    if is_stale {
        BoundaryCheck::Stale
    } else {
        BoundaryCheck::Ok
    }
}


/// Same as [check_scan_boundaries], but applies the outcome to the scan.
///
/// Stale boundaries are reported as [StaleRegionBoundary].
/// Local index scans get their range replaced with the region range.
pub fn validate_scan_boundaries(
    scan: &mut Scan,
    attrs: &ScanAttributes,
    region: &RegionInfo
) -> anyhow::Result<BoundaryCheck>
{
    let check = check_scan_boundaries(scan, attrs, region);
    match check {
        BoundaryCheck::Ok => {},
        BoundaryCheck::Clip => {
            scan.set_start_row(region.start_key().clone(), true);
            scan.set_stop_row(region.end_key().clone(), false);
        },
        BoundaryCheck::Stale => bail!(StaleRegionBoundary {
            table: region.table().clone()
        })
    }
    Ok(check)
}
