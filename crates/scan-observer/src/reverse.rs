use crate::attrs::{ScanAttributes, SCAN_ACTUAL_START_ROW};
use crate::scan::Scan;


/// Restates a forward `[start, stop)` range for backward iteration.
///
/// Start and stop swap places: iteration begins at the former stop row, which stays exclusive,
/// and walks down to the former start row, which stays inclusive.
/// The forward start row is kept under [SCAN_ACTUAL_START_ROW].
///
/// Must run after all boundary checks, they assume forward bounds.
/// Scans already marked as reversed are left alone, so the swap happens at most once.
pub fn setup_reverse_scan(scan: &mut Scan, attrs: &ScanAttributes) -> bool {
    if !attrs.reverse_scan || scan.is_reversed() {
        return false
    }

    let start_row = scan.start_row().clone();
    let include_start_row = scan.include_start_row();
    let stop_row = scan.stop_row().clone();
    let include_stop_row = scan.include_stop_row();

    if !start_row.is_empty() {
        scan.set_attribute(SCAN_ACTUAL_START_ROW, start_row.clone());
    }

    scan.set_start_row(stop_row, include_stop_row);
    scan.set_stop_row(start_row, include_start_row);
    scan.set_reversed(true);
    true
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::{encode_bool, REVERSE_SCAN};


    fn reverse_attrs() -> ScanAttributes {
        ScanAttributes {
            reverse_scan: true,
            ..ScanAttributes::default()
        }
    }

    #[test]
    fn swaps_bounds() {
        let mut scan = Scan::new("b", "k").with_attribute(REVERSE_SCAN, encode_bool(true));

        assert!(setup_reverse_scan(&mut scan, &reverse_attrs()));
        assert!(scan.is_reversed());
        assert_eq!(scan.start_row().as_ref(), b"k");
        assert!(!scan.include_start_row());
        assert_eq!(scan.stop_row().as_ref(), b"b");
        assert!(scan.include_stop_row());
        assert_eq!(scan.attribute(SCAN_ACTUAL_START_ROW).unwrap().as_ref(), b"b");
        assert!(scan.has_ordered_range());

        assert!(scan.contains_row(b"b"));
        assert!(scan.contains_row(b"j"));
        assert!(!scan.contains_row(b"k"));
        assert!(!scan.contains_row(b"a"));
    }

    #[test]
    fn applied_at_most_once() {
        let mut scan = Scan::new("b", "k");
        setup_reverse_scan(&mut scan, &reverse_attrs());
        let once = scan.clone();

        assert!(!setup_reverse_scan(&mut scan, &reverse_attrs()));
        assert_eq!(scan, once);
    }

    #[test]
    fn untouched_without_attribute() {
        let mut scan = Scan::new("b", "k");
        assert!(!setup_reverse_scan(&mut scan, &ScanAttributes::default()));
        assert_eq!(scan, Scan::new("b", "k"));
    }

    #[test]
    fn unbounded_sides() {
        let mut scan = Scan::new("", "k");
        setup_reverse_scan(&mut scan, &reverse_attrs());
        assert_eq!(scan.start_row().as_ref(), b"k");
        assert!(scan.stop_row().is_empty());
        assert!(scan.attribute(SCAN_ACTUAL_START_ROW).is_none());
        assert!(scan.contains_row(b"\x00"));
        assert!(!scan.contains_row(b"z"));
    }
}
