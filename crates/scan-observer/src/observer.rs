use crate::attrs::{Annotations, ScanAttributes};
use crate::boundary::validate_scan_boundaries;
use crate::config::ObserverConfig;
use crate::error::{normalize, InvalidRowRange, ScanError};
use crate::holder::ScannerHolder;
use crate::region::RegionEnvironment;
use crate::reverse::setup_reverse_scan;
use crate::scan::Scan;
use crate::scanner::RegionScanner;
use crate::strategy::{AdmissionGate, ScanStrategy, ScannerFactory, WrapRequest};
use anyhow::ensure;
use std::sync::Arc;
use tracing::warn;


/// Entry points the host calls around opening a region scanner.
///
/// Scans not claimed by any enabled query shape pass through both hooks untouched.
/// Everything else leaves as either a result or a [ScanError].
pub struct ScanObserver {
    gate: AdmissionGate,
    factory: Arc<dyn ScannerFactory>,
    span_description: Arc<str>
}


impl ScanObserver {
    pub fn new(config: &ObserverConfig, factory: Arc<dyn ScannerFactory>) -> Self {
        Self {
            gate: AdmissionGate::new(&config.strategies),
            factory,
            span_description: Arc::from(config.span_description.as_str())
        }
    }

    /// Runs before the host opens the raw scanner.
    ///
    /// Applies the transaction snapshot bound, checks region boundaries
    /// and, as the very last step, flips the scan for reverse iteration.
    /// A scan already flipped by an earlier call is left as is.
    pub fn pre_scanner_open(
        &self,
        env: &dyn RegionEnvironment,
        scan: &mut Scan
    ) -> Result<(), ScanError>
    {
        if self.gate.admit(scan).is_none() {
            return Ok(())
        }
        prepare_scan(env, scan).map_err(|err| {
            normalize(
                env.table_name(),
                &env.region_name(),
                &Annotations::from_scan(scan),
                err
            )
        })
    }

    /// Runs right after the host opened the raw scanner.
    ///
    /// Returns `scanner` as is for scans this layer does not handle,
    /// otherwise a [ScannerHolder] around it.
    pub fn post_scanner_open(
        &self,
        env: &dyn RegionEnvironment,
        scan: &Scan,
        mut scanner: Box<dyn RegionScanner>
    ) -> Result<Box<dyn RegionScanner>, ScanError>
    {
        let Some(strategy) = self.gate.admit(scan) else {
            return Ok(scanner)
        };

        let annotations = Annotations::from_scan(scan);

        let request = match wrap_request(strategy, env, scan) {
            Ok(request) => request,
            Err(err) => {
                if let Err(close_err) = scanner.close() {
                    warn!(
                        region = %env.region_name(),
                        error = ?close_err,
                        "failed to close raw scanner"
                    );
                }
                return Err(normalize(
                    env.table_name(),
                    &env.region_name(),
                    &annotations,
                    err
                ))
            }
        };

        let holder = ScannerHolder::new(
            strategy,
            self.factory.clone(),
            request,
            annotations,
            self.span_description.clone(),
            scanner
        );

        Ok(Box::new(holder))
    }
}


fn prepare_scan(env: &dyn RegionEnvironment, scan: &mut Scan) -> anyhow::Result<()> {
    ensure!(
        scan.has_ordered_range(),
        InvalidRowRange {
            start_row: scan.start_row().clone(),
            stop_row: scan.stop_row().clone()
        }
    );

    // Already prepared. Boundary checks and the snapshot bound assume forward bounds.
    if scan.is_reversed() {
        return Ok(())
    }

    let attrs = ScanAttributes::decode(scan)?;

    if let Some(tx_scn) = attrs.tx_scn {
        let time_range = scan.time_range();
        scan.set_time_range(time_range.min, tx_scn)?;
    }

    // Local index results are unusable when computed against the wrong region,
    // so the client can't opt out of the check for them.
    if !attrs.skip_region_boundary_check || attrs.local_index {
        let region = env.region_info()?;
        validate_scan_boundaries(scan, &attrs, &region)?;
    }

    setup_reverse_scan(scan, &attrs);
    Ok(())
}


fn wrap_request(
    strategy: &dyn ScanStrategy,
    env: &dyn RegionEnvironment,
    scan: &Scan
) -> anyhow::Result<WrapRequest>
{
    let attrs = ScanAttributes::decode(scan)?;
    let region = env.region_info()?;
    Ok(WrapRequest {
        shape: strategy.shape(),
        region,
        scan: scan.clone(),
        encoding_scheme: attrs.encoding_scheme,
        use_new_value_column_qualifier: attrs.use_new_value_column_qualifier
    })
}
