use crate::description::{RegionDescription, ScanDescription};
use anyhow::Context;
use clap::Parser;
use rgn_scan_observer::{
    Cell, MemScanner, ObserverConfig, RegionEnvironment, RegionScanner, Scan, ScanError,
    ScanObserver, ScannerFactory, WrapRequest
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};


#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CLI {
    /// Observer config file, defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Region boundaries and stored cells
    #[arg(long, value_name = "FILE")]
    pub region: String,

    /// Scan to run against the region
    #[arg(long, value_name = "FILE")]
    pub scan: String
}


#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Verdict {
    Rows {
        reversed: bool,
        cells: Vec<CellOutput>
    },
    StaleBoundary {
        table: String
    },
    Fatal {
        region: String,
        message: String
    }
}


#[derive(Debug, Serialize)]
pub struct CellOutput {
    pub row: String,
    pub family: String,
    pub qualifier: String,
    pub timestamp: u64,
    pub value: String
}


impl From<&Cell> for CellOutput {
    fn from(cell: &Cell) -> Self {
        Self {
            row: String::from_utf8_lossy(&cell.row).into_owned(),
            family: String::from_utf8_lossy(&cell.family).into_owned(),
            qualifier: String::from_utf8_lossy(&cell.qualifier).into_owned(),
            timestamp: cell.timestamp,
            value: String::from_utf8_lossy(&cell.value).into_owned()
        }
    }
}


impl From<ScanError> for Verdict {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::StaleBoundary { table } => Verdict::StaleBoundary {
                table: table.to_string()
            },
            ScanError::Fatal { region, message, .. } => Verdict::Fatal {
                region,
                message
            }
        }
    }
}


/// Hands the raw scanner back unchanged, the stored cells are the result.
struct PassThroughFactory;


impl ScannerFactory for PassThroughFactory {
    fn wrap(
        &self,
        request: &WrapRequest,
        scanner: Box<dyn RegionScanner>
    ) -> anyhow::Result<Box<dyn RegionScanner>>
    {
        debug!(shape = %request.shape, encoding = ?request.encoding_scheme, "wrapping region scanner");
        Ok(scanner)
    }
}


impl CLI {
    pub fn run(&self) -> anyhow::Result<Verdict> {
        let config = match self.config.as_ref() {
            Some(file) => ObserverConfig::read(file).context("failed to read observer config")?,
            None => ObserverConfig::default()
        };

        let region = RegionDescription::read(&self.region)
            .context("failed to read region description")?;

        let mut scan = ScanDescription::read(&self.scan)
            .context("failed to read scan description")?
            .to_scan()
            .context("invalid scan description")?;

        let env = region.environment();
        let observer = ScanObserver::new(&config, Arc::new(PassThroughFactory));

        let verdict = match execute(&observer, &env, &mut scan, region.cells()) {
            Ok(cells) => Verdict::Rows {
                reversed: scan.is_reversed(),
                cells: cells.iter().map(CellOutput::from).collect()
            },
            Err(err) => Verdict::from(err)
        };

        Ok(verdict)
    }
}


fn execute(
    observer: &ScanObserver,
    env: &dyn RegionEnvironment,
    scan: &mut Scan,
    cells: Vec<Cell>
) -> Result<Vec<Cell>, ScanError>
{
    observer.pre_scanner_open(env, scan)?;

    let raw = Box::new(MemScanner::open(cells, scan));
    let mut scanner = observer.post_scanner_open(env, scan, raw)?;

    let result = drain(env, &mut *scanner)?;

    info!(
        region = %env.region_name(),
        cells = result.len(),
        "scan finished"
    );

    Ok(result)
}


/// Reads `scanner` to the end and closes it.
///
/// A failed fetch is reported even when the following close fails as well.
fn drain(env: &dyn RegionEnvironment, scanner: &mut dyn RegionScanner) -> Result<Vec<Cell>, ScanError> {
    let classify = |err: anyhow::Error| ScanError::classify(env.table_name(), &env.region_name(), err);

    let mut result = Vec::new();
    loop {
        match scanner.next(&mut result) {
            Ok(true) => {},
            Ok(false) => break,
            Err(err) => {
                if let Err(close_err) = scanner.close() {
                    warn!(
                        region = %env.region_name(),
                        error = ?close_err,
                        "failed to close scanner after fetch error"
                    );
                }
                return Err(classify(err))
            }
        }
    }

    scanner.close().map_err(classify)?;
    Ok(result)
}
