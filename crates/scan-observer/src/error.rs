use crate::attrs::Annotations;
use crate::region::TableName;
use crate::scan::Timestamp;
use bytes::Bytes;
use std::fmt::{Display, Formatter};
use tracing::{debug, error, warn};


/// Region boundaries assumed by the client no longer match the ones served here.
#[derive(Debug)]
pub struct StaleRegionBoundary {
    pub table: TableName
}


impl Display for StaleRegionBoundary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache of region boundaries is out of date, tableName={}", self.table)
    }
}


impl std::error::Error for StaleRegionBoundary {}


/// Raised by the host when the region is no longer online on this node.
#[derive(Debug)]
pub struct NotServingRegion {
    pub region: String
}


impl Display for NotServingRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "region {} is not online on this server", self.region)
    }
}


impl std::error::Error for NotServingRegion {}


#[derive(Debug)]
pub struct MalformedAttribute {
    pub name: &'static str,
    pub reason: String
}


impl Display for MalformedAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "scan attribute {} is malformed: {}", self.name, self.reason)
    }
}


impl std::error::Error for MalformedAttribute {}


#[derive(Debug)]
pub struct InvalidTimeRange {
    pub min: Timestamp,
    pub max: Timestamp
}


impl Display for InvalidTimeRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "max timestamp {} is less than min timestamp {}",
            self.max,
            self.min
        )
    }
}


impl std::error::Error for InvalidTimeRange {}


#[derive(Debug)]
pub struct InvalidRowRange {
    pub start_row: Bytes,
    pub stop_row: Bytes
}


impl Display for InvalidRowRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "start row {} is after stop row {}",
            self.start_row.escape_ascii(),
            self.stop_row.escape_ascii()
        )
    }
}


impl std::error::Error for InvalidRowRange {}


#[derive(Debug)]
pub struct ScannerClosed;


impl Display for ScannerClosed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "scanner is closed")
    }
}


impl std::error::Error for ScannerClosed {}


#[derive(Debug)]
pub struct ScannerFailed;


impl Display for ScannerFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "scanner construction previously failed")
    }
}


impl std::error::Error for ScannerFailed {}


/// The only error shapes handed back to the host.
///
/// Both variants travel over the host's do-not-retry channel.
/// `StaleBoundary` tells the client to refresh its region map and reissue the scan,
/// `Fatal` is never worth retrying.
#[derive(Debug)]
pub enum ScanError {
    StaleBoundary {
        table: TableName
    },
    Fatal {
        region: String,
        message: String,
        cause: Option<anyhow::Error>
    }
}


impl ScanError {
    pub fn fatal(region: impl Into<String>, message: impl Into<String>) -> Self {
        ScanError::Fatal {
            region: region.into(),
            message: message.into(),
            cause: None
        }
    }

    pub fn is_stale_boundary(&self) -> bool {
        matches!(self, ScanError::StaleBoundary { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Fatal { .. })
    }

    /// Maps an arbitrary failure onto one of the two host visible kinds.
    pub fn classify(table: &TableName, region: &str, err: anyhow::Error) -> ScanError {
        let err = match err.downcast::<ScanError>() {
            Ok(scan_error) => return scan_error,
            Err(err) => err
        };

        if let Some(stale) = err.downcast_ref::<StaleRegionBoundary>() {
            return ScanError::StaleBoundary {
                table: stale.table.clone()
            }
        }

        if err.is::<NotServingRegion>() {
            return ScanError::StaleBoundary {
                table: table.clone()
            }
        }

        ScanError::Fatal {
            region: region.to_string(),
            message: format!("{:#}", err),
            cause: Some(err)
        }
    }
}


impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::StaleBoundary { table } => {
                write!(f, "cache of region boundaries is out of date, tableName={}", table)
            },
            ScanError::Fatal { region, message, .. } => {
                write!(f, "{}: {}", region, message)
            }
        }
    }
}


impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::StaleBoundary { .. } => None,
            ScanError::Fatal { cause, .. } => {
                cause.as_ref().map(|err| &**err as &(dyn std::error::Error + 'static))
            }
        }
    }
}


/// Classifies `err` and logs the outcome.
pub(crate) fn normalize(
    table: &TableName,
    region: &str,
    annotations: &Annotations,
    err: anyhow::Error
) -> ScanError
{
    let not_serving = err.is::<NotServingRegion>();
    let scan_error = ScanError::classify(table, region, err);
    match &scan_error {
        ScanError::StaleBoundary { .. } if not_serving => warn!(
            table = %table,
            region,
            annotations = %annotations,
            "region is not served here anymore, reporting stale boundaries"
        ),
        ScanError::StaleBoundary { .. } => debug!(
            table = %table,
            region,
            annotations = %annotations,
            "scan does not match current region boundaries"
        ),
        ScanError::Fatal { .. } => error!(
            table = %table,
            region,
            annotations = %annotations,
            error = ?scan_error,
            "scan failed"
        )
    }
    scan_error
}
