pub mod attrs;
mod boundary;
mod config;
pub mod error;
mod holder;
mod mem;
mod observer;
mod region;
mod reverse;
mod scan;
mod scanner;
mod strategy;


pub use attrs::{Annotations, QualifierEncodingScheme, ScanAttributes};
pub use boundary::{check_scan_boundaries, validate_scan_boundaries, BoundaryCheck};
pub use config::{ObserverConfig, SCANNER_OPENED_TRACE_INFO};
pub use error::ScanError;
pub use holder::{HolderCloser, OverrideState, ScannerHolder};
pub use mem::MemScanner;
pub use observer::ScanObserver;
pub use region::{RegionEnvironment, RegionInfo, StaticRegion, TableName};
pub use reverse::setup_reverse_scan;
pub use scan::{Cell, Scan, TimeRange, Timestamp};
pub use scanner::RegionScanner;
pub use strategy::{
    AdmissionGate, GroupedAggregate, NonAggregate, QueryShape, ScanStrategy, ScannerFactory,
    UngroupedAggregate, WrapRequest
};
