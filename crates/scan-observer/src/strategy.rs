use crate::attrs::{
    QualifierEncodingScheme, AGGREGATORS, DELETE_AGG, KEY_ORDERED_GROUP_BY_EXPRESSIONS,
    NON_AGGREGATE_QUERY, TOPN, UNGROUPED_AGG, UNORDERED_GROUP_BY_EXPRESSIONS
};
use crate::error::MalformedAttribute;
use crate::region::RegionInfo;
use crate::scan::Scan;
use crate::scanner::RegionScanner;
use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use tracing::warn;


#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryShape {
    NonAggregate,
    UngroupedAggregate,
    GroupedAggregate
}


impl QueryShape {
    pub const ALL: [QueryShape; 3] = [
        QueryShape::NonAggregate,
        QueryShape::UngroupedAggregate,
        QueryShape::GroupedAggregate
    ];

    pub fn strategy(self) -> &'static dyn ScanStrategy {
        match self {
            QueryShape::NonAggregate => &NonAggregate,
            QueryShape::UngroupedAggregate => &UngroupedAggregate,
            QueryShape::GroupedAggregate => &GroupedAggregate
        }
    }
}


impl Display for QueryShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            QueryShape::NonAggregate => "non-aggregate",
            QueryShape::UngroupedAggregate => "ungrouped-aggregate",
            QueryShape::GroupedAggregate => "grouped-aggregate"
        })
    }
}


/// Everything the downstream scanner factory needs besides the raw scanner itself.
#[derive(Debug, Clone)]
pub struct WrapRequest {
    pub shape: QueryShape,
    pub region: RegionInfo,
    pub scan: Scan,
    pub encoding_scheme: QualifierEncodingScheme,
    pub use_new_value_column_qualifier: bool
}


/// Builds the aggregation / projection scanner on top of a raw region scanner.
pub trait ScannerFactory: Send + Sync {
    fn wrap(
        &self,
        request: &WrapRequest,
        scanner: Box<dyn RegionScanner>
    ) -> anyhow::Result<Box<dyn RegionScanner>>;
}


/// Per query shape hooks: whether a scan belongs to the shape
/// and how the result scanner gets built for it.
pub trait ScanStrategy: Debug + Send + Sync {
    fn shape(&self) -> QueryShape;

    fn applies_to(&self, scan: &Scan) -> bool;

    fn create_scanner(
        &self,
        request: &WrapRequest,
        scanner: Box<dyn RegionScanner>,
        factory: &dyn ScannerFactory
    ) -> anyhow::Result<Box<dyn RegionScanner>>
    {
        factory.wrap(request, scanner)
    }
}


#[derive(Debug)]
pub struct NonAggregate;


impl ScanStrategy for NonAggregate {
    fn shape(&self) -> QueryShape {
        QueryShape::NonAggregate
    }

    fn applies_to(&self, scan: &Scan) -> bool {
        scan.attribute(NON_AGGREGATE_QUERY).is_some() || scan.attribute(TOPN).is_some()
    }
}


#[derive(Debug)]
pub struct UngroupedAggregate;


impl ScanStrategy for UngroupedAggregate {
    fn shape(&self) -> QueryShape {
        QueryShape::UngroupedAggregate
    }

    fn applies_to(&self, scan: &Scan) -> bool {
        scan.attribute(UNGROUPED_AGG).is_some() || scan.attribute(DELETE_AGG).is_some()
    }

    fn create_scanner(
        &self,
        request: &WrapRequest,
        scanner: Box<dyn RegionScanner>,
        factory: &dyn ScannerFactory
    ) -> anyhow::Result<Box<dyn RegionScanner>>
    {
        wrap_aggregate(request, scanner, factory)
    }
}


#[derive(Debug)]
pub struct GroupedAggregate;


impl ScanStrategy for GroupedAggregate {
    fn shape(&self) -> QueryShape {
        QueryShape::GroupedAggregate
    }

    fn applies_to(&self, scan: &Scan) -> bool {
        scan.attribute(UNORDERED_GROUP_BY_EXPRESSIONS).is_some()
            || scan.attribute(KEY_ORDERED_GROUP_BY_EXPRESSIONS).is_some()
    }

    fn create_scanner(
        &self,
        request: &WrapRequest,
        scanner: Box<dyn RegionScanner>,
        factory: &dyn ScannerFactory
    ) -> anyhow::Result<Box<dyn RegionScanner>>
    {
        wrap_aggregate(request, scanner, factory)
    }
}


fn wrap_aggregate(
    request: &WrapRequest,
    mut scanner: Box<dyn RegionScanner>,
    factory: &dyn ScannerFactory
) -> anyhow::Result<Box<dyn RegionScanner>>
{
    if let Err(err) = ensure_aggregators(&request.scan) {
        if let Err(close_err) = scanner.close() {
            warn!(error = ?close_err, "failed to close raw scanner");
        }
        return Err(err)
    }
    factory.wrap(request, scanner)
}


fn ensure_aggregators(scan: &Scan) -> anyhow::Result<()> {
    ensure!(
        scan.attribute(AGGREGATORS).map_or(false, |bytes| !bytes.is_empty()),
        MalformedAttribute {
            name: AGGREGATORS,
            reason: "aggregate scan carries no aggregators".to_string()
        }
    );
    Ok(())
}


/// Picks the strategy responsible for a scan, if any.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    strategies: Vec<&'static dyn ScanStrategy>
}


impl AdmissionGate {
    pub fn new(shapes: &[QueryShape]) -> Self {
        let strategies = shapes.iter().map(|shape| shape.strategy()).collect();
        Self {
            strategies
        }
    }

    pub fn admit(&self, scan: &Scan) -> Option<&'static dyn ScanStrategy> {
        self.strategies.iter().copied().find(|strategy| strategy.applies_to(scan))
    }
}


impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(&QueryShape::ALL)
    }
}
