use crate::error::NotServingRegion;
use anyhow::ensure;
use bytes::Bytes;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};


#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TableName(String);


impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}


impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}


/// Key range `[start_key, end_key)` of a table currently served by this node.
///
/// An empty `start_key` marks the first region, an empty `end_key` the last one.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RegionInfo {
    table: TableName,
    start_key: Bytes,
    end_key: Bytes,
    region_id: u64
}


impl RegionInfo {
    pub fn new(
        table: TableName,
        start_key: impl Into<Bytes>,
        end_key: impl Into<Bytes>,
        region_id: u64
    ) -> Self
    {
        Self {
            table,
            start_key: start_key.into(),
            end_key: end_key.into(),
            region_id
        }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn start_key(&self) -> &Bytes {
        &self.start_key
    }

    pub fn end_key(&self) -> &Bytes {
        &self.end_key
    }

    pub fn region_id(&self) -> u64 {
        self.region_id
    }

    pub fn is_last_region(&self) -> bool {
        self.end_key.is_empty()
    }

    pub fn region_name(&self) -> String {
        format!(
            "{},{},{}",
            self.table,
            self.start_key.escape_ascii(),
            self.region_id
        )
    }
}


/// Host side view of the region a scan was routed to.
pub trait RegionEnvironment: Send + Sync {
    fn table_name(&self) -> &TableName;

    fn region_name(&self) -> String;

    /// Boundaries of the region as this node serves it right now.
    ///
    /// Fails with [NotServingRegion] once the region was closed or moved away.
    fn region_info(&self) -> anyhow::Result<RegionInfo>;
}


/// Region environment backed by a fixed boundary snapshot.
#[derive(Debug)]
pub struct StaticRegion {
    info: RegionInfo,
    serving: AtomicBool
}


impl StaticRegion {
    pub fn new(info: RegionInfo) -> Self {
        Self {
            info,
            serving: AtomicBool::new(true)
        }
    }

    pub fn set_serving(&self, serving: bool) {
        self.serving.store(serving, Ordering::SeqCst)
    }
}


impl RegionEnvironment for StaticRegion {
    fn table_name(&self) -> &TableName {
        self.info.table()
    }

    fn region_name(&self) -> String {
        self.info.region_name()
    }

    fn region_info(&self) -> anyhow::Result<RegionInfo> {
        ensure!(
            self.serving.load(Ordering::SeqCst),
            NotServingRegion {
                region: self.info.region_name()
            }
        );
        Ok(self.info.clone())
    }
}
