use anyhow::ensure;
use bytes::Bytes;
use rgn_scan_observer::attrs::{encode_bool, encode_long};
use rgn_scan_observer::{Cell, RegionInfo, Scan, StaticRegion, TableName, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;


/// Region boundaries together with the cells stored in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDescription {
    pub table: String,
    #[serde(default)]
    pub start_key: String,
    #[serde(default)]
    pub end_key: String,
    #[serde(default)]
    pub region_id: u64,
    /// Simulates a region that was closed or moved away
    #[serde(default = "default_serving")]
    pub serving: bool,
    #[serde(default)]
    pub cells: Vec<CellDescription>
}


fn default_serving() -> bool {
    true
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDescription {
    pub row: String,
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default = "default_qualifier")]
    pub qualifier: String,
    #[serde(default = "default_timestamp")]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub value: String
}


fn default_family() -> String {
    "0".to_string()
}


fn default_qualifier() -> String {
    "v".to_string()
}


fn default_timestamp() -> Timestamp {
    1
}


impl RegionDescription {
    pub fn read(file: &str) -> anyhow::Result<Self> {
        let desc = serde_json::from_reader(
            std::io::BufReader::new(std::fs::File::open(file)?)
        )?;
        Ok(desc)
    }

    pub fn environment(&self) -> StaticRegion {
        let info = RegionInfo::new(
            TableName::new(self.table.as_str()),
            self.start_key.clone(),
            self.end_key.clone(),
            self.region_id
        );
        let region = StaticRegion::new(info);
        region.set_serving(self.serving);
        region
    }

    pub fn cells(&self) -> Vec<Cell> {
        self.cells.iter().map(|cell| {
            Cell::new(
                cell.row.clone(),
                cell.family.clone(),
                cell.qualifier.clone(),
                cell.timestamp,
                cell.value.clone()
            )
        }).collect()
    }
}


/// Attribute value as written in a scan description.
///
/// Flags become single byte booleans, numbers big endian longs,
/// strings are taken as is and arrays as raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Long(u64),
    Text(String),
    Raw(Vec<u8>)
}


impl AttributeValue {
    pub fn encode(&self) -> Bytes {
        match self {
            AttributeValue::Flag(value) => encode_bool(*value),
            AttributeValue::Long(value) => encode_long(*value),
            AttributeValue::Text(value) => Bytes::copy_from_slice(value.as_bytes()),
            AttributeValue::Raw(value) => Bytes::copy_from_slice(value)
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDescription {
    #[serde(default)]
    pub start_row: String,
    #[serde(default)]
    pub stop_row: String,
    /// `[min, max)` bound on cell timestamps
    #[serde(default)]
    pub time_range: Option<(Timestamp, Timestamp)>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>
}


impl ScanDescription {
    pub fn read(file: &str) -> anyhow::Result<Self> {
        let desc = serde_json::from_reader(
            std::io::BufReader::new(std::fs::File::open(file)?)
        )?;
        Ok(desc)
    }

    pub fn to_scan(&self) -> anyhow::Result<Scan> {
        let mut scan = Scan::new(self.start_row.clone(), self.stop_row.clone());
        if let Some((min, max)) = self.time_range {
            scan.set_time_range(min, max)?;
        }
        for (name, value) in self.attributes.iter() {
            ensure!(!name.is_empty(), "attribute name can't be empty");
            scan.set_attribute(name, value.encode());
        }
        Ok(scan)
    }
}
