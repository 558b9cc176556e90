//! Scan attribute names understood by the server side and their decoding.

use crate::error::MalformedAttribute;
use crate::scan::{Scan, Timestamp};
use anyhow::{anyhow, ensure};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};


pub const AGGREGATORS: &str = "_Aggs";
pub const UNORDERED_GROUP_BY_EXPRESSIONS: &str = "_UnorderedGroupByExpressions";
pub const KEY_ORDERED_GROUP_BY_EXPRESSIONS: &str = "_OrderedGroupByExpressions";
pub const ESTIMATED_DISTINCT_VALUES: &str = "_EstDistinctValues";
pub const NON_AGGREGATE_QUERY: &str = "_NonAggregateQuery";
pub const TOPN: &str = "_TopN";
pub const UNGROUPED_AGG: &str = "_UngroupedAgg";
pub const DELETE_AGG: &str = "_DeleteAgg";
pub const UPSERT_SELECT_TABLE: &str = "_UpsertSelectTable";
pub const UPSERT_SELECT_EXPRS: &str = "_UpsertSelectExprs";
pub const DELETE_CQ: &str = "_DeleteCQ";
pub const DELETE_CF: &str = "_DeleteCF";
pub const EMPTY_CF: &str = "_EmptyCF";
pub const EMPTY_COLUMN_QUALIFIER: &str = "_EmptyColumnQualifier";
pub const SPECIFIC_ARRAY_INDEX: &str = "_SpecificArrayIndex";
pub const GROUP_BY_LIMIT: &str = "_GroupByLimit";
pub const LOCAL_INDEX: &str = "_LocalIndex";
pub const LOCAL_INDEX_BUILD: &str = "_LocalIndexBuild";
pub const LOCAL_INDEX_JOIN_SCHEMA: &str = "_LocalIndexJoinSchema";
pub const DATA_TABLE_COLUMNS_TO_JOIN: &str = "_DataTableColumnsToJoin";
pub const COLUMNS_STORED_IN_SINGLE_CELL: &str = "_ColumnsStoredInSingleCell";
pub const VIEW_CONSTANTS: &str = "_ViewConstants";
pub const EXPECTED_UPPER_REGION_KEY: &str = "_ExpectedUpperRegionKey";
pub const REVERSE_SCAN: &str = "_ReverseScan";
pub const ANALYZE_TABLE: &str = "_ANALYZETABLE";
pub const REBUILD_INDEXES: &str = "_RebuildIndexes";
pub const TX_STATE: &str = "_TxState";
pub const GUIDEPOST_WIDTH_BYTES: &str = "_GUIDEPOST_WIDTH_BYTES";
pub const GUIDEPOST_PER_REGION: &str = "_GUIDEPOST_PER_REGION";
pub const UPGRADE_DESC_ROW_KEY: &str = "_UPGRADE_DESC_ROW_KEY";
pub const SCAN_REGION_SERVER: &str = "_SCAN_REGION_SERVER";
pub const RUN_UPDATE_STATS_ASYNC: &str = "_RunUpdateStatsAsync";
pub const SKIP_REGION_BOUNDARY_CHECK: &str = "_SKIP_REGION_BOUNDARY_CHECK";
pub const TX_SCN: &str = "_TxScn";
pub const SCAN_ACTUAL_START_ROW: &str = "_ScanActualStartRow";
pub const IGNORE_NEWER_MUTATIONS: &str = "_IGNORE_NEWER_MUTATIONS";
pub const SCAN_OFFSET: &str = "_RowOffset";
pub const SCAN_START_ROW_SUFFIX: &str = "_ScanStartRowSuffix";
pub const SCAN_STOP_ROW_SUFFIX: &str = "_ScanStopRowSuffix";
pub const MIN_QUALIFIER: &str = "_MinQualifier";
pub const MAX_QUALIFIER: &str = "_MaxQualifier";
pub const USE_NEW_VALUE_COLUMN_QUALIFIER: &str = "_UseNewValueColumnQualifier";
pub const QUALIFIER_ENCODING_SCHEME: &str = "_QualifierEncodingScheme";
pub const IMMUTABLE_STORAGE_ENCODING_SCHEME: &str = "_ImmutableStorageEncodingScheme";
pub const USE_ENCODED_COLUMN_QUALIFIER_LIST: &str = "_UseEncodedColumnQualifierList";

/// Prefix of client supplied key/value pairs used to annotate server side log lines
pub const CUSTOM_ANNOTATIONS: &str = "_Annot";


pub fn encode_bool(value: bool) -> Bytes {
    Bytes::from_static(if value { &[1u8] } else { &[0u8] })
}


pub fn encode_long(value: u64) -> Bytes {
    Bytes::copy_from_slice(&value.to_be_bytes())
}


#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualifierEncodingScheme {
    #[default]
    NonEncoded,
    OneByte,
    TwoByte,
    ThreeByte,
    FourByte
}


impl QualifierEncodingScheme {
    pub fn from_serialized(value: u8) -> anyhow::Result<Self> {
        Ok(match value {
            0 => Self::NonEncoded,
            1 => Self::OneByte,
            2 => Self::TwoByte,
            3 => Self::ThreeByte,
            4 => Self::FourByte,
            _ => return Err(anyhow!(MalformedAttribute {
                name: QUALIFIER_ENCODING_SCHEME,
                reason: format!("unknown encoding scheme {}", value)
            }))
        })
    }

    pub fn serialized(self) -> u8 {
        match self {
            Self::NonEncoded => 0,
            Self::OneByte => 1,
            Self::TwoByte => 2,
            Self::ThreeByte => 3,
            Self::FourByte => 4
        }
    }
}


/// Typed view of the scan attributes this layer acts upon.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ScanAttributes {
    pub local_index: bool,
    /// Explicit expected end key of a local index region.
    /// Use [ScanAttributes::expected_upper_region_key] to get the effective value.
    pub expected_upper_region_key: Option<Bytes>,
    pub skip_region_boundary_check: bool,
    pub reverse_scan: bool,
    pub tx_scn: Option<Timestamp>,
    pub encoding_scheme: QualifierEncodingScheme,
    pub use_new_value_column_qualifier: bool
}


impl ScanAttributes {
    pub fn decode(scan: &Scan) -> anyhow::Result<Self> {
        let encoding_scheme = match read_fixed::<1>(scan, QUALIFIER_ENCODING_SCHEME)? {
            Some([value]) => QualifierEncodingScheme::from_serialized(value)?,
            None => QualifierEncodingScheme::default()
        };

        Ok(Self {
            local_index: read_bool(scan, LOCAL_INDEX)?,
            expected_upper_region_key: scan.attribute(EXPECTED_UPPER_REGION_KEY).cloned(),
            skip_region_boundary_check: read_bool(scan, SKIP_REGION_BOUNDARY_CHECK)?,
            reverse_scan: read_bool(scan, REVERSE_SCAN)?,
            tx_scn: read_fixed::<8>(scan, TX_SCN)?.map(u64::from_be_bytes),
            encoding_scheme,
            use_new_value_column_qualifier: read_bool(scan, USE_NEW_VALUE_COLUMN_QUALIFIER)?
        })
    }

    /// End key the client believes the local index region has.
    /// Falls back to the scan's own stop row.
    pub fn expected_upper_region_key<'a>(&'a self, scan: &'a Scan) -> &'a Bytes {
        self.expected_upper_region_key.as_ref().unwrap_or(scan.stop_row())
    }
}


fn read_bool(scan: &Scan, name: &'static str) -> anyhow::Result<bool> {
    Ok(read_fixed::<1>(scan, name)?.map_or(false, |[b]| b != 0))
}


fn read_fixed<const N: usize>(scan: &Scan, name: &'static str) -> anyhow::Result<Option<[u8; N]>> {
    let Some(value) = scan.attribute(name) else {
        return Ok(None)
    };
    ensure!(
        value.len() == N,
        MalformedAttribute {
            name,
            reason: format!("expected {} bytes, but got {}", N, value.len())
        }
    );
    let mut bytes = [0; N];
    bytes.copy_from_slice(value);
    Ok(Some(bytes))
}


/// Client supplied log annotations, `_Annot<key>` attributes in name order.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Annotations {
    pairs: Vec<(String, String)>
}


impl Annotations {
    pub fn from_scan(scan: &Scan) -> Self {
        let pairs = scan.attributes()
            .filter_map(|(name, value)| {
                let key = name.strip_prefix(CUSTOM_ANNOTATIONS)?;
                Some((key.to_string(), String::from_utf8_lossy(value).into_owned()))
            })
            .collect();
        Self {
            pairs
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}


impl Display for Annotations {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}
