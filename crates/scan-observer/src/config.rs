use crate::strategy::QueryShape;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;


pub const SCANNER_OPENED_TRACE_INFO: &str = "Scanner opened on server";


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserverConfig {
    /// Query shapes handled on this node, checked in the listed order
    #[serde(default = "default_strategies")]
    pub strategies: Vec<QueryShape>,
    /// Description recorded on the span opened together with the result scanner
    #[serde(default = "default_span_description")]
    pub span_description: String
}


fn default_strategies() -> Vec<QueryShape> {
    QueryShape::ALL.to_vec()
}


fn default_span_description() -> String {
    SCANNER_OPENED_TRACE_INFO.to_string()
}


impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            span_description: default_span_description()
        }
    }
}


impl ObserverConfig {
    pub fn read(file: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_reader(
            std::io::BufReader::new(std::fs::File::open(file)?)
        )?;
        config.validate().context("invalid config")?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.strategies.is_empty(), "at least one query shape must be enabled");

        let mut seen = HashSet::new();
        for shape in self.strategies.iter() {
            ensure!(
                seen.insert(*shape),
                "query shape {} is listed more than once",
                shape
            );
        }

        Ok(())
    }
}
