//! Single-shot ledger and network queries.
//!
//! Each query opens a connection, sends one request and returns the decoded
//! `result`. Node errors surface as [`ClientError::Query`].

use ogmios_core::{Num, Point, TxIn, Utxo};
use ogmios_sync::Connector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::client::Client;
use crate::error::{ClientError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Era history
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraSeconds {
    pub seconds: Num,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraMilliseconds {
    pub milliseconds: Num,
}

/// Start or end of an era.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraBound {
    pub time: EraSeconds,
    pub slot: u64,
    pub epoch: u64,
}

/// Start of the current era.
pub type EraStart = EraBound;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EraParameters {
    pub epoch_length: u64,
    pub slot_length: EraMilliseconds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_zone: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraSummary {
    pub start: EraBound,
    /// Absent for an era with no known end.
    #[serde(default)]
    pub end: Option<EraBound>,
    pub parameters: EraParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EraHistory {
    pub summaries: Vec<EraSummary>,
}

impl EraHistory {
    pub fn elapsed_milliseconds(&self, slot: u64) -> u64 {
        slot_to_elapsed_milliseconds(self, slot)
    }
}

/// Milliseconds between the system start and `slot`.
///
/// Each era contributes its elapsed slots times its slot length. Eras that
/// start at or after `slot` contribute nothing.
pub fn slot_to_elapsed_milliseconds(history: &EraHistory, slot: u64) -> u64 {
    history
        .summaries
        .iter()
        .filter_map(|summary| {
            let interval_end = match &summary.end {
                Some(end) if end.slot < slot => end.slot,
                _ if summary.start.slot < slot => slot,
                _ => return None,
            };
            let slots = interval_end.saturating_sub(summary.start.slot);
            let slot_length = summary.parameters.slot_length.milliseconds.to_u64()?;
            Some(slots.saturating_mul(slot_length))
        })
        .fold(0u64, u64::saturating_add)
}

// ─────────────────────────────────────────────────────────────────────────────
// Script evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// Which script a budget belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub purpose: String,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExUnitsBudget {
    pub memory: u64,
    pub cpu: u64,
}

/// Execution budget of one script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExUnits {
    pub validator: Validator,
    pub budget: ExUnitsBudget,
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

fn params<T: Serialize>(key: &str, value: T) -> Result<Option<JsonValue>> {
    let mut map = Map::new();
    map.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(Some(JsonValue::Object(map)))
}

fn no_params() -> Option<JsonValue> {
    Some(JsonValue::Object(Map::new()))
}

impl<C> Client<C>
where
    C: Connector + Clone + 'static,
{
    /// The node's current chain tip.
    pub async fn chain_tip(&self) -> Result<Point> {
        self.request("queryLedgerState/tip", no_params()).await
    }

    pub async fn current_epoch(&self) -> Result<u64> {
        self.request("queryLedgerState/epoch", no_params()).await
    }

    pub async fn current_protocol_parameters(&self) -> Result<JsonValue> {
        self.request("queryLedgerState/protocolParameters", no_params())
            .await
    }

    /// Genesis configuration of `era` (`byron`, `shelley`, `alonzo`, `conway`).
    pub async fn genesis_config(&self, era: &str) -> Result<JsonValue> {
        self.request("queryNetwork/genesisConfiguration", params("era", era)?)
            .await
    }

    /// System start, as an ISO-8601 timestamp.
    pub async fn start_time(&self) -> Result<String> {
        self.request("queryNetwork/startTime", None).await
    }

    pub async fn era_summaries(&self) -> Result<EraHistory> {
        let summaries = self
            .request("queryLedgerState/eraSummaries", no_params())
            .await?;
        Ok(EraHistory { summaries })
    }

    pub async fn era_start(&self) -> Result<EraStart> {
        self.request("queryLedgerState/eraStart", no_params()).await
    }

    pub async fn utxos_by_address(&self, addresses: &[String]) -> Result<Vec<Utxo>> {
        self.request("queryLedgerState/utxo", params("addresses", addresses)?)
            .await
    }

    pub async fn utxos_by_tx_in(&self, inputs: &[TxIn]) -> Result<Vec<Utxo>> {
        self.request("queryLedgerState/utxo", params("outputReferences", inputs)?)
            .await
    }

    /// Execution budgets of every script in a hex-encoded transaction.
    pub async fn evaluate_tx(&self, cbor: &str) -> Result<Vec<ExUnits>> {
        const METHOD: &str = "evaluateTransaction";

        let mut tx = Map::new();
        tx.insert("cbor".into(), JsonValue::from(cbor));
        let result: JsonValue = self.request(METHOD, params("transaction", tx)?).await?;
        if !result.is_array() {
            return Err(ClientError::Query {
                method: METHOD.into(),
                message: format!("expected a list of budgets, got {result}"),
            });
        }
        Ok(serde_json::from_value(result)?)
    }
}
