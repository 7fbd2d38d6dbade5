//! Extracts emitted IDs (data-set id, provider id) from a stored
//! `tx_receipt` JSON blob via event-log parsing. The receipt watcher
//! stores the whole receipt verbatim; this
//! module is where the specific event shapes are known, so callers ask for
//! exactly the field they need rather than re-parsing raw logs themselves.

use alloy_primitives::keccak256;
use serde_json::Value;

fn topic_hash(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

fn parse_topic_u64(topic: &str) -> Option<u64> {
    let hex_str = topic.trim_start_matches("0x");
    u64::from_str_radix(&hex_str[hex_str.len().saturating_sub(16)..], 16).ok()
}

fn parse_topic_address(topic: &str) -> Option<String> {
    let hex_str = topic.trim_start_matches("0x");
    if hex_str.len() < 40 {
        return None;
    }
    Some(format!("0x{}", &hex_str[hex_str.len() - 40..]))
}

fn logs_from(receipt: &Value, emitter: &str) -> Vec<&Value> {
    receipt
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| {
            logs.iter()
                .filter(|log| {
                    log.get("address")
                        .and_then(Value::as_str)
                        .is_some_and(|addr| addr.eq_ignore_ascii_case(emitter))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `DataSetCreated(uint256 indexed setId, address indexed owner)`.
pub fn decode_data_set_created(receipt: &Value, verifier_address: &str) -> Option<(u64, String)> {
    let signature = topic_hash("DataSetCreated(uint256,address)");
    for log in logs_from(receipt, verifier_address) {
        let topics = log.get("topics")?.as_array()?;
        if topics.first()?.as_str()?.eq_ignore_ascii_case(&signature) {
            let set_id = parse_topic_u64(topics.get(1)?.as_str()?)?;
            let owner = parse_topic_address(topics.get(2)?.as_str()?)?;
            return Some((set_id, owner));
        }
    }
    None
}

/// `PiecesAdded(uint256 indexed setId, uint256[] pieceIds)` - only the
/// indexed `setId` is recovered from topics; the piece ID array lives in
/// log data and isn't needed by anything in this workspace today.
pub fn decode_pieces_added_set_id(receipt: &Value, verifier_address: &str) -> Option<u64> {
    let signature = topic_hash("PiecesAdded(uint256,uint256[])");
    for log in logs_from(receipt, verifier_address) {
        let topics = log.get("topics")?.as_array()?;
        if topics.first()?.as_str()?.eq_ignore_ascii_case(&signature) {
            return parse_topic_u64(topics.get(1)?.as_str()?);
        }
    }
    None
}

/// `ProviderRegistered(address indexed provider)`.
pub fn decode_provider_registered(receipt: &Value, registry_address: &str) -> Option<String> {
    let signature = topic_hash("ProviderRegistered(address)");
    for log in logs_from(receipt, registry_address) {
        let topics = log.get("topics")?.as_array()?;
        if topics.first()?.as_str()?.eq_ignore_ascii_case(&signature) {
            return parse_topic_address(topics.get(1)?.as_str()?);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_data_set_created_from_matching_log() {
        let signature = topic_hash("DataSetCreated(uint256,address)");
        let owner_topic = format!("0x{:0>64}", "1122334455667788990011223344556677889900");
        let receipt = json!({
            "logs": [{
                "address": "0xAbCd000000000000000000000000000000000A",
                "topics": [signature, format!("0x{:064x}", 42u64), owner_topic],
            }]
        });
        let (set_id, owner) =
            decode_data_set_created(&receipt, "0xabcd000000000000000000000000000000000a").unwrap();
        assert_eq!(set_id, 42);
        assert_eq!(owner, "0x1122334455667788990011223344556677889900");
    }

    #[test]
    fn ignores_logs_from_other_emitters() {
        let receipt = json!({ "logs": [{ "address": "0x0", "topics": [] }] });
        assert!(decode_data_set_created(&receipt, "0xabc").is_none());
    }
}
