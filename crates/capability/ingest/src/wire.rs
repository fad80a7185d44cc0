//! 遥测线格式解析。
//!
//! 三种传输共用同一 JSON 负载：至少包含 `device_id` 与
//! `nivel_pct`/`levelPercent`，未知字段一律忽略。

use serde::Deserialize;

/// 解析后的单条遥测读数。
#[derive(Debug, Clone, PartialEq)]
pub struct WireReading {
    pub device_id: String,
    pub level_pct: f64,
}

#[derive(Debug, Deserialize)]
struct LevelPayload {
    #[serde(alias = "deviceId")]
    device_id: String,
    #[serde(alias = "levelPercent", alias = "level_percent")]
    nivel_pct: f64,
}

/// 解析遥测负载。范围校验属于调和层，这里只做结构校验。
pub fn parse_level_payload(payload: &[u8]) -> Result<WireReading, String> {
    if payload.is_empty() {
        return Err("empty payload".to_string());
    }
    let parsed: LevelPayload = serde_json::from_slice(payload).map_err(|err| err.to_string())?;
    if parsed.device_id.trim().is_empty() {
        return Err("missing device_id".to_string());
    }
    Ok(WireReading {
        device_id: parsed.device_id,
        level_pct: parsed.nivel_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nivel_pct_payload() {
        let reading =
            parse_level_payload(br#"{"device_id":"d2","nivel_pct":55}"#).expect("parsed");
        assert_eq!(reading.device_id, "d2");
        assert_eq!(reading.level_pct, 55.0);
    }

    #[test]
    fn parses_level_percent_alias() {
        let reading =
            parse_level_payload(br#"{"deviceId":"d1","levelPercent":12.5}"#).expect("parsed");
        assert_eq!(reading.device_id, "d1");
        assert_eq!(reading.level_pct, 12.5);
    }

    #[test]
    fn ignores_unknown_fields() {
        let reading = parse_level_payload(
            br#"{"device_id":"d1","nivel_pct":40,"quality":"good","rssi":-60}"#,
        )
        .expect("parsed");
        assert_eq!(reading.level_pct, 40.0);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(parse_level_payload(b"").is_err());
        assert!(parse_level_payload(b"not json").is_err());
        assert!(parse_level_payload(br#"{"nivel_pct":40}"#).is_err());
        assert!(parse_level_payload(br#"{"device_id":"d1"}"#).is_err());
        assert!(parse_level_payload(br#"{"device_id":"","nivel_pct":40}"#).is_err());
        assert!(parse_level_payload(br#"{"device_id":"d1","nivel_pct":"high"}"#).is_err());
    }
}
