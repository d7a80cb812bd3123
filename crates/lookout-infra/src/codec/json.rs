//! JSON payloads as written by arq workers configured with a JSON serializer.
//!
//! Definition: `{"t": try, "f": function, "a": [args], "k": {kwargs}, "et": enqueue_ms}`.
//! Result: the definition keys plus `"s"`, `"r"`, `"st"`, `"ft"` and `"q"`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use lookout_core::domain::{JobDefinition, JobInfo, JobOutcome};
use lookout_core::error::DeserializeError;
use lookout_core::ports::JobDeserializer;

#[derive(Debug, Serialize, Deserialize)]
struct DefinitionPayload {
    #[serde(rename = "t", default)]
    job_try: Option<i64>,
    #[serde(rename = "f")]
    function: String,
    #[serde(rename = "a", default)]
    args: Vec<Value>,
    #[serde(rename = "k", default)]
    kwargs: Map<String, Value>,
    #[serde(rename = "et")]
    enqueue_time_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultPayload {
    #[serde(flatten)]
    definition: DefinitionPayload,
    #[serde(rename = "s")]
    success: bool,
    #[serde(rename = "r", default)]
    result: Value,
    #[serde(rename = "st")]
    start_ms: i64,
    #[serde(rename = "ft")]
    finish_ms: i64,
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    queue_name: Option<String>,
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>, DeserializeError> {
    DateTime::from_timestamp_millis(ms).ok_or(DeserializeError::Timestamp(ms))
}

fn parse<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DeserializeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DeserializeError::Encoding)?;
    serde_json::from_str(text).map_err(|e| DeserializeError::Malformed(e.to_string()))
}

impl DefinitionPayload {
    fn into_definition(self) -> Result<JobDefinition, DeserializeError> {
        Ok(JobDefinition {
            function: self.function,
            args: self.args,
            kwargs: self.kwargs,
            job_try: self.job_try.unwrap_or(-1),
            enqueue_time: timestamp(self.enqueue_time_ms)?,
            score: None,
        })
    }

    fn from_definition(definition: &JobDefinition) -> Self {
        Self {
            job_try: (definition.job_try >= 0).then_some(definition.job_try),
            function: definition.function.clone(),
            args: definition.args.clone(),
            kwargs: definition.kwargs.clone(),
            enqueue_time_ms: definition.enqueue_time.timestamp_millis(),
        }
    }
}

/// Codec for arq's JSON payloads. The default deserializer of every queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArqJsonCodec;

impl ArqJsonCodec {
    pub fn encode_definition(definition: &JobDefinition) -> Vec<u8> {
        Self::to_bytes(&DefinitionPayload::from_definition(definition))
    }

    pub fn encode_result(definition: &JobDefinition, outcome: &JobOutcome) -> Vec<u8> {
        Self::to_bytes(&ResultPayload {
            definition: DefinitionPayload::from_definition(definition),
            success: outcome.success,
            result: outcome.result.clone(),
            start_ms: outcome.start_time.timestamp_millis(),
            finish_ms: outcome.finish_time.timestamp_millis(),
            queue_name: outcome.queue_name.clone(),
        })
    }

    fn to_bytes<T: Serialize>(payload: &T) -> Vec<u8> {
        // Payloads are plain maps of JSON values; serializing them cannot fail.
        serde_json::to_vec(payload).unwrap_or_default()
    }
}

impl JobDeserializer for ArqJsonCodec {
    fn deserialize_definition(&self, payload: &[u8]) -> Result<JobDefinition, DeserializeError> {
        parse::<DefinitionPayload>(payload)?.into_definition()
    }

    fn deserialize_result(&self, payload: &[u8]) -> Result<JobInfo, DeserializeError> {
        let payload: ResultPayload = parse(payload)?;
        Ok(JobInfo {
            outcome: Some(JobOutcome {
                success: payload.success,
                result: payload.result,
                start_time: timestamp(payload.start_ms)?,
                finish_time: timestamp(payload.finish_ms)?,
                queue_name: payload.queue_name,
            }),
            definition: payload.definition.into_definition()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_definition() {
        let payload = json!({
            "t": 2,
            "f": "send_email",
            "a": ["bob@example.com", 3],
            "k": {"urgent": true},
            "et": 1_700_000_000_123_i64,
        });

        let definition = ArqJsonCodec
            .deserialize_definition(payload.to_string().as_bytes())
            .unwrap();

        assert_eq!(definition.function, "send_email");
        assert_eq!(definition.args, vec![json!("bob@example.com"), json!(3)]);
        assert_eq!(definition.kwargs["urgent"], json!(true));
        assert_eq!(definition.job_try, 2);
        assert_eq!(definition.enqueue_time.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(definition.score, None);
    }

    #[test]
    fn missing_try_is_unknown() {
        let payload = br#"{"f": "task", "et": 0}"#;

        let definition = ArqJsonCodec.deserialize_definition(payload).unwrap();

        assert_eq!(definition.job_try, -1);
        assert!(definition.args.is_empty());
        assert!(definition.kwargs.is_empty());
    }

    #[test]
    fn decodes_result_with_outcome() {
        let payload = json!({
            "t": 1, "f": "failed_task", "a": [], "k": {}, "et": 1_000,
            "s": false, "r": "Exception()", "st": 2_000, "ft": 3_000, "q": "arq:queue",
        });

        let info = ArqJsonCodec
            .deserialize_result(payload.to_string().as_bytes())
            .unwrap();

        assert_eq!(info.definition.function, "failed_task");
        let outcome = info.outcome.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.result, json!("Exception()"));
        assert_eq!(outcome.start_time.timestamp_millis(), 2_000);
        assert_eq!(outcome.finish_time.timestamp_millis(), 3_000);
        assert_eq!(outcome.queue_name.as_deref(), Some("arq:queue"));
    }

    #[yare::parameterized(
        random_text   = { b"RANDOM TEXT" },
        wrong_shape   = { br#"{"function": "task"}"# },
        pickle_header = { b"\x80\x04\x95" },
        empty         = { b"" },
    )]
    fn rejects_unreadable_payloads(payload: &[u8]) {
        assert!(ArqJsonCodec.deserialize_definition(payload).is_err());
        assert!(ArqJsonCodec.deserialize_result(payload).is_err());
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        assert_eq!(
            ArqJsonCodec.deserialize_definition(b"\x80\x04\x95"),
            Err(DeserializeError::Encoding)
        );
    }

    #[test]
    fn definition_is_not_a_result() {
        let payload = br#"{"t": 1, "f": "task", "a": [], "k": {}, "et": 1000}"#;
        assert!(ArqJsonCodec.deserialize_result(payload).is_err());
    }

    #[test]
    fn encoded_payloads_decode() {
        let definition = JobDefinition {
            function: "task".into(),
            args: vec![json!(1)],
            kwargs: Map::new(),
            job_try: -1,
            enqueue_time: DateTime::from_timestamp_millis(5_000).unwrap(),
            score: Some(99),
        };
        let outcome = JobOutcome {
            success: true,
            result: json!({"rows": 3}),
            start_time: DateTime::from_timestamp_millis(6_000).unwrap(),
            finish_time: DateTime::from_timestamp_millis(7_000).unwrap(),
            queue_name: None,
        };

        let info = ArqJsonCodec
            .deserialize_result(&ArqJsonCodec::encode_result(&definition, &outcome))
            .unwrap();

        // The score lives in the sorted set, not in the payload.
        assert_eq!(info.definition, JobDefinition { score: None, ..definition });
        assert_eq!(info.outcome, Some(outcome));
    }
}
