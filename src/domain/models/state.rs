//! Captured execution state returned to callers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::models::chain::TaskType;
use crate::domain::models::value::DataType;

/// Error detail attached to a failed task visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One record per task visit: what went in, what came out, how long it
/// took, and the transition eval the output produced.
///
/// Units are appended in visit order, revisits included, so the unit count
/// always equals the number of task visits in the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedStateUnit {
    #[serde(rename = "taskID")]
    pub task_id: String,
    #[serde(rename = "taskType")]
    pub task_type: TaskType,
    #[serde(rename = "inputType")]
    pub input_type: DataType,
    #[serde(rename = "outputType")]
    pub output_type: DataType,
    #[serde(rename = "transition")]
    pub transition: String,
    #[serde(
        rename = "duration_ms",
        serialize_with = "serialize_duration_ms",
        deserialize_with = "deserialize_duration_ms"
    )]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_duration_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis: u64 = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let unit = CapturedStateUnit {
            task_id: "score".to_string(),
            task_type: TaskType::PromptToScore,
            input_type: DataType::String,
            output_type: DataType::Int,
            transition: "73".to_string(),
            duration: Duration::from_millis(42),
            error: None,
        };

        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["taskID"], "score");
        assert_eq!(json["taskType"], "prompt_to_score");
        assert_eq!(json["inputType"], "string");
        assert_eq!(json["outputType"], "int");
        assert_eq!(json["duration_ms"], 42);
        assert!(json.get("error").is_none());

        let decoded: CapturedStateUnit = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, unit);
    }

    #[test]
    fn test_error_shape() {
        let unit = CapturedStateUnit {
            task_id: "t".to_string(),
            task_type: TaskType::Hook,
            input_type: DataType::String,
            output_type: DataType::String,
            transition: String::new(),
            duration: Duration::from_millis(1),
            error: Some(ErrorResponse {
                error: "boom".to_string(),
            }),
        };
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["error"]["error"], "boom");
    }
}
