//! Read-only store tools for the query agent.

use crate::store::{CharacterStore, StorageError};
use gemini::{FunctionCall, Tool};
use serde_json::{json, Value};

/// Collection of lookup tools exposed to the model.
pub struct QueryTools;

impl QueryTools {
    /// Get all tool definitions for the API.
    pub fn all() -> Vec<Tool> {
        vec![Self::list_characters(), Self::get_character()]
    }

    fn list_characters() -> Tool {
        Tool {
            name: "list_characters".to_string(),
            description: "저장된 모든 등장인물의 목록을 조회합니다. 이름, 직업, 출전 소설 제목을 반환합니다.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    fn get_character() -> Tool {
        Tool {
            name: "get_character".to_string(),
            description: "특정 등장인물의 상세 정보를 조회합니다. 이름이 정확히 일치해야 합니다.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "full_name": {
                        "type": "string",
                        "description": "조회할 등장인물의 전체 이름"
                    }
                },
                "required": ["full_name"]
            }),
        }
    }
}

/// Execute one tool call against the store.
///
/// Lookup misses and bad arguments come back as payloads the model can
/// read and explain; only storage faults are errors.
pub fn execute_tool_call(
    store: &CharacterStore,
    call: &FunctionCall,
) -> Result<Value, StorageError> {
    match call.name.as_str() {
        "list_characters" => {
            let characters = store.list()?;
            Ok(json!({
                "status": "success",
                "count": characters.len(),
                "characters": characters,
            }))
        }
        "get_character" => {
            let Some(full_name) = call.args.get("full_name").and_then(Value::as_str) else {
                return Ok(json!({
                    "status": "error",
                    "message": "full_name 인자가 필요합니다.",
                }));
            };
            match store.get(full_name)? {
                Some(stored) => Ok(json!({
                    "status": "found",
                    "character": {
                        "full_name": stored.record.full_name,
                        "events": stored.record.events,
                        "characteristics": stored.record.characteristics,
                        "occupation": stored.record.occupation,
                        "relationships": stored.record.relationships,
                        "novel_title": stored.record.novel_title,
                        "created_at": stored.created_at,
                    },
                })),
                None => Ok(json!({
                    "status": "not_found",
                    "message": format!("등장인물 '{full_name}'을(를) 찾을 수 없습니다."),
                })),
            }
        }
        other => Ok(json!({
            "status": "error",
            "message": format!("알 수 없는 도구: {other}"),
        })),
    }
}
