use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "server": {
                "type": "object",
                "properties": {
                    "host": { "type": "string" },
                    "port": { "type": "integer", "minimum": 1, "maximum": 65535 }
                }
            },
            "paths": {
                "type": "object",
                "properties": {
                    "data_dir": { "type": "string" },
                    "reports_dir": { "type": "string" },
                    "static_dir": { "type": "string" },
                    "templates_dir": { "type": "string" },
                    "exploit_db": { "type": "string" }
                }
            },
            "llm": {
                "type": "object",
                "properties": {
                    "backend": { "type": "string", "enum": ["local", "openai_compatible"] },
                    "base_url": { "type": "string" },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "max_tokens": { "type": "integer", "minimum": 1 },
                    "temperature": { "type": "number", "minimum": 0, "maximum": 2 },
                    "top_p": { "type": "number", "exclusiveMinimum": 0, "maximum": 1 },
                    "max_prompt_chars": { "type": "integer", "minimum": 256 },
                    "request_timeout_secs": { "type": "integer", "minimum": 1 },
                    "preamble": { "type": "string" },
                    "plain_text_only": { "type": "boolean" },
                    "history_limit": { "type": "integer", "minimum": 1 }
                }
            },
            "scans": {
                "type": "object",
                "properties": {
                    "quick_timeout_secs": { "type": "integer", "minimum": 1 },
                    "long_timeout_secs": { "type": "integer", "minimum": 1 },
                    "quick_budget_secs": { "type": "integer", "minimum": 1 },
                    "long_budget_secs": { "type": "integer", "minimum": 1 },
                    "geolocation": { "type": "boolean" },
                    "geolocation_url": { "type": "string" },
                    "large_file_mb": { "type": "integer", "minimum": 1 },
                    "old_file_days": { "type": "integer", "minimum": 1 },
                    "recent_snapshot_days": { "type": "integer", "minimum": 0 },
                    "entropy_threshold": { "type": "number", "minimum": 0, "maximum": 8 },
                    "max_file_records": { "type": "integer", "minimum": 1 },
                    "file_roots": { "type": "array", "items": { "type": "string" } },
                    "hash_dirs": { "type": "array", "items": { "type": "string" } }
                }
            }
        }
    })
});
