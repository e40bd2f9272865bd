use serde_json::{Map, Value};

/// Keys whose object value is merged wholesale into the accumulated params.
const WHOLE_PARAM_KEYS: [&str; 4] = ["parameters", "args", "arguments", "input"];

/// Value shape a synonym accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    String,
    List,
    NonNull,
}

impl Accept {
    fn matches(self, value: &Value) -> bool {
        match self {
            Accept::String => value.is_string(),
            Accept::List => value.is_array(),
            Accept::NonNull => !value.is_null(),
        }
    }
}

/// One `(alias, canonical)` resolution rule.
#[derive(Debug, Clone, Copy)]
pub struct Synonym {
    pub alias: &'static str,
    pub canonical: &'static str,
    pub accept: Accept,
}

const fn synonym(alias: &'static str, canonical: &'static str, accept: Accept) -> Synonym {
    Synonym {
        alias,
        canonical,
        accept,
    }
}

/// Applied in order; an earlier alias wins over a later one for the same
/// canonical key, and nothing overwrites a key already accumulated.
pub const PARAM_SYNONYMS: &[Synonym] = &[
    synonym("query", "query", Accept::String),
    synonym("q", "query", Accept::String),
    synonym("recency", "recency", Accept::NonNull),
    synonym("time_range", "time_range", Accept::NonNull),
    synonym("days", "days", Accept::NonNull),
    synonym("domains", "domains", Accept::List),
    synonym("include_domains", "domains", Accept::List),
    synonym("include", "domains", Accept::List),
    synonym("max_results", "max_results", Accept::NonNull),
    synonym("topn", "max_results", Accept::NonNull),
    synonym("limit", "max_results", Accept::NonNull),
];

/// Merge tool parameters observed in `src` into `params`.
pub fn merge_tool_params(params: &mut Map<String, Value>, src: &Map<String, Value>) {
    for key in WHOLE_PARAM_KEYS {
        if let Some(Value::Object(whole)) = src.get(key) {
            for (k, v) in whole {
                params.insert(k.clone(), v.clone());
            }
        }
    }
    for rule in PARAM_SYNONYMS {
        let Some(value) = src.get(rule.alias) else {
            continue;
        };
        if rule.accept.matches(value) && !params.contains_key(rule.canonical) {
            params.insert(rule.canonical.to_string(), value.clone());
        }
    }
}

/// Render tool arguments as the JSON string clients expect.
///
/// Objects and lists serialize directly; a string holding an object or list
/// is re-serialized; any other string becomes `{"query": s}`; everything
/// else, and anything that fails to serialize, degrades to `"{}"`.
#[must_use]
pub fn serialize_tool_args(args: &Value) -> String {
    let rendered = match args {
        Value::Object(_) | Value::Array(_) => serde_json::to_string(args),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => serde_json::to_string(&parsed),
            _ => serde_json::to_string(&serde_json::json!({ "query": s })),
        },
        _ => return "{}".to_string(),
    };
    rendered.unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merged(sources: &[Value]) -> Value {
        let mut params = Map::new();
        for src in sources {
            merge_tool_params(&mut params, src.as_object().unwrap());
        }
        Value::Object(params)
    }

    #[test]
    fn test_query_synonyms_first_wins() {
        assert_eq!(merged(&[json!({"q": "a", "query": "b"})]), json!({"query": "b"}));
        assert_eq!(merged(&[json!({"q": "a"}), json!({"query": "b"})]), json!({"query": "a"}));
        assert_eq!(merged(&[json!({"q": 3})]), json!({}));
    }

    #[test]
    fn test_whole_dicts_merge_and_overwrite() {
        let params = merged(&[
            json!({"parameters": {"query": "x", "k": 1}}),
            json!({"arguments": {"k": 2}}),
        ]);
        assert_eq!(params, json!({"query": "x", "k": 2}));
    }

    #[test]
    fn test_domain_and_limit_synonyms() {
        let params = merged(&[json!({
            "include_domains": ["a.com"],
            "include": ["b.com"],
            "topn": 5,
            "limit": 9,
            "days": 7,
            "time_range": null
        })]);
        assert_eq!(
            params,
            json!({"domains": ["a.com"], "max_results": 5, "days": 7})
        );
        assert_eq!(merged(&[json!({"domains": "a.com"})]), json!({}));
    }

    #[test]
    fn test_serialize_tool_args() {
        assert_eq!(serialize_tool_args(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(serialize_tool_args(&json!([1, 2])), "[1,2]");
        assert_eq!(serialize_tool_args(&json!("{ \"a\" : 1 }")), r#"{"a":1}"#);
        assert_eq!(serialize_tool_args(&json!("cats")), r#"{"query":"cats"}"#);
        assert_eq!(serialize_tool_args(&json!("42")), r#"{"query":"42"}"#);
        assert_eq!(serialize_tool_args(&json!(null)), "{}");
        assert_eq!(serialize_tool_args(&json!(7)), "{}");
    }
}
