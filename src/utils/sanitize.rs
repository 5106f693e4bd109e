use serde_json::Value;

/// Masks payment credentials anywhere in a JSON payload before it is logged.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = match sensitivity(key) {
                    Some(Sensitivity::KeepLastFour) => mask_keep_last_four(val),
                    Some(Sensitivity::Hide) => Value::String("***".to_string()),
                    None => sanitize_json(val),
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

enum Sensitivity {
    KeepLastFour,
    Hide,
}

fn sensitivity(key: &str) -> Option<Sensitivity> {
    match key.to_lowercase().as_str() {
        "number" | "card_number" | "account_number" | "bank_code" => Some(Sensitivity::KeepLastFour),
        "cvv" | "password" | "secret" | "token" | "authorization" => Some(Sensitivity::Hide),
        _ => None,
    }
}

fn mask_keep_last_four(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 4 => {
            let chars: Vec<char> = s.chars().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            Value::String(format!("****{}", tail))
        }
        _ => Value::String("****".to_string()),
    }
}
