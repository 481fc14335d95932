use serde_json::{Map, Value, json};

/// JSON types a tool argument may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
}

impl FieldType {
    fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldType,
    pub required: bool,
    pub description: &'static str,
}

/// Declared input contract of a tool. Field order is preserved in the
/// published schema.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<Field>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, description: &'static str) -> Self {
        self.fields.push(Field {
            name,
            kind: FieldType::String,
            required: true,
            description,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, description: &'static str) -> Self {
        self.fields.push(Field {
            name,
            kind: FieldType::String,
            required: false,
            description,
        });
        self
    }

    /// JSON Schema object as published by `tools/list`.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.to_string(),
                    json!({"type": f.kind.as_str(), "description": f.description}),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema["additionalProperties"] = Value::Bool(false);
        schema
    }

    /// Check `args` against the contract. Absent or null arguments count as
    /// an empty object. Returns the arguments as an object value.
    pub fn validate(&self, args: Value) -> Result<Value, String> {
        let args = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "arguments must be an object, got {}",
                    json_type(&other)
                ));
            }
        };

        for field in &self.fields {
            match args.get(field.name) {
                None if field.required => {
                    return Err(format!("missing required argument '{}'", field.name));
                }
                Some(value) if !field.kind.matches(value) => {
                    return Err(format!(
                        "argument '{}' must be a {}, got {}",
                        field.name,
                        field.kind.as_str(),
                        json_type(value)
                    ));
                }
                _ => {}
            }
        }

        if let Some(unknown) = args
            .keys()
            .find(|key| !self.fields.iter().any(|f| f.name == key.as_str()))
        {
            return Err(format!("unexpected argument '{unknown}'"));
        }

        Ok(Value::Object(args))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
