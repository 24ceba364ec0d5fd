//! Builders for the OpenAPI fragments modules hand to the router.

use serde_json::{json, Map, Value};

/// `{"$ref": "#/components/schemas/{name}"}`
pub fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

/// Schema of a `{message, data}` envelope around `data`.
pub fn envelope(data: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "data": data
        },
        "required": ["message"]
    })
}

/// Schema of an `{items, count}` list.
pub fn item_list(item: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "items": { "type": "array", "items": item },
            "count": { "type": "integer" }
        },
        "required": ["items", "count"]
    })
}

/// One operation object under a path item.
pub struct Operation {
    summary: &'static str,
    tag: &'static str,
    request: Option<Value>,
    parameters: Vec<Value>,
    responses: Map<String, Value>,
}

impl Operation {
    pub fn new(summary: &'static str, tag: &'static str) -> Self {
        Self {
            summary,
            tag,
            request: None,
            parameters: Vec::new(),
            responses: Map::new(),
        }
    }

    pub fn path_param(mut self, name: &str) -> Self {
        self.parameters.push(json!({
            "name": name,
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        }));
        self
    }

    pub fn body(mut self, schema: Value) -> Self {
        self.request = Some(json!({
            "required": true,
            "content": { "application/json": { "schema": schema } }
        }));
        self
    }

    pub fn success(mut self, status: u16, description: &str, schema: Value) -> Self {
        self.responses.insert(
            status.to_string(),
            json!({
                "description": description,
                "content": { "application/json": { "schema": schema } }
            }),
        );
        self
    }

    pub fn errors(mut self, errors: &[(u16, &str)]) -> Self {
        for (status, description) in errors {
            self.responses.insert(
                status.to_string(),
                json!({
                    "description": description,
                    "content": { "application/json": { "schema": schema_ref("ErrorResponse") } }
                }),
            );
        }
        self
    }

    pub fn build(self) -> Value {
        let mut operation = json!({
            "summary": self.summary,
            "tags": [self.tag],
            "responses": self.responses,
        });
        if let Some(request) = self.request {
            operation["requestBody"] = request;
        }
        if !self.parameters.is_empty() {
            operation["parameters"] = Value::Array(self.parameters);
        }
        operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_carries_params_body_and_errors() {
        let operation = Operation::new("Update rating", "Reviews")
            .path_param("id")
            .body(schema_ref("RatingUpdate"))
            .success(200, "Updated", envelope(schema_ref("Review")))
            .errors(&[(403, "Not the owner"), (404, "Review not found")])
            .build();

        assert_eq!(operation["tags"][0], "Reviews");
        assert_eq!(operation["parameters"][0]["name"], "id");
        assert!(operation["responses"]["403"].is_object());
        assert_eq!(
            operation["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/RatingUpdate"
        );
    }
}
