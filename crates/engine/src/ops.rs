//! Batch write operations and the externally-proposed edit boundary.
//!
//! `CellWrite` is the engine's native unit of batched mutation.
//! `EditScript` is the wire shape produced by the AI collaborator: an
//! ordered list of `{ row, col, value?, formula? }` intents plus free-text
//! analysis. The engine validates syntax only, never intent.

use serde::Deserialize;

/// One ordered write in a batch: raw input text for a cell address.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub row: usize,
    pub col: usize,
    pub input: String,
}

impl CellWrite {
    pub fn new(row: usize, col: usize, input: impl Into<String>) -> Self {
        Self {
            row,
            col,
            input: input.into(),
        }
    }
}

/// Externally proposed write intent, as received on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct EditIntent {
    pub row: usize,
    pub col: usize,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub formula: Option<String>,
}

impl EditIntent {
    /// Lower to a raw cell write. Formula wins over value when both are
    /// present; neither means clear the cell.
    pub fn to_write(&self) -> CellWrite {
        let input = if let Some(formula) = &self.formula {
            formula.clone()
        } else if let Some(value) = &self.value {
            json_scalar_to_input(value)
        } else {
            String::new()
        };
        CellWrite::new(self.row, self.col, input)
    }
}

/// Ordered edit script plus the proposer's free-text analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct EditScript {
    #[serde(default)]
    pub updates: Vec<EditIntent>,
    #[serde(default)]
    pub analysis: String,
}

impl EditScript {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn writes(&self) -> Vec<CellWrite> {
        self.updates.iter().map(EditIntent::to_write).collect()
    }
}

fn json_scalar_to_input(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_script_from_json() {
        let script = EditScript::from_json(
            r#"{
                "updates": [
                    {"row": 0, "col": 0, "value": 42},
                    {"row": 0, "col": 1, "formula": "=A1*2"},
                    {"row": 1, "col": 0, "value": "Q3 total"}
                ],
                "analysis": "Doubled the projection."
            }"#,
        )
        .unwrap();

        assert_eq!(script.analysis, "Doubled the projection.");
        let writes = script.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], CellWrite::new(0, 0, "42"));
        assert_eq!(writes[1], CellWrite::new(0, 1, "=A1*2"));
        assert_eq!(writes[2], CellWrite::new(1, 0, "Q3 total"));
    }

    #[test]
    fn test_formula_wins_over_value() {
        let intent: EditIntent = serde_json::from_str(
            r#"{"row": 2, "col": 3, "value": 7, "formula": "=SUM(A1:A3)"}"#,
        )
        .unwrap();
        assert_eq!(intent.to_write().input, "=SUM(A1:A3)");
    }

    #[test]
    fn test_missing_fields_clear_cell() {
        let intent: EditIntent = serde_json::from_str(r#"{"row": 0, "col": 0}"#).unwrap();
        assert_eq!(intent.to_write().input, "");
    }

    #[test]
    fn test_bool_and_null_values() {
        let intent: EditIntent =
            serde_json::from_str(r#"{"row": 0, "col": 0, "value": true}"#).unwrap();
        assert_eq!(intent.to_write().input, "TRUE");

        let intent: EditIntent =
            serde_json::from_str(r#"{"row": 0, "col": 0, "value": null}"#).unwrap();
        assert_eq!(intent.to_write().input, "");
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let script = EditScript::from_json(
            r#"{"updates": [{"row": 0, "col": 0, "value": 1, "note": "extra"}], "analysis": "", "model": "x"}"#,
        )
        .unwrap();
        assert_eq!(script.updates.len(), 1);
    }

    #[test]
    fn test_empty_script() {
        let script = EditScript::from_json("{}").unwrap();
        assert!(script.updates.is_empty());
        assert!(script.analysis.is_empty());
    }
}
