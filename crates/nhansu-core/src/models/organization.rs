use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "ten_phong_ban")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "ten_chuc_vu")]
    pub name: String,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl Position {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_department() {
        let dept: Department = serde_json::from_str(r#"{"id": 2, "ten_phong_ban": "Kế toán"}"#)
            .expect("Failed to parse department");
        assert_eq!(dept.id, Some(2));
        assert_eq!(dept.name, "Kế toán");
    }

    #[test]
    fn test_new_position_omits_id() {
        let body = serde_json::to_value(Position::new("Trưởng phòng")).expect("serializes");
        assert_eq!(body, serde_json::json!({"ten_chuc_vu": "Trưởng phòng"}));
    }
}
