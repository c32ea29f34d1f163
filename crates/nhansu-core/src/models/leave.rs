use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: i64,
    #[serde(rename = "nhan_vien")]
    pub employee_id: i64,
    #[serde(rename = "ngay_bat_dau")]
    pub start_date: NaiveDate,
    #[serde(rename = "ngay_ket_thuc")]
    pub end_date: NaiveDate,
    #[serde(rename = "ly_do")]
    pub reason: String,
    #[serde(rename = "trang_thai")]
    pub status: LeaveStatus,
}

impl LeaveRequest {
    /// Calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Only pending requests can be approved or rejected.
    pub fn is_decidable(&self) -> bool {
        self.status == LeaveStatus::Pending
    }
}

/// The server fills in the employee and starts every request as pending.
#[derive(Debug, Clone, Serialize)]
pub struct NewLeaveRequest {
    #[serde(rename = "ngay_bat_dau")]
    pub start_date: NaiveDate,
    #[serde(rename = "ngay_ket_thuc")]
    pub end_date: NaiveDate,
    #[serde(rename = "ly_do")]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leave_request() {
        let json = r#"{"id": 3, "nhan_vien": 5, "ngay_bat_dau": "2024-06-10", "ngay_ket_thuc": "2024-06-12", "ly_do": "Việc gia đình", "trang_thai": "pending"}"#;
        let leave: LeaveRequest = serde_json::from_str(json).expect("Failed to parse leave request");
        assert_eq!(leave.days(), 3);
        assert!(leave.is_decidable());
        assert_eq!(leave.status.to_string(), "pending");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let json = r#"{"id": 3, "nhan_vien": 5, "ngay_bat_dau": "2024-06-10", "ngay_ket_thuc": "2024-06-10", "ly_do": "", "trang_thai": "cancelled"}"#;
        assert!(serde_json::from_str::<LeaveRequest>(json).is_err());
    }
}
