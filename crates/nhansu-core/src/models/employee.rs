use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Department, Position};

/// An employee as returned by `/nhanvien/`, with department and position
/// expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    #[serde(rename = "ma_nhan_vien")]
    pub code: String,
    #[serde(rename = "ho_ten")]
    pub full_name: String,
    #[serde(rename = "ngay_sinh")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "ngay_vao_lam")]
    pub start_date: NaiveDate,
    #[serde(rename = "phong_ban", default)]
    pub department: Option<Department>,
    #[serde(rename = "chuc_vu", default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Employee {
    pub fn department_name(&self) -> &str {
        self.department.as_ref().map(|d| d.name.as_str()).unwrap_or("-")
    }

    pub fn position_name(&self) -> &str {
        self.position.as_ref().map(|p| p.name.as_str()).unwrap_or("-")
    }

    /// Whole years of service as of `today`.
    pub fn years_of_service(&self, today: NaiveDate) -> u32 {
        today.years_since(self.start_date).unwrap_or(0)
    }
}

/// Payload for creating an employee together with their login account.
#[derive(Debug, Clone, Serialize)]
pub struct NewEmployee {
    #[serde(rename = "ma_nhan_vien")]
    pub code: String,
    #[serde(rename = "ho_ten")]
    pub full_name: String,
    #[serde(rename = "ngay_sinh")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "ngay_vao_lam")]
    pub start_date: NaiveDate,
    #[serde(rename = "phong_ban_id")]
    pub department_id: i64,
    #[serde(rename = "chuc_vu_id")]
    pub position_id: i64,
    #[serde(rename = "new_username")]
    pub username: String,
    pub password: String,
}

/// Payload for updating an employee. The employee code and account are
/// fixed once created.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeUpdate {
    #[serde(rename = "ho_ten")]
    pub full_name: String,
    #[serde(rename = "ngay_sinh")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "ngay_vao_lam")]
    pub start_date: NaiveDate,
    #[serde(rename = "phong_ban_id")]
    pub department_id: i64,
    #[serde(rename = "chuc_vu_id")]
    pub position_id: i64,
}
