use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One day's check-in for an employee. `check_out` is empty while the
/// employee is still at work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    #[serde(rename = "nhan_vien")]
    pub employee_id: i64,
    #[serde(rename = "ngay")]
    pub date: NaiveDate,
    #[serde(rename = "gio_vao")]
    pub check_in: NaiveTime,
    #[serde(rename = "gio_ra", default)]
    pub check_out: Option<NaiveTime>,
}

impl AttendanceRecord {
    /// Minutes between check-in and check-out, if checked out.
    pub fn minutes_worked(&self) -> Option<i64> {
        self.check_out
            .map(|out| (out - self.check_in).num_minutes())
            .filter(|minutes| *minutes >= 0)
    }

    pub fn hours_display(&self) -> String {
        match self.minutes_worked() {
            Some(minutes) => format!("{}h{:02}", minutes / 60, minutes % 60),
            None => "working".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAttendanceRecord {
    #[serde(rename = "nhan_vien")]
    pub employee_id: i64,
    #[serde(rename = "ngay")]
    pub date: NaiveDate,
    #[serde(rename = "gio_vao")]
    pub check_in: NaiveTime,
    #[serde(rename = "gio_ra", skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveTime>,
}
