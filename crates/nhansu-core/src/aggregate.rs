//! Load every HR resource at once, keeping each outcome separate.
//!
//! One call per resource, all in flight together. A failure on one resource,
//! an expired session included, never stops the others.

use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{AttendanceRecord, Department, Employee, LeaveRequest, Position};

/// Result of one resource fetch.
pub type Fetched<T> = Result<Vec<T>, ApiError>;

pub struct Snapshot {
    pub departments: Fetched<Department>,
    pub positions: Fetched<Position>,
    pub employees: Fetched<Employee>,
    pub attendance: Fetched<AttendanceRecord>,
    pub leave_requests: Fetched<LeaveRequest>,
}

impl Snapshot {
    /// Names of resources that failed, with their errors.
    pub fn failures(&self) -> Vec<(&'static str, &ApiError)> {
        let mut failures = Vec::new();
        if let Err(ref e) = self.departments {
            failures.push(("departments", e));
        }
        if let Err(ref e) = self.positions {
            failures.push(("positions", e));
        }
        if let Err(ref e) = self.employees {
            failures.push(("employees", e));
        }
        if let Err(ref e) = self.attendance {
            failures.push(("attendance", e));
        }
        if let Err(ref e) = self.leave_requests {
            failures.push(("leave requests", e));
        }
        failures
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    /// True if any resource failed because the session ended.
    pub fn session_expired(&self) -> bool {
        self.failures().iter().any(|(_, e)| e.is_auth_expired())
    }
}

fn log_outcome<T>(name: &str, result: &Fetched<T>) {
    match result {
        Ok(items) => debug!(resource = name, count = items.len(), "Resource fetched"),
        Err(e) => warn!(resource = name, error = %e, "Failed to fetch resource"),
    }
}

pub async fn fetch_all(api: &ApiClient) -> Snapshot {
    info!("Fetching all resources");

    let (departments, positions, employees, attendance, leave_requests) = tokio::join!(
        api.list_departments(),
        api.list_positions(),
        api.list_employees(),
        api.list_attendance(),
        api.list_leave_requests(),
    );

    log_outcome("departments", &departments);
    log_outcome("positions", &positions);
    log_outcome("employees", &employees);
    log_outcome("attendance", &attendance);
    log_outcome("leave requests", &leave_requests);

    Snapshot {
        departments,
        positions,
        employees,
        attendance,
        leave_requests,
    }
}
