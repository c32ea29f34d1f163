//! Data models for HR resources.
//!
//! These mirror the JSON the server speaks (field names are renamed from the
//! wire form) and include:
//!
//! - `Department`, `Position`: organization structure
//! - `Employee`, `NewEmployee`, `EmployeeUpdate`: employee records
//! - `AttendanceRecord`: daily check-in/check-out
//! - `LeaveRequest`, `LeaveStatus`: leave applications and their approval state

pub mod attendance;
pub mod employee;
pub mod leave;
pub mod organization;

pub use attendance::{AttendanceRecord, NewAttendanceRecord};
pub use employee::{Employee, EmployeeUpdate, NewEmployee};
pub use leave::{LeaveRequest, LeaveStatus, NewLeaveRequest};
pub use organization::{Department, Position};
