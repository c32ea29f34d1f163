//! API client for the HR management REST API.
//!
//! This module provides the `ApiClient` struct for typed access to
//! departments, positions, employees, attendance, and leave requests.
//! Every call goes through the `RequestDispatcher`, so expiry handling is
//! invisible here.

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{ApiError, HttpResponse, RequestDispatcher, RequestEnvelope};
use crate::models::{
    AttendanceRecord, Department, Employee, EmployeeUpdate, LeaveRequest, NewAttendanceRecord,
    NewEmployee, NewLeaveRequest, Position,
};

// ============================================================================
// Endpoints
// ============================================================================

pub const DEPARTMENTS_PATH: &str = "/phongban/";
pub const POSITIONS_PATH: &str = "/chucvu/";
pub const EMPLOYEES_PATH: &str = "/nhanvien/";
pub const ATTENDANCE_PATH: &str = "/chamcong/";
pub const LEAVE_PATH: &str = "/donxinnghi/";

fn detail_path(collection: &str, id: i64) -> String {
    format!("{}{}/", collection, id)
}

/// Typed HR API. Clone is cheap - the dispatcher shares everything via Arc.
#[derive(Clone)]
pub struct ApiClient {
    dispatcher: RequestDispatcher,
}

impl ApiClient {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: HttpResponse) -> Result<HttpResponse, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status(), &response.text()))
        }
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, path: &str) -> Result<T, ApiError> {
        response
            .json()
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    fn encode<B: Serialize>(envelope: RequestEnvelope, body: &B) -> Result<RequestEnvelope, ApiError> {
        envelope
            .json(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))
    }

    async fn execute(&self, envelope: RequestEnvelope) -> Result<HttpResponse, ApiError> {
        let response = self.dispatcher.send(envelope).await?;
        Self::check_response(response)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(RequestEnvelope::get(path)).await?;
        Self::parse(&response, path)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let envelope = Self::encode(RequestEnvelope::post(path), body)?;
        let response = self.execute(envelope).await?;
        Self::parse(&response, path)
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let envelope = Self::encode(RequestEnvelope::put(path), body)?;
        let response = self.execute(envelope).await?;
        Self::parse(&response, path)
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(RequestEnvelope::delete(path)).await?;
        Ok(())
    }

    // ===== Departments =====

    pub async fn list_departments(&self) -> Result<Vec<Department>, ApiError> {
        let departments: Vec<Department> = self.get(DEPARTMENTS_PATH).await?;
        debug!(count = departments.len(), "Departments fetched");
        Ok(departments)
    }

    pub async fn create_department(&self, department: &Department) -> Result<Department, ApiError> {
        self.post(DEPARTMENTS_PATH, department).await
    }

    pub async fn update_department(&self, id: i64, department: &Department) -> Result<Department, ApiError> {
        self.put(&detail_path(DEPARTMENTS_PATH, id), department).await
    }

    pub async fn delete_department(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&detail_path(DEPARTMENTS_PATH, id)).await
    }

    // ===== Positions =====

    pub async fn list_positions(&self) -> Result<Vec<Position>, ApiError> {
        let positions: Vec<Position> = self.get(POSITIONS_PATH).await?;
        debug!(count = positions.len(), "Positions fetched");
        Ok(positions)
    }

    pub async fn create_position(&self, position: &Position) -> Result<Position, ApiError> {
        self.post(POSITIONS_PATH, position).await
    }

    pub async fn update_position(&self, id: i64, position: &Position) -> Result<Position, ApiError> {
        self.put(&detail_path(POSITIONS_PATH, id), position).await
    }

    pub async fn delete_position(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&detail_path(POSITIONS_PATH, id)).await
    }

    // ===== Employees =====

    pub async fn list_employees(&self) -> Result<Vec<Employee>, ApiError> {
        let employees: Vec<Employee> = self.get(EMPLOYEES_PATH).await?;
        debug!(count = employees.len(), "Employees fetched");
        Ok(employees)
    }

    pub async fn create_employee(&self, employee: &NewEmployee) -> Result<Employee, ApiError> {
        self.post(EMPLOYEES_PATH, employee).await
    }

    pub async fn update_employee(&self, id: i64, update: &EmployeeUpdate) -> Result<Employee, ApiError> {
        self.put(&detail_path(EMPLOYEES_PATH, id), update).await
    }

    pub async fn delete_employee(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&detail_path(EMPLOYEES_PATH, id)).await
    }

    // ===== Attendance =====

    pub async fn list_attendance(&self) -> Result<Vec<AttendanceRecord>, ApiError> {
        let records: Vec<AttendanceRecord> = self.get(ATTENDANCE_PATH).await?;
        debug!(count = records.len(), "Attendance fetched");
        Ok(records)
    }

    pub async fn create_attendance(&self, record: &NewAttendanceRecord) -> Result<AttendanceRecord, ApiError> {
        self.post(ATTENDANCE_PATH, record).await
    }

    pub async fn update_attendance(
        &self,
        id: i64,
        record: &NewAttendanceRecord,
    ) -> Result<AttendanceRecord, ApiError> {
        self.put(&detail_path(ATTENDANCE_PATH, id), record).await
    }

    pub async fn delete_attendance(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&detail_path(ATTENDANCE_PATH, id)).await
    }

    // ===== Leave requests =====

    pub async fn list_leave_requests(&self) -> Result<Vec<LeaveRequest>, ApiError> {
        let requests: Vec<LeaveRequest> = self.get(LEAVE_PATH).await?;
        debug!(count = requests.len(), "Leave requests fetched");
        Ok(requests)
    }

    pub async fn create_leave_request(&self, request: &NewLeaveRequest) -> Result<LeaveRequest, ApiError> {
        self.post(LEAVE_PATH, request).await
    }

    pub async fn update_leave_request(
        &self,
        id: i64,
        request: &NewLeaveRequest,
    ) -> Result<LeaveRequest, ApiError> {
        self.put(&detail_path(LEAVE_PATH, id), request).await
    }

    pub async fn delete_leave_request(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&detail_path(LEAVE_PATH, id)).await
    }

    /// Approve a pending request. The server answers 400 if it was already decided.
    pub async fn approve_leave_request(&self, id: i64) -> Result<LeaveRequest, ApiError> {
        let path = format!("{}approve/", detail_path(LEAVE_PATH, id));
        let response = self.execute(RequestEnvelope::post(&path)).await?;
        Self::parse(&response, &path)
    }

    /// Reject a pending request. The server answers 400 if it was already decided.
    pub async fn reject_leave_request(&self, id: i64) -> Result<LeaveRequest, ApiError> {
        let path = format!("{}reject/", detail_path(LEAVE_PATH, id));
        let response = self.execute(RequestEnvelope::post(&path)).await?;
        Self::parse(&response, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::DispatchError;
    use crate::auth::{CredentialPair, CredentialStore, SessionController};
    use crate::models::LeaveStatus;
    use crate::testing::{respond, FakeTransport};

    fn client(transport: FakeTransport) -> (Arc<FakeTransport>, ApiClient) {
        let transport = Arc::new(transport);
        let store = CredentialStore::in_memory().shared();
        store.set(CredentialPair::new("A1", "R1"));
        let session = SessionController::new(transport.clone(), store);
        (transport, ApiClient::new(session.dispatcher()))
    }

    #[test]
    fn test_detail_path() {
        assert_eq!(detail_path(EMPLOYEES_PATH, 12), "/nhanvien/12/");
    }

    #[tokio::test]
    async fn test_list_departments() {
        let (_, api) = client(FakeTransport::new(|_| {
            respond(200, serde_json::json!([
                {"id": 1, "ten_phong_ban": "Nhân sự"},
                {"id": 2, "ten_phong_ban": "Kế toán"}
            ]))
        }));

        let departments = api.list_departments().await.expect("departments");
        assert_eq!(departments.len(), 2);
        assert_eq!(departments[1].name, "Kế toán");
    }

    #[tokio::test]
    async fn test_approve_leave_request() {
        let (transport, api) = client(FakeTransport::new(|_| {
            respond(200, serde_json::json!({
                "id": 7, "nhan_vien": 5, "ngay_bat_dau": "2024-06-10",
                "ngay_ket_thuc": "2024-06-11", "ly_do": "Khám bệnh", "trang_thai": "approved"
            }))
        }));

        let leave = api.approve_leave_request(7).await.expect("approved");
        assert_eq!(leave.status, LeaveStatus::Approved);

        let sent = transport.requests();
        assert_eq!(sent[0].method, reqwest::Method::POST);
        assert_eq!(sent[0].path, "/donxinnghi/7/approve/");
    }

    #[tokio::test]
    async fn test_already_processed_is_bad_request() {
        let (_, api) = client(FakeTransport::new(|_| {
            respond(400, serde_json::json!({"error": "Đơn này đã được xử lý."}))
        }));

        let err = api.reject_leave_request(7).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(body) if body.contains("error")));
    }

    #[tokio::test]
    async fn test_create_department_sends_body() {
        let (transport, api) = client(FakeTransport::new(|_| {
            respond(201, serde_json::json!({"id": 3, "ten_phong_ban": "Kinh doanh"}))
        }));

        let created = api
            .create_department(&Department::new("Kinh doanh"))
            .await
            .expect("created");
        assert_eq!(created.id, Some(3));
        assert_eq!(
            transport.requests()[0].body,
            Some(serde_json::json!({"ten_phong_ban": "Kinh doanh"}))
        );
    }

    #[tokio::test]
    async fn test_delete_accepts_empty_body() {
        let (transport, api) = client(FakeTransport::new(|_| {
            Ok(HttpResponse::new(reqwest::StatusCode::NO_CONTENT, Vec::new()))
        }));

        api.delete_employee(4).await.expect("deleted");
        assert_eq!(transport.requests()[0].method, reqwest::Method::DELETE);
        assert_eq!(transport.requests()[0].path, "/nhanvien/4/");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_invalid_response() {
        let (_, api) = client(FakeTransport::new(|_| respond(200, serde_json::json!({"oops": true}))));

        let err = api.list_positions().await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(msg) if msg.starts_with(POSITIONS_PATH)));
    }

    #[tokio::test]
    async fn test_auth_expiry_surfaces_as_dispatch_error() {
        let (_, api) = client(FakeTransport::new(|_| respond(401, serde_json::json!({}))));

        let err = api.list_employees().await.unwrap_err();
        assert!(matches!(err, ApiError::Dispatch(DispatchError::AuthExpired { .. })));
        assert!(err.is_auth_expired());
    }
}
