//! Command implementations and the login route guard.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use nhansu_core::aggregate::{fetch_all, Fetched};
use nhansu_core::api::ApiError;
use nhansu_core::auth::{LoginError, LogoutReason};
use nhansu_core::models::{AttendanceRecord, Department, Employee, LeaveRequest, Position};
use nhansu_core::{ApiClient, Config, SessionController, SessionEvent};

use crate::Resource;

/// Exit code when the user has to log in again.
const LOGIN_REQUIRED: u8 = 2;

pub struct App {
    config: Config,
    session: SessionController,
    api: ApiClient,
    events: broadcast::Receiver<SessionEvent>,
    json: bool,
}

impl App {
    pub fn new(json: bool) -> Result<Self> {
        let config = Config::load()?;
        debug!(base_url = %config.base_url, storage = ?config.storage, "Configuration loaded");

        let session = config.session()?;
        let events = session.subscribe();
        let api = ApiClient::new(session.dispatcher());

        Ok(Self {
            config,
            session,
            api,
            events,
            json,
        })
    }

    // ===== Session =====

    pub async fn login(&mut self, username: Option<String>, password: Option<String>) -> Result<ExitCode> {
        let username = match username {
            Some(username) => username,
            None => self.prompt_username()?,
        };
        let password = match password {
            Some(password) => password,
            None => rpassword::prompt_password("Password: ")?,
        };

        match self.session.login(&username, &password).await {
            Ok(()) => {}
            Err(LoginError::InvalidCredentials { .. }) => {
                eprintln!("Invalid username or password.");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e).context("Login failed"),
        }

        self.config.last_username = Some(username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save last username");
        }

        println!("Logged in as {}.", username);
        Ok(ExitCode::SUCCESS)
    }

    pub fn logout(&mut self) -> ExitCode {
        self.session.logout();
        // The redirect is implied by the command itself
        let _ = self.events.try_recv();
        println!("Logged out.");
        ExitCode::SUCCESS
    }

    pub fn status(&self) -> ExitCode {
        if self.session.is_authenticated() {
            match self.config.last_username {
                Some(ref username) => println!("Logged in as {} ({}).", username, self.config.base_url),
                None => println!("Logged in ({}).", self.config.base_url),
            }
            ExitCode::SUCCESS
        } else {
            login_redirect("Not logged in.")
        }
    }

    fn prompt_username(&self) -> Result<String> {
        match self.config.last_username {
            Some(ref last) => print!("Username [{}]: ", last),
            None => print!("Username: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        match (input.is_empty(), self.config.last_username.as_ref()) {
            (true, Some(last)) => Ok(last.clone()),
            _ => Ok(input.to_string()),
        }
    }

    /// Protected commands only run with an active session. A stored refresh
    /// token gets one silent attempt to bring the session back first.
    async fn guard(&mut self) -> Option<ExitCode> {
        if self.session.restore().await {
            return None;
        }
        // A failed attempt ends quietly; the redirect below covers it
        while self.events.try_recv().is_ok() {}
        Some(login_redirect("You need to log in first."))
    }

    /// Drain session events; returns the redirect exit code if the session
    /// ended while the command ran.
    fn take_redirect(&mut self) -> Option<ExitCode> {
        let mut redirect = None;
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::NavigateToLogin { reason }) => {
                    redirect = Some(login_redirect(describe(&reason)));
                }
                Ok(event) => debug!(?event, "Session event"),
                Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "Session events dropped"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        redirect
    }

    /// Map a failed API call to an exit code, preferring the login redirect.
    fn api_failure(&mut self, err: ApiError) -> Result<ExitCode> {
        if let Some(code) = self.take_redirect() {
            return Ok(code);
        }
        if err.is_auth_expired() {
            return Ok(login_redirect("Your session has expired."));
        }
        Err(err.into())
    }

    // ===== Resources =====

    pub async fn list(&mut self, resource: Resource) -> Result<ExitCode> {
        if let Some(code) = self.guard().await {
            return Ok(code);
        }

        let printed = match resource {
            Resource::Departments => self.api.list_departments().await.map(|items| {
                self.print(&items, department_line)
            }),
            Resource::Positions => self.api.list_positions().await.map(|items| {
                self.print(&items, position_line)
            }),
            Resource::Employees => self.api.list_employees().await.map(|items| {
                self.print(&items, employee_line)
            }),
            Resource::Attendance => self.api.list_attendance().await.map(|items| {
                self.print(&items, attendance_line)
            }),
            Resource::Leave => self.api.list_leave_requests().await.map(|items| {
                self.print(&items, leave_line)
            }),
        };

        match printed {
            Ok(result) => {
                result?;
                Ok(self.take_redirect().unwrap_or(ExitCode::SUCCESS))
            }
            Err(e) => self.api_failure(e),
        }
    }

    pub async fn sync(&mut self) -> Result<ExitCode> {
        if let Some(code) = self.guard().await {
            return Ok(code);
        }

        let snapshot = fetch_all(&self.api).await;

        summary("Departments", &snapshot.departments);
        summary("Positions", &snapshot.positions);
        summary("Employees", &snapshot.employees);
        summary("Attendance", &snapshot.attendance);
        summary("Leave requests", &snapshot.leave_requests);

        if let Some(code) = self.take_redirect() {
            return Ok(code);
        }
        if snapshot.session_expired() {
            return Ok(login_redirect("Your session has expired."));
        }
        Ok(if snapshot.is_complete() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    pub async fn decide_leave(&mut self, id: i64, approve: bool) -> Result<ExitCode> {
        if let Some(code) = self.guard().await {
            return Ok(code);
        }

        let result = if approve {
            self.api.approve_leave_request(id).await
        } else {
            self.api.reject_leave_request(id).await
        };

        match result {
            Ok(leave) => {
                println!("Leave request {} is now {}.", leave.id, leave.status);
                Ok(self.take_redirect().unwrap_or(ExitCode::SUCCESS))
            }
            Err(ApiError::BadRequest(body)) => {
                eprintln!("Leave request {} was not changed: {}", id, body);
                Ok(ExitCode::FAILURE)
            }
            Err(e) => self.api_failure(e),
        }
    }

    fn print<T: Serialize>(&self, items: &[T], line: fn(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(items)?);
        } else if items.is_empty() {
            println!("(none)");
        } else {
            for item in items {
                println!("{}", line(item));
            }
        }
        Ok(())
    }
}

fn login_redirect(message: &str) -> ExitCode {
    eprintln!("{}", message);
    eprintln!("Run `nhansu login` to sign in.");
    ExitCode::from(LOGIN_REQUIRED)
}

fn describe(reason: &LogoutReason) -> &'static str {
    match reason {
        LogoutReason::UserRequested => "You have been logged out.",
        LogoutReason::RefreshFailed(_) => "Your session has expired.",
        LogoutReason::RejectedAfterRetry { .. } => "The server no longer accepts your session.",
    }
}

fn summary<T>(name: &str, result: &Fetched<T>) {
    match result {
        Ok(items) => println!("{:<16}{}", name, items.len()),
        Err(e) => println!("{:<16}failed: {}", name, e),
    }
}

fn optional_id(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn department_line(d: &Department) -> String {
    format!("{:>5}  {}", optional_id(d.id), d.name)
}

fn position_line(p: &Position) -> String {
    format!("{:>5}  {}", optional_id(p.id), p.name)
}

fn employee_line(e: &Employee) -> String {
    format!(
        "{:>5}  {:<10} {:<30} {} / {}",
        e.id,
        e.code,
        e.full_name,
        e.department_name(),
        e.position_name()
    )
}

fn attendance_line(a: &AttendanceRecord) -> String {
    format!(
        "{:>5}  employee {:<5} {}  {}  {}",
        a.id,
        a.employee_id,
        a.date,
        a.check_in.format("%H:%M"),
        a.hours_display()
    )
}

fn leave_line(l: &LeaveRequest) -> String {
    format!(
        "{:>5}  employee {:<5} {} .. {} ({}d)  {:<9} {}",
        l.id,
        l.employee_id,
        l.start_date,
        l.end_date,
        l.days(),
        l.status.to_string(),
        l.reason
    )
}
