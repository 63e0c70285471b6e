//! Request/response collaborators consumed by the board.
//!
//! [`BoardApi`] is the seam the runtime talks to; [`RestClient`] implements it
//! over HTTP against the plant backend. Reads map failures to
//! [`BoardError::Fetch`], writes to [`BoardError::Persist`]; neither retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use board_core::models::{Department, Machine, MachineDraft, MachineId, MachineStats, Position, StatsWindow};
use board_core::{BoardError, Result};

// ── BoardApi ──────────────────────────────────────────────────────────────────

/// Backend operations the board depends on.
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// Department snapshot including its machine list.
    async fn get_department(&self, department_id: &str) -> Result<Department>;

    /// Rolling statistics for one machine.
    async fn get_machine_stats(&self, machine_id: MachineId, window: StatsWindow) -> Result<MachineStats>;

    /// Create a machine in `department_id`; returns the stored machine with its
    /// server-assigned id.
    async fn create_machine(&self, department_id: &str, draft: &MachineDraft) -> Result<Machine>;

    async fn delete_machine(&self, machine_id: MachineId) -> Result<()>;

    async fn update_machine_position(&self, machine_id: MachineId, position: Position) -> Result<()>;
}

// ── Endpoints ─────────────────────────────────────────────────────────────────

fn department_endpoint(base: &str, department_id: &str) -> String {
    format!("{base}/api/departments/{department_id}")
}

fn machines_endpoint(base: &str) -> String {
    format!("{base}/api/machines")
}

fn machine_endpoint(base: &str, machine_id: MachineId) -> String {
    format!("{base}/api/machines/{machine_id}")
}

fn machine_stats_endpoint(base: &str, machine_id: MachineId, window: StatsWindow) -> String {
    format!(
        "{base}/api/machines/{machine_id}/stats?window={}",
        window.as_query()
    )
}

fn machine_position_endpoint(base: &str, machine_id: MachineId) -> String {
    format!("{base}/api/machines/{machine_id}/position")
}

// ── RestClient ────────────────────────────────────────────────────────────────

/// HTTP implementation of [`BoardApi`].
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    /// Base URL without a trailing slash.
    base: String,
}

impl RestClient {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| BoardError::Config(format!("invalid API URL {base_url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BoardError::Config(format!(
                "API URL must be http or https, got {base_url:?}"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BoardError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn read_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        tracing::debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BoardError::fetch(what, e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(BoardError::NotFound(what.to_string())),
            s if !s.is_success() => Err(BoardError::fetch(what, format!("HTTP {}", s.as_u16()))),
            _ => resp.json::<T>().await.map_err(|e| BoardError::fetch(what, e)),
        }
    }

    fn check_write(status: StatusCode, what: &str) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(BoardError::persist(what, format!("HTTP {}", status.as_u16())))
        }
    }
}

#[async_trait]
impl BoardApi for RestClient {
    async fn get_department(&self, department_id: &str) -> Result<Department> {
        let url = department_endpoint(&self.base, department_id);
        self.read_json(&url, &format!("department {department_id}"))
            .await
    }

    async fn get_machine_stats(&self, machine_id: MachineId, window: StatsWindow) -> Result<MachineStats> {
        let url = machine_stats_endpoint(&self.base, machine_id, window);
        self.read_json(&url, &format!("stats for machine {machine_id}"))
            .await
    }

    async fn create_machine(&self, department_id: &str, draft: &MachineDraft) -> Result<Machine> {
        let what = format!("new machine {:?}", draft.name);
        let body = serde_json::json!({
            "name": draft.name,
            "description": draft.description,
            "status": draft.status,
            "departmentId": department_id,
        });

        let resp = self
            .http
            .post(machines_endpoint(&self.base))
            .json(&body)
            .send()
            .await
            .map_err(|e| BoardError::persist(what.as_str(), e))?;
        Self::check_write(resp.status(), &what)?;

        resp.json::<Machine>()
            .await
            .map_err(|e| BoardError::persist(what.as_str(), e))
    }

    async fn delete_machine(&self, machine_id: MachineId) -> Result<()> {
        let what = format!("deletion of machine {machine_id}");
        let resp = self
            .http
            .delete(machine_endpoint(&self.base, machine_id))
            .send()
            .await
            .map_err(|e| BoardError::persist(what.as_str(), e))?;
        Self::check_write(resp.status(), &what)
    }

    async fn update_machine_position(&self, machine_id: MachineId, position: Position) -> Result<()> {
        let what = format!("position of machine {machine_id}");
        let resp = self
            .http
            .put(machine_position_endpoint(&self.base, machine_id))
            .json(&position)
            .send()
            .await
            .map_err(|e| BoardError::persist(what.as_str(), e))?;
        Self::check_write(resp.status(), &what)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:3001";

    #[test]
    fn test_endpoints() {
        assert_eq!(
            department_endpoint(BASE, "4"),
            "http://localhost:3001/api/departments/4"
        );
        assert_eq!(machines_endpoint(BASE), "http://localhost:3001/api/machines");
        assert_eq!(
            machine_endpoint(BASE, MachineId(9)),
            "http://localhost:3001/api/machines/9"
        );
        assert_eq!(
            machine_stats_endpoint(BASE, MachineId(9), StatsWindow::Last24Hours),
            "http://localhost:3001/api/machines/9/stats?window=24h"
        );
        assert_eq!(
            machine_position_endpoint(BASE, MachineId(9)),
            "http://localhost:3001/api/machines/9/position"
        );
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = RestClient::new("http://plant:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://plant:8080");
    }

    #[test]
    fn test_client_rejects_bad_urls() {
        assert!(matches!(
            RestClient::new("not a url", Duration::from_secs(5)),
            Err(BoardError::Config(_))
        ));
        assert!(matches!(
            RestClient::new("ftp://plant", Duration::from_secs(5)),
            Err(BoardError::Config(_))
        ));
    }

    #[test]
    fn test_check_write_maps_status() {
        assert!(RestClient::check_write(StatusCode::NO_CONTENT, "x").is_ok());
        let err = RestClient::check_write(StatusCode::INTERNAL_SERVER_ERROR, "position of machine 2")
            .unwrap_err();
        assert!(matches!(err, BoardError::Persist { .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }
}
