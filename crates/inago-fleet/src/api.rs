//! Wire types of the fleet v1 HTTP API.

use serde::{Deserialize, Serialize};

use inago_core::{UnitFile, UnitOption};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUnitOption {
    pub section: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUnit {
    pub name: String,
    #[serde(default)]
    pub options: Vec<ApiUnitOption>,
    #[serde(default)]
    pub desired_state: String,
    #[serde(default)]
    pub current_state: String,
    #[serde(default, rename = "machineID")]
    pub machine_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUnitState {
    pub name: String,
    #[serde(default)]
    pub hash: String,
    #[serde(rename = "machineID")]
    pub machine_id: String,
    #[serde(default)]
    pub systemd_load_state: String,
    #[serde(default)]
    pub systemd_active_state: String,
    #[serde(default)]
    pub systemd_sub_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMachine {
    pub id: String,
    #[serde(default, rename = "primaryIP")]
    pub primary_ip: String,
    #[serde(default)]
    pub metadata: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPage {
    #[serde(default)]
    pub units: Vec<ApiUnit>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatePage {
    #[serde(default)]
    pub states: Vec<ApiUnitState>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinePage {
    #[serde(default)]
    pub machines: Vec<ApiMachine>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of `PUT /fleet/v1/units/{name}`. Options are only sent on create.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPut<'a> {
    pub desired_state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ApiUnitOption>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: ApiErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

pub fn options_from_unit_file(uf: &UnitFile) -> Vec<ApiUnitOption> {
    uf.options()
        .iter()
        .map(|o| ApiUnitOption {
            section: o.section.clone(),
            name: o.name.clone(),
            value: o.value.clone(),
        })
        .collect()
}

pub fn unit_file_from_options(options: &[ApiUnitOption]) -> UnitFile {
    UnitFile::from_options(
        options
            .iter()
            .map(|o| UnitOption::new(&o.section, &o.name, &o.value))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_unit_page() {
        let raw = r#"{
            "units": [{
                "name": "web@1.service",
                "options": [{"section": "Service", "name": "ExecStart", "value": "/bin/true"}],
                "desiredState": "launched",
                "currentState": "launched",
                "machineID": "m1"
            }],
            "nextPageToken": "abc"
        }"#;
        let page: UnitPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.units[0].desired_state, "launched");
        assert_eq!(page.units[0].machine_id, "m1");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn decodes_state_and_machine_pages() {
        let raw = r#"{"states": [{"name": "a.service", "hash": "h", "machineID": "m1",
            "systemdLoadState": "loaded", "systemdActiveState": "active", "systemdSubState": "running"}]}"#;
        let page: UnitStatePage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.states[0].systemd_sub_state, "running");
        assert!(page.next_page_token.is_none());

        let raw = r#"{"machines": [{"id": "m1", "primaryIP": "10.0.0.1", "metadata": {"role": "db"}}]}"#;
        let page: MachinePage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.machines[0].primary_ip, "10.0.0.1");
    }

    #[test]
    fn unit_put_omits_options_on_state_change() {
        let body = serde_json::to_string(&UnitPut {
            desired_state: "launched",
            options: None,
        })
        .unwrap();
        assert_eq!(body, r#"{"desiredState":"launched"}"#);
    }
}
