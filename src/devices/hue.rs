// hue.rs
use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::GatewayError,
    models::{FixtureCommand, FixtureState},
};

#[derive(Debug, Deserialize)]
struct HueLight {
    #[serde(default)]
    name: String,
    state: HueLightState,
}

#[derive(Debug, Deserialize)]
struct HueLightState {
    on: bool,
    bri: Option<u8>,
    xy: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LightsResponse {
    Lights(BTreeMap<String, HueLight>),
    Errors(Vec<HueResponseItem>),
}

#[derive(Debug, Deserialize)]
struct HueResponseItem {
    error: Option<HueErrorBody>,
}

#[derive(Debug, Deserialize)]
struct HueErrorBody {
    description: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct HueStateUpdate {
    on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    xy: Option<[f64; 2]>,
}

impl From<&FixtureCommand> for HueStateUpdate {
    fn from(command: &FixtureCommand) -> Self {
        if command.on {
            Self {
                on: true,
                bri: Some(command.brightness),
                xy: Some([command.x, command.y]),
            }
        } else {
            Self {
                on: false,
                bri: None,
                xy: None,
            }
        }
    }
}

/// Philips Hue bridge speaking the v1 REST API.
pub struct HueBridge {
    client: reqwest::Client,
    base_url: String,
    lights: Vec<String>,
}

impl HueBridge {
    /// Connects to the bridge and discovers the color-capable lights.
    pub async fn connect(
        address: &str,
        username: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = format!("http://{address}/api/{username}");
        let mut bridge = Self {
            client,
            base_url,
            lights: Vec::new(),
        };

        let lights = bridge.fetch_lights().await?;
        for (id, light) in &lights {
            if light.state.bri.is_none() || light.state.xy.is_none() {
                info!(%id, name = %light.name, "Skipping light without color support");
            }
        }
        bridge.lights = color_lights(&lights);
        if bridge.lights.is_empty() {
            return Err(GatewayError::Unavailable);
        }
        info!(address, lights = ?bridge.lights, "Connected to Hue bridge");
        Ok(bridge)
    }

    async fn fetch_lights(&self) -> Result<BTreeMap<String, HueLight>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/lights", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<LightsResponse>()
            .await?;
        match response {
            LightsResponse::Lights(lights) => Ok(lights),
            LightsResponse::Errors(items) => Err(bridge_error("lights", items)),
        }
    }

    async fn write_one(&self, id: &str, update: &HueStateUpdate) -> Result<(), GatewayError> {
        let items = self
            .client
            .put(format!("{}/lights/{}/state", self.base_url, id))
            .json(update)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<HueResponseItem>>()
            .await?;
        if items.iter().any(|item| item.error.is_some()) {
            return Err(bridge_error(id, items));
        }
        Ok(())
    }
}

fn bridge_error(id: &str, items: Vec<HueResponseItem>) -> GatewayError {
    let description = items
        .into_iter()
        .filter_map(|item| item.error.map(|e| e.description))
        .collect::<Vec<_>>()
        .join("; ");
    GatewayError::Bridge {
        id: id.to_string(),
        description,
    }
}

fn color_lights(lights: &BTreeMap<String, HueLight>) -> Vec<String> {
    lights
        .iter()
        .filter(|(_, light)| light.state.bri.is_some() && light.state.xy.is_some())
        .map(|(id, _)| id.clone())
        .collect()
}

fn fixture_states(lights: &BTreeMap<String, HueLight>, ids: &[String]) -> Vec<FixtureState> {
    ids.iter()
        .filter_map(|id| {
            let light = lights.get(id)?;
            let [x, y] = light.state.xy?;
            Some(FixtureState {
                id: id.clone(),
                on: light.state.on,
                brightness: light.state.bri?,
                x,
                y,
            })
        })
        .collect()
}

fn failed_lights(
    ids: &[String],
    results: Vec<Result<(), GatewayError>>,
) -> Result<Vec<String>, GatewayError> {
    let mut failed = Vec::new();
    for (id, result) in ids.iter().zip(results) {
        if let Err(e) = result {
            warn!(%id, error = %e, "Light update failed");
            failed.push(id.clone());
        }
    }
    if !failed.is_empty() && failed.len() == ids.len() {
        return Err(GatewayError::Unavailable);
    }
    Ok(failed)
}

#[async_trait]
impl super::FixtureGateway for HueBridge {
    async fn write_all(&self, command: &FixtureCommand) -> Result<Vec<String>, GatewayError> {
        let update = HueStateUpdate::from(command);
        let results = join_all(self.lights.iter().map(|id| self.write_one(id, &update))).await;
        failed_lights(&self.lights, results)
    }

    async fn read_all(&self) -> Result<Vec<FixtureState>, GatewayError> {
        let lights = self.fetch_lights().await?;
        let states = fixture_states(&lights, &self.lights);
        if states.len() < self.lights.len() {
            warn!(
                expected = self.lights.len(),
                reported = states.len(),
                "Bridge did not report every light"
            );
        }
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHTS: &str = r#"{
        "1": {"name": "Bedroom", "state": {"on": true, "bri": 120, "xy": [0.4573, 0.41], "reachable": true}},
        "2": {"name": "Plug", "state": {"on": false, "reachable": true}},
        "3": {"name": "Hall", "state": {"on": false, "bri": 1, "xy": [0.3, 0.31]}}
    }"#;

    fn parse_lights() -> BTreeMap<String, HueLight> {
        match serde_json::from_str::<LightsResponse>(LIGHTS).unwrap() {
            LightsResponse::Lights(lights) => lights,
            LightsResponse::Errors(_) => panic!("expected lights"),
        }
    }

    #[test]
    fn discovers_only_color_lights() {
        assert_eq!(color_lights(&parse_lights()), vec!["1", "3"]);
    }

    #[test]
    fn maps_light_states() {
        let ids = vec!["1".to_string(), "3".to_string(), "7".to_string()];
        let states = fixture_states(&parse_lights(), &ids);
        assert_eq!(
            states,
            vec![
                FixtureState {
                    id: "1".into(),
                    on: true,
                    brightness: 120,
                    x: 0.4573,
                    y: 0.41,
                },
                FixtureState {
                    id: "3".into(),
                    on: false,
                    brightness: 1,
                    x: 0.3,
                    y: 0.31,
                },
            ]
        );
    }

    #[test]
    fn error_array_is_a_bridge_error() {
        let body = r#"[{"error": {"type": 1, "address": "/lights", "description": "unauthorized user"}}]"#;
        let LightsResponse::Errors(items) = serde_json::from_str(body).unwrap() else {
            panic!("expected errors");
        };
        match bridge_error("lights", items) {
            GatewayError::Bridge { id, description } => {
                assert_eq!(id, "lights");
                assert_eq!(description, "unauthorized user");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn rejected(id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Bridge {
            id: id.to_string(),
            description: "device is not reachable".to_string(),
        })
    }

    #[test]
    fn reports_lights_that_rejected_the_update() {
        let ids = vec!["1".to_string(), "3".to_string()];
        let failed = failed_lights(&ids, vec![Ok(()), rejected("3")]).unwrap();
        assert_eq!(failed, vec!["3"]);

        assert!(failed_lights(&ids, vec![Ok(()), Ok(())]).unwrap().is_empty());
        assert!(matches!(
            failed_lights(&ids, vec![rejected("1"), rejected("3")]),
            Err(GatewayError::Unavailable)
        ));
    }

    #[test]
    fn off_update_only_sends_power() {
        let body = serde_json::to_value(HueStateUpdate::from(&FixtureCommand::off())).unwrap();
        assert_eq!(body, serde_json::json!({"on": false}));

        let on = FixtureCommand {
            on: true,
            brightness: 127,
            x: 0.45,
            y: 0.41,
        };
        let body = serde_json::to_value(HueStateUpdate::from(&on)).unwrap();
        assert_eq!(body, serde_json::json!({"on": true, "bri": 127, "xy": [0.45, 0.41]}));
    }
}
