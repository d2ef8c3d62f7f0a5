use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, MqttOptions};

use super::{Notification, NotificationSink};
use crate::error::SinkError;

/// Writes notifications to the process log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError> {
        log::info!("{}: {}", notification.title, notification.body);
        Ok(())
    }
}

/// Drops every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn name(&self) -> &'static str {
        "none"
    }

    fn notify(&mut self, _notification: &Notification) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(feature = "notify-pushbullet")]
pub use pushbullet::PushbulletNotifier;

#[cfg(feature = "notify-pushbullet")]
mod pushbullet {
    use std::time::Duration;

    use super::{Notification, NotificationSink};
    use crate::error::SinkError;

    const PUSHES_URL: &str = "https://api.pushbullet.com/v2/pushes";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Sends note pushes through the Pushbullet HTTP API.
    pub struct PushbulletNotifier {
        api_key: String,
    }

    impl PushbulletNotifier {
        pub fn new(api_key: String) -> Self {
            Self { api_key }
        }
    }

    impl NotificationSink for PushbulletNotifier {
        fn name(&self) -> &'static str {
            "pushbullet"
        }

        fn notify(&mut self, notification: &Notification) -> Result<(), SinkError> {
            let body = serde_json::json!({
                "type": "note",
                "title": notification.title,
                "body": notification.body,
            });
            ureq::post(PUSHES_URL)
                .timeout(REQUEST_TIMEOUT)
                .set("Access-Token", &self.api_key)
                .set("Content-Type", "application/json")
                .send_string(&body.to_string())
                .map_err(|err| SinkError::notify("pushbullet", err))?;
            log::info!("pushbullet: sent \"{}\"", notification.title);
            Ok(())
        }
    }
}

struct MqttRuntime {
    client: Client,
    connection_handle: Option<std::thread::JoinHandle<()>>,
}

impl MqttRuntime {
    fn new(client: Client, mut connection: Connection) -> Self {
        let handle = std::thread::spawn(move || {
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                    Err(e) => {
                        log::warn!("MQTT connection error: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            client,
            connection_handle: Some(handle),
        }
    }

    fn disconnect(&mut self) {
        if let Err(err) = self.client.disconnect() {
            log::warn!("MQTT disconnect failed: {}", err);
        }
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Publishes notifications as JSON to an MQTT topic with QoS 1.
pub struct MqttNotifier {
    runtime: MqttRuntime,
    topic: String,
}

impl MqttNotifier {
    /// `broker` is `host:port`, optionally prefixed with `mqtt://` or `tcp://`.
    pub fn connect(broker: &str, client_id: &str, topic: &str) -> Result<Self> {
        if topic.trim().is_empty() {
            return Err(anyhow!("MQTT topic must not be empty"));
        }
        let (host, port) = parse_broker(broker)?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_start(true);

        let (client, connection) = Client::new(options, 10);
        log::info!("MQTT notifications to {} on topic {}", broker, topic);
        Ok(Self {
            runtime: MqttRuntime::new(client, connection),
            topic: topic.to_string(),
        })
    }
}

impl NotificationSink for MqttNotifier {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError> {
        let payload =
            serde_json::to_vec(notification).map_err(|err| SinkError::notify("mqtt", err))?;
        self.runtime
            .client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)
            .map_err(|err| SinkError::notify("mqtt", err))
    }
}

impl Drop for MqttNotifier {
    fn drop(&mut self) {
        self.runtime.disconnect();
    }
}

fn parse_broker(addr: &str) -> Result<(String, u16)> {
    let mut remainder = addr.trim();
    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    if let Some(rest) = remainder.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port.parse().context("invalid MQTT port")?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = remainder
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port.parse().context("invalid MQTT port")?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_address_forms() {
        assert_eq!(parse_broker("localhost:1883").unwrap(), ("localhost".to_string(), 1883));
        assert_eq!(
            parse_broker("mqtt://10.0.0.2:1884").unwrap(),
            ("10.0.0.2".to_string(), 1884)
        );
        assert_eq!(parse_broker("[::1]:1883").unwrap(), ("::1".to_string(), 1883));
        assert!(parse_broker("mqtts://broker:8883").is_err());
        assert!(parse_broker("broker").is_err());
    }

    #[test]
    fn null_and_log_notifiers_accept_everything() {
        let n = Notification {
            title: "Object Detected: car".into(),
            body: "At 2024-05-01 08:30:00, car was detected.".into(),
        };
        assert!(LogNotifier.notify(&n).is_ok());
        assert!(NullNotifier.notify(&n).is_ok());
    }
}
