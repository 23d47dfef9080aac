//! Location tracking through a local gpsd daemon.
//!
//! A background task keeps a watch connection to gpsd open and records the
//! latest position report (`TPV` object). Reads return that record without
//! touching the network. Altitude stays NaN until the receiver has a 3D
//! fix, which tells the aggregator there is nothing to report yet.

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{metadata_from, MetadataDefaults};
use crate::{
    core::{
        plugins::{
            error::PluginError,
            traits::{Constructed, Plugin, PluginFactory, Sensor},
            types::{PluginFields, PluginKind, PluginResult},
        },
        reading::{LocationFix, SensorMetadata, SensorValue},
    },
    register_plugin,
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 2947;
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The parts of a gpsd `TPV` report the tracker uses.
#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
    #[serde(rename = "altMSL")]
    alt_msl: Option<f64>,
}

/// Position carried by one report line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// NaN without a 3D fix.
    pub altitude: f64,
}

/// Parses one line of gpsd JSON output.
///
/// Returns `None` for anything but a `TPV` report with at least a 2D fix.
pub fn parse_report(line: &str) -> Option<Position> {
    let report: Report = serde_json::from_str(line).ok()?;
    if report.class != "TPV" || report.mode < 2 {
        return None;
    }

    let altitude = if report.mode >= 3 {
        report.alt_msl.or(report.alt).unwrap_or(f64::NAN)
    } else {
        f64::NAN
    };

    Some(Position {
        latitude: report.lat?,
        longitude: report.lon?,
        altitude,
    })
}

pub struct GpsdSensor {
    meta: SensorMetadata,
    address: String,
    fix: Arc<RwLock<LocationFix>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl GpsdSensor {
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn ensure_tracking(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() || self.cancel.is_cancelled() {
            return;
        }
        info!("Starting location tracker on {}", self.address);
        *worker = Some(tokio::spawn(track(
            self.address.clone(),
            self.fix.clone(),
            self.cancel.clone(),
        )));
    }
}

/// Keeps a watch session to gpsd alive until cancelled.
async fn track(address: String, fix: Arc<RwLock<LocationFix>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            result = watch(&address, &fix) => match result {
                Ok(()) => warn!("gpsd at {} closed the connection", address),
                Err(e) => warn!("Location tracker error: {}", e),
            },
            _ = cancel.cancelled() => break,
        }

        fix.write().await.altitude = f64::NAN;

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = cancel.cancelled() => break,
        }
    }
    debug!("Location tracker for {} stopped", address);
}

async fn watch(address: &str, fix: &RwLock<LocationFix>) -> PluginResult<()> {
    let mut stream = TcpStream::connect(address)
        .await
        .map_err(|e| PluginError::io(format!("gpsd at {}", address), e))?;
    stream
        .write_all(WATCH_COMMAND)
        .await
        .map_err(|e| PluginError::io(format!("gpsd at {}", address), e))?;

    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| PluginError::io(format!("gpsd at {}", address), e))?
    {
        trace!("gpsd: {}", line);
        if let Some(position) = parse_report(&line) {
            let mut current = fix.write().await;
            current.latitude = position.latitude;
            current.longitude = position.longitude;
            current.altitude = position.altitude;
        }
    }
    Ok(())
}

impl Plugin for GpsdSensor {}

#[async_trait::async_trait]
impl Sensor for GpsdSensor {
    fn metadata(&self) -> &SensorMetadata {
        &self.meta
    }

    async fn read(&self) -> PluginResult<SensorValue> {
        self.ensure_tracking().await;
        Ok(SensorValue::Location(self.fix.read().await.clone()))
    }

    async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Location tracker ended abnormally: {}", e);
            }
        }
    }
}

impl PluginFactory for GpsdSensor {
    const KIND: PluginKind = PluginKind::Sensor;
    const OPTIONAL_FIELDS: &'static [&'static str] = &[
        "host",
        "port",
        "disposition",
        "exposure",
        "measurement",
        "description",
        "readingtype",
    ];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        let host = fields.get_or("host", DEFAULT_HOST);
        let port = fields.parse::<u16>("port")?.unwrap_or(DEFAULT_PORT);

        let disposition = fields.get_or("disposition", "mobile");
        if !matches!(disposition, "mobile" | "fixed") {
            return Err(PluginError::InvalidField {
                plugin: fields.plugin().to_string(),
                field: "disposition".to_string(),
                value: disposition.to_string(),
                reason: "expected 'mobile' or 'fixed'".to_string(),
            });
        }
        let exposure = fields.get_or("exposure", "outdoor");
        if !matches!(exposure, "indoor" | "outdoor") {
            return Err(PluginError::InvalidField {
                plugin: fields.plugin().to_string(),
                field: "exposure".to_string(),
                value: exposure.to_string(),
                reason: "expected 'indoor' or 'outdoor'".to_string(),
            });
        }

        let mut meta = metadata_from(
            fields,
            MetadataDefaults {
                name: "Location",
                unit: "",
                symbol: "",
                description: "Position reported by gpsd",
            },
        );
        meta.tracks_location = true;

        Ok(Self {
            meta,
            address: format!("{}:{}", host, port),
            fix: Arc::new(RwLock::new(LocationFix {
                latitude: 0.0,
                longitude: 0.0,
                altitude: f64::NAN,
                disposition: disposition.to_string(),
                exposure: exposure.to_string(),
            })),
            worker: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Sensor(Box::new(self))
    }
}

register_plugin!(GpsdSensor, "gpsd");

#[cfg(test)]
mod tests {
    use tokio::{io::AsyncReadExt, net::TcpListener};

    use super::*;

    #[test]
    fn three_d_fix_carries_altitude() {
        let pos = parse_report(
            r#"{"class":"TPV","device":"/dev/ttyAMA0","mode":3,"lat":51.5,"lon":-0.12,"alt":35.2,"altMSL":34.9}"#,
        )
        .unwrap();
        assert_eq!(pos.latitude, 51.5);
        assert_eq!(pos.longitude, -0.12);
        assert_eq!(pos.altitude, 34.9);
    }

    #[test]
    fn two_d_fix_has_no_altitude() {
        let pos = parse_report(r#"{"class":"TPV","mode":2,"lat":51.5,"lon":-0.12,"alt":35.2}"#)
            .unwrap();
        assert!(pos.altitude.is_nan());
    }

    #[test]
    fn other_reports_are_ignored() {
        assert!(parse_report(r#"{"class":"VERSION","release":"3.22"}"#).is_none());
        assert!(parse_report(r#"{"class":"TPV","mode":1}"#).is_none());
        assert!(parse_report(r#"{"class":"SKY","satellites":[]}"#).is_none());
        assert!(parse_report("not json").is_none());
    }

    #[test]
    fn rejects_unknown_disposition() {
        let fields = PluginFields::new("GPS").with("disposition", "floating");
        assert!(GpsdSensor::build(&fields).is_err());
    }

    #[tokio::test]
    async fn tracks_fixes_from_a_gpsd_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"class\":\"VERSION\",\"release\":\"3.22\"}\n")
                .await
                .unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(buf[..n].starts_with(b"?WATCH="));
            socket
                .write_all(b"{\"class\":\"TPV\",\"mode\":3,\"lat\":52.2,\"lon\":0.12,\"alt\":18.0}\n")
                .await
                .unwrap();
            // Hold the connection open until the client goes away.
            let _ = socket.read(&mut buf).await;
        });

        let fields = PluginFields::new("GPS")
            .with("port", port.to_string())
            .with("exposure", "indoor");
        let sensor = GpsdSensor::build(&fields).unwrap();
        assert!(sensor.metadata().tracks_location);

        let mut fix = None;
        for _ in 0..100 {
            match sensor.read().await.unwrap() {
                SensorValue::Location(loc) if loc.has_fix() => {
                    fix = Some(loc);
                    break;
                }
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }

        let fix = fix.expect("no fix received");
        assert_eq!(fix.latitude, 52.2);
        assert_eq!(fix.altitude, 18.0);
        assert_eq!(fix.exposure, "indoor");
        assert_eq!(fix.disposition, "mobile");

        sensor.stop().await;
        assert!(sensor.worker.lock().await.is_none());
        server.abort();
    }

    #[tokio::test]
    async fn first_read_without_daemon_has_no_fix() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sensor = GpsdSensor::build(&PluginFields::new("GPS").with("port", port.to_string()))
            .unwrap();
        match sensor.read().await.unwrap() {
            SensorValue::Location(loc) => assert!(!loc.has_fix()),
            other => panic!("unexpected value {:?}", other),
        }
        sensor.stop().await;
    }
}
