use crate::gesture::settings::{Settings, REG_INFO};
use crate::gesture::GestureState;
use crate::report::{FeatureReport, HostReport, InfoReport, ReportSink};
use crate::rmi::f01::DeviceIdentity;
use crate::rmi::frame::{Frame, FrameDecoder, FrameStatus, Resolution};
use crate::rmi::protocol::{RmiClient, RmiMode};
use crate::rmi::{self, DeviceLayout, RmiError};
use crate::transport::RmiTransport;

pub const DRIVER_VERSION: &str = concat!("synatap ", env!("CARGO_PKG_VERSION"));

pub const INFO_DRIVER_VERSION: u8 = 0;
pub const INFO_PRODUCT_ID: u8 = 1;
pub const INFO_FIRMWARE_VERSION: u8 = 2;

/// Discover and configure the touchpad, then switch it to attention reports.
pub fn init<T: RmiTransport>(client: &mut RmiClient<T>) -> Result<DeviceLayout, RmiError> {
    let layout = rmi::populate(client)?;
    client.set_mode(RmiMode::AttnReports)?;
    tracing::info!(
        product_id = %layout.control.identity.product_id,
        firmware = %layout.control.identity.firmware_version(),
        "touchpad ready"
    );
    Ok(layout)
}

/// Everything one touchpad needs per frame: decoder, gesture engine and the
/// sink its reports go to.
pub struct DeviceContext<S> {
    decoder: FrameDecoder,
    gesture: GestureState,
    identity: DeviceIdentity,
    sink: S,
}

impl<S: ReportSink> DeviceContext<S> {
    /// `resolution` defaults to the sensor's native range.
    pub fn new(layout: &DeviceLayout, resolution: Option<Resolution>, settings: Settings, sink: S) -> Self {
        let resolution = resolution.unwrap_or(Resolution {
            x: i32::from(layout.sensor.max_x),
            y: i32::from(layout.sensor.max_y),
        });
        Self {
            decoder: FrameDecoder::new(layout, resolution),
            gesture: GestureState::new(settings, resolution),
            identity: layout.control.identity.clone(),
            sink,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn settings(&self) -> &Settings {
        &self.gesture.settings
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Decode one attention frame and run it through the gesture engine.
    pub fn process(&mut self, frame: &Frame) -> FrameStatus {
        let status = self.decoder.decode(frame);
        match &status {
            FrameStatus::Decoded(touches) => self.gesture.process_frame(touches, &mut self.sink),
            FrameStatus::NoData => {}
            FrameStatus::Skipped(id) => tracing::trace!(report_id = id, "frame skipped"),
        }
        status
    }

    /// Apply a report written by the host. Returns false if it was not one
    /// this device understands.
    pub fn handle_host_report(&mut self, bytes: &[u8]) -> bool {
        match HostReport::parse(bytes) {
            Some(HostReport::ScrollControl { inertia_active }) => {
                self.gesture.set_scroll_inertia(inertia_active);
                true
            }
            Some(HostReport::Setting { register, value }) => {
                self.apply_setting(register, value);
                true
            }
            None => {
                tracing::debug!(report = format!("{:02X?}", bytes), "unknown host report");
                false
            }
        }
    }

    pub fn apply_setting(&mut self, register: u8, value: u8) {
        if register == REG_INFO {
            let info = InfoReport::new(&self.info(value));
            self.sink.emit(&info.to_bytes());
            return;
        }
        if !self.gesture.settings.apply(register, value) {
            tracing::debug!(register, value, "unknown settings register ignored");
        }
    }

    pub fn info(&self, which: u8) -> String {
        match which {
            INFO_DRIVER_VERSION => DRIVER_VERSION.to_string(),
            INFO_PRODUCT_ID => self.identity.product_id.clone(),
            INFO_FIRMWARE_VERSION => self.identity.firmware_version(),
            _ => String::new(),
        }
    }

    pub fn feature_report(&self) -> FeatureReport {
        FeatureReport::mouse()
    }
}
