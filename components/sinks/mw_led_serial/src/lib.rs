use log::{debug, info};
use maskwatch::actuation::SignalCode;
use maskwatch::clock::WallClock;
use maskwatch::config::ComponentConfig;
use maskwatch::task::{SignalDriver, StationLifecycle};
use maskwatch::{MwError, MwResult};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Write;
use std::time::Duration;

const DEFAULT_BAUDRATE: u32 = 9600; // what the LED board firmware listens at
const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Opens the LED board port, 8N1 without flow control.
pub fn open_port(port_name: &str, baudrate: u32, timeout: Duration) -> MwResult<Box<dyn SerialPort>> {
    serialport::new(port_name, baudrate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .open()
        .map_err(|e| {
            MwError::collaborator_with_cause("led driver", &format!("Could not open {port_name}"), e)
        })
}

/// Writes one signal code, as its ASCII digit, to an open port.
pub fn write_code(port: &mut dyn SerialPort, code: SignalCode) -> MwResult<()> {
    port.write_all(&[code.as_byte()])
        .and_then(|_| port.flush())
        .map_err(|e| MwError::collaborator_with_cause("led driver", &format!("Could not send {code}"), e))
}

/// This is a driver for the LED board of the station, a microcontroller listening on a serial
/// port for a single digit: 0 idle, 1 clear, 2 fault.
/// The config takes `port` (ie. `/dev/ttyACM0` or `COM9`), and optionally `baudrate` and `timeout_ms`.
pub struct SerialLedDriver {
    port_name: String,
    baudrate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
    last_code: Option<SignalCode>,
}

impl SerialLedDriver {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    pub fn last_code(&self) -> Option<SignalCode> {
        self.last_code
    }
}

impl StationLifecycle for SerialLedDriver {
    fn new(config: Option<&ComponentConfig>) -> MwResult<Self>
    where
        Self: Sized,
    {
        let config = config.ok_or("SerialLedDriver needs a config, None was passed as ComponentConfig")?;
        let port_name: String = config.require("port")?;
        let baudrate: u32 = config.get_or("baudrate", DEFAULT_BAUDRATE)?;
        let timeout_ms: u64 = config.get_or("timeout_ms", DEFAULT_TIMEOUT_MS)?;
        Ok(Self {
            port_name,
            baudrate,
            timeout: Duration::from_millis(timeout_ms),
            port: None,
            last_code: None,
        })
    }

    fn start(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.port = Some(open_port(&self.port_name, self.baudrate, self.timeout)?);
        info!("LED board connected on {} at {} bauds.", self.port_name, self.baudrate);
        Ok(())
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        // Dropping the handle closes the port.
        if self.port.take().is_some() {
            debug!("LED board port {} released.", self.port_name);
        }
        Ok(())
    }
}

impl SignalDriver for SerialLedDriver {
    fn send_signal(&mut self, code: SignalCode) -> MwResult<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| MwError::collaborator("led driver", "port not open"))?;
        write_code(&mut **port, code)?;
        self.last_code = Some(code);
        Ok(())
    }
}
