//! WiFi station-mode adapter for the network switch-input variant.
//!
//! Implements [`ConnectivityPort`] — the boundary for network
//! connectivity.  The radio must be configured with the two-letter
//! regulatory-domain code from the credentials record before associating.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) before retrying.

use core::fmt;
use log::{error, info, warn};

use crate::config::NetworkCredentials;

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassphrase,
    InvalidCountry,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassphrase => {
                write!(f, "passphrase invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::InvalidCountry => {
                write!(f, "country invalid (must be a two-letter regulatory-domain code)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn poll(&mut self);
    fn set_credentials(&mut self, creds: &NetworkCredentials) -> Result<(), ConnectivityError>;
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate(creds: &NetworkCredentials) -> Result<(), ConnectivityError> {
    if creds.ssid.is_empty() || !is_printable_ascii(&creds.ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    if !creds.passphrase.is_empty() && creds.passphrase.len() < 8 {
        return Err(ConnectivityError::InvalidPassphrase);
    }
    if creds.country.len() != 2 || !creds.country.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ConnectivityError::InvalidCountry);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    creds: Option<NetworkCredentials>,
    backoff_secs: u32,
    last_rssi: Option<i8>,
    /// Simulation: counts platform_connect() calls for deterministic failures.
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            creds: None,
            backoff_secs: 2,
            last_rssi: None,
            #[cfg(not(target_os = "espidf"))]
            sim_connect_counter: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn backoff_secs(&self) -> u32 {
        self.backoff_secs
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_set_country(&self, country: &str) {
        // The regulatory domain constrains channel use; it must be set
        // before the STA starts scanning.
        let mut code = [0u8; 3];
        code[..2].copy_from_slice(country.as_bytes());
        // SAFETY: code is a NUL-terminated two-letter string.
        let ret = unsafe {
            esp_idf_svc::sys::esp_wifi_set_country_code(code.as_ptr().cast(), true)
        };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            warn!("WiFi: setting country code '{}' failed (rc={})", country, ret);
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        // ESP-IDF WiFi STA connection.
        //
        // The full wiring requires:
        // 1. EspWifi::new(peripherals.modem, sysloop, nvs)
        // 2. wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        //        ssid, password, auth_method: AuthMethod::WPA2Personal, ..
        //    }))
        // 3. wifi.start() / wifi.connect()
        //
        // The modem peripheral handle will be threaded in from main.rs
        // together with the (still undesigned) switch-input transport.
        if let Some(creds) = &self.creds {
            self.platform_set_country(&creds.country);
        }
        info!("WiFi(espidf): STA connect deferred until transport wiring");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        // Every 10th attempt fails (offset 3) to exercise the backoff path
        // deterministically in tests.
        if self.sim_connect_counter % 10 == 3 {
            warn!("WiFi(sim): simulated association failure (attempt {})", self.sim_connect_counter);
            return Err(ConnectivityError::ConnectionFailed);
        }
        let ssid = self.creds.as_ref().map_or("", |c| c.ssid.as_str());
        info!("WiFi(sim): connected to '{}' (attempt {})", ssid, self.sim_connect_counter);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // wifi.disconnect().ok(); wifi.stop().ok();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }

    fn platform_is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        // Queried via esp_wifi_sta_get_ap_info once the STA is wired.
        None
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        if self.state != WifiState::Connected {
            return None;
        }
        let oscillation = ((self.sim_connect_counter % 12) as i8) - 6;
        Some(-60_i8.saturating_add(oscillation))
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.creds.is_none() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        self.state = WifiState::Connecting;
        match self.platform_connect() {
            Ok(()) => {
                self.state = WifiState::Connected;
                self.backoff_secs = 2;
                self.last_rssi = self.platform_rssi();
                info!("WiFi: connected (RSSI={:?})", self.last_rssi);
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed — {}", e);
                self.state = WifiState::Reconnecting { attempt: 0 };
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        self.last_rssi = None;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn poll(&mut self) {
        match self.state {
            WifiState::Reconnecting { attempt } => {
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt, self.backoff_secs);
                match self.platform_connect() {
                    Ok(()) => {
                        self.state = WifiState::Connected;
                        self.backoff_secs = 2;
                        self.last_rssi = self.platform_rssi();
                        info!("WiFi: reconnected (RSSI={:?})", self.last_rssi);
                    }
                    Err(_) => {
                        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        self.state = WifiState::Reconnecting { attempt: attempt + 1 };
                    }
                }
            }
            WifiState::Connected => {
                if self.platform_is_connected() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    self.last_rssi = None;
                }
            }
            _ => {}
        }
    }

    fn set_credentials(&mut self, creds: &NetworkCredentials) -> Result<(), ConnectivityError> {
        validate(creds)?;
        info!("WiFi: credentials updated (SSID='{}', country={})", creds.ssid, creds.country);
        self.creds = Some(creds.clone());
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(ssid: &str, passphrase: &str, country: &str) -> NetworkCredentials {
        NetworkCredentials {
            ssid: heapless::String::try_from(ssid).unwrap(),
            passphrase: heapless::String::try_from(passphrase).unwrap(),
            country: heapless::String::try_from(country).unwrap(),
        }
    }

    #[test]
    fn rejects_empty_ssid() {
        let mut a = WifiAdapter::new();
        assert_eq!(
            a.set_credentials(&creds("", "password123", "GB")),
            Err(ConnectivityError::InvalidSsid)
        );
    }

    #[test]
    fn rejects_short_passphrase() {
        let mut a = WifiAdapter::new();
        assert_eq!(
            a.set_credentials(&creds("LayoutNet", "short", "GB")),
            Err(ConnectivityError::InvalidPassphrase)
        );
    }

    #[test]
    fn accepts_open_network() {
        let mut a = WifiAdapter::new();
        assert!(a.set_credentials(&creds("OpenLayout", "", "US")).is_ok());
    }

    #[test]
    fn rejects_bad_country_code() {
        let mut a = WifiAdapter::new();
        assert_eq!(
            a.set_credentials(&creds("LayoutNet", "password1", "gb")),
            Err(ConnectivityError::InvalidCountry)
        );
        assert_eq!(
            a.set_credentials(&creds("LayoutNet", "password1", "G")),
            Err(ConnectivityError::InvalidCountry)
        );
    }

    #[test]
    fn connect_without_credentials_fails() {
        let mut a = WifiAdapter::new();
        assert_eq!(a.connect(), Err(ConnectivityError::NoCredentials));
    }

    #[test]
    fn connect_disconnect_roundtrip() {
        let mut a = WifiAdapter::new();
        a.set_credentials(&creds("LayoutNet", "password1", "GB")).unwrap();
        a.connect().unwrap();
        assert!(a.is_connected());
        assert!(a.rssi().is_some());
        a.disconnect();
        assert!(!a.is_connected());
        assert!(a.rssi().is_none());
    }

    #[test]
    fn double_connect_fails() {
        let mut a = WifiAdapter::new();
        a.set_credentials(&creds("LayoutNet", "password1", "GB")).unwrap();
        a.connect().unwrap();
        assert_eq!(a.connect(), Err(ConnectivityError::AlreadyConnected));
    }

    #[test]
    fn reconnects_after_simulated_failure() {
        let mut a = WifiAdapter::new();
        a.set_credentials(&creds("LayoutNet", "password1", "GB")).unwrap();
        // Attempts 1 and 2 connect; attempt 3 is the deterministic
        // simulated failure.
        a.connect().unwrap();
        a.disconnect();
        a.connect().unwrap();
        a.disconnect();
        assert_eq!(a.connect(), Err(ConnectivityError::ConnectionFailed));
        assert_eq!(a.state(), WifiState::Reconnecting { attempt: 0 });
        // The next poll retries (attempt 4) and succeeds.
        a.poll();
        assert!(a.is_connected());
        assert_eq!(a.backoff_secs(), 2);
    }
}
