//! User-Agent 到设备类别的粗略映射，仅用于日志。

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    Android,
    IPhone,
    MacOs,
    Windows,
    Linux,
    Unknown(String),
}

pub fn identify_device(user_agent: &str) -> DeviceKind {
    let ua = user_agent.to_lowercase();
    if ua.contains("android") {
        DeviceKind::Android
    } else if ua.contains("iphone") {
        DeviceKind::IPhone
    } else if ua.contains("mac") {
        DeviceKind::MacOs
    } else if ua.contains("windows nt") {
        DeviceKind::Windows
    } else if ua.contains("linux") {
        DeviceKind::Linux
    } else {
        DeviceKind::Unknown(user_agent.to_string())
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Android => f.write_str("📱 Android Device"),
            DeviceKind::IPhone => f.write_str("📱 iPhone"),
            DeviceKind::MacOs => f.write_str("🖥️ macOS"),
            DeviceKind::Windows => f.write_str("💻 Windows PC"),
            DeviceKind::Linux => f.write_str("🐧 Linux Device"),
            DeviceKind::Unknown(raw) => write!(f, "🌐 Unknown Device ({raw})"),
        }
    }
}
