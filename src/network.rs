//! 启动横幅用的局域网地址探测与终端二维码。

use anyhow::Context;
use qrcode::QrCode;
use qrcode::render::unicode;
use std::net::{IpAddr, Ipv4Addr};
use tokio::net::UdpSocket;
use tracing::debug;

/// 用于选择出口网卡的外部地址；UDP connect 不会真正发包。
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// 探测本机在局域网中的地址，失败时退回回环地址。
pub async fn local_ip() -> IpAddr {
    match probe_local_ip().await {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(err) => {
            debug!(error = %err, "local address probe failed");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn probe_local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(ROUTE_PROBE_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}

/// 把 URL 渲染为终端可扫描的二维码（半块字符，两行模块占一行文本）。
pub fn render_qr(url: &str) -> anyhow::Result<String> {
    let code = QrCode::new(url.as_bytes()).context("cannot encode url as qr code")?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_renders_block_characters() {
        let rendered = render_qr("http://192.168.1.20:8000").expect("qr");
        assert!(rendered.lines().count() > 10);
        assert!(rendered.chars().any(|ch| matches!(ch, '█' | '▀' | '▄')));
    }

    #[tokio::test]
    async fn local_ip_is_never_unspecified() {
        assert!(!local_ip().await.is_unspecified());
    }
}
