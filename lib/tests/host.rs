use std::{net::SocketAddr, time::Duration};

use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use rki::{
    host::{HostConfig, HostProvisioningRequest, HostProvisioningResponse, KeyHostClient},
    Error, ErrorKind,
};
use rki_sim::{HostScript, MockKeyHost};

mod helpers;
use helpers::setup_logging;

const URL: &str = "https://keys.example.com/rki";

fn request() -> HostProvisioningRequest {
    HostProvisioningRequest::new("prod", "terminal", "temp", "FFFF9876543210E00000")
}

#[tokio::test]
async fn host_round_trip() -> anyhow::Result<()> {
    setup_logging();

    let h = MockKeyHost::new();
    let c = KeyHostClient::new(h.clone(), URL);

    let r = c.request_provisioning(&request()).await?;

    // All seven fields returned unchanged
    let v = MockKeyHost::success_response();
    assert_eq!(
        r,
        HostProvisioningResponse {
            hsm_cert: v["hsmCert"].as_str().unwrap().to_string(),
            kbpk: v["kbpk"].as_str().unwrap().to_string(),
            kbpk_sig: v["kbpkSig"].as_str().unwrap().to_string(),
            sred_tr31: v["sredTr31"].as_str().unwrap().to_string(),
            sred_iksn: v["sredIksn"].as_str().unwrap().to_string(),
            pin_tr31: v["pinTr31"].as_str().unwrap().to_string(),
            pin_iksn: v["pinIksn"].as_str().unwrap().to_string(),
        }
    );

    // Single request with the expected body
    let reqs = h.requests();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].0, URL);
    assert_eq!(
        reqs[0].1,
        json!({
            "prodSignCert": "prod",
            "terminalCert": "terminal",
            "tempLoadCert": "temp",
            "suggestedIKSN": "FFFF9876543210E00000",
            "keyHostIndex": "1",
        })
    );

    Ok(())
}

#[tokio::test]
async fn host_validation() {
    setup_logging();

    let mut missing_result = MockKeyHost::success_response();
    missing_result.as_object_mut().unwrap().remove("result");

    let mut failure = MockKeyHost::success_response();
    failure["result"] = json!("Failure");

    let mut non_string_result = MockKeyHost::success_response();
    non_string_result["result"] = json!(true);

    let mut missing_field = MockKeyHost::success_response();
    missing_field.as_object_mut().unwrap().remove("pinIksn");

    let mut non_string = MockKeyHost::success_response();
    non_string["kbpk"] = json!(1234);

    let tests = [
        (missing_result.to_string().into_bytes(), "missing result"),
        (failure.to_string().into_bytes(), "failure"),
        (non_string_result.to_string().into_bytes(), "non-string result"),
        (missing_field.to_string().into_bytes(), "missing field"),
        (non_string.to_string().into_bytes(), "non-string field"),
        (b"<html>".to_vec(), "not json"),
        (vec![0xff, 0xfe, 0x7b], "not utf-8"),
    ];

    for (body, name) in tests {
        let c = KeyHostClient::new(MockKeyHost::with_body(body), URL);

        let e = c.request_provisioning(&request()).await.unwrap_err();

        assert_eq!(e.kind(), ErrorKind::Host, "{name}: {e:?}");

        match name {
            "failure" => assert!(matches!(e, Error::HostRejected(ref r) if r == "Failure")),
            _ => assert!(matches!(e, Error::HostResponseMalformed(_)), "{name}: {e:?}"),
        }
    }
}

#[tokio::test]
async fn host_unreachable() {
    setup_logging();

    let c = KeyHostClient::new(MockKeyHost::with_script(HostScript::Unreachable), URL);

    let e = c.request_provisioning(&request()).await.unwrap_err();
    assert!(matches!(e, Error::HostUnreachable(_)), "{e:?}");
}

/// Serve a single canned HTTP response, returning the received request body
async fn serve_once(
    status: &'static str,
    body: String,
) -> (SocketAddr, tokio::task::JoinHandle<String>) {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = l.local_addr().unwrap();

    let h = tokio::spawn(async move {
        let (mut s, _) = l.accept().await.unwrap();

        // Read headers then body
        let mut buff = vec![];
        let mut b = [0u8; 1024];
        let header_end = loop {
            let n = s.read(&mut b).await.unwrap();
            assert!(n > 0, "connection closed early");
            buff.extend_from_slice(&b[..n]);

            if let Some(i) = buff.windows(4).position(|w| w == b"\r\n\r\n") {
                break i + 4;
            }
        };

        let headers = String::from_utf8_lossy(&buff[..header_end]).to_lowercase();
        assert!(headers.starts_with("post "), "{headers}");
        assert!(
            headers.contains("content-type: application/json; charset=utf-8"),
            "{headers}"
        );

        let len: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length: "))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);

        while buff.len() < header_end + len {
            let n = s.read(&mut b).await.unwrap();
            assert!(n > 0, "connection closed early");
            buff.extend_from_slice(&b[..n]);
        }

        let resp = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        s.write_all(resp.as_bytes()).await.unwrap();
        s.shutdown().await.unwrap();

        String::from_utf8(buff[header_end..][..len].to_vec()).unwrap()
    });

    (addr, h)
}

#[tokio::test]
async fn http_transport_success() -> anyhow::Result<()> {
    setup_logging();

    let (addr, h) = serve_once("200 OK", MockKeyHost::success_response().to_string()).await;

    let c = KeyHostClient::http(&HostConfig::new(format!("http://{addr}/rki")))?;
    let r = c.request_provisioning(&request()).await?;

    assert_eq!(r.kbpk, "0123456789abcdef0123456789abcdef");

    let body: serde_json::Value = serde_json::from_str(&h.await?)?;
    assert_eq!(body["keyHostIndex"], "1");
    assert_eq!(body["suggestedIKSN"], "FFFF9876543210E00000");

    Ok(())
}

#[tokio::test]
async fn http_transport_error_status() -> anyhow::Result<()> {
    setup_logging();

    let (addr, h) = serve_once("500 Internal Server Error", "{}".to_string()).await;

    let c = KeyHostClient::http(&HostConfig::new(format!("http://{addr}/rki")))?;
    let e = c.request_provisioning(&request()).await.unwrap_err();

    assert!(matches!(e, Error::HostUnreachable(_)), "{e:?}");

    h.await?;

    Ok(())
}

#[tokio::test]
async fn http_transport_refused() -> anyhow::Result<()> {
    setup_logging();

    // Bind then release a port so nothing is listening
    let addr = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;

    let mut cfg = HostConfig::new(format!("http://{addr}/rki"));
    cfg.connect_timeout = Duration::from_secs(1);
    cfg.request_timeout = Duration::from_secs(2);

    let c = KeyHostClient::http(&cfg)?;
    let e = c.request_provisioning(&request()).await.unwrap_err();

    assert!(matches!(e, Error::HostUnreachable(_)), "{e:?}");
    assert_eq!(e.kind(), ErrorKind::Host);

    Ok(())
}
