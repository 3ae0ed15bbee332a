// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Key host client
//!
//! The key host issues terminal-specific key material in exchange for the
//! terminal's bootstrap certificates. Each provisioning request is a single
//! JSON POST, see [KeyHostClient::request_provisioning].

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(feature = "host_http")]
pub use http::HttpTransport;

/// Key host index sent with every provisioning request
pub const KEY_HOST_INDEX: &str = "1";

/// `result` value indicating a successful provisioning response
pub const RESULT_SUCCESS: &str = "Success";

/// Default key host connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default key host request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Key host connection configuration
#[derive(Clone, Debug, PartialEq)]
pub struct HostConfig {
    /// Provisioning endpoint URL
    pub url: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Timeout for the whole request / response exchange
    pub request_timeout: Duration,
}

impl HostConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Provisioning request, built from the terminal bootstrap files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostProvisioningRequest {
    #[serde(rename = "prodSignCert")]
    pub prod_sign_cert: String,
    #[serde(rename = "terminalCert")]
    pub terminal_cert: String,
    #[serde(rename = "tempLoadCert")]
    pub temp_load_cert: String,
    #[serde(rename = "suggestedIKSN")]
    pub suggested_iksn: String,
    #[serde(rename = "keyHostIndex")]
    pub key_host_index: String,
}

impl HostProvisioningRequest {
    pub fn new(
        prod_sign_cert: impl Into<String>,
        terminal_cert: impl Into<String>,
        temp_load_cert: impl Into<String>,
        suggested_iksn: impl Into<String>,
    ) -> Self {
        Self {
            prod_sign_cert: prod_sign_cert.into(),
            terminal_cert: terminal_cert.into(),
            temp_load_cert: temp_load_cert.into(),
            suggested_iksn: suggested_iksn.into(),
            key_host_index: KEY_HOST_INDEX.to_string(),
        }
    }
}

/// Validated provisioning response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostProvisioningResponse {
    /// Key host (HSM) certificate
    pub hsm_cert: String,
    /// Key block protection key (hex)
    pub kbpk: String,
    /// KBPK signature (hex)
    pub kbpk_sig: String,
    /// SRED key block
    pub sred_tr31: String,
    /// SRED initial key serial number
    pub sred_iksn: String,
    /// PIN key block
    pub pin_tr31: String,
    /// PIN initial key serial number
    pub pin_iksn: String,
}

impl HostProvisioningResponse {
    /// Parse and validate a key host response body.
    ///
    /// The `result` field must equal [RESULT_SUCCESS] and every key field must
    /// be present, no partial responses are returned.
    pub fn parse(body: &str) -> Result<Self, Error> {
        let v: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| Error::HostResponseMalformed(e.to_string()))?;

        let o = v
            .as_object()
            .ok_or_else(|| Error::HostResponseMalformed("expected JSON object".to_string()))?;

        match o.get("result") {
            None => {
                return Err(Error::HostResponseMalformed(
                    "missing 'result' field".to_string(),
                ))
            }
            Some(serde_json::Value::String(s)) if s == RESULT_SUCCESS => (),
            Some(serde_json::Value::String(s)) => return Err(Error::HostRejected(s.clone())),
            Some(_) => {
                return Err(Error::HostResponseMalformed(
                    "'result' is not a string".to_string(),
                ))
            }
        }

        serde_json::from_value(v).map_err(|e| Error::HostResponseMalformed(e.to_string()))
    }
}

/// Network transport for key host requests
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// POST a JSON body to the provided URL, returning the response body
    async fn post_json(&self, url: &str, body: String) -> Result<Vec<u8>, Error>;
}

/// Key host client, generic over [HostTransport]
pub struct KeyHostClient<H: HostTransport> {
    transport: H,
    url: String,
}

impl<H: HostTransport> KeyHostClient<H> {
    /// Create a new key host client using the provided transport and endpoint
    pub fn new(transport: H, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }

    /// Fetch the provisioning endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Execute a provisioning request
    pub async fn request_provisioning(
        &self,
        req: &HostProvisioningRequest,
    ) -> Result<HostProvisioningResponse, Error> {
        let body = serde_json::to_string(req)
            .map_err(|_| Error::InvalidArgument("unencodable provisioning request"))?;

        debug!("Requesting provisioning from {}", self.url);

        let resp = self.transport.post_json(&self.url, body).await?;

        let resp = String::from_utf8(resp)
            .map_err(|_| Error::HostResponseMalformed("response is not valid UTF-8".to_string()))?;

        HostProvisioningResponse::parse(&resp)
    }
}

#[cfg(feature = "host_http")]
impl KeyHostClient<HttpTransport> {
    /// Create a key host client using the HTTP transport
    pub fn http(cfg: &HostConfig) -> Result<Self, Error> {
        let t = HttpTransport::new(cfg)?;
        Ok(Self::new(t, cfg.url.clone()))
    }
}

#[cfg(feature = "host_http")]
mod http {
    use async_trait::async_trait;
    use log::debug;
    use reqwest::header::CONTENT_TYPE;

    use super::{HostConfig, HostTransport};
    use crate::Error;

    /// HTTP(S) transport for key host requests
    pub struct HttpTransport {
        client: reqwest::Client,
    }

    impl HttpTransport {
        /// Create a new HTTP transport with the configured timeouts
        pub fn new(cfg: &HostConfig) -> Result<Self, Error> {
            let client = reqwest::Client::builder()
                .connect_timeout(cfg.connect_timeout)
                .timeout(cfg.request_timeout)
                .build()
                .map_err(|e| Error::HostUnreachable(e.to_string()))?;

            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HostTransport for HttpTransport {
        async fn post_json(&self, url: &str, body: String) -> Result<Vec<u8>, Error> {
            let resp = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/json; charset=utf-8")
                .body(body)
                .send()
                .await
                .map_err(|e| Error::HostUnreachable(e.to_string()))?;

            let status = resp.status();
            debug!("Key host responded with HTTP {}", status);

            if !status.is_success() {
                return Err(Error::HostUnreachable(format!("HTTP status {status}")));
            }

            let b = resp
                .bytes()
                .await
                .map_err(|e| Error::HostUnreachable(e.to_string()))?;

            Ok(b.to_vec())
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn success() -> serde_json::Value {
        json!({
            "result": "Success",
            "hsmCert": "A",
            "kbpk": "0011",
            "kbpkSig": "2233",
            "sredTr31": "B",
            "sredIksn": "C",
            "pinTr31": "D",
            "pinIksn": "E",
        })
    }

    #[test]
    fn request_keys() {
        let r = HostProvisioningRequest::new("p", "t", "l", "k");
        let v = serde_json::to_value(&r).unwrap();

        assert_eq!(
            v,
            json!({
                "prodSignCert": "p",
                "terminalCert": "t",
                "tempLoadCert": "l",
                "suggestedIKSN": "k",
                "keyHostIndex": "1",
            })
        );
    }

    #[test]
    fn parse_success() {
        let r = HostProvisioningResponse::parse(&success().to_string()).unwrap();

        assert_eq!(
            r,
            HostProvisioningResponse {
                hsm_cert: "A".to_string(),
                kbpk: "0011".to_string(),
                kbpk_sig: "2233".to_string(),
                sred_tr31: "B".to_string(),
                sred_iksn: "C".to_string(),
                pin_tr31: "D".to_string(),
                pin_iksn: "E".to_string(),
            }
        );
    }

    #[test]
    fn parse_missing_result() {
        let mut v = success();
        v.as_object_mut().unwrap().remove("result");

        let e = HostProvisioningResponse::parse(&v.to_string()).unwrap_err();
        assert!(matches!(e, Error::HostResponseMalformed(_)), "{e:?}");
    }

    #[test]
    fn parse_non_string_result() {
        for r in [json!(true), json!(null), json!(1), json!({"status": "Success"})] {
            let mut v = success();
            v["result"] = r.clone();

            let e = HostProvisioningResponse::parse(&v.to_string()).unwrap_err();
            assert!(matches!(e, Error::HostResponseMalformed(_)), "{r}: {e:?}");
        }
    }

    #[test]
    fn parse_rejected() {
        let mut v = success();
        v["result"] = json!("Failure");

        let e = HostProvisioningResponse::parse(&v.to_string()).unwrap_err();
        assert!(matches!(e, Error::HostRejected(ref s) if s == "Failure"), "{e:?}");
    }

    #[test]
    fn parse_missing_field() {
        for f in ["hsmCert", "kbpk", "kbpkSig", "sredTr31", "sredIksn", "pinTr31", "pinIksn"] {
            let mut v = success();
            v.as_object_mut().unwrap().remove(f);

            let e = HostProvisioningResponse::parse(&v.to_string()).unwrap_err();
            assert!(matches!(e, Error::HostResponseMalformed(_)), "{f}: {e:?}");
        }
    }

    #[test]
    fn parse_invalid_json() {
        for b in ["", "not json", "[1, 2]", "{\"result\": "] {
            let e = HostProvisioningResponse::parse(b).unwrap_err();
            assert!(matches!(e, Error::HostResponseMalformed(_)), "'{b}': {e:?}");
        }
    }
}
