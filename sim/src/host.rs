// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Scripted key host for injection tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use serde_json::json;

use rki::{host::HostTransport, Error};

/// Scripted key host response
#[derive(Clone, Debug)]
pub enum HostScript {
    /// Respond with the provided body
    Respond(Vec<u8>),
    /// Fail as if the host were unreachable
    Unreachable,
}

/// Mock [HostTransport], returning a scripted response and capturing requests
#[derive(Clone, Debug)]
pub struct MockKeyHost {
    script: Arc<Mutex<HostScript>>,
    requests: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl Default for MockKeyHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKeyHost {
    /// Create a mock host returning [MockKeyHost::success_response]
    pub fn new() -> Self {
        Self::with_body(Self::success_response().to_string())
    }

    /// Create a mock host returning the provided body
    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        Self::with_script(HostScript::Respond(body.into()))
    }

    /// Create a mock host with the provided script
    pub fn with_script(script: HostScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Canned successful provisioning response
    pub fn success_response() -> serde_json::Value {
        json!({
            "result": "Success",
            "hsmCert": "-----BEGIN CERTIFICATE-----\nMIIBsim\n-----END CERTIFICATE-----\n",
            "kbpk": "0123456789abcdef0123456789abcdef",
            "kbpkSig": "deadbeefcafebabe",
            "sredTr31": "B0096B1TX00N0100KS1800604B120F9292800000",
            "sredIksn": "FFFF9876543210E00000",
            "pinTr31": "B0096P0TE00N0100KS1800604B120F9292800001",
            "pinIksn": "FFFF9876543210E00001",
        })
    }

    /// Replace the scripted response
    pub fn set_script(&self, script: HostScript) {
        match self.script.lock() {
            Ok(mut s) => *s = script,
            Err(e) => *e.into_inner() = script,
        }
    }

    /// Fetch captured requests as `(url, body)` pairs
    pub fn requests(&self) -> Vec<(String, serde_json::Value)> {
        match self.requests.lock() {
            Ok(r) => r.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }
}

#[async_trait]
impl HostTransport for MockKeyHost {
    async fn post_json(&self, url: &str, body: String) -> Result<Vec<u8>, Error> {
        debug!("Key host request to {}: {}", url, body);

        let v = serde_json::from_str(&body)
            .map_err(|_| Error::InvalidArgument("request is not valid JSON"))?;

        {
            let mut r = match self.requests.lock() {
                Ok(r) => r,
                Err(e) => e.into_inner(),
            };
            r.push((url.to_string(), v));
        }

        let script = match self.script.lock() {
            Ok(s) => s.clone(),
            Err(e) => e.into_inner().clone(),
        };

        match script {
            HostScript::Respond(b) => Ok(b),
            HostScript::Unreachable => {
                Err(Error::HostUnreachable("connection refused".to_string()))
            }
        }
    }
}
